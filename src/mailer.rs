//! Transactional email through the Brevo (formerly Sendinblue) HTTP API.

use std::fmt::{Display, Formatter};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::invite::{InviteMessage, TemplateCache};

const DEFAULT_API_URL: &str = "https://api.brevo.com/v3";
const DEFAULT_TEMPLATE_NAME: &str = "candidate-invitation";
/// The most templates Brevo returns in one listing page.
const TEMPLATE_PAGE_SIZE: usize = 1000;

/// Provider-side ID of an email template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub i64);

impl Display for TemplateId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider-side ID of a sent message.
pub type MessageId = String;

/// Finds email templates by name.
#[rocket::async_trait]
pub trait TemplateLookup: Send + Sync {
    async fn template_id(&self, name: &str) -> Result<Option<TemplateId>>;
}

/// Sends one transactional email.
///
/// `Ok(None)` means the provider accepted the call but reported no message ID.
#[rocket::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_transactional(&self, message: &InviteMessage) -> Result<Option<MessageId>>;
}

/// Client for the Brevo v3 API.
pub struct Brevo {
    http: reqwest::Client,
    api_url: String,
}

impl Brevo {
    pub fn new(api_url: &str, api_key: &str) -> Result<Self> {
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| Error::internal("Brevo API key is not a valid header value"))?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("api-key", key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct TemplateList {
    #[serde(default)]
    templates: Vec<TemplateSummary>,
}

#[derive(Deserialize)]
struct TemplateSummary {
    id: i64,
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SentEmail {
    message_id: Option<MessageId>,
}

#[rocket::async_trait]
impl TemplateLookup for Brevo {
    async fn template_id(&self, name: &str) -> Result<Option<TemplateId>> {
        let url = format!("{}/smtp/templates", self.api_url);
        let list: TemplateList = self
            .http
            .get(&url)
            .query(&[
                ("templateStatus", "true".to_string()),
                ("limit", TEMPLATE_PAGE_SIZE.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(find_template(list.templates, name))
    }
}

fn find_template(templates: Vec<TemplateSummary>, name: &str) -> Option<TemplateId> {
    templates
        .into_iter()
        .find(|template| template.name == name)
        .map(|template| TemplateId(template.id))
}

#[rocket::async_trait]
impl EmailSender for Brevo {
    async fn send_transactional(&self, message: &InviteMessage) -> Result<Option<MessageId>> {
        let url = format!("{}/smtp/email", self.api_url);
        let response = self.http.post(&url).json(message).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::internal(format!(
                "{url} returned HTTP {status}: {body}"
            )));
        }
        let sent: SentEmail = response.json().await?;
        Ok(sent.message_id)
    }
}

/// Configuration for the email provider.
#[derive(Deserialize)]
struct MailerConfig {
    #[serde(default = "default_api_url")]
    brevo_api_url: String,
    #[serde(default = "default_template_name")]
    invite_template_name: String,
    /// Skips the template lookup when set.
    #[serde(default)]
    invite_template_id: Option<i64>,
    // secrets
    brevo_api_key: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_template_name() -> String {
    DEFAULT_TEMPLATE_NAME.to_string()
}

/// A fairing that builds the Brevo client and the invitation template cache
/// and places both into managed state.
pub struct MailerFairing;

#[rocket::async_trait]
impl Fairing for MailerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Brevo mailer",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<MailerConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load mailer config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let client = match Brevo::new(&config.brevo_api_url, &config.brevo_api_key) {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to build Brevo client: {e}");
                return Err(rocket);
            }
        };
        let templates = match config.invite_template_id {
            Some(id) => {
                info!(
                    "Using configured template {id} for {:?}",
                    config.invite_template_name
                );
                TemplateCache::with_id(config.invite_template_name, TemplateId(id))
            }
            None => TemplateCache::new(config.invite_template_name),
        };
        info!("Loaded Brevo config for {}", config.brevo_api_url);

        Ok(rocket.manage(client).manage(templates))
    }
}
