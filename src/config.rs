use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::mongodb::ensure_indexes_exist;

const DEFAULT_SCHEME: &str = "https://";
const DEFAULT_PLATFORM_NAME: &str = "EnCiv.org";
const DEFAULT_LOGO_URL: &str =
    "https://res.cloudinary.com/hf6mryjpf/image/upload/v1664306598/assets/undebate-logo_qczkk6.png";

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Deserialize)]
pub struct Config {
    // non-secrets
    hostname: String,
    #[serde(default = "default_scheme")]
    scheme: String,
    #[serde(default = "default_platform_name")]
    platform_name: String,
    default_from_email: String,
    #[serde(default = "default_logo_url")]
    default_logo_url: String,
    auth_ttl: u32,
    // secrets
    jwt_secret: String,
}

fn default_scheme() -> String {
    DEFAULT_SCHEME.to_string()
}

fn default_platform_name() -> String {
    DEFAULT_PLATFORM_NAME.to_string()
}

fn default_logo_url() -> String {
    DEFAULT_LOGO_URL.to_string()
}

impl Config {
    /// The public hostname of the site, used to build recorder links.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// URL scheme prefix, including the `://`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Name shown after "via" in the sender of every invitation.
    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    /// Sender address of every invitation.
    pub fn default_from_email(&self) -> &str {
        &self.default_from_email
    }

    /// Logo used when an election has none of its own.
    pub fn default_logo_url(&self) -> &str {
        &self.default_logo_url
    }

    /// Absolute URL of a recorder given its site-relative path.
    pub fn recorder_url(&self, path: &str) -> String {
        format!("{}{}{}", self.scheme, self.hostname, path)
    }

    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!(
            "Invitations will be sent from {} for {}",
            config.default_from_email, config.hostname
        );
        Ok(rocket.manage(config))
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// ensures indexes exist, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        Ok(rocket.manage(client).manage(db))
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "undebate".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
