use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::mailer::TemplateId;
use crate::model::{
    election::{Candidate, Election, Questions},
    mongodb::Id,
};

const DEFAULT_ELECTION_NAME: &str = "Election Administrator";

/// A transactional email as the provider expects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteMessage {
    /// Template variables.
    pub params: InviteParams,
    pub to: Vec<Contact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<Contact>>,
    pub sender: Contact,
    pub template_id: TemplateId,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub organization_name: String,
    pub organization_logo: String,
    pub moderator: Contact,
    pub questions: Questions,
    pub candidate: CandidateParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateParams {
    pub name: String,
    pub email: String,
    pub unique_id: String,
    pub office: String,
    // The templates were written against this exact key.
    #[serde(rename = "recorder_url")]
    pub recorder_url: String,
    pub submission_deadline: String,
}

/// Why a message could not be built for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("candidate {0} has no email address")]
    NoRecipient(String),
    #[error("candidate {0} has no recorder")]
    NoRecorder(String),
    #[error("no sender address is configured")]
    NoSender,
}

/// Builds the invitation for each candidate of one run.
///
/// Everything that is the same for every candidate (the question list, the
/// deadline text, the sender) is fixed when the composer is created.
pub struct Composer<'a> {
    election_id: Id,
    election: &'a Election,
    config: &'a Config,
    template_id: TemplateId,
    questions: Questions,
    deadline: String,
}

impl<'a> Composer<'a> {
    pub fn new(
        election_id: Id,
        election: &'a Election,
        config: &'a Config,
        template_id: TemplateId,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            election_id,
            election,
            config,
            template_id,
            // Taken once so every message of the run shows the same questions.
            questions: election.questions.clone(),
            deadline: format_deadline(deadline),
        }
    }

    /// Build the message for one candidate.
    pub fn compose(&self, candidate: &Candidate) -> Result<InviteMessage, PayloadError> {
        let election = self.election;
        if candidate.email.trim().is_empty() {
            return Err(PayloadError::NoRecipient(candidate.unique_id.clone()));
        }
        if self.config.default_from_email().trim().is_empty() {
            return Err(PayloadError::NoSender);
        }
        let recorder_path = candidate
            .recorder_path()
            .ok_or_else(|| PayloadError::NoRecorder(candidate.unique_id.clone()))?;

        let election_email = election.email.clone().filter(|email| !email.is_empty());
        let params = InviteParams {
            name: election.name.clone(),
            email: election_email.clone(),
            organization_name: election.organization_name.clone(),
            organization_logo: election
                .organization_logo
                .clone()
                .filter(|logo| !logo.is_empty())
                .unwrap_or_else(|| self.config.default_logo_url().to_string()),
            moderator: Contact {
                name: election.moderator.name.clone(),
                email: election.moderator.email.clone(),
            },
            questions: self.questions.clone(),
            candidate: CandidateParams {
                name: candidate.name.clone(),
                email: candidate.email.clone(),
                unique_id: candidate.unique_id.clone(),
                office: candidate.office.clone(),
                recorder_url: self.config.recorder_url(recorder_path),
                submission_deadline: self.deadline.clone(),
            },
        };

        let sender_name = format!(
            "{} @ {} via {}",
            if election.name.is_empty() {
                DEFAULT_ELECTION_NAME
            } else {
                election.name.as_str()
            },
            election.organization_name,
            self.config.platform_name()
        );

        Ok(InviteMessage {
            to: vec![Contact {
                email: candidate.email.clone(),
                name: candidate.name.clone(),
            }],
            cc: election_email.map(|email| {
                vec![Contact {
                    email,
                    name: election.name.clone(),
                }]
            }),
            sender: Contact {
                name: sender_name,
                email: self.config.default_from_email().to_string(),
            },
            template_id: self.template_id,
            tags: vec![
                format!("id:{}", self.election_id),
                "role:candidate".to_string(),
                format!("office:{}", candidate.office),
            ],
            params,
        })
    }
}

/// Render a deadline the way it appears in the email body.
pub fn format_deadline(deadline: DateTime<Utc>) -> String {
    deadline.format("%B %-d, %Y, %-I:%M %p UTC").to_string()
}
