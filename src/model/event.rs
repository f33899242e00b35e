use std::ops::Deref;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::invite::InviteMessage;
use crate::mailer::MessageId;
use crate::model::mongodb::{Coll, Id};

pub const INVITE_SENT_SUBJECT: &str = "Candidate Invite Sent";
pub const INVITE_SENT_COMPONENT: &str = "CandidateInviteSent";

/// Record that one invitation email went out, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInviteSentEvent {
    /// The election the invitation belongs to.
    pub parent_id: Id,
    pub subject: String,
    pub description: String,
    pub component: InviteSentComponent,
}

/// Event payload: the message exactly as it was handed to the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteSentComponent {
    pub component: String,
    pub message_id: MessageId,
    #[serde(flatten)]
    pub message: InviteMessage,
    pub sent_date: DateTime<Utc>,
}

impl NewInviteSentEvent {
    pub fn new(
        election_id: Id,
        election_label: &str,
        message_id: MessageId,
        message: InviteMessage,
        sent_date: DateTime<Utc>,
    ) -> Self {
        Self {
            parent_id: election_id,
            subject: INVITE_SENT_SUBJECT.to_string(),
            description: format!("{INVITE_SENT_SUBJECT} for election {election_label}"),
            component: InviteSentComponent {
                component: INVITE_SENT_COMPONENT.to_string(),
                message_id,
                message,
                sent_date,
            },
        }
    }
}

/// A stored invitation event, with its unique ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteSentEvent {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub event: NewInviteSentEvent,
}

impl Deref for InviteSentEvent {
    type Target = NewInviteSentEvent;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

/// Append-only store of events, keyed by parent election.
#[rocket::async_trait]
pub trait EventStore: Send + Sync {
    async fn create(&self, event: NewInviteSentEvent) -> Result<InviteSentEvent>;
}

#[rocket::async_trait]
impl EventStore for Coll<NewInviteSentEvent> {
    async fn create(&self, event: NewInviteSentEvent) -> Result<InviteSentEvent> {
        let id: Id = self
            .insert_one(&event, None)
            .await?
            .inserted_id
            .as_object_id()
            .ok_or_else(|| Error::internal("Inserted event has no ObjectId"))?
            .into();
        Ok(InviteSentEvent { id, event })
    }
}
