use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mailer::MessageId;
use crate::model::{event::InviteSentEvent, mongodb::Id};

use super::{compose::PayloadError, dispatch::RunId};

/// One invitation that went out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub unique_id: String,
    pub message_id: MessageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotSelected,
    NoRecorder,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error(transparent)]
    Compose(#[from] PayloadError),
    #[error("provider error: {0}")]
    Send(String),
    #[error("provider returned no message ID")]
    NoMessageId,
}

/// What happened to one candidate during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The email was sent. `event` is `None` if recording it failed.
    Sent {
        message_id: MessageId,
        event: Option<Id>,
    },
    Skipped(SkipReason),
    Failed(FailureReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateOutcome {
    pub unique_id: String,
    pub outcome: Outcome,
}

/// Everything one dispatch run did, in candidate order.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub run_id: RunId,
    pub election_id: Id,
    outcomes: Vec<CandidateOutcome>,
    events: Vec<InviteSentEvent>,
}

impl DispatchReport {
    pub fn new(run_id: RunId, election_id: Id) -> Self {
        Self {
            run_id,
            election_id,
            outcomes: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn record(&mut self, unique_id: String, outcome: Outcome) {
        self.outcomes.push(CandidateOutcome { unique_id, outcome });
    }

    pub fn record_event(&mut self, event: InviteSentEvent) {
        self.events.push(event);
    }

    pub fn outcome_of(&self, unique_id: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|o| o.unique_id == unique_id)
            .map(|o| &o.outcome)
    }

    /// Events stored during the run.
    pub fn events(&self) -> &[InviteSentEvent] {
        &self.events
    }

    /// Number of candidates that failed, as opposed to being skipped.
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Failed(_)))
            .count()
    }

    /// The sent invitations, in candidate order.
    pub fn results(&self) -> Vec<DispatchResult> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.outcome {
                Outcome::Sent { message_id, .. } => Some(DispatchResult {
                    unique_id: o.unique_id.clone(),
                    message_id: message_id.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}
