use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::revision::RevisionLog;

/// A candidate standing in an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Unique ID within the election.
    pub unique_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub office: String,
    /// Recorder pages created for this candidate, newest last.
    #[serde(default)]
    pub recorders: RevisionLog<Recorder>,
    /// Invitations sent so far, newest last.
    #[serde(default)]
    pub invitations: RevisionLog<Invitation>,
    /// Recorded answers received so far, newest last.
    #[serde(default)]
    pub submissions: RevisionLog<Submission>,
    /// The candidate has said they will not take part.
    #[serde(default)]
    pub declined: bool,
}

impl Candidate {
    /// Site-relative path of the newest recorder, if it has one.
    pub fn recorder_path(&self) -> Option<&str> {
        self.recorders
            .latest()
            .map(|recorder| recorder.path.as_str())
            .filter(|path| !path.is_empty())
    }

    /// Has enough contact detail to be sent an invitation.
    pub fn has_contact_details(&self) -> bool {
        !self.name.trim().is_empty()
            && !self.email.trim().is_empty()
            && !self.office.trim().is_empty()
    }
}

/// A link to the page where a candidate records their answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recorder {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub message_id: String,
    pub sent_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub path: String,
    pub date: DateTime<Utc>,
}
