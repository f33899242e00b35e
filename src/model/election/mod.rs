use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    mongodb::{Coll, Id},
    revision::RevisionLog,
};

mod candidate;
mod question;

pub use candidate::{Candidate, Invitation, Recorder, Submission};
pub use question::{Question, QuestionIndexError, Questions};

/// An election record, as stored by the election-management system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Election {
    /// Unique ID.
    #[serde(rename = "_id")]
    pub id: Id,
    /// Election name; may be blank while the election is being set up.
    #[serde(default)]
    pub name: String,
    /// Contact address for the election, copied on every invitation.
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub organization_name: String,
    #[serde(default)]
    pub organization_logo: Option<String>,
    #[serde(default)]
    pub moderator: Moderator,
    /// Candidates keyed by unique ID, in the order they were added.
    #[serde(default)]
    pub candidates: IndexMap<String, Candidate>,
    #[serde(default)]
    pub questions: Questions,
    #[serde(default)]
    pub timeline: Timeline,
}

impl Election {
    /// Name for log lines and event descriptions, falling back to the ID.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            self.id.to_string()
        } else {
            self.name.clone()
        }
    }

    /// The current candidate submission deadline.
    pub fn submission_deadline(&self) -> Option<DateTime<Utc>> {
        self.timeline
            .candidate_submission_deadline
            .latest()
            .map(|point| point.date)
    }

    /// Everything the invitation email refers to has been filled in: there
    /// are candidates and each can be contacted, the questions are complete,
    /// the moderator is known and a submission deadline is set.
    pub fn are_candidates_ready_for_invites(&self) -> bool {
        !self.candidates.is_empty()
            && self.candidates.values().all(Candidate::has_contact_details)
            && !self.questions.is_empty()
            && self.questions.is_complete()
            && self.moderator.is_complete()
            && self.submission_deadline().is_some()
    }

    /// Questions are frozen once any candidate has been invited.
    pub fn are_questions_locked(&self) -> bool {
        self.candidates
            .values()
            .any(|candidate| !candidate.invitations.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moderator {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl Moderator {
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.email.trim().is_empty()
    }
}

/// Key dates of the election, each kept as a revision history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    #[serde(default)]
    pub candidate_submission_deadline: RevisionLog<TimelinePoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub date: DateTime<Utc>,
}

/// Where election records are read from.
#[rocket::async_trait]
pub trait ElectionSource: Send + Sync {
    async fn find_election(&self, id: Id) -> Result<Option<Election>>;
}

#[rocket::async_trait]
impl ElectionSource for Coll<Election> {
    async fn find_election(&self, id: Id) -> Result<Option<Election>> {
        Ok(self.find_one(id.as_doc(), None).await?)
    }
}

/// Example test data.
#[cfg(test)]
mod examples {
    use chrono::TimeZone;

    use super::*;

    impl Election {
        /// A ready election with three candidates.
        pub fn example() -> Self {
            let deadline = Utc.with_ymd_and_hms(2026, 11, 2, 17, 30, 0).unwrap();
            Self {
                id: Id::new(),
                name: "Springfield Mayoral Undebate".to_string(),
                email: Some("elections@springfield.example".to_string()),
                organization_name: "Springfield League".to_string(),
                organization_logo: None,
                moderator: Moderator {
                    name: "Pat Moderator".to_string(),
                    email: "pat@springfield.example".to_string(),
                },
                candidates: (1..=3)
                    .map(Candidate::example)
                    .map(|candidate| (candidate.unique_id.clone(), candidate))
                    .collect(),
                questions: Questions::example(),
                timeline: Timeline {
                    candidate_submission_deadline: vec![
                        TimelinePoint {
                            date: deadline - chrono::Duration::days(7),
                        },
                        TimelinePoint { date: deadline },
                    ]
                    .into(),
                },
            }
        }
    }
}
