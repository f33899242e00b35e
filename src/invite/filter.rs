use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PreconditionFailure;
use crate::model::election::Candidate;

/// Named policies selecting which candidates a run invites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateFilter {
    /// Everyone.
    #[default]
    All,
    /// Candidates who have never been sent an invitation.
    NotYetInvited,
    /// Candidates who have not recorded answers and have not declined.
    NotYetSubmitted,
    /// Candidates who have recorded answers.
    Submitted,
}

impl CandidateFilter {
    pub const VARIANTS: [CandidateFilter; 4] = [
        Self::All,
        Self::NotYetInvited,
        Self::NotYetSubmitted,
        Self::Submitted,
    ];

    /// The name callers select this filter by.
    pub const fn name(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::NotYetInvited => "NOT_YET_INVITED",
            Self::NotYetSubmitted => "NOT_YET_SUBMITTED",
            Self::Submitted => "SUBMITTED",
        }
    }

    pub fn matches(self, candidate: &Candidate) -> bool {
        match self {
            Self::All => true,
            Self::NotYetInvited => candidate.invitations.is_empty(),
            Self::NotYetSubmitted => candidate.submissions.is_empty() && !candidate.declined,
            Self::Submitted => !candidate.submissions.is_empty(),
        }
    }
}

impl Display for CandidateFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CandidateFilter {
    type Err = PreconditionFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::VARIANTS
            .into_iter()
            .find(|filter| filter.name() == s)
            .ok_or_else(|| PreconditionFailure::UnknownFilter(s.to_string()))
    }
}

/// Whether one candidate gets an invitation in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// The filter does not select this candidate.
    NotSelected,
    /// Selected, but there is no recorder to send them to.
    NoRecorder,
}

pub fn eligibility(candidate: &Candidate, filter: CandidateFilter) -> Eligibility {
    if !filter.matches(candidate) {
        Eligibility::NotSelected
    } else if candidate.recorder_path().is_none() {
        Eligibility::NoRecorder
    } else {
        Eligibility::Eligible
    }
}

pub fn is_eligible(candidate: &Candidate, filter: CandidateFilter) -> bool {
    eligibility(candidate, filter) == Eligibility::Eligible
}
