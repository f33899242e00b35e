//! The candidate invitation pipeline.
//!
//! One dispatch run takes an election, picks the candidates a named filter
//! selects, emails each one an invitation, records an event per email sent and
//! finally tells observers about all of those events at once.

mod compose;
mod dispatch;
mod filter;
mod report;
mod template;

pub use compose::{CandidateParams, Composer, Contact, InviteMessage, InviteParams, PayloadError};
pub use dispatch::{Invites, RunId};
pub use filter::{eligibility, is_eligible, CandidateFilter, Eligibility};
pub use report::{
    CandidateOutcome, DispatchReport, DispatchResult, FailureReason, Outcome, SkipReason,
};
pub use template::TemplateCache;
