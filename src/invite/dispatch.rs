use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::PreconditionFailure;
use crate::mailer::{EmailSender, TemplateId, TemplateLookup};
use crate::model::{
    auth::AuthToken,
    election::{Candidate, Election, ElectionSource},
    event::{EventStore, NewInviteSentEvent},
    mongodb::Id,
};
use crate::notify::ElectionNotifier;

use super::{
    compose::Composer,
    filter::{eligibility, CandidateFilter, Eligibility},
    report::{DispatchReport, DispatchResult, FailureReason, Outcome, SkipReason},
    template::TemplateCache,
};

/// Identifies one dispatch run across its log lines and its update.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub usize);

impl RunId {
    /// Atomically get the next ID, wrapping at `usize::MAX`.
    pub fn next() -> RunId {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        RunId(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "run{}", self.0)
    }
}

/// The collaborators a dispatch run needs.
pub struct Invites<'a> {
    pub config: &'a Config,
    pub templates: &'a TemplateCache,
    pub lookup: &'a dyn TemplateLookup,
    pub sender: &'a dyn EmailSender,
    pub elections: &'a dyn ElectionSource,
    pub events: &'a dyn EventStore,
    pub notifier: &'a dyn ElectionNotifier,
}

impl Invites<'_> {
    /// Invite the candidates of an election that `filter_name` selects.
    ///
    /// Returns the invitations sent, in candidate order. Nothing is sent and
    /// the result is empty if any precondition fails; individual candidates
    /// that cannot be invited are left out.
    pub async fn send(
        &self,
        actor: Option<&AuthToken>,
        election_id: Id,
        filter_name: &str,
    ) -> Vec<DispatchResult> {
        match self.run(actor, election_id, filter_name).await {
            Ok(report) => report.results(),
            Err(failure) => {
                error!("Not sending candidate invites for election {election_id}: {failure}");
                Vec::new()
            }
        }
    }

    /// Check the preconditions that don't need the election, load it, and
    /// dispatch.
    pub async fn run(
        &self,
        actor: Option<&AuthToken>,
        election_id: Id,
        filter_name: &str,
    ) -> Result<DispatchReport, PreconditionFailure> {
        let actor = actor.ok_or(PreconditionFailure::NotAuthenticated)?;
        let template_id = self.templates.resolve(self.lookup).await?;
        let filter: CandidateFilter = filter_name.parse()?;
        let election = match self.elections.find_election(election_id).await {
            Ok(Some(election)) => election,
            Ok(None) => return Err(PreconditionFailure::ElectionNotFound(election_id.to_string())),
            Err(e) => {
                error!("Failed to load election {election_id}: {e}");
                return Err(PreconditionFailure::ElectionNotFound(election_id.to_string()));
            }
        };
        debug!(
            "User {} is inviting {filter} candidates of election {election_id}",
            actor.id
        );
        self.dispatch(election_id, &election, filter, template_id)
            .await
    }

    /// Send one invitation to every eligible candidate of `election`, one
    /// after the other, then publish the recorded events in a single update.
    pub async fn dispatch(
        &self,
        election_id: Id,
        election: &Election,
        filter: CandidateFilter,
        template_id: TemplateId,
    ) -> Result<DispatchReport, PreconditionFailure> {
        if !election.are_candidates_ready_for_invites() {
            return Err(PreconditionFailure::NotReady(election_id.to_string()));
        }
        let deadline = election
            .submission_deadline()
            .ok_or_else(|| PreconditionFailure::NoSubmissionDeadline(election_id.to_string()))?;

        let composer = Composer::new(election_id, election, self.config, template_id, deadline);
        let mut report = DispatchReport::new(RunId::next(), election_id);
        let run_id = report.run_id;
        info!(
            "{run_id}: inviting {filter} of {} candidates of election {election_id}",
            election.candidates.len()
        );

        for candidate in election.candidates.values() {
            let outcome = self
                .invite(&composer, election, candidate, filter, &mut report)
                .await;
            report.record(candidate.unique_id.clone(), outcome);
        }

        if !report.events().is_empty() {
            self.notifier
                .publish_batch(election_id, run_id, report.events())
                .await;
        }

        info!(
            "{run_id}: sent {} invites, recorded {} events, {} failed",
            report.results().len(),
            report.events().len(),
            report.failed()
        );
        Ok(report)
    }

    /// Invite one candidate. Never fails the run.
    async fn invite(
        &self,
        composer: &Composer<'_>,
        election: &Election,
        candidate: &Candidate,
        filter: CandidateFilter,
        report: &mut DispatchReport,
    ) -> Outcome {
        let run_id = report.run_id;
        let election_id = report.election_id;
        match eligibility(candidate, filter) {
            Eligibility::Eligible => {}
            Eligibility::NotSelected => return Outcome::Skipped(SkipReason::NotSelected),
            Eligibility::NoRecorder => {
                warn!(
                    "{run_id}: skipping candidate {} of election {election_id}, there's no recorder",
                    candidate.unique_id
                );
                return Outcome::Skipped(SkipReason::NoRecorder);
            }
        }

        let message = match composer.compose(candidate) {
            Ok(message) => message,
            Err(e) => {
                error!("{run_id}: cannot build invite for election {election_id}: {e}");
                return Outcome::Failed(e.into());
            }
        };

        let message_id = match self.sender.send_transactional(&message).await {
            Ok(Some(message_id)) if !message_id.is_empty() => message_id,
            Ok(_) => {
                error!(
                    "{run_id}: invite to candidate {} of election {election_id} has no message ID",
                    candidate.unique_id
                );
                return Outcome::Failed(FailureReason::NoMessageId);
            }
            Err(e) => {
                error!(
                    "{run_id}: invite to candidate {} of election {election_id} failed: {e}",
                    candidate.unique_id
                );
                return Outcome::Failed(FailureReason::Send(e.to_string()));
            }
        };

        let event = NewInviteSentEvent::new(
            election_id,
            &election.label(),
            message_id.clone(),
            message,
            Utc::now(),
        );
        // A failed write keeps the send.
        let event = match self.events.create(event).await {
            Ok(stored) => {
                let id = stored.id;
                report.record_event(stored);
                Some(id)
            }
            Err(e) => {
                error!(
                    "{run_id}: couldn't record invite {message_id} for candidate {}: {e}",
                    candidate.unique_id
                );
                None
            }
        };
        Outcome::Sent { message_id, event }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use super::*;
    use crate::error::{Error, Result};
    use crate::invite::InviteMessage;
    use crate::mailer::MessageId;
    use crate::model::event::InviteSentEvent;

    /// Email provider that fails for chosen recipients.
    #[derive(Default)]
    struct FakeProvider {
        lookups: AtomicUsize,
        no_template: bool,
        sent: Mutex<Vec<InviteMessage>>,
        failing: Vec<String>,
        without_id: Vec<String>,
    }

    impl FakeProvider {
        fn sent_to(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|message| message.to[0].email.clone())
                .collect()
        }
    }

    #[rocket::async_trait]
    impl TemplateLookup for FakeProvider {
        async fn template_id(&self, _name: &str) -> Result<Option<TemplateId>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok((!self.no_template).then_some(TemplateId(42)))
        }
    }

    #[rocket::async_trait]
    impl EmailSender for FakeProvider {
        async fn send_transactional(&self, message: &InviteMessage) -> Result<Option<MessageId>> {
            let recipient = message.to[0].email.clone();
            let mut sent = self.sent.lock().unwrap();
            sent.push(message.clone());
            if self.failing.contains(&recipient) {
                return Err(Error::internal("HTTP 400"));
            }
            if self.without_id.contains(&recipient) {
                return Ok(None);
            }
            Ok(Some(format!("<m{}@test>", sent.len())))
        }
    }

    /// Event store that refuses events for chosen recipients.
    #[derive(Default)]
    struct FakeStore {
        failing: Vec<String>,
        created: Mutex<Vec<InviteSentEvent>>,
    }

    #[rocket::async_trait]
    impl EventStore for FakeStore {
        async fn create(&self, event: NewInviteSentEvent) -> Result<InviteSentEvent> {
            if self.failing.contains(&event.component.message.to[0].email) {
                return Err(Error::internal("write concern failed"));
            }
            let stored = InviteSentEvent { id: Id::new(), event };
            self.created.lock().unwrap().push(stored.clone());
            Ok(stored)
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        batches: Mutex<Vec<(Id, RunId, Vec<InviteSentEvent>)>>,
    }

    #[rocket::async_trait]
    impl ElectionNotifier for FakeNotifier {
        async fn publish_batch(&self, election_id: Id, run_id: RunId, events: &[InviteSentEvent]) {
            self.batches
                .lock()
                .unwrap()
                .push((election_id, run_id, events.to_vec()));
        }
    }

    struct FakeElections(Option<Election>);

    #[rocket::async_trait]
    impl ElectionSource for FakeElections {
        async fn find_election(&self, id: Id) -> Result<Option<Election>> {
            Ok(self.0.clone().filter(|election| election.id == id))
        }
    }

    struct Harness {
        config: Config,
        templates: TemplateCache,
        provider: FakeProvider,
        store: FakeStore,
        notifier: FakeNotifier,
        elections: FakeElections,
        election_id: Id,
        token: AuthToken,
    }

    impl Harness {
        fn new(election: Election) -> Self {
            Self {
                config: Config::example(),
                templates: TemplateCache::new("candidate-invitation"),
                provider: FakeProvider::default(),
                store: FakeStore::default(),
                notifier: FakeNotifier::default(),
                election_id: election.id,
                elections: FakeElections(Some(election)),
                token: AuthToken::new(Id::new()),
            }
        }

        fn invites(&self) -> Invites<'_> {
            Invites {
                config: &self.config,
                templates: &self.templates,
                lookup: &self.provider,
                sender: &self.provider,
                elections: &self.elections,
                events: &self.store,
                notifier: &self.notifier,
            }
        }

        async fn send(&self, filter: &str) -> Vec<DispatchResult> {
            self.invites()
                .send(Some(&self.token), self.election_id, filter)
                .await
        }

        async fn run(&self, filter: &str) -> Result<DispatchReport, PreconditionFailure> {
            self.invites()
                .run(Some(&self.token), self.election_id, filter)
                .await
        }

        fn batches(&self) -> Vec<(Id, RunId, Vec<InviteSentEvent>)> {
            self.notifier.batches.lock().unwrap().clone()
        }

        fn created(&self) -> Vec<InviteSentEvent> {
            self.store.created.lock().unwrap().clone()
        }
    }

    #[rocket::async_test]
    async fn skipped_and_failed_candidates_are_left_out() {
        let mut election = Election::example();
        election.candidates[1] = election.candidates[1].clone().without_recorder();
        let mut harness = Harness::new(election);
        harness.provider.failing = vec!["candidate3@example.com".to_string()];

        let report = harness.run("ALL").await.unwrap();

        assert_eq!(
            report.results(),
            vec![DispatchResult {
                unique_id: "candidate-1".to_string(),
                message_id: "<m1@test>".to_string(),
            }]
        );
        assert_eq!(
            report.outcome_of("candidate-2"),
            Some(&Outcome::Skipped(SkipReason::NoRecorder))
        );
        assert!(matches!(
            report.outcome_of("candidate-3"),
            Some(Outcome::Failed(FailureReason::Send(_)))
        ));
        // Candidate 2 was never attempted.
        assert_eq!(
            harness.provider.sent_to(),
            ["candidate1@example.com", "candidate3@example.com"]
        );

        let created = harness.created();
        assert_eq!(created.len(), 1);
        let batches = harness.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, harness.election_id);
        assert_eq!(batches[0].1, report.run_id);
        assert_eq!(batches[0].2, created);
    }

    #[rocket::async_test]
    async fn one_event_per_send_and_one_notification_per_run() {
        let harness = Harness::new(Election::example());

        let results = harness.send("ALL").await;

        let ids: Vec<_> = results.iter().map(|r| r.unique_id.as_str()).collect();
        assert_eq!(ids, ["candidate-1", "candidate-2", "candidate-3"]);
        let created = harness.created();
        assert_eq!(created.len(), 3);
        for (event, result) in created.iter().zip(&results) {
            assert_eq!(event.parent_id, harness.election_id);
            assert_eq!(event.subject, "Candidate Invite Sent");
            assert_eq!(
                event.description,
                "Candidate Invite Sent for election Springfield Mayoral Undebate"
            );
            assert_eq!(event.component.component, "CandidateInviteSent");
            assert_eq!(event.component.message_id, result.message_id);
        }
        let batches = harness.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].2, created);
    }

    #[rocket::async_test]
    async fn not_ready_election_sends_nothing() {
        let mut election = Election::example();
        election.questions = Default::default();
        let harness = Harness::new(election);

        assert!(harness.send("ALL").await.is_empty());
        assert_eq!(
            harness.run("ALL").await.unwrap_err(),
            PreconditionFailure::NotReady(harness.election_id.to_string())
        );
        assert!(harness.provider.sent_to().is_empty());
        assert!(harness.batches().is_empty());
    }

    #[rocket::async_test]
    async fn unknown_filter_sends_nothing() {
        let harness = Harness::new(Election::example());

        assert!(harness.send("EVERYONE").await.is_empty());
        assert_eq!(
            harness.run("EVERYONE").await.unwrap_err(),
            PreconditionFailure::UnknownFilter("EVERYONE".to_string())
        );
        assert!(harness.provider.sent_to().is_empty());
    }

    #[rocket::async_test]
    async fn anonymous_caller_sends_nothing() {
        let harness = Harness::new(Election::example());

        let results = harness
            .invites()
            .send(None, harness.election_id, "ALL")
            .await;

        assert!(results.is_empty());
        assert_eq!(harness.provider.lookups.load(Ordering::SeqCst), 0);
        assert!(harness.provider.sent_to().is_empty());
    }

    #[rocket::async_test]
    async fn missing_template_or_election_sends_nothing() {
        let mut harness = Harness::new(Election::example());
        harness.provider.no_template = true;
        assert_eq!(
            harness.run("ALL").await.unwrap_err(),
            PreconditionFailure::TemplateNotFound("candidate-invitation".to_string())
        );

        let harness = Harness::new(Election::example());
        let other = Id::new();
        let result = harness
            .invites()
            .run(Some(&harness.token), other, "ALL")
            .await;
        assert_eq!(
            result.unwrap_err(),
            PreconditionFailure::ElectionNotFound(other.to_string())
        );
        assert!(harness.provider.sent_to().is_empty());
    }

    #[rocket::async_test]
    async fn unrecorded_send_is_still_returned() {
        let mut harness = Harness::new(Election::example());
        harness.store.failing = vec!["candidate2@example.com".to_string()];

        let report = harness.run("ALL").await.unwrap();

        assert_eq!(report.results().len(), 3);
        assert_eq!(
            report.outcome_of("candidate-2"),
            Some(&Outcome::Sent {
                message_id: "<m2@test>".to_string(),
                event: None,
            })
        );
        // Only the recorded events are announced.
        let batches = harness.batches();
        assert_eq!(batches.len(), 1);
        let announced: Vec<_> = batches[0]
            .2
            .iter()
            .map(|event| event.component.message_id.clone())
            .collect();
        assert_eq!(announced, ["<m1@test>", "<m3@test>"]);
    }

    #[rocket::async_test]
    async fn no_notification_without_events() {
        let mut harness = Harness::new(Election::example());
        harness.store.failing = (1..=3)
            .map(|n| format!("candidate{n}@example.com"))
            .collect();

        let results = harness.send("ALL").await;

        assert_eq!(results.len(), 3);
        assert!(harness.batches().is_empty());
    }

    #[rocket::async_test]
    async fn missing_message_id_is_a_failure() {
        let mut harness = Harness::new(Election::example());
        harness.provider.without_id = vec!["candidate1@example.com".to_string()];

        let report = harness.run("ALL").await.unwrap();

        assert_eq!(
            report.outcome_of("candidate-1"),
            Some(&Outcome::Failed(FailureReason::NoMessageId))
        );
        assert_eq!(harness.created().len(), 2);
    }

    #[rocket::async_test]
    async fn filter_selects_recipients() {
        let mut election = Election::example();
        election.candidates[0] = election.candidates[0].clone().invited();
        let harness = Harness::new(election);

        let report = harness.run("NOT_YET_INVITED").await.unwrap();

        assert_eq!(
            report.outcome_of("candidate-1"),
            Some(&Outcome::Skipped(SkipReason::NotSelected))
        );
        assert_eq!(
            harness.provider.sent_to(),
            ["candidate2@example.com", "candidate3@example.com"]
        );
    }

    #[rocket::async_test]
    async fn template_is_looked_up_once_across_runs() {
        let harness = Harness::new(Election::example());

        for _ in 0..3 {
            assert_eq!(harness.send("ALL").await.len(), 3);
        }

        assert_eq!(harness.provider.lookups.load(Ordering::SeqCst), 1);
        assert_eq!(harness.batches().len(), 3);
        let runs: Vec<_> = harness.batches().iter().map(|batch| batch.1).collect();
        assert!(runs.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[rocket::async_test]
    async fn every_message_carries_the_same_questions() {
        let harness = Harness::new(Election::example());
        harness.send("ALL").await;

        let sent = harness.provider.sent.lock().unwrap();
        assert!(sent
            .iter()
            .all(|message| message.params.questions == sent[0].params.questions));
        assert_eq!(sent[0].template_id, TemplateId(42));
    }
}
