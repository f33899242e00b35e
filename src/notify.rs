//! Coalesced election updates for observers.
//!
//! A dispatch run publishes all of its events in one update instead of one
//! update per candidate.

use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::sync::broadcast,
    Build, Rocket,
};
use serde::Serialize;

use crate::invite::RunId;
use crate::model::{event::InviteSentEvent, mongodb::Id};

/// How many updates an observer can fall behind before it starts missing them.
const UPDATE_BACKLOG: usize = 64;

/// One batch of new events for an election.
#[derive(Debug, Clone, Serialize)]
pub struct ElectionUpdate {
    pub election_id: Id,
    pub run_id: RunId,
    pub events: Vec<InviteSentEvent>,
}

/// Receives the events of a dispatch run, at most once per run.
#[rocket::async_trait]
pub trait ElectionNotifier: Send + Sync {
    async fn publish_batch(&self, election_id: Id, run_id: RunId, events: &[InviteSentEvent]);
}

/// In-process fan-out of election updates to every subscriber.
pub struct ElectionUpdates {
    sender: broadcast::Sender<ElectionUpdate>,
}

impl ElectionUpdates {
    pub fn new(backlog: usize) -> Self {
        let (sender, _) = broadcast::channel(backlog);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ElectionUpdate> {
        self.sender.subscribe()
    }
}

impl Default for ElectionUpdates {
    fn default() -> Self {
        Self::new(UPDATE_BACKLOG)
    }
}

#[rocket::async_trait]
impl ElectionNotifier for ElectionUpdates {
    async fn publish_batch(&self, election_id: Id, run_id: RunId, events: &[InviteSentEvent]) {
        let update = ElectionUpdate {
            election_id,
            run_id,
            events: events.to_vec(),
        };
        match self.sender.send(update) {
            Ok(observers) => debug!(
                "{run_id}: sent {} events for election {election_id} to {observers} observers",
                events.len()
            ),
            // Nobody is watching; the events are already stored.
            Err(_) => debug!("{run_id}: no observers for election {election_id}"),
        }
    }
}

/// A fairing that places an `ElectionUpdates` into managed state.
pub struct NotifierFairing;

#[rocket::async_trait]
impl Fairing for NotifierFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election updates",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        Ok(rocket.manage(ElectionUpdates::default()))
    }
}
