use serde::{Deserialize, Serialize};

/// An append-only list of revisions where the last entry wins.
///
/// Recorders, invitations, submissions and timeline points are all kept this
/// way: older entries stay for the record, and readers want the newest one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionLog<T>(Vec<T>);

impl<T> RevisionLog<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// The most recent revision, if any.
    pub fn latest(&self) -> Option<&T> {
        self.0.last()
    }

    /// Record a new revision, superseding the current latest.
    pub fn push(&mut self, revision: T) {
        self.0.push(revision);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All revisions, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

// Manual impl so `T: Default` isn't required.
impl<T> Default for RevisionLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for RevisionLog<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<T> From<Vec<T>> for RevisionLog<T> {
    fn from(revisions: Vec<T>) -> Self {
        Self(revisions)
    }
}
