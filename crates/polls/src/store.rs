//! Storage trait for in-progress drafts.

use std::sync::Arc;

use {
    async_trait::async_trait,
    dashmap::DashMap,
    tokio::sync::{Mutex, OwnedMutexGuard},
};

use crate::{Result, types::Draft};

/// Closure applied to a stored draft by [`DraftStore::mutate`].
pub type DraftMutation = Box<dyn FnOnce(&mut Draft) + Send>;

/// One draft per authoring user, keyed by user id.
///
/// Read-modify-write sequences on one key are serialized by the caller
/// through [`DraftLocks`].
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<Draft>>;

    /// Store a fresh draft. Fails with [`Error::DraftExists`](crate::Error::DraftExists)
    /// when the author already has one.
    async fn create(&self, draft: Draft) -> Result<Draft>;

    /// Apply `mutation` in place and return the updated draft. Fails with
    /// [`Error::NoDraft`](crate::Error::NoDraft) when there is nothing to mutate.
    async fn mutate(&self, user_id: &str, mutation: DraftMutation) -> Result<Draft>;

    /// Remove the draft. Returns whether one existed.
    async fn delete(&self, user_id: &str) -> Result<bool>;
}

/// One async lock per author.
///
/// Held from reading a draft until its update is stored, so an author's
/// messages and commands apply one at a time in arrival order (tokio's mutex
/// is fair).
#[derive(Clone, Default)]
pub struct DraftLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl DraftLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(user_id.to_string()).or_default().value());
        lock.lock_owned().await
    }
}
