//! In-memory poll backend that records every call, for tests.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    backend::{NewPoll, Poll, PollBackend, PollResults},
};

/// Calls made against [`InMemoryPollBackend`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    CreatePoll { question: String },
    GetPoll { poll_id: u64 },
    GetResults { poll_id: u64 },
    CastVote { poll_id: u64, user_id: String, option_index: usize },
    RetractVote { poll_id: u64, user_id: String, option_index: usize },
}

impl BackendCall {
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::CastVote { .. } | Self::RetractVote { .. })
    }
}

#[derive(Default)]
pub struct InMemoryPollBackend {
    next_id: AtomicU64,
    polls: Mutex<HashMap<u64, Poll>>,
    /// `(user_id, option_index)` pairs per poll.
    votes: Mutex<HashMap<u64, BTreeSet<(String, usize)>>>,
    calls: Mutex<Vec<BackendCall>>,
    reject_create: Mutex<Option<String>>,
    fail_votes: AtomicBool,
    fail_results: AtomicUsize,
}

impl InMemoryPollBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a poll directly, bypassing `create_poll`.
    pub fn insert_poll(&self, poll: Poll) {
        let mut polls = self.polls.lock().unwrap_or_else(|e| e.into_inner());
        self.next_id.fetch_max(poll.id, Ordering::SeqCst);
        polls.insert(poll.id, poll);
    }

    #[must_use]
    pub fn poll(&self, poll_id: u64) -> Option<Poll> {
        let polls = self.polls.lock().unwrap_or_else(|e| e.into_inner());
        polls.get(&poll_id).cloned()
    }

    /// Votes currently recorded for `user_id` on `poll_id`.
    #[must_use]
    pub fn votes_of(&self, poll_id: u64, user_id: &str) -> Vec<usize> {
        let votes = self.votes.lock().unwrap_or_else(|e| e.into_inner());
        votes
            .get(&poll_id)
            .map(|set| {
                set.iter()
                    .filter(|(u, _)| u == user_id)
                    .map(|(_, i)| *i)
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Make the next `create_poll` calls fail with [`Error::Publish`].
    pub fn reject_creates(&self, message: impl Into<String>) {
        *self.reject_create.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    pub fn fail_votes(&self, fail: bool) {
        self.fail_votes.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` `get_results` calls fail as if the backend were down.
    pub fn fail_next_results(&self, count: usize) {
        self.fail_results.store(count, Ordering::SeqCst);
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    fn unavailable(context: &str) -> Error {
        Error::backend(context, std::io::Error::other("backend unavailable"))
    }

    fn ensure_poll(&self, poll_id: u64) -> Result<Poll> {
        self.poll(poll_id).ok_or(Error::NotFound { poll_id })
    }
}

#[async_trait]
impl PollBackend for InMemoryPollBackend {
    async fn create_poll(&self, poll: &NewPoll) -> Result<u64> {
        self.record(BackendCall::CreatePoll {
            question: poll.question.clone(),
        });
        if let Some(message) = self
            .reject_create
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(Error::Publish { message });
        }
        if poll.options.is_empty() || poll.options.len() != poll.reactions.len() {
            return Err(Error::Publish {
                message: "options and reactions must be non-empty and aligned".into(),
            });
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.insert_poll(Poll {
            id,
            question: poll.question.clone(),
            options: poll.options.clone(),
            reactions: poll.reactions.clone(),
            expires_at: poll.expires_at,
        });
        Ok(id)
    }

    async fn get_poll(&self, poll_id: u64) -> Result<Poll> {
        self.record(BackendCall::GetPoll { poll_id });
        self.ensure_poll(poll_id)
    }

    async fn get_results(&self, poll_id: u64) -> Result<PollResults> {
        self.record(BackendCall::GetResults { poll_id });
        if self
            .fail_results
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Self::unavailable("failed to fetch poll results"));
        }
        let poll = self.ensure_poll(poll_id)?;
        let votes = self.votes.lock().unwrap_or_else(|e| e.into_inner());
        let mut counts = vec![0; poll.options.len()];
        for (_, index) in votes.get(&poll_id).into_iter().flatten() {
            if let Some(count) = counts.get_mut(*index) {
                *count += 1;
            }
        }
        Ok(PollResults { counts })
    }

    async fn cast_vote(&self, poll_id: u64, user_id: &str, option_index: usize) -> Result<()> {
        self.record(BackendCall::CastVote {
            poll_id,
            user_id: user_id.to_string(),
            option_index,
        });
        if self.fail_votes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("failed to cast vote"));
        }
        self.ensure_poll(poll_id)?;
        let mut votes = self.votes.lock().unwrap_or_else(|e| e.into_inner());
        votes
            .entry(poll_id)
            .or_default()
            .insert((user_id.to_string(), option_index));
        Ok(())
    }

    async fn retract_vote(&self, poll_id: u64, user_id: &str, option_index: usize) -> Result<()> {
        self.record(BackendCall::RetractVote {
            poll_id,
            user_id: user_id.to_string(),
            option_index,
        });
        if self.fail_votes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("failed to retract vote"));
        }
        let mut votes = self.votes.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(set) = votes.get_mut(&poll_id) {
            set.remove(&(user_id.to_string(), option_index));
        }
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::emoji::EmojiToken,
        chrono::{TimeDelta, Utc},
    };

    fn seeded() -> InMemoryPollBackend {
        let backend = InMemoryPollBackend::new();
        backend.insert_poll(Poll {
            id: 7,
            question: "Best color?".into(),
            options: vec!["Red".into(), "Blue".into()],
            reactions: vec![EmojiToken::Unicode("🔴".into()), EmojiToken::Unicode("🔵".into())],
            expires_at: Utc::now() + TimeDelta::days(1),
        });
        backend
    }

    #[tokio::test]
    async fn casting_the_same_vote_twice_counts_once() {
        let backend = seeded();
        backend.cast_vote(7, "U", 1).await.unwrap();
        backend.cast_vote(7, "U", 1).await.unwrap();
        assert_eq!(backend.votes_of(7, "U"), vec![1]);
        assert_eq!(backend.get_results(7).await.unwrap().counts, vec![0, 1]);
    }

    #[tokio::test]
    async fn retracting_a_missing_vote_is_a_no_op() {
        let backend = seeded();
        backend.retract_vote(7, "U", 0).await.unwrap();
        assert!(backend.votes_of(7, "U").is_empty());
    }

    #[tokio::test]
    async fn unknown_poll_is_not_found() {
        let backend = seeded();
        assert!(matches!(
            backend.get_poll(8).await.unwrap_err(),
            Error::NotFound { poll_id: 8 }
        ));
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids_after_seeded_polls() {
        let backend = seeded();
        let id = backend
            .create_poll(&NewPoll {
                channel_id: "c1".into(),
                question: "Lunch?".into(),
                options: vec!["Yes".into()],
                reactions: vec![EmojiToken::Unicode("👍".into())],
                expires_at: Utc::now(),
            })
            .await
            .unwrap();
        assert_eq!(id, 8);
    }

    #[tokio::test]
    async fn injected_results_failures_are_consumed() {
        let backend = seeded();
        backend.fail_next_results(1);
        assert!(backend.get_results(7).await.is_err());
        assert!(backend.get_results(7).await.is_ok());
    }
}
