//! Reaction events to backend votes.
//!
//! Each event is handled on its own: the poll, the message's reactions and
//! the tally are read fresh every time, so duplicated or reordered
//! add/remove events converge on the next event for the same message.

use std::{sync::Arc, time::Duration};

use {
    chrono::Utc,
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use guildbot_metrics::{counter, labels, votes as vote_metrics};

use crate::{
    Error, Result,
    backend::{Poll, PollBackend},
    emoji::EmojiToken,
    platform::{ChatPlatform, MessageRef},
    render::{poll_embed, poll_id_from_title},
};

const RENDER_ATTEMPTS: u32 = 2;
const RENDER_RETRY_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    Added,
    Removed,
}

impl ReactionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub kind: ReactionKind,
    pub message: MessageRef,
    pub user_id: String,
    pub emoji: EmojiToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Cast { option_index: usize },
    Retracted { option_index: usize },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The message is not a poll (or the backend does not know it).
    NotAPoll,
    /// The poll is closed; nothing was changed.
    Expired { poll_id: u64 },
    Reconciled {
        poll_id: u64,
        vote: VoteChange,
        /// Reactions removed from the message for this user.
        stripped: Vec<EmojiToken>,
        /// Whether the tally was re-rendered.
        rendered: bool,
    },
}

pub struct VoteReconciler {
    backend: Arc<dyn PollBackend>,
    platform: Arc<dyn ChatPlatform>,
    embed_color: u32,
}

impl VoteReconciler {
    pub fn new(
        backend: Arc<dyn PollBackend>,
        platform: Arc<dyn ChatPlatform>,
        embed_color: u32,
    ) -> Self {
        Self {
            backend,
            platform,
            embed_color,
        }
    }

    /// Apply one reaction event.
    ///
    /// Errors are only returned when nothing was committed: the message or
    /// poll could not be read, or the vote itself failed. Platform failures
    /// after a committed vote are logged and do not fail the event.
    pub async fn reconcile(&self, event: &ReactionEvent) -> Result<ReconcileOutcome> {
        #[cfg(feature = "metrics")]
        counter!(vote_metrics::RECONCILE_EVENTS_TOTAL, labels::KIND => event.kind.as_str())
            .increment(1);

        let message = self.platform.fetch_message(&event.message).await?;
        let Some(poll_id) = message.title.as_deref().and_then(poll_id_from_title) else {
            return Ok(ReconcileOutcome::NotAPoll);
        };

        let poll = match self.backend.get_poll(poll_id).await {
            Ok(poll) => poll,
            Err(Error::NotFound { poll_id }) => {
                warn!(
                    poll_id,
                    message_id = %event.message.message_id,
                    "poll message without a backend poll"
                );
                return Ok(ReconcileOutcome::NotAPoll);
            },
            Err(e) => return Err(e),
        };

        if poll.is_expired(Utc::now()) {
            warn!(poll_id, "Poll #{poll_id} has already expired");
            return Ok(ReconcileOutcome::Expired { poll_id });
        }

        let user_id = event.user_id.as_str();
        let option = poll.option_index(&event.emoji);
        let mut stripped = Vec::new();

        let vote = match (event.kind, option) {
            (ReactionKind::Added, Some(option_index)) => {
                self.backend.cast_vote(poll_id, user_id, option_index).await?;
                #[cfg(feature = "metrics")]
                counter!(vote_metrics::CAST_TOTAL).increment(1);
                debug!(poll_id, user_id, option_index, "vote cast");

                for other in message.voted_emoji_except(&event.emoji) {
                    match self.platform.has_reacted(&event.message, &other, user_id).await {
                        Ok(true) => {},
                        Ok(false) => continue,
                        Err(e) => {
                            warn!(
                                poll_id,
                                user_id,
                                emoji = %other,
                                error = %e,
                                "failed to check reaction"
                            );
                            continue;
                        },
                    }
                    if self.strip(&event.message, &other, user_id).await {
                        stripped.push(other.clone());
                    }
                    // The removal echo retracts this as well, if it arrives.
                    if let Some(previous) = poll.option_index(&other)
                        && let Err(e) = self.backend.retract_vote(poll_id, user_id, previous).await
                    {
                        warn!(
                            poll_id,
                            user_id,
                            option_index = previous,
                            error = %e,
                            "failed to retract replaced vote"
                        );
                    }
                }
                VoteChange::Cast { option_index }
            },
            (ReactionKind::Added, None) => {
                if self.strip(&event.message, &event.emoji, user_id).await {
                    stripped.push(event.emoji.clone());
                }
                VoteChange::Unchanged
            },
            (ReactionKind::Removed, Some(option_index)) => {
                self.backend.retract_vote(poll_id, user_id, option_index).await?;
                #[cfg(feature = "metrics")]
                counter!(vote_metrics::RETRACTED_TOTAL).increment(1);
                debug!(poll_id, user_id, option_index, "vote retracted");
                VoteChange::Retracted { option_index }
            },
            (ReactionKind::Removed, None) => {
                return Ok(ReconcileOutcome::Reconciled {
                    poll_id,
                    vote: VoteChange::Unchanged,
                    stripped,
                    rendered: false,
                });
            },
        };

        let rendered = self.rerender(&poll, &event.message).await;
        Ok(ReconcileOutcome::Reconciled {
            poll_id,
            vote,
            stripped,
            rendered,
        })
    }

    /// Remove one user's reaction. Returns whether it was removed.
    async fn strip(&self, message: &MessageRef, emoji: &EmojiToken, user_id: &str) -> bool {
        match self.platform.remove_reaction(message, emoji, user_id).await {
            Ok(()) => {
                #[cfg(feature = "metrics")]
                counter!(vote_metrics::REACTIONS_STRIPPED_TOTAL).increment(1);
                true
            },
            Err(e) => {
                warn!(
                    message_id = %message.message_id,
                    user_id,
                    emoji = %emoji,
                    error = %e,
                    "failed to remove reaction"
                );
                false
            },
        }
    }

    /// Fetch the tally and edit the message, retrying once.
    async fn rerender(&self, poll: &Poll, message: &MessageRef) -> bool {
        for attempt in 1..=RENDER_ATTEMPTS {
            match self.render_once(poll, message).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        poll_id = poll.id,
                        message_id = %message.message_id,
                        attempt,
                        error = %e,
                        "failed to refresh poll tally"
                    );
                    if attempt < RENDER_ATTEMPTS {
                        tokio::time::sleep(RENDER_RETRY_DELAY).await;
                    }
                },
            }
        }
        false
    }

    async fn render_once(&self, poll: &Poll, message: &MessageRef) -> Result<()> {
        let results = self.backend.get_results(poll.id).await?;
        self.platform
            .edit_embed(message, poll_embed(poll, &results, self.embed_color))
            .await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            backend_memory::{BackendCall, InMemoryPollBackend},
            test_support::{FakePlatform, PlatformCall},
        },
        chrono::TimeDelta,
    };

    const POLL_ID: u64 = 7;

    struct Fixture {
        backend: Arc<InMemoryPollBackend>,
        platform: Arc<FakePlatform>,
        reconciler: VoteReconciler,
        message: MessageRef,
    }

    fn red() -> EmojiToken {
        EmojiToken::Unicode("🔴".into())
    }

    fn blue() -> EmojiToken {
        EmojiToken::Unicode("🔵".into())
    }

    fn fixture_expiring_in(delta: TimeDelta) -> Fixture {
        let backend = Arc::new(InMemoryPollBackend::new());
        backend.insert_poll(Poll {
            id: POLL_ID,
            question: "Best color?".into(),
            options: vec!["Red".into(), "Blue".into()],
            reactions: vec![red(), blue()],
            expires_at: Utc::now() + delta,
        });
        let platform = Arc::new(FakePlatform::new());
        let message = MessageRef::new("c1", "m-poll");
        platform.seed_message(&message, Some("Poll #7: Best color?"));
        platform.react(&message, &red(), "bot");
        platform.react(&message, &blue(), "bot");
        let reconciler = VoteReconciler::new(backend.clone(), platform.clone(), 0x6366f1);
        Fixture {
            backend,
            platform,
            reconciler,
            message,
        }
    }

    fn fixture() -> Fixture {
        fixture_expiring_in(TimeDelta::hours(1))
    }

    impl Fixture {
        /// The user clicks `emoji`, then the gateway delivers the add event.
        async fn add(&self, user: &str, emoji: EmojiToken) -> ReconcileOutcome {
            self.platform.react(&self.message, &emoji, user);
            self.reconciler
                .reconcile(&ReactionEvent {
                    kind: ReactionKind::Added,
                    message: self.message.clone(),
                    user_id: user.into(),
                    emoji,
                })
                .await
                .unwrap()
        }

        async fn remove(&self, user: &str, emoji: EmojiToken) -> ReconcileOutcome {
            self.reconciler
                .reconcile(&ReactionEvent {
                    kind: ReactionKind::Removed,
                    message: self.message.clone(),
                    user_id: user.into(),
                    emoji,
                })
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn recognized_add_casts_vote_and_renders() {
        let f = fixture();
        let outcome = f.add("U", blue()).await;

        assert_eq!(outcome, ReconcileOutcome::Reconciled {
            poll_id: POLL_ID,
            vote: VoteChange::Cast { option_index: 1 },
            stripped: vec![],
            rendered: true,
        });
        assert_eq!(f.backend.votes_of(POLL_ID, "U"), vec![1]);
        let edits = f.platform.edits();
        assert_eq!(edits.len(), 1);
        assert!(edits[0].description.contains("🔵 Blue ▸ 1 vote (100%)"));
    }

    #[tokio::test]
    async fn switching_reaction_leaves_one_vote_and_strips_the_old_one() {
        let f = fixture();
        f.add("U", red()).await;
        let outcome = f.add("U", blue()).await;

        assert_eq!(f.backend.votes_of(POLL_ID, "U"), vec![1]);
        assert_eq!(f.platform.reactions_by(&f.message, "U"), vec![blue()]);
        match outcome {
            ReconcileOutcome::Reconciled { stripped, .. } => assert_eq!(stripped, vec![red()]),
            other => panic!("unexpected {other:?}"),
        }

        // The gateway echoes the bot's removal; it must not disturb the vote.
        f.remove("U", red()).await;
        assert_eq!(f.backend.votes_of(POLL_ID, "U"), vec![1]);
    }

    fn reaction_lookups(platform: &FakePlatform) -> Vec<EmojiToken> {
        platform
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                PlatformCall::HasReacted { emoji, .. } => Some(emoji),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn first_vote_checks_no_bot_only_reactions() {
        let f = fixture();
        f.add("U", blue()).await;

        assert!(reaction_lookups(&f.platform).is_empty());
    }

    #[tokio::test]
    async fn switching_vote_checks_only_emoji_other_users_applied() {
        let f = fixture();
        f.add("U", red()).await;
        f.platform.clear_calls();
        f.add("U", blue()).await;

        assert_eq!(reaction_lookups(&f.platform), vec![red()]);
    }

    #[tokio::test]
    async fn unrecognized_and_removed_reactions_skip_user_lookups() {
        let f = fixture();
        f.add("V", red()).await;
        f.platform.clear_calls();

        f.add("U", EmojiToken::Unicode("🎉".into())).await;
        f.remove("V", red()).await;

        assert!(reaction_lookups(&f.platform).is_empty());
    }

    #[tokio::test]
    async fn other_users_reactions_are_left_alone() {
        let f = fixture();
        f.add("V", red()).await;
        f.add("U", blue()).await;

        assert_eq!(f.platform.reactions_by(&f.message, "V"), vec![red()]);
        assert_eq!(f.backend.votes_of(POLL_ID, "V"), vec![0]);
    }

    #[tokio::test]
    async fn unrecognized_add_is_stripped_without_vote() {
        let f = fixture();
        let party = EmojiToken::Unicode("🎉".into());
        let outcome = f.add("U", party.clone()).await;

        assert_eq!(f.platform.removed_reactions(), vec![(party.clone(), "U".to_string())]);
        assert!(!f.backend.calls().iter().any(BackendCall::is_mutation));
        match outcome {
            ReconcileOutcome::Reconciled { vote, stripped, .. } => {
                assert_eq!(vote, VoteChange::Unchanged);
                assert_eq!(stripped, vec![party]);
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn recognized_remove_retracts_vote() {
        let f = fixture();
        f.add("U", red()).await;
        let outcome = f.remove("U", red()).await;

        assert!(f.backend.votes_of(POLL_ID, "U").is_empty());
        assert!(matches!(outcome, ReconcileOutcome::Reconciled {
            vote: VoteChange::Retracted { option_index: 0 },
            ..
        }));
    }

    #[tokio::test]
    async fn unrecognized_remove_makes_no_backend_mutation() {
        let f = fixture();
        f.remove("U", EmojiToken::Unicode("🎉".into())).await;

        let calls = f.backend.calls();
        assert_eq!(calls, vec![BackendCall::GetPoll { poll_id: POLL_ID }]);
        assert!(f.platform.edits().is_empty());
    }

    #[tokio::test]
    async fn expired_poll_is_frozen() {
        let f = fixture_expiring_in(TimeDelta::minutes(-1));
        let outcome = f.add("U", red()).await;

        assert_eq!(outcome, ReconcileOutcome::Expired { poll_id: POLL_ID });
        assert!(!f.backend.calls().iter().any(BackendCall::is_mutation));
        assert!(f.platform.edits().is_empty());
        assert!(f.platform.removed_reactions().is_empty());
    }

    #[tokio::test]
    async fn non_poll_messages_are_ignored() {
        let f = fixture();
        let other = MessageRef::new("c1", "m-other");
        f.platform.seed_message(&other, Some("Weekly update"));

        let outcome = f
            .reconciler
            .reconcile(&ReactionEvent {
                kind: ReactionKind::Added,
                message: other,
                user_id: "U".into(),
                emoji: red(),
            })
            .await
            .unwrap();

        assert_eq!(outcome, ReconcileOutcome::NotAPoll);
        assert!(f.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_poll_id_is_not_a_poll() {
        let f = fixture();
        let stale = MessageRef::new("c1", "m-stale");
        f.platform.seed_message(&stale, Some("Poll #99: Gone"));

        let outcome = f
            .reconciler
            .reconcile(&ReactionEvent {
                kind: ReactionKind::Added,
                message: stale,
                user_id: "U".into(),
                emoji: red(),
            })
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::NotAPoll);
    }

    #[tokio::test]
    async fn duplicate_add_events_are_idempotent() {
        let f = fixture();
        f.add("U", blue()).await;
        f.add("U", blue()).await;

        assert_eq!(f.backend.votes_of(POLL_ID, "U"), vec![1]);
        assert_eq!(f.backend.get_results(POLL_ID).await.unwrap().counts, vec![0, 1]);
    }

    #[tokio::test]
    async fn failed_vote_is_an_error_and_skips_render() {
        let f = fixture();
        f.backend.fail_votes(true);
        f.platform.react(&f.message, &red(), "U");

        let err = f
            .reconciler
            .reconcile(&ReactionEvent {
                kind: ReactionKind::Added,
                message: f.message.clone(),
                user_id: "U".into(),
                emoji: red(),
            })
            .await
            .unwrap_err();
        assert!(err.is_backend());
        assert!(f.platform.edits().is_empty());
    }

    #[tokio::test]
    async fn strip_failure_does_not_undo_vote() {
        let f = fixture();
        f.add("U", red()).await;
        f.platform.fail_reactions(true);
        let outcome = f.add("U", blue()).await;

        assert_eq!(f.backend.votes_of(POLL_ID, "U"), vec![1]);
        match outcome {
            ReconcileOutcome::Reconciled { vote, stripped, rendered, .. } => {
                assert_eq!(vote, VoteChange::Cast { option_index: 1 });
                assert!(stripped.is_empty());
                assert!(rendered);
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn render_is_retried_once() {
        let f = fixture();
        f.backend.fail_next_results(1);
        let outcome = f.add("U", red()).await;

        assert!(matches!(outcome, ReconcileOutcome::Reconciled { rendered: true, .. }));
        assert_eq!(f.platform.edits().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn render_gives_up_after_second_failure() {
        let f = fixture();
        f.platform.fail_next_edits(2);
        let outcome = f.add("U", red()).await;

        assert!(matches!(outcome, ReconcileOutcome::Reconciled { rendered: false, .. }));
        let edit_attempts = f
            .platform
            .calls()
            .iter()
            .filter(|c| matches!(c, PlatformCall::EditEmbed { .. }))
            .count();
        assert_eq!(edit_attempts, 2);
        assert_eq!(f.backend.votes_of(POLL_ID, "U"), vec![0]);
    }
}
