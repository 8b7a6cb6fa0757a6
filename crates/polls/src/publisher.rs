//! Turns a confirmed draft into a stored poll and its public message.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use guildbot_metrics::{counter, polls as poll_metrics};

use crate::{
    Error, Result,
    backend::{NewPoll, Poll, PollBackend, PollResults},
    platform::{ChatPlatform, MessageRef, OutboundMessage},
    render::poll_embed,
    store::DraftStore,
    throttle::OutboundThrottle,
    types::{Draft, DraftStep, ResetTarget},
};

/// A poll that is stored and posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub poll_id: u64,
    pub message: MessageRef,
}

pub struct PollPublisher {
    store: Arc<dyn DraftStore>,
    backend: Arc<dyn PollBackend>,
    platform: Arc<dyn ChatPlatform>,
    throttle: OutboundThrottle,
    embed_color: u32,
}

impl PollPublisher {
    pub fn new(
        store: Arc<dyn DraftStore>,
        backend: Arc<dyn PollBackend>,
        platform: Arc<dyn ChatPlatform>,
        throttle: OutboundThrottle,
        embed_color: u32,
    ) -> Self {
        Self {
            store,
            backend,
            platform,
            throttle,
            embed_color,
        }
    }

    /// Store the author's confirmed draft, post it to the channel the poll
    /// was started in and seed its reactions.
    ///
    /// The draft is only deleted once the poll message is posted. A backend
    /// rejection ([`Error::Publish`]) or any earlier failure leaves it intact
    /// so the author can retry. Once the backend has stored the poll its id is
    /// kept on the draft, and a retry only posts the message.
    pub async fn finalize(&self, author_id: &str) -> Result<Published> {
        let draft = self
            .store
            .get(author_id)
            .await?
            .ok_or_else(|| Error::no_draft(author_id))?;
        let new_poll = confirmed_poll(&draft, Utc::now())?;

        let poll_id = match draft.published_poll_id {
            Some(poll_id) => {
                debug!(poll_id, user_id = author_id, "posting previously stored poll");
                poll_id
            },
            None => self.store_poll(author_id, &new_poll).await?,
        };

        let poll = Poll {
            id: poll_id,
            question: new_poll.question,
            options: new_poll.options,
            reactions: new_poll.reactions,
            expires_at: new_poll.expires_at,
        };
        let results = PollResults {
            counts: vec![0; poll.options.len()],
        };
        let embed = poll_embed(&poll, &results, self.embed_color);
        let message = self
            .throttle
            .schedule(
                self.platform
                    .send(&draft.channel_id, OutboundMessage::Embed(embed)),
            )
            .await
            .inspect_err(|e| {
                warn!(poll_id, user_id = author_id, error = %e, "failed to post poll message");
                #[cfg(feature = "metrics")]
                counter!(poll_metrics::PUBLISH_ERRORS_TOTAL).increment(1);
            })?;

        for emoji in &poll.reactions {
            if let Err(e) = self.platform.add_reaction(&message, emoji).await {
                warn!(poll_id, emoji = %emoji, error = %e, "failed to seed poll reaction");
            }
        }

        self.store.delete(author_id).await?;

        #[cfg(feature = "metrics")]
        counter!(poll_metrics::PUBLISHED_TOTAL).increment(1);
        info!(
            poll_id,
            user_id = author_id,
            channel_id = %message.channel_id,
            message_id = %message.message_id,
            "poll published"
        );
        Ok(Published { poll_id, message })
    }

    async fn store_poll(&self, author_id: &str, new_poll: &NewPoll) -> Result<u64> {
        let poll_id = match self.backend.create_poll(new_poll).await {
            Ok(id) => id,
            Err(e) => {
                warn!(user_id = author_id, error = %e, "failed to create poll");
                #[cfg(feature = "metrics")]
                counter!(poll_metrics::PUBLISH_ERRORS_TOTAL).increment(1);
                return Err(e);
            },
        };
        self.store
            .mutate(author_id, Box::new(move |d| d.published_poll_id = Some(poll_id)))
            .await?;
        Ok(poll_id)
    }

    /// Drop the author's draft. Returns whether there was one.
    pub async fn cancel(&self, author_id: &str) -> Result<bool> {
        let existed = self.store.delete(author_id).await?;
        if existed {
            info!(user_id = author_id, "poll draft cancelled");
        }
        Ok(existed)
    }

    /// Rewind the author's draft to `to`, discarding everything collected
    /// after that step.
    pub async fn reset(&self, author_id: &str, to: ResetTarget) -> Result<Draft> {
        let mut draft = self
            .store
            .get(author_id)
            .await?
            .ok_or_else(|| Error::no_draft(author_id))?;
        draft.rewind(to)?;
        let draft = self
            .store
            .mutate(author_id, Box::new(move |d| *d = draft))
            .await?;
        info!(user_id = author_id, target = to.as_str(), "poll draft reset");
        Ok(draft)
    }
}

fn confirmed_poll(draft: &Draft, now: DateTime<Utc>) -> Result<NewPoll> {
    match (draft.step, draft.expires_at) {
        (DraftStep::AwaitingConfirmation, Some(expires_at)) if expires_at <= now => {
            Err(Error::draft_expired(&draft.author_id))
        },
        (DraftStep::AwaitingConfirmation, Some(expires_at)) => Ok(NewPoll {
            channel_id: draft.channel_id.clone(),
            question: draft.question.clone(),
            options: draft.options.clone(),
            reactions: draft.reactions.clone(),
            expires_at,
        }),
        (step, _) => Err(Error::invalid_step("awaiting_confirmation", step)),
    }
}
