//! Entry points the chat adapter calls: slash commands, private messages and
//! reaction events.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
    Error, Result,
    backend::PollBackend,
    platform::ChatPlatform,
    publisher::PollPublisher,
    reconciler::{ReactionEvent, ReconcileOutcome, VoteReconciler},
    store::{DraftLocks, DraftStore},
    throttle::OutboundThrottle,
    types::{Draft, ResetTarget},
    wizard::{DraftWizard, Prompt, Transition, WizardOutcome, WizardSettings, finish_options},
};

pub const NO_DRAFT_REPLY: &str = "You don't have a poll in progress. Start one by using **/poll**.";
pub const DRAFT_EXISTS_REPLY: &str =
    "You already have a poll in progress. Finish it or use **/cancel** before starting a new one.";
pub const CHECK_DMS_REPLY: &str =
    "Check your direct messages, I'll guide you through creating the poll.";
pub const DM_FAILED_REPLY: &str =
    "I couldn't send you a direct message. Please allow direct messages from server members \
     and try again.";
pub const PUBLISHED_REPLY: &str = "Your poll has been published.";
pub const NOT_READY_REPLY: &str =
    "Your poll is not finished yet. Please answer my last question first.";
pub const PUBLISH_FAILED_REPLY: &str =
    "Something went wrong while publishing your poll. Please try **/done** again later.";
pub const DRAFT_EXPIRED_REPLY: &str =
    "The end time of your poll has already passed. Use **/reset** with `expiration` to choose \
     a new duration.";
pub const CANCELLED_REPLY: &str = "Your poll has been cancelled.";
pub const RESET_TOO_FAR_REPLY: &str = "You can only reset to a step you have already reached.";

/// Poll subsystem facade wiring the draft store, wizard, publisher and
/// reconciler around one throttle.
///
/// Every entry point that touches a draft holds the author's [`DraftLocks`]
/// entry, so commands and private messages from one author never interleave.
pub struct PollService {
    store: Arc<dyn DraftStore>,
    platform: Arc<dyn ChatPlatform>,
    locks: DraftLocks,
    wizard: DraftWizard,
    publisher: PollPublisher,
    reconciler: VoteReconciler,
}

impl PollService {
    pub fn new(
        store: Arc<dyn DraftStore>,
        backend: Arc<dyn PollBackend>,
        platform: Arc<dyn ChatPlatform>,
        throttle: OutboundThrottle,
        settings: WizardSettings,
    ) -> Self {
        let locks = DraftLocks::new();
        Self {
            wizard: DraftWizard::new(
                Arc::clone(&store),
                Arc::clone(&platform),
                throttle.clone(),
                settings,
                locks.clone(),
            ),
            publisher: PollPublisher::new(
                Arc::clone(&store),
                Arc::clone(&backend),
                Arc::clone(&platform),
                throttle,
                settings.embed_color,
            ),
            reconciler: VoteReconciler::new(backend, Arc::clone(&platform), settings.embed_color),
            store,
            platform,
            locks,
        }
    }

    pub async fn handle_direct_message(
        &self,
        author_id: &str,
        dm_channel_id: &str,
        text: &str,
    ) -> Result<WizardOutcome> {
        self.wizard.handle_message(author_id, dm_channel_id, text).await
    }

    pub async fn handle_reaction(&self, event: &ReactionEvent) -> Result<ReconcileOutcome> {
        self.reconciler.reconcile(event).await
    }

    /// `/poll`: open a draft for `author_id` and ask for the question in DMs.
    /// Returns the reply for the invoking channel.
    pub async fn start(
        &self,
        author_id: &str,
        guild_id: Option<&str>,
        channel_id: &str,
    ) -> Result<String> {
        let _guard = self.locks.lock(author_id).await;
        let draft = Draft::new(author_id, guild_id.map(str::to_string), channel_id);
        match self.store.create(draft).await {
            Ok(_) => {},
            Err(Error::DraftExists { .. }) => return Ok(DRAFT_EXISTS_REPLY.to_string()),
            Err(e) => return Err(e),
        }

        let greeted = match self.platform.open_dm(author_id).await {
            Ok(dm) => self.wizard.say(&dm, Prompt::AskQuestion.text()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = greeted {
            warn!(user_id = author_id, error = %e, "failed to open poll conversation");
            self.store.delete(author_id).await?;
            return Ok(DM_FAILED_REPLY.to_string());
        }

        info!(user_id = author_id, channel_id, "poll draft started");
        Ok(CHECK_DMS_REPLY.to_string())
    }

    /// `/enough`: stop collecting options.
    pub async fn enough(&self, author_id: &str) -> Result<String> {
        let _guard = self.locks.lock(author_id).await;
        let Some(draft) = self.store.get(author_id).await? else {
            return Ok(NO_DRAFT_REPLY.to_string());
        };
        match finish_options(&draft) {
            Transition::Rejected(rejection) => Ok(rejection.text().to_string()),
            Transition::Advanced { draft, prompt } => {
                self.store
                    .mutate(author_id, Box::new(move |d| *d = draft))
                    .await?;
                Ok(prompt.text().to_string())
            },
        }
    }

    /// `/done`: publish the confirmed draft.
    pub async fn done(&self, author_id: &str) -> Result<String> {
        let _guard = self.locks.lock(author_id).await;
        match self.publisher.finalize(author_id).await {
            Ok(_) => Ok(PUBLISHED_REPLY.to_string()),
            Err(Error::NoDraft { .. }) => Ok(NO_DRAFT_REPLY.to_string()),
            Err(Error::InvalidStep { .. }) => Ok(NOT_READY_REPLY.to_string()),
            Err(Error::DraftExpired { .. }) => Ok(DRAFT_EXPIRED_REPLY.to_string()),
            Err(Error::Publish { message }) => Ok(format!(
                "The poll was rejected: {message}. Use **/reset** to fix it and try again."
            )),
            Err(e) => {
                error!(user_id = author_id, error = %e, "failed to publish poll");
                Ok(PUBLISH_FAILED_REPLY.to_string())
            },
        }
    }

    /// `/reset`: rewind the draft, by default to the question.
    pub async fn reset(&self, author_id: &str, to: Option<ResetTarget>) -> Result<String> {
        let to = to.unwrap_or(ResetTarget::Question);
        let _guard = self.locks.lock(author_id).await;
        match self.publisher.reset(author_id, to).await {
            Ok(_) => Ok(match to {
                ResetTarget::Question => Prompt::AskQuestion,
                ResetTarget::Options => Prompt::AskFirstOption,
                ResetTarget::Expiration => Prompt::AskExpiration,
            }
            .text()
            .to_string()),
            Err(Error::NoDraft { .. }) => Ok(NO_DRAFT_REPLY.to_string()),
            Err(Error::InvalidStep { .. }) => Ok(RESET_TOO_FAR_REPLY.to_string()),
            Err(e) => Err(e),
        }
    }

    /// `/cancel`: drop the draft.
    pub async fn cancel(&self, author_id: &str) -> Result<String> {
        let _guard = self.locks.lock(author_id).await;
        Ok(if self.publisher.cancel(author_id).await? {
            CANCELLED_REPLY.to_string()
        } else {
            NO_DRAFT_REPLY.to_string()
        })
    }
}
