//! Conversational poll authoring over direct messages.
//!
//! [`transition`] is the pure state machine: it looks at the stored draft and
//! one incoming message and either produces the next draft or a
//! [`Rejection`] that leaves the draft untouched. [`DraftWizard`] wraps it with
//! storage and the replies the author sees.

use std::sync::Arc;

use {
    chrono::{DateTime, Utc},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use guildbot_metrics::{counter, labels, polls as poll_metrics};

use crate::{
    Result,
    backend::{Poll, PollResults},
    emoji::{EmojiToken, EmoteCatalog},
    expiration::expiry_from,
    platform::{ChatPlatform, MessageRef, OutboundMessage, PollEmbed},
    render::{PREVIEW_POLL_ID, poll_embed},
    store::{DraftLocks, DraftStore},
    throttle::OutboundThrottle,
    types::{Draft, DraftStep, MAX_OPTIONS, OptionPhase},
};

/// What the wizard asks for next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    AskQuestion,
    AskFirstOption,
    AskEmoji,
    AskSecondOption,
    AskNextOption,
    AskExpiration,
    /// Sent before the preview embed.
    PreviewIntro,
    /// Sent after the preview embed.
    ConfirmHint,
}

impl Prompt {
    #[must_use]
    pub fn text(self) -> &'static str {
        match self {
            Self::AskQuestion => "Let's create a poll! Please send me the question of your poll.",
            Self::AskFirstOption => "Please give me the first option of your poll.",
            Self::AskEmoji => "Now send me the corresponding emoji",
            Self::AskSecondOption => "Please give me the second option.",
            Self::AskNextOption => {
                "Please give me a new option or go to the next step by using **/enough**."
            },
            Self::AskExpiration => {
                "Please give me the duration of the poll in the DD:HH:mm format \
                 (for example 1:12:30 is one day, twelve hours and thirty minutes)."
            },
            Self::PreviewIntro => "Your poll will look like this:",
            Self::ConfirmHint => {
                "You can accept it by using **/done**,\n\
                 reset the data by using **/reset**\n\
                 or cancel it using **/cancel**."
            },
        }
    }
}

/// Why an input was refused. The draft is never changed by a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MaxOptionsReached,
    DuplicateOption,
    DuplicateEmoji,
    NotAnEmoji,
    ForeignEmote,
    BadExpiration,
    /// The draft is complete and waits for `/done`, `/reset` or `/cancel`.
    AwaitingCommand,
    NotEnoughOptions,
    EmojiPending,
    NotCollectingOptions,
    Uninterpretable,
}

impl Rejection {
    #[must_use]
    pub fn text(self) -> &'static str {
        match self {
            Self::MaxOptionsReached => "You have reached the maximum number of options.",
            Self::DuplicateOption => "This option has already been added",
            Self::DuplicateEmoji => "This emoji has already been used, please choose another one.",
            Self::NotAnEmoji => "The message you sent doesn't contain any emoji",
            Self::ForeignEmote => "Please only use emotes from your guild. Send a different emote.",
            Self::BadExpiration => {
                "The message you sent me is not in the DD:HH:mm format. \
                 Please verify the contents of your message and send again."
            },
            Self::AwaitingCommand => {
                "Your poll is ready. You can accept it by using **/done**,\n\
                 reset the data by using **/reset**\n\
                 or cancel it using **/cancel**."
            },
            Self::NotEnoughOptions => {
                "A poll needs at least two options. Please give me another option."
            },
            Self::EmojiPending => "Please send me the emoji for your last option first.",
            Self::NotCollectingOptions => "You can only use **/enough** while adding options.",
            Self::Uninterpretable => "Incorrect input, please try again.",
        }
    }

    /// Stable label for logs and metrics.
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            Self::MaxOptionsReached => "max_options",
            Self::DuplicateOption => "duplicate_option",
            Self::DuplicateEmoji => "duplicate_emoji",
            Self::NotAnEmoji => "not_an_emoji",
            Self::ForeignEmote => "foreign_emote",
            Self::BadExpiration => "bad_expiration",
            Self::AwaitingCommand => "awaiting_command",
            Self::NotEnoughOptions => "not_enough_options",
            Self::EmojiPending => "emoji_pending",
            Self::NotCollectingOptions => "not_collecting_options",
            Self::Uninterpretable => "uninterpretable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Advanced { draft: Draft, prompt: Prompt },
    Rejected(Rejection),
}

/// Advance `draft` with one message.
///
/// `emotes` only matters when a custom emote is offered as an option's
/// reaction. `max_options` is capped at [`MAX_OPTIONS`].
#[must_use]
pub fn transition(
    draft: &Draft,
    text: &str,
    emotes: &EmoteCatalog,
    now: DateTime<Utc>,
    max_options: usize,
) -> Transition {
    if text.trim().is_empty() {
        return Transition::Rejected(Rejection::Uninterpretable);
    }
    let max_options = max_options.clamp(1, MAX_OPTIONS);
    let mut next = draft.clone();

    let prompt = match draft.step {
        DraftStep::AwaitingQuestion => {
            next.question = text.to_string();
            next.step = DraftStep::AwaitingOption(OptionPhase::NeedOption);
            Prompt::AskFirstOption
        },
        DraftStep::AwaitingOption(OptionPhase::NeedOption) => {
            if draft.options.len() >= max_options {
                return Transition::Rejected(Rejection::MaxOptionsReached);
            }
            if draft.has_option(text) {
                return Transition::Rejected(Rejection::DuplicateOption);
            }
            next.options.push(text.to_string());
            next.step = DraftStep::AwaitingOption(OptionPhase::NeedEmoji);
            Prompt::AskEmoji
        },
        DraftStep::AwaitingOption(OptionPhase::NeedEmoji) => {
            let Some(emoji) = EmojiToken::parse(text) else {
                return Transition::Rejected(Rejection::NotAnEmoji);
            };
            if draft.has_reaction(&emoji) {
                return Transition::Rejected(Rejection::DuplicateEmoji);
            }
            if !emotes.offers(&emoji) {
                return Transition::Rejected(Rejection::ForeignEmote);
            }
            next.reactions.push(emoji);
            next.step = DraftStep::AwaitingOption(OptionPhase::NeedOption);
            if next.reactions.len() == 1 {
                Prompt::AskSecondOption
            } else {
                Prompt::AskNextOption
            }
        },
        DraftStep::AwaitingExpiration => {
            let Some(expires_at) = expiry_from(now, text) else {
                return Transition::Rejected(Rejection::BadExpiration);
            };
            next.expires_at = Some(expires_at);
            next.step = DraftStep::AwaitingConfirmation;
            Prompt::PreviewIntro
        },
        DraftStep::AwaitingConfirmation => {
            return Transition::Rejected(Rejection::AwaitingCommand);
        },
    };

    Transition::Advanced { draft: next, prompt }
}

/// Close option collection (the `/enough` command).
#[must_use]
pub fn finish_options(draft: &Draft) -> Transition {
    match draft.step {
        DraftStep::AwaitingOption(OptionPhase::NeedEmoji) => {
            Transition::Rejected(Rejection::EmojiPending)
        },
        DraftStep::AwaitingOption(OptionPhase::NeedOption) if draft.complete_options() < 2 => {
            Transition::Rejected(Rejection::NotEnoughOptions)
        },
        DraftStep::AwaitingOption(OptionPhase::NeedOption) => {
            let mut next = draft.clone();
            next.step = DraftStep::AwaitingExpiration;
            Transition::Advanced {
                draft: next,
                prompt: Prompt::AskExpiration,
            }
        },
        _ => Transition::Rejected(Rejection::NotCollectingOptions),
    }
}

/// Preview of a draft as it would be posted, with the placeholder id.
#[must_use]
pub fn preview_embed(draft: &Draft, color: u32) -> PollEmbed {
    let poll = Poll {
        id: PREVIEW_POLL_ID,
        question: draft.question.clone(),
        options: draft.options.clone(),
        reactions: draft.reactions.clone(),
        expires_at: draft.expires_at.unwrap_or_else(Utc::now),
    };
    poll_embed(&poll, &PollResults::default(), color)
}

pub const NO_DRAFT_TITLE: &str = "I'm sorry, but I couldn't interpret your request.";
pub const NO_DRAFT_HINT: &str = "You can start a new poll by using **/poll** in a server channel.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WizardSettings {
    pub embed_color: u32,
    pub error_color: u32,
    pub max_options: usize,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self {
            embed_color: 0x6366f1,
            error_color: 0xff0000,
            max_options: MAX_OPTIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardOutcome {
    /// The author has no draft; they were told how to start one.
    NoDraft,
    Advanced(DraftStep),
    Rejected(Rejection),
}

/// Drives drafts from private messages. Every reply goes through the
/// outbound throttle.
pub struct DraftWizard {
    store: Arc<dyn DraftStore>,
    platform: Arc<dyn ChatPlatform>,
    throttle: OutboundThrottle,
    settings: WizardSettings,
    locks: DraftLocks,
}

impl DraftWizard {
    pub fn new(
        store: Arc<dyn DraftStore>,
        platform: Arc<dyn ChatPlatform>,
        throttle: OutboundThrottle,
        settings: WizardSettings,
        locks: DraftLocks,
    ) -> Self {
        Self {
            store,
            platform,
            throttle,
            settings,
            locks,
        }
    }

    /// Handle one private message from `author_id` received in `dm_channel_id`.
    pub async fn handle_message(
        &self,
        author_id: &str,
        dm_channel_id: &str,
        text: &str,
    ) -> Result<WizardOutcome> {
        #[cfg(feature = "metrics")]
        counter!(poll_metrics::WIZARD_MESSAGES_TOTAL).increment(1);

        let _guard = self.locks.lock(author_id).await;
        let Some(draft) = self.store.get(author_id).await? else {
            debug!(user_id = author_id, "private message without a draft");
            self.send(
                dm_channel_id,
                OutboundMessage::Embed(PollEmbed {
                    title: NO_DRAFT_TITLE.to_string(),
                    description: NO_DRAFT_HINT.to_string(),
                    color: self.settings.error_color,
                    footer: None,
                }),
            )
            .await?;
            return Ok(WizardOutcome::NoDraft);
        };

        let emotes = match self.emotes_for(&draft, text).await {
            Ok(emotes) => emotes,
            Err(e) => {
                warn!(user_id = author_id, error = %e, "failed to list guild emotes");
                return self
                    .reject(dm_channel_id, author_id, Rejection::Uninterpretable)
                    .await;
            },
        };

        match transition(&draft, text, &emotes, Utc::now(), self.settings.max_options) {
            Transition::Rejected(rejection) => {
                self.reject(dm_channel_id, author_id, rejection).await
            },
            Transition::Advanced { draft: next, prompt } => {
                let step = next.step;
                let stored = self
                    .store
                    .mutate(author_id, Box::new(move |d| *d = next))
                    .await?;
                debug!(user_id = author_id, step = %step, "draft advanced");

                if prompt == Prompt::PreviewIntro {
                    self.send_preview(dm_channel_id, &stored).await?;
                } else {
                    self.say(dm_channel_id, prompt.text()).await?;
                }
                Ok(WizardOutcome::Advanced(step))
            },
        }
    }

    /// Send the preview sequence: intro, embed with its reactions, then the
    /// hint about `/done`, `/reset` and `/cancel`.
    pub async fn send_preview(&self, channel_id: &str, draft: &Draft) -> Result<()> {
        self.say(channel_id, Prompt::PreviewIntro.text()).await?;
        let preview = self
            .send(
                channel_id,
                OutboundMessage::Embed(preview_embed(draft, self.settings.embed_color)),
            )
            .await?;
        for emoji in &draft.reactions {
            if let Err(e) = self.platform.add_reaction(&preview, emoji).await {
                warn!(
                    user_id = %draft.author_id,
                    emoji = %emoji,
                    error = %e,
                    "failed to attach reaction to preview"
                );
            }
        }
        self.say(channel_id, Prompt::ConfirmHint.text()).await
    }

    pub(crate) async fn say(&self, channel_id: &str, text: &str) -> Result<()> {
        self.send(channel_id, OutboundMessage::text(text)).await.map(|_| ())
    }

    async fn send(&self, channel_id: &str, message: OutboundMessage) -> Result<MessageRef> {
        self.throttle
            .schedule(self.platform.send(channel_id, message))
            .await
    }

    async fn reject(
        &self,
        channel_id: &str,
        author_id: &str,
        rejection: Rejection,
    ) -> Result<WizardOutcome> {
        debug!(user_id = author_id, reason = rejection.reason(), "wizard input rejected");
        #[cfg(feature = "metrics")]
        counter!(poll_metrics::WIZARD_REJECTIONS_TOTAL, labels::REASON => rejection.reason())
            .increment(1);
        self.say(channel_id, rejection.text()).await?;
        Ok(WizardOutcome::Rejected(rejection))
    }

    /// Guild emotes are only fetched when a custom emote is offered as a
    /// reaction.
    async fn emotes_for(&self, draft: &Draft, text: &str) -> Result<EmoteCatalog> {
        let wants_custom = draft.step == DraftStep::AwaitingOption(OptionPhase::NeedEmoji)
            && EmojiToken::parse_custom(text).is_some();
        match (&draft.guild_id, wants_custom) {
            (Some(guild_id), true) => {
                Ok(EmoteCatalog::new(self.platform.guild_emotes(guild_id).await?))
            },
            _ => Ok(EmoteCatalog::empty()),
        }
    }
}
