//! Recording fake of the chat platform shared by the crate's tests.

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    Error, Result,
    emoji::EmojiToken,
    platform::{
        ChatPlatform, GuildEmote, MessageRef, OutboundMessage, PollEmbed, PollMessage,
        ReactionCount,
    },
};

pub(crate) const BOT_USER: &str = "bot";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PlatformCall {
    Send { channel_id: String, message: OutboundMessage },
    EditEmbed { message: MessageRef, embed: PollEmbed },
    AddReaction { message: MessageRef, emoji: EmojiToken },
    RemoveReaction { message: MessageRef, emoji: EmojiToken, user_id: String },
    FetchMessage { message: MessageRef },
    HasReacted { message: MessageRef, emoji: EmojiToken, user_id: String },
    GuildEmotes { guild_id: String },
    OpenDm { user_id: String },
}

/// A posted message with every reacting user, as the platform itself sees it.
#[derive(Debug, Clone, Default)]
struct StoredMessage {
    title: Option<String>,
    reactions: Vec<(EmojiToken, Vec<String>)>,
}

impl StoredMessage {
    fn reactions_by(&self, user_id: &str) -> Vec<EmojiToken> {
        self.reactions
            .iter()
            .filter(|(_, users)| users.iter().any(|u| u == user_id))
            .map(|(emoji, _)| emoji.clone())
            .collect()
    }

    fn summary(&self) -> PollMessage {
        PollMessage {
            title: self.title.clone(),
            reactions: self
                .reactions
                .iter()
                .map(|(emoji, users)| ReactionCount {
                    emoji: emoji.clone(),
                    others: users.iter().filter(|u| *u != BOT_USER).count() as u64,
                })
                .collect(),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakePlatform {
    calls: Mutex<Vec<PlatformCall>>,
    messages: Mutex<HashMap<String, StoredMessage>>,
    emotes: Mutex<Vec<GuildEmote>>,
    emote_delay: Mutex<Option<Duration>>,
    next_id: AtomicU64,
    fail_edits: AtomicUsize,
    fail_reactions: AtomicBool,
    fail_sends: AtomicBool,
    fail_emotes: AtomicBool,
    fail_dm: AtomicBool,
}

fn failure(context: &str) -> Error {
    Error::platform(context, std::io::Error::other("missing permissions"))
}

impl FakePlatform {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_emotes(emotes: Vec<GuildEmote>) -> Self {
        let platform = Self::new();
        *platform.emotes.lock().unwrap_or_else(|e| e.into_inner()) = emotes;
        platform
    }

    /// Make every guild emote listing take `delay` before answering.
    pub(crate) fn delay_emotes(&self, delay: Duration) {
        *self.emote_delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    pub(crate) fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Plain texts sent to `channel_id`, in order.
    pub(crate) fn texts_to(&self, channel_id: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Send {
                    channel_id: c,
                    message: OutboundMessage::Text(text),
                } if c == channel_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn embeds_to(&self, channel_id: &str) -> Vec<PollEmbed> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::Send {
                    channel_id: c,
                    message: OutboundMessage::Embed(embed),
                } if c == channel_id => Some(embed),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn edits(&self) -> Vec<PollEmbed> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::EditEmbed { embed, .. } => Some(embed),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn removed_reactions(&self) -> Vec<(EmojiToken, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::RemoveReaction { emoji, user_id, .. } => Some((emoji, user_id)),
                _ => None,
            })
            .collect()
    }

    /// Put a message with the given title in place, as if posted earlier.
    pub(crate) fn seed_message(&self, message: &MessageRef, title: Option<&str>) {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(message.message_id.clone(), StoredMessage {
                title: title.map(str::to_string),
                reactions: Vec::new(),
            });
    }

    /// Apply a reaction the way a user clicking it would.
    pub(crate) fn react(&self, message: &MessageRef, emoji: &EmojiToken, user_id: &str) {
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        let msg = messages.entry(message.message_id.clone()).or_default();
        match msg.reactions.iter_mut().find(|(e, _)| e.same_emoji(emoji)) {
            Some((_, users)) => {
                if !users.iter().any(|u| u == user_id) {
                    users.push(user_id.to_string());
                }
            },
            None => msg
                .reactions
                .push((emoji.clone(), vec![user_id.to_string()])),
        }
    }

    pub(crate) fn reactions_by(&self, message: &MessageRef, user_id: &str) -> Vec<EmojiToken> {
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&message.message_id)
            .map(|m| m.reactions_by(user_id))
            .unwrap_or_default()
    }

    pub(crate) fn fail_next_edits(&self, count: usize) {
        self.fail_edits.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_reactions(&self, fail: bool) {
        self.fail_reactions.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_emotes(&self, fail: bool) {
        self.fail_emotes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_dm(&self, fail: bool) {
        self.fail_dm.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn send(&self, channel_id: &str, message: OutboundMessage) -> Result<MessageRef> {
        self.record(PlatformCall::Send {
            channel_id: channel_id.to_string(),
            message: message.clone(),
        });
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(failure("failed to send message"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let sent = MessageRef::new(channel_id, format!("m{id}"));
        let title = match message {
            OutboundMessage::Embed(embed) => Some(embed.title),
            OutboundMessage::Text(_) => None,
        };
        self.seed_message(&sent, title.as_deref());
        Ok(sent)
    }

    async fn edit_embed(&self, message: &MessageRef, embed: PollEmbed) -> Result<()> {
        self.record(PlatformCall::EditEmbed {
            message: message.clone(),
            embed,
        });
        if self
            .fail_edits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(failure("failed to edit message"));
        }
        Ok(())
    }

    async fn add_reaction(&self, message: &MessageRef, emoji: &EmojiToken) -> Result<()> {
        self.record(PlatformCall::AddReaction {
            message: message.clone(),
            emoji: emoji.clone(),
        });
        if self.fail_reactions.load(Ordering::SeqCst) {
            return Err(failure("failed to add reaction"));
        }
        self.react(message, emoji, BOT_USER);
        Ok(())
    }

    async fn remove_reaction(
        &self,
        message: &MessageRef,
        emoji: &EmojiToken,
        user_id: &str,
    ) -> Result<()> {
        self.record(PlatformCall::RemoveReaction {
            message: message.clone(),
            emoji: emoji.clone(),
            user_id: user_id.to_string(),
        });
        if self.fail_reactions.load(Ordering::SeqCst) {
            return Err(failure("failed to remove reaction"));
        }
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(msg) = messages.get_mut(&message.message_id) {
            for (_, users) in msg.reactions.iter_mut().filter(|(e, _)| e.same_emoji(emoji)) {
                users.retain(|u| u != user_id);
            }
            msg.reactions.retain(|(_, users)| !users.is_empty());
        }
        Ok(())
    }

    async fn fetch_message(&self, message: &MessageRef) -> Result<PollMessage> {
        self.record(PlatformCall::FetchMessage {
            message: message.clone(),
        });
        self.messages
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&message.message_id)
            .map(StoredMessage::summary)
            .ok_or_else(|| failure("unknown message"))
    }

    async fn has_reacted(
        &self,
        message: &MessageRef,
        emoji: &EmojiToken,
        user_id: &str,
    ) -> Result<bool> {
        self.record(PlatformCall::HasReacted {
            message: message.clone(),
            emoji: emoji.clone(),
            user_id: user_id.to_string(),
        });
        Ok(self
            .reactions_by(message, user_id)
            .iter()
            .any(|r| r.same_emoji(emoji)))
    }

    async fn guild_emotes(&self, guild_id: &str) -> Result<Vec<GuildEmote>> {
        self.record(PlatformCall::GuildEmotes {
            guild_id: guild_id.to_string(),
        });
        let delay = *self.emote_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_emotes.load(Ordering::SeqCst) {
            return Err(failure("failed to list emotes"));
        }
        Ok(self.emotes.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn open_dm(&self, user_id: &str) -> Result<String> {
        self.record(PlatformCall::OpenDm {
            user_id: user_id.to_string(),
        });
        if self.fail_dm.load(Ordering::SeqCst) {
            return Err(failure("cannot message this user"));
        }
        Ok(format!("dm-{user_id}"))
    }
}
