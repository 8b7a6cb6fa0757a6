//! Chat platform seam: everything the poll core needs from Discord.

use async_trait::async_trait;

use crate::{Result, emoji::EmojiToken};

/// Location of a sent message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel_id: String,
    pub message_id: String,
}

impl MessageRef {
    #[must_use]
    pub fn new(channel_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            message_id: message_id.into(),
        }
    }
}

/// A custom emote a guild offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildEmote {
    pub id: u64,
    pub name: String,
    pub animated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollEmbed {
    pub title: String,
    pub description: String,
    /// RGB colour, `0xRRGGBB`.
    pub color: u32,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Text(String),
    Embed(PollEmbed),
}

impl OutboundMessage {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// One emoji on a message and how many users besides the bot applied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionCount {
    pub emoji: EmojiToken,
    pub others: u64,
}

/// The parts of a message the reconciler reads.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollMessage {
    /// Title of the first embed, if any.
    pub title: Option<String>,
    pub reactions: Vec<ReactionCount>,
}

impl PollMessage {
    /// Emoji other than `except` that some user besides the bot applied.
    /// Only these can hold a previous vote.
    #[must_use]
    pub fn voted_emoji_except(&self, except: &EmojiToken) -> Vec<EmojiToken> {
        self.reactions
            .iter()
            .filter(|r| r.others > 0 && !r.emoji.same_emoji(except))
            .map(|r| r.emoji.clone())
            .collect()
    }
}

#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send(&self, channel_id: &str, message: OutboundMessage) -> Result<MessageRef>;

    /// Replace the first embed of `message`.
    async fn edit_embed(&self, message: &MessageRef, embed: PollEmbed) -> Result<()>;

    async fn add_reaction(&self, message: &MessageRef, emoji: &EmojiToken) -> Result<()>;

    /// Remove `user_id`'s `emoji` reaction from `message`.
    async fn remove_reaction(
        &self,
        message: &MessageRef,
        emoji: &EmojiToken,
        user_id: &str,
    ) -> Result<()>;

    /// Read the message's title and reaction counts. Does not list who reacted.
    async fn fetch_message(&self, message: &MessageRef) -> Result<PollMessage>;

    /// Whether `user_id` currently has `emoji` on `message`.
    async fn has_reacted(
        &self,
        message: &MessageRef,
        emoji: &EmojiToken,
        user_id: &str,
    ) -> Result<bool>;

    async fn guild_emotes(&self, guild_id: &str) -> Result<Vec<GuildEmote>>;

    /// Open (or reuse) the private channel with `user_id`.
    async fn open_dm(&self, user_id: &str) -> Result<String>;
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn count(emoji: &str, others: u64) -> ReactionCount {
        ReactionCount {
            emoji: EmojiToken::Unicode(emoji.into()),
            others,
        }
    }

    #[test]
    fn only_emoji_with_human_reactions_are_candidates() {
        let message = PollMessage {
            title: Some("Poll #1: Best color?".into()),
            reactions: vec![count("🔴", 0), count("🔵", 2), count("🟢", 1)],
        };
        let candidates = message.voted_emoji_except(&EmojiToken::Unicode("🟢".into()));
        assert_eq!(candidates, vec![EmojiToken::Unicode("🔵".into())]);
    }
}
