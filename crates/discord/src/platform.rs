//! [`ChatPlatform`] over serenity's REST client.

use std::sync::Arc;

use {
    async_trait::async_trait,
    guildbot_polls::{
        ChatPlatform, EmojiToken, Error as PollError, Result as PollResult,
        platform::{GuildEmote, MessageRef, OutboundMessage, PollEmbed, PollMessage, ReactionCount},
    },
    serenity::{
        all::{ChannelId, CreateMessage, EditMessage, MessageId, UserId},
        http::Http,
    },
    tracing::debug,
};

use crate::convert;

pub struct DiscordPlatform {
    http: Arc<Http>,
}

impl DiscordPlatform {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    fn target(message: &MessageRef) -> PollResult<(ChannelId, MessageId)> {
        Ok((
            convert::channel_id(&message.channel_id)?,
            convert::message_id(&message.message_id)?,
        ))
    }
}

/// Reaction users are listed in id order, so the single user listed after
/// this cursor is `user` exactly when they reacted.
fn reaction_cursor(user: UserId) -> Option<UserId> {
    (user.get() > 1).then(|| UserId::new(user.get() - 1))
}

#[async_trait]
impl ChatPlatform for DiscordPlatform {
    async fn send(&self, channel_id: &str, message: OutboundMessage) -> PollResult<MessageRef> {
        let channel = convert::channel_id(channel_id)?;
        let builder = match message {
            OutboundMessage::Text(text) => CreateMessage::new().content(text),
            OutboundMessage::Embed(embed) => CreateMessage::new().embed(convert::embed(embed)),
        };
        let sent = channel
            .send_message(&self.http, builder)
            .await
            .map_err(|e| PollError::platform("send message", e))?;
        Ok(MessageRef::new(sent.channel_id.to_string(), sent.id.to_string()))
    }

    async fn edit_embed(&self, message: &MessageRef, embed: PollEmbed) -> PollResult<()> {
        let (channel, id) = Self::target(message)?;
        channel
            .edit_message(&self.http, id, EditMessage::new().embed(convert::embed(embed)))
            .await
            .map_err(|e| PollError::platform("edit poll message", e))?;
        Ok(())
    }

    async fn add_reaction(&self, message: &MessageRef, emoji: &EmojiToken) -> PollResult<()> {
        let (channel, id) = Self::target(message)?;
        channel
            .create_reaction(&self.http, id, convert::reaction_type(emoji)?)
            .await
            .map_err(|e| PollError::platform("add reaction", e))
    }

    async fn remove_reaction(
        &self,
        message: &MessageRef,
        emoji: &EmojiToken,
        user_id: &str,
    ) -> PollResult<()> {
        let (channel, id) = Self::target(message)?;
        let user = convert::user_id(user_id)?;
        channel
            .delete_reaction(&self.http, id, Some(user), convert::reaction_type(emoji)?)
            .await
            .map_err(|e| PollError::platform("remove reaction", e))
    }

    async fn fetch_message(&self, message: &MessageRef) -> PollResult<PollMessage> {
        let (channel, id) = Self::target(message)?;
        let fetched = channel
            .message(&self.http, id)
            .await
            .map_err(|e| PollError::platform("fetch message", e))?;

        let title = fetched.embeds.first().and_then(|e| e.title.clone());
        let reactions: Vec<ReactionCount> = fetched
            .reactions
            .iter()
            .filter_map(|r| {
                Some(ReactionCount {
                    emoji: convert::emoji_token(&r.reaction_type)?,
                    others: r.count.saturating_sub(u64::from(r.me)),
                })
            })
            .collect();
        debug!(
            message_id = %message.message_id,
            reactions = reactions.len(),
            "fetched message"
        );
        Ok(PollMessage { title, reactions })
    }

    async fn has_reacted(
        &self,
        message: &MessageRef,
        emoji: &EmojiToken,
        user_id: &str,
    ) -> PollResult<bool> {
        let (channel, id) = Self::target(message)?;
        let user = convert::user_id(user_id)?;
        let page = channel
            .reaction_users(
                &self.http,
                id,
                convert::reaction_type(emoji)?,
                Some(1),
                reaction_cursor(user),
            )
            .await
            .map_err(|e| PollError::platform("list reaction users", e))?;
        Ok(page.first().is_some_and(|u| u.id == user))
    }

    async fn guild_emotes(&self, guild_id: &str) -> PollResult<Vec<GuildEmote>> {
        let guild = convert::guild_id(guild_id)?;
        let emojis = guild
            .emojis(&self.http)
            .await
            .map_err(|e| PollError::platform("list guild emotes", e))?;
        Ok(emojis
            .into_iter()
            .map(|e| GuildEmote {
                id: e.id.get(),
                name: e.name,
                animated: e.animated,
            })
            .collect())
    }

    async fn open_dm(&self, user_id: &str) -> PollResult<String> {
        let user = convert::user_id(user_id)?;
        let channel = user
            .create_dm_channel(&self.http)
            .await
            .map_err(|e| PollError::platform("open direct message", e))?;
        Ok(channel.id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_sits_just_below_the_user() {
        assert_eq!(
            reaction_cursor(UserId::new(80351110224678912)),
            Some(UserId::new(80351110224678911))
        );
        assert_eq!(reaction_cursor(UserId::new(1)), None);
    }
}
