//! Conversions between serenity models and the poll core's types.

use std::num::NonZeroU64;

use {
    guildbot_polls::{EmojiToken, platform::PollEmbed},
    serenity::all::{
        ChannelId, CreateEmbed, CreateEmbedFooter, EmojiId, GuildId, MessageId, ReactionType,
        UserId,
    },
};

use crate::{Error, Result};

fn snowflake(kind: &'static str, raw: &str) -> Result<NonZeroU64> {
    raw.trim()
        .parse::<NonZeroU64>()
        .map_err(|_| Error::invalid_id(kind, raw))
}

pub fn channel_id(raw: &str) -> Result<ChannelId> {
    snowflake("channel", raw).map(ChannelId::from)
}

pub fn message_id(raw: &str) -> Result<MessageId> {
    snowflake("message", raw).map(MessageId::from)
}

pub fn user_id(raw: &str) -> Result<UserId> {
    snowflake("user", raw).map(UserId::from)
}

pub fn guild_id(raw: &str) -> Result<GuildId> {
    snowflake("guild", raw).map(GuildId::from)
}

pub fn reaction_type(emoji: &EmojiToken) -> Result<ReactionType> {
    match emoji {
        EmojiToken::Unicode(grapheme) => Ok(ReactionType::Unicode(grapheme.clone())),
        EmojiToken::Custom { animated, name, id } => {
            let id = NonZeroU64::new(*id).ok_or_else(|| Error::invalid_id("emoji", "0"))?;
            Ok(ReactionType::Custom {
                animated: *animated,
                id: EmojiId::from(id),
                name: Some(name.clone()),
            })
        },
    }
}

/// `None` for reaction kinds polls cannot use.
pub fn emoji_token(reaction: &ReactionType) -> Option<EmojiToken> {
    match reaction {
        ReactionType::Unicode(grapheme) => Some(EmojiToken::Unicode(grapheme.clone())),
        ReactionType::Custom { animated, id, name } => Some(EmojiToken::Custom {
            animated: *animated,
            name: name.clone().unwrap_or_default(),
            id: id.get(),
        }),
        _ => None,
    }
}

pub fn embed(embed: PollEmbed) -> CreateEmbed {
    let builder = CreateEmbed::new()
        .title(embed.title)
        .description(embed.description)
        .colour(embed.color);
    match embed.footer {
        Some(footer) => builder.footer(CreateEmbedFooter::new(footer)),
        None => builder,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("123456789012345678", true)]
    #[case(" 42 ", true)]
    #[case("0", false)]
    #[case("-1", false)]
    #[case("dm-1", false)]
    #[case("", false)]
    fn parses_snowflakes(#[case] raw: &str, #[case] ok: bool) {
        assert_eq!(channel_id(raw).is_ok(), ok);
    }

    #[test]
    fn invalid_id_names_the_kind() {
        let err = message_id("abc").unwrap_err();
        assert_eq!(err.to_string(), "invalid discord message id \"abc\"");
    }

    #[test]
    fn unicode_reaction_round_trips() {
        let token = EmojiToken::Unicode("🔴".into());
        let reaction = reaction_type(&token).unwrap();
        assert_eq!(reaction, ReactionType::Unicode("🔴".into()));
        assert_eq!(emoji_token(&reaction), Some(token));
    }

    #[test]
    fn custom_reaction_keeps_id_name_and_animation() {
        let token = EmojiToken::Custom {
            animated: true,
            name: "party".into(),
            id: 987,
        };
        let reaction = reaction_type(&token).unwrap();
        match &reaction {
            ReactionType::Custom { animated, id, name } => {
                assert!(*animated);
                assert_eq!(id.get(), 987);
                assert_eq!(name.as_deref(), Some("party"));
            },
            other => panic!("unexpected reaction {other:?}"),
        }
        assert_eq!(emoji_token(&reaction), Some(token));
    }

    #[test]
    fn custom_reaction_without_name() {
        let reaction = ReactionType::Custom {
            animated: false,
            id: EmojiId::new(5),
            name: None,
        };
        let token = emoji_token(&reaction).unwrap();
        assert!(token.same_emoji(&EmojiToken::Custom {
            animated: false,
            name: "renamed".into(),
            id: 5,
        }));
    }

    #[test]
    fn zero_emote_id_is_rejected() {
        let token = EmojiToken::Custom {
            animated: false,
            name: "x".into(),
            id: 0,
        };
        assert!(reaction_type(&token).is_err());
    }
}
