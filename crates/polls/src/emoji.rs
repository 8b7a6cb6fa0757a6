//! Emoji tokens: a single Unicode emoji sequence or a guild custom emote.

use std::{fmt, sync::LazyLock};

use {
    regex::Regex,
    serde::{Deserialize, Serialize},
};

use crate::platform::GuildEmote;

/// One emoji sequence, anchored. Covers flags, keycaps, skin tones, tag
/// sequences and ZWJ chains.
static UNICODE_EMOJI_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"[\x{1F1E6}-\x{1F1FF}]{2}",
        r"|[0-9#*]\x{FE0F}?\x{20E3}",
        r"|(?:\p{Extended_Pictographic}|\p{Emoji_Presentation})",
        r"[\x{FE0E}\x{FE0F}]?[\x{1F3FB}-\x{1F3FF}]?[\x{E0020}-\x{E007F}]*",
        r"(?:\x{200D}(?:\p{Extended_Pictographic}|\p{Emoji_Presentation})",
        r"[\x{FE0E}\x{FE0F}]?[\x{1F3FB}-\x{1F3FF}]?)*",
        r")$",
    ))
    .ok()
});

static CUSTOM_EMOTE_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^<(a?):(\w+):(\d+)>$").ok());

/// A reaction emoji as stored in a draft and sent to the poll backend.
///
/// The canonical string form is the raw grapheme for Unicode emoji and
/// `<:name:id>` / `<a:name:id>` for custom emotes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EmojiToken {
    Unicode(String),
    Custom {
        animated: bool,
        name: String,
        id: u64,
    },
}

impl EmojiToken {
    /// Parse a whole message as exactly one emoji. Surrounding whitespace is
    /// ignored; anything else makes the message not an emoji.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if let Some(custom) = Self::parse_custom(text) {
            return Some(custom);
        }
        let re = UNICODE_EMOJI_RE.as_ref()?;
        re.is_match(text).then(|| Self::Unicode(text.to_string()))
    }

    #[must_use]
    pub fn parse_custom(text: &str) -> Option<Self> {
        let caps = CUSTOM_EMOTE_RE.as_ref()?.captures(text.trim())?;
        let id = caps.get(3)?.as_str().parse::<u64>().ok()?;
        Some(Self::Custom {
            animated: caps.get(1).is_some_and(|m| !m.as_str().is_empty()),
            name: caps.get(2)?.as_str().to_string(),
            id,
        })
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom { .. })
    }

    /// Whether two tokens name the same emoji as the platform sees it.
    ///
    /// Custom emotes are identified by id alone (renaming an emote keeps its
    /// id). Unicode emoji compare with variation selector 16 stripped, since
    /// clients differ in whether they send it.
    #[must_use]
    pub fn same_emoji(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Custom { id: a, .. }, Self::Custom { id: b, .. }) => a == b,
            (Self::Unicode(a), Self::Unicode(b)) => strip_vs16(a) == strip_vs16(b),
            _ => false,
        }
    }

    /// Position of this emoji in `reactions`, if any.
    #[must_use]
    pub fn position_in(&self, reactions: &[Self]) -> Option<usize> {
        reactions.iter().position(|r| r.same_emoji(self))
    }
}

fn strip_vs16(s: &str) -> String {
    s.chars().filter(|c| *c != '\u{FE0F}').collect()
}

impl fmt::Display for EmojiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicode(raw) => f.write_str(raw),
            Self::Custom { animated, name, id } => {
                let prefix = if *animated { "a" } else { "" };
                write!(f, "<{prefix}:{name}:{id}>")
            },
        }
    }
}

impl From<String> for EmojiToken {
    fn from(raw: String) -> Self {
        Self::parse_custom(&raw).unwrap_or(Self::Unicode(raw))
    }
}

impl From<EmojiToken> for String {
    fn from(token: EmojiToken) -> Self {
        token.to_string()
    }
}

/// Custom emotes a guild currently offers.
#[derive(Debug, Clone, Default)]
pub struct EmoteCatalog {
    emotes: Vec<GuildEmote>,
}

impl EmoteCatalog {
    #[must_use]
    pub fn new(emotes: Vec<GuildEmote>) -> Self {
        Self { emotes }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A custom token is available when both its name and id match a guild
    /// emote. Unicode emoji are always available.
    #[must_use]
    pub fn offers(&self, token: &EmojiToken) -> bool {
        match token {
            EmojiToken::Unicode(_) => true,
            EmojiToken::Custom { name, id, .. } => {
                self.emotes.iter().any(|e| e.id == *id && e.name == *name)
            },
        }
    }
}
