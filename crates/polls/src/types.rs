//! Draft data model and the explicit wizard step.

use std::{fmt, str::FromStr};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::{
    Error, Result,
    emoji::EmojiToken,
};

/// Hard ceiling on the number of options a poll may carry.
pub const MAX_OPTIONS: usize = 20;

/// Which half of an option/emoji pair the wizard is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionPhase {
    NeedOption,
    NeedEmoji,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "phase", rename_all = "snake_case")]
pub enum DraftStep {
    AwaitingQuestion,
    AwaitingOption(OptionPhase),
    AwaitingExpiration,
    AwaitingConfirmation,
}

impl DraftStep {
    fn rank(self) -> u8 {
        match self {
            Self::AwaitingQuestion => 0,
            Self::AwaitingOption(_) => 1,
            Self::AwaitingExpiration => 2,
            Self::AwaitingConfirmation => 3,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingQuestion => "awaiting_question",
            Self::AwaitingOption(OptionPhase::NeedOption) => "awaiting_option",
            Self::AwaitingOption(OptionPhase::NeedEmoji) => "awaiting_emoji",
            Self::AwaitingExpiration => "awaiting_expiration",
            Self::AwaitingConfirmation => "awaiting_confirmation",
        }
    }
}

impl fmt::Display for DraftStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step a draft can be rewound to with `/reset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetTarget {
    Question,
    Options,
    Expiration,
}

impl ResetTarget {
    fn rank(self) -> u8 {
        match self {
            Self::Question => 0,
            Self::Options => 1,
            Self::Expiration => 2,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Options => "options",
            Self::Expiration => "expiration",
        }
    }
}

impl FromStr for ResetTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "question" => Ok(Self::Question),
            "options" | "option" => Ok(Self::Options),
            "expiration" | "expiry" | "duration" => Ok(Self::Expiration),
            other => Err(Error::message(format!("unknown reset target: {other}"))),
        }
    }
}

/// An in-progress poll owned by its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub author_id: String,
    /// Guild whose custom emotes are accepted as reactions.
    pub guild_id: Option<String>,
    /// Channel the finished poll is published to.
    pub channel_id: String,
    pub question: String,
    pub options: Vec<String>,
    pub reactions: Vec<EmojiToken>,
    pub expires_at: Option<DateTime<Utc>>,
    pub step: DraftStep,
    /// Backend id once the poll is stored but not yet posted. A retried
    /// `/done` reuses it instead of storing the poll again.
    #[serde(default)]
    pub published_poll_id: Option<u64>,
}

impl Draft {
    #[must_use]
    pub fn new(
        author_id: impl Into<String>,
        guild_id: Option<String>,
        channel_id: impl Into<String>,
    ) -> Self {
        Self {
            author_id: author_id.into(),
            guild_id,
            channel_id: channel_id.into(),
            question: String::new(),
            options: Vec::new(),
            reactions: Vec::new(),
            expires_at: None,
            step: DraftStep::AwaitingQuestion,
            published_poll_id: None,
        }
    }

    /// Number of options that already have their emoji.
    #[must_use]
    pub fn complete_options(&self) -> usize {
        self.reactions.len()
    }

    #[must_use]
    pub fn has_option(&self, text: &str) -> bool {
        self.options.iter().any(|o| o == text)
    }

    #[must_use]
    pub fn has_reaction(&self, emoji: &EmojiToken) -> bool {
        self.reactions.iter().any(|r| r.same_emoji(emoji))
    }

    /// Structural invariants every stored draft satisfies.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        let aligned = self.reactions.len() == self.options.len()
            || self.reactions.len() + 1 == self.options.len();
        let distinct_options = self
            .options
            .iter()
            .enumerate()
            .all(|(i, o)| !self.options[..i].contains(o));
        let distinct_reactions = self
            .reactions
            .iter()
            .enumerate()
            .all(|(i, r)| !self.reactions[..i].iter().any(|p| p.same_emoji(r)));
        let phase_matches = match self.step {
            DraftStep::AwaitingOption(OptionPhase::NeedOption) => {
                self.reactions.len() == self.options.len()
            },
            DraftStep::AwaitingOption(OptionPhase::NeedEmoji) => {
                self.reactions.len() + 1 == self.options.len()
            },
            _ => true,
        };
        let stored_when_confirmed = self.published_poll_id.is_none()
            || self.step == DraftStep::AwaitingConfirmation;
        aligned
            && stored_when_confirmed
            && distinct_options
            && distinct_reactions
            && phase_matches
            && self.options.len() <= MAX_OPTIONS
    }

    /// Rewind to `to`, clearing everything collected after it.
    ///
    /// A stored poll id is forgotten as well: the edited draft is a new poll.
    /// Rewinding forward (e.g. to the expiration step while options are still
    /// being collected) is refused.
    pub fn rewind(&mut self, to: ResetTarget) -> Result<()> {
        if to.rank() > self.step.rank() {
            return Err(Error::invalid_step(
                match to {
                    ResetTarget::Question => "awaiting_question or later",
                    ResetTarget::Options => "awaiting_option or later",
                    ResetTarget::Expiration => "awaiting_expiration or later",
                },
                self.step,
            ));
        }
        self.published_poll_id = None;
        match to {
            ResetTarget::Question => {
                self.question.clear();
                self.options.clear();
                self.reactions.clear();
                self.expires_at = None;
                self.step = DraftStep::AwaitingQuestion;
            },
            ResetTarget::Options => {
                self.options.clear();
                self.reactions.clear();
                self.expires_at = None;
                self.step = DraftStep::AwaitingOption(OptionPhase::NeedOption);
            },
            ResetTarget::Expiration => {
                self.expires_at = None;
                self.step = DraftStep::AwaitingExpiration;
            },
        }
        Ok(())
    }
}
