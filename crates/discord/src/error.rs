use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Serenity(#[from] serenity::Error),

    #[error(transparent)]
    Polls(#[from] guildbot_polls::Error),

    #[error("{message}")]
    Message { message: String },

    #[error("invalid discord {kind} id \"{raw}\"")]
    InvalidId { kind: &'static str, raw: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn invalid_id(kind: &'static str, raw: impl Into<String>) -> Self {
        Self::InvalidId {
            kind,
            raw: raw.into(),
        }
    }
}

impl From<Error> for guildbot_polls::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Polls(inner) => inner,
            other => Self::platform("discord", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
