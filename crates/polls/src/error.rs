use thiserror::Error;

use crate::types::DraftStep;

#[derive(Debug, Error)]
pub enum Error {
    /// The poll API could not be reached or answered with a server error.
    #[error("poll backend request failed: {context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("poll backend returned {status} for {context}: {body}")]
    BackendStatus {
        context: String,
        status: u16,
        body: String,
    },

    #[error("poll not found: {poll_id}")]
    NotFound { poll_id: u64 },

    /// The poll API rejected a new poll (malformed payload).
    #[error("poll rejected by backend: {message}")]
    Publish { message: String },

    /// A chat platform call failed (missing permission, unknown message, transport).
    #[error("chat platform request failed: {context}: {source}")]
    Platform {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("no poll draft in progress for user {user_id}")]
    NoDraft { user_id: String },

    #[error("user {user_id} already has a poll draft in progress")]
    DraftExists { user_id: String },

    /// The confirmed end time passed before the poll was published.
    #[error("poll draft of user {user_id} expired before it was published")]
    DraftExpired { user_id: String },

    #[error("draft is at step {actual:?}, expected {expected}")]
    InvalidStep {
        expected: &'static str,
        actual: DraftStep,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn backend(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn platform(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Platform {
            context: context.into(),
            source: Box::new(source),
        }
    }

    #[must_use]
    pub fn no_draft(user_id: impl Into<String>) -> Self {
        Self::NoDraft {
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn draft_exists(user_id: impl Into<String>) -> Self {
        Self::DraftExists {
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn draft_expired(user_id: impl Into<String>) -> Self {
        Self::DraftExpired {
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn invalid_step(expected: &'static str, actual: DraftStep) -> Self {
        Self::InvalidStep { expected, actual }
    }

    /// Whether the failure came from the poll API rather than the chat platform
    /// or the caller.
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::Backend { .. }
                | Self::BackendStatus { .. }
                | Self::NotFound { .. }
                | Self::Publish { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
