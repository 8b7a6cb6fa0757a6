//! Emoji-reaction polls for guild chat.
//!
//! Authors build a poll in a private conversation with the bot
//! ([`wizard`]), publish it through the remote poll store ([`publisher`]),
//! and members vote by reacting to the posted message ([`reconciler`]).
//! The remote store is the only source of truth for tallies; this crate
//! keeps nothing but in-progress drafts.

pub mod backend;
#[cfg(any(test, feature = "test-util"))]
pub mod backend_memory;
pub mod emoji;
pub mod error;
pub mod expiration;
pub mod platform;
pub mod publisher;
pub mod reconciler;
pub mod render;
pub mod service;
pub mod store;
pub mod store_memory;
pub mod throttle;
pub mod types;
pub mod wizard;

#[cfg(test)]
pub(crate) mod test_support;

pub use {
    backend::{HttpPollBackend, PollBackend},
    emoji::EmojiToken,
    error::{Error, Result},
    platform::ChatPlatform,
    reconciler::{ReactionEvent, ReactionKind, ReconcileOutcome},
    service::PollService,
    store::DraftStore,
    store_memory::InMemoryDraftStore,
    throttle::{OutboundThrottle, ThrottleLimits},
    wizard::{WizardOutcome, WizardSettings},
};
