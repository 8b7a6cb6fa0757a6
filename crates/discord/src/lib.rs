//! Discord gateway adapter for the poll subsystem.
//!
//! [`DiscordPlatform`] implements the poll core's chat seam over the REST
//! client and [`PollHandler`] routes gateway events and slash commands into
//! a [`guildbot_polls::PollService`].

pub mod bot;
pub mod commands;
pub mod convert;
pub mod error;
pub mod handler;
pub mod platform;

pub use {
    bot::{rest_platform, run_bot},
    error::{Error, Result},
    handler::PollHandler,
    platform::DiscordPlatform,
};
