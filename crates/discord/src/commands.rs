//! Slash command definitions and dispatch.

use std::str::FromStr;

use {
    guildbot_polls::{PollService, Result as PollResult, types::ResetTarget},
    serenity::all::{CommandDataOption, CommandOptionType, CreateCommand, CreateCommandOption},
};

pub const POLL: &str = "poll";
pub const ENOUGH: &str = "enough";
pub const DONE: &str = "done";
pub const RESET: &str = "reset";
pub const CANCEL: &str = "cancel";

const RESET_TARGET_OPTION: &str = "to";

pub const GUILD_ONLY_REPLY: &str = "Polls can only be created in a server channel.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollCommand {
    Start,
    Enough,
    Done,
    Reset(Option<ResetTarget>),
    Cancel,
}

impl PollCommand {
    /// Map an invoked command name and its options, `None` for commands
    /// this bot does not own.
    pub fn parse(name: &str, reset_target: Option<&str>) -> Option<Self> {
        Some(match name {
            POLL => Self::Start,
            ENOUGH => Self::Enough,
            DONE => Self::Done,
            RESET => Self::Reset(reset_target.and_then(|t| ResetTarget::from_str(t).ok())),
            CANCEL => Self::Cancel,
            _ => return None,
        })
    }

    pub fn from_interaction(name: &str, options: &[CommandDataOption]) -> Option<Self> {
        let target = options
            .iter()
            .find(|o| o.name == RESET_TARGET_OPTION)
            .and_then(|o| o.value.as_str());
        Self::parse(name, target)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => POLL,
            Self::Enough => ENOUGH,
            Self::Done => DONE,
            Self::Reset(_) => RESET,
            Self::Cancel => CANCEL,
        }
    }

    /// Run the command for `author_id`, invoked in `channel_id`. Returns the
    /// ephemeral reply.
    pub async fn run(
        self,
        service: &PollService,
        author_id: &str,
        guild_id: Option<&str>,
        channel_id: &str,
    ) -> PollResult<String> {
        match self {
            Self::Start => service.start(author_id, guild_id, channel_id).await,
            Self::Enough => service.enough(author_id).await,
            Self::Done => service.done(author_id).await,
            Self::Reset(to) => service.reset(author_id, to).await,
            Self::Cancel => service.cancel(author_id).await,
        }
    }
}

/// Global command set registered on `ready`.
pub fn definitions() -> Vec<CreateCommand> {
    let reset_target = [
        ResetTarget::Question,
        ResetTarget::Options,
        ResetTarget::Expiration,
    ]
    .into_iter()
    .fold(
        CreateCommandOption::new(
            CommandOptionType::String,
            RESET_TARGET_OPTION,
            "Step to go back to (defaults to the question)",
        )
        .required(false),
        |option, target| option.add_string_choice(target.as_str(), target.as_str()),
    );

    vec![
        CreateCommand::new(POLL).description("Create a poll in this channel"),
        CreateCommand::new(ENOUGH).description("Stop adding options to your poll"),
        CreateCommand::new(DONE).description("Publish your finished poll"),
        CreateCommand::new(RESET)
            .description("Go back to an earlier step of your poll")
            .add_option(reset_target),
        CreateCommand::new(CANCEL).description("Discard the poll you are creating"),
    ]
}
