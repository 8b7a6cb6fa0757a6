//! Discord event handler for serenity.
//!
//! Routes private messages to the draft wizard, reactions on guild messages
//! to the vote reconciler and slash commands to the poll commands. Every
//! failure is logged here; nothing propagates back into the gateway.

use std::sync::{Arc, OnceLock};

use {
    guildbot_polls::{
        PollService, ReactionEvent, ReactionKind, ReconcileOutcome, platform::MessageRef,
    },
    serenity::{
        all::{
            Command, CommandInteraction, Context, CreateInteractionResponse,
            CreateInteractionResponseMessage, EventHandler, GatewayIntents, Interaction, Message,
            Reaction, Ready, UserId,
        },
        async_trait,
    },
    tracing::{debug, error, info, warn},
};

use crate::{
    commands::{self, GUILD_ONLY_REPLY, PollCommand},
    convert,
};

/// Handler for Discord gateway events.
pub struct PollHandler {
    service: Arc<PollService>,
    register_commands: bool,
    bot_user_id: OnceLock<UserId>,
}

impl PollHandler {
    pub fn new(service: Arc<PollService>, register_commands: bool) -> Self {
        Self {
            service,
            register_commands,
            bot_user_id: OnceLock::new(),
        }
    }

    /// Required gateway intents for the bot.
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
    }

    fn is_own(&self, user_id: UserId) -> bool {
        self.bot_user_id.get() == Some(&user_id)
    }

    async fn handle_reaction(&self, kind: ReactionKind, reaction: Reaction) {
        // Poll messages only live in guild channels.
        let (Some(user_id), Some(_)) = (reaction.user_id, reaction.guild_id) else {
            return;
        };
        if self.is_own(user_id) || reaction.member.as_ref().is_some_and(|m| m.user.bot) {
            return;
        }
        let Some(emoji) = convert::emoji_token(&reaction.emoji) else {
            debug!(message_id = %reaction.message_id, "ignoring unsupported reaction kind");
            return;
        };

        let event = ReactionEvent {
            kind,
            message: MessageRef::new(
                reaction.channel_id.to_string(),
                reaction.message_id.to_string(),
            ),
            user_id: user_id.to_string(),
            emoji,
        };
        match self.service.handle_reaction(&event).await {
            Ok(ReconcileOutcome::NotAPoll) => {},
            Ok(outcome) => debug!(
                message_id = %event.message.message_id,
                user_id = %event.user_id,
                kind = kind.as_str(),
                ?outcome,
                "reaction reconciled"
            ),
            Err(e) => error!(
                message_id = %event.message.message_id,
                user_id = %event.user_id,
                kind = kind.as_str(),
                error = %e,
                "failed to reconcile reaction"
            ),
        }
    }

    async fn handle_command(&self, ctx: &Context, command: &CommandInteraction) {
        let Some(poll_command) =
            PollCommand::from_interaction(&command.data.name, &command.data.options)
        else {
            warn!(command = %command.data.name, "unknown slash command");
            return;
        };
        let author_id = command.user.id.to_string();
        let guild_id = command.guild_id.map(|g| g.to_string());
        let channel_id = command.channel_id.to_string();

        let reply = if poll_command == PollCommand::Start && guild_id.is_none() {
            GUILD_ONLY_REPLY.to_string()
        } else {
            match poll_command
                .run(&self.service, &author_id, guild_id.as_deref(), &channel_id)
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    error!(
                        command = poll_command.name(),
                        user_id = %author_id,
                        error = %e,
                        "poll command failed"
                    );
                    "Something went wrong. Please try again later.".to_string()
                },
            }
        };

        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(reply)
                .ephemeral(true),
        );
        if let Err(e) = command.create_response(&ctx.http, response).await {
            warn!(command = poll_command.name(), error = %e, "failed to answer slash command");
        }
    }
}

#[async_trait]
impl EventHandler for PollHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord bot ready"
        );
        let _ = self.bot_user_id.set(ready.user.id);

        if self.register_commands {
            match Command::set_global_commands(&ctx.http, commands::definitions()).await {
                Ok(registered) => info!(count = registered.len(), "slash commands registered"),
                Err(e) => warn!(error = %e, "failed to register slash commands"),
            }
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        // Skip bot messages to prevent loops
        if msg.author.bot || msg.guild_id.is_some() {
            return;
        }

        let author_id = msg.author.id.to_string();
        let channel_id = msg.channel_id.to_string();
        match self
            .service
            .handle_direct_message(&author_id, &channel_id, &msg.content)
            .await
        {
            Ok(outcome) => debug!(user_id = %author_id, ?outcome, "direct message handled"),
            Err(e) => error!(user_id = %author_id, error = %e, "failed to handle direct message"),
        }
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        self.handle_reaction(ReactionKind::Added, reaction).await;
    }

    async fn reaction_remove(&self, _ctx: Context, reaction: Reaction) {
        self.handle_reaction(ReactionKind::Removed, reaction).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            self.handle_command(&ctx, &command).await;
        }
    }
}
