use std::sync::Arc;

use {
    serenity::{Client, http::Http},
    tracing::{info, warn},
};

use crate::{Result, handler::PollHandler, platform::DiscordPlatform};

/// REST-only platform for the poll core, usable before the gateway connects.
pub fn rest_platform(token: &str) -> Arc<DiscordPlatform> {
    Arc::new(DiscordPlatform::new(Arc::new(Http::new(token))))
}

/// Connect to the gateway and dispatch events to `handler` until the
/// connection ends or the process receives Ctrl-C.
pub async fn run_bot(token: &str, handler: PollHandler) -> Result<()> {
    let mut client = Client::builder(token, PollHandler::intents())
        .event_handler(handler)
        .await?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("shutting down discord gateway");
        shard_manager.shutdown_all().await;
    });

    info!("connecting to discord gateway");
    client.start().await?;
    Ok(())
}
