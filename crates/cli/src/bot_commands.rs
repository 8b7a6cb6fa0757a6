use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    anyhow::Context,
    guildbot_config::{GuildbotConfig, Severity, validate},
    guildbot_discord::{PollHandler, rest_platform, run_bot},
    guildbot_metrics::{MetricsRecorderConfig, init_metrics},
    guildbot_polls::{
        HttpPollBackend, InMemoryDraftStore, OutboundThrottle, PollService, ThrottleLimits,
        WizardSettings,
    },
    secrecy::ExposeSecret,
    tracing::{error, info, warn},
};

/// `guildbot run`: wire the poll subsystem to Discord and serve until the
/// gateway connection ends.
pub async fn run(config: GuildbotConfig) -> anyhow::Result<()> {
    let result = validate(&config);
    for d in &result.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => info!(path = %d.path, "{}", d.message),
        }
    }
    if result.has_errors() {
        anyhow::bail!(
            "invalid configuration ({} error(s)); run `guildbot check-config` for details",
            result.count(Severity::Error)
        );
    }

    let _metrics = init_metrics(metrics_config(&config)?)?;

    let backend = Arc::new(HttpPollBackend::new(
        config.backend.url.as_str(),
        config.backend.platform.as_str(),
        Duration::from_secs(config.backend.timeout_secs),
    )?);
    let token = config.discord.token.expose_secret();
    let service = Arc::new(PollService::new(
        Arc::new(InMemoryDraftStore::new()),
        backend,
        rest_platform(token),
        OutboundThrottle::new(throttle_limits(&config)),
        wizard_settings(&config)?,
    ));

    info!(backend = %config.backend.url, "starting poll bot");
    run_bot(token, PollHandler::new(service, config.discord.register_commands)).await?;
    Ok(())
}

fn wizard_settings(config: &GuildbotConfig) -> anyhow::Result<WizardSettings> {
    Ok(WizardSettings {
        embed_color: config
            .discord
            .embed_color_value()
            .context("discord.embed_color is not a hex color")?,
        error_color: config
            .discord
            .error_color_value()
            .context("discord.error_color is not a hex color")?,
        max_options: config.polls.max_options,
    })
}

fn throttle_limits(config: &GuildbotConfig) -> ThrottleLimits {
    ThrottleLimits {
        max_per_window: config.throttle.max_per_window,
        window: Duration::from_millis(config.throttle.window_ms),
    }
}

fn metrics_config(config: &GuildbotConfig) -> anyhow::Result<MetricsRecorderConfig> {
    let listen = config
        .metrics
        .listen
        .as_deref()
        .map(|addr| {
            addr.parse::<SocketAddr>()
                .with_context(|| format!("invalid metrics.listen address \"{addr}\""))
        })
        .transpose()?;
    Ok(MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        listen,
        global_labels: vec![("platform".into(), config.backend.platform.clone())],
    })
}
