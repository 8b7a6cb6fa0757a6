/// Config schema types (discord, backend, polls, throttle, metrics).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Hard ceiling on the number of options a poll may carry.
pub const MAX_POLL_OPTIONS: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildbotConfig {
    pub discord: DiscordConfig,
    pub backend: BackendConfig,
    pub polls: PollsConfig,
    pub throttle: ThrottleConfig,
    pub metrics: MetricsConfig,
}

/// Gateway credentials and embed styling.
///
/// `Debug` prints the token as `[REDACTED]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscordConfig {
    #[serde(serialize_with = "serialize_secret")]
    pub token: Secret<String>,
    /// Hex RGB, with or without a leading `#`.
    pub embed_color: String,
    pub error_color: String,
    /// Register the slash commands globally on `ready`.
    pub register_commands: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: Secret::new(String::new()),
            embed_color: "6366f1".into(),
            error_color: "ff0000".into(),
            register_commands: true,
        }
    }
}

impl DiscordConfig {
    pub fn embed_color_value(&self) -> Option<u32> {
        parse_hex_color(&self.embed_color)
    }

    pub fn error_color_value(&self) -> Option<u32> {
        parse_hex_color(&self.error_color)
    }
}

/// Remote poll store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    /// Platform tag sent with every vote and poll.
    pub platform: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".into(),
            platform: "DISCORD".into(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollsConfig {
    pub max_options: usize,
}

impl Default for PollsConfig {
    fn default() -> Self {
        Self {
            max_options: MAX_POLL_OPTIONS,
        }
    }
}

/// Outbound send pacing: at most `max_per_window` sends per `window_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    pub max_per_window: usize,
    pub window_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_per_window: 5,
            window_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// `host:port` for the Prometheus scrape endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listen: Option<String>,
}

/// Parse `6366f1` or `#6366f1` into an RGB value.
pub fn parse_hex_color(raw: &str) -> Option<u32> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
