use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::GuildbotConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "guildbot.toml",
    "guildbot.yaml",
    "guildbot.yml",
    "guildbot.json",
];

const TOKEN_ENV: &str = "GUILDBOT_DISCORD_TOKEN";
const BACKEND_URL_ENV: &str = "GUILDBOT_BACKEND_URL";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<GuildbotConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./guildbot.{toml,yaml,yml,json}` (working directory)
/// 2. `~/.config/guildbot/guildbot.{toml,yaml,yml,json}` (user-global)
///
/// Returns `GuildbotConfig::default()` if no config file is found or the
/// one found does not parse.
pub fn discover_and_load() -> GuildbotConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    GuildbotConfig::default()
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/guildbot/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "guildbot").map(|d| d.config_dir().to_path_buf())
}

/// Let the process environment override secrets and endpoints from the file.
#[must_use]
pub fn apply_env_overrides(config: GuildbotConfig) -> GuildbotConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: GuildbotConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> GuildbotConfig {
    if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.is_empty()) {
        config.discord.token = Secret::new(token);
    }
    if let Some(url) = lookup(BACKEND_URL_ENV).filter(|u| !u.is_empty()) {
        config.backend.url = url;
    }
    config
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<GuildbotConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
