//! Configuration loading, validation and env substitution.
//!
//! Config files: `guildbot.toml`, `guildbot.yaml`, or `guildbot.json`
//! Searched in `./` then `~/.config/guildbot/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    env_subst::substitute_env,
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        BackendConfig, DiscordConfig, GuildbotConfig, MAX_POLL_OPTIONS, MetricsConfig,
        PollsConfig, ThrottleConfig, parse_hex_color,
    },
    validate::{
        Diagnostic, Severity, ValidationResult, validate, validate_discovered, validate_file,
        validate_toml_str,
    },
};
