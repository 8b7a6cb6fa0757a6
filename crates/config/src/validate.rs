//! Configuration validation engine.
//!
//! Checks a loaded [`GuildbotConfig`] for values the bot cannot run with and
//! validates raw TOML for unknown or misspelled keys.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use secrecy::ExposeSecret;

use crate::{
    env_subst::substitute_env,
    loader::{apply_env_overrides, find_config_file, load_config},
    schema::{GuildbotConfig, MAX_POLL_OPTIONS, parse_hex_color},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "discord.token"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.severity, self.message)
        } else {
            write!(f, "{}: {}: {}", self.severity, self.path, self.message)
        }
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Known keys ──────────────────────────────────────────────────────────────

/// Keys accepted in each section, mirroring `schema.rs`.
fn known_sections() -> HashMap<&'static str, &'static [&'static str]> {
    HashMap::from([
        (
            "discord",
            &["token", "embed_color", "error_color", "register_commands"][..],
        ),
        ("backend", &["url", "platform", "timeout_secs"][..]),
        ("polls", &["max_options"][..]),
        ("throttle", &["max_per_window", "window_ms"][..]),
        ("metrics", &["enabled", "listen"][..]),
    ])
}

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Closest candidate within `max_distance` edits, if any.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Semantic checks on a parsed config.
#[must_use]
pub fn validate(config: &GuildbotConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();
    check_semantics(config, &mut diagnostics);
    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Validate a config file on disk: TOML files get the unknown-key pass,
/// other formats only the semantic checks. Semantic checks see the values
/// after environment overrides, as the bot would.
#[must_use]
pub fn validate_file(path: &Path) -> ValidationResult {
    let mut result = match std::fs::read_to_string(path) {
        Ok(raw) if path.extension().is_none_or(|e| e == "toml") => {
            validate_toml_with(&substitute_env(&raw), apply_env_overrides)
        },
        Ok(_) => match load_config(path) {
            Ok(config) => validate(&apply_env_overrides(config)),
            Err(e) => ValidationResult {
                diagnostics: vec![Diagnostic::error("", format!("parse error: {e}"))],
                config_path: None,
            },
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic::error(
                "",
                format!("failed to read config file: {e}"),
            )],
            config_path: None,
        },
    };
    result.config_path = Some(path.to_path_buf());
    result
}

/// Validate the discovered config file, or the defaults plus environment
/// overrides when there is none.
#[must_use]
pub fn validate_discovered() -> ValidationResult {
    if let Some(path) = find_config_file() {
        return validate_file(&path);
    }
    let mut result = validate(&apply_env_overrides(GuildbotConfig::default()));
    result.diagnostics.insert(0, Diagnostic {
        severity: Severity::Info,
        path: String::new(),
        message: "no config file found; using defaults".into(),
    });
    result
}

/// Validate a TOML string: syntax, unknown keys, types, then semantics.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    validate_toml_with(toml_str, |config| config)
}

fn validate_toml_with(
    toml_str: &str,
    prepare: impl FnOnce(GuildbotConfig) -> GuildbotConfig,
) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic::error("", format!("TOML syntax error: {e}")));
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    if let Some(table) = toml_value.as_table() {
        check_unknown_keys(table, &mut diagnostics);
    }

    match toml::from_str::<GuildbotConfig>(toml_str) {
        Ok(config) => check_semantics(&prepare(config), &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic::error("", format!("type error: {e}"))),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_keys(
    table: &toml::map::Map<String, toml::Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let sections = known_sections();
    let mut section_names: Vec<&str> = sections.keys().copied().collect();
    section_names.sort_unstable();

    for (key, value) in table {
        let Some(fields) = sections.get(key.as_str()) else {
            diagnostics.push(unknown_key(key, key, &section_names, "at top level "));
            continue;
        };
        let Some(inner) = value.as_table() else {
            continue;
        };
        for field in inner.keys().filter(|f| !fields.contains(&f.as_str())) {
            let path = format!("{key}.{field}");
            diagnostics.push(unknown_key(&path, field, fields, ""));
        }
    }
}

fn unknown_key(path: &str, key: &str, candidates: &[&str], level: &str) -> Diagnostic {
    let message = match suggest(key, candidates, 3) {
        Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
        None => format!("unknown field {level}"),
    };
    Diagnostic::error(path, message.trim())
}

fn check_semantics(config: &GuildbotConfig, diagnostics: &mut Vec<Diagnostic>) {
    if config.discord.token.expose_secret().trim().is_empty() {
        diagnostics.push(Diagnostic::error(
            "discord.token",
            "bot token is empty (set it in the file or GUILDBOT_DISCORD_TOKEN)",
        ));
    }
    for (path, value) in [
        ("discord.embed_color", &config.discord.embed_color),
        ("discord.error_color", &config.discord.error_color),
    ] {
        if parse_hex_color(value).is_none() {
            diagnostics.push(Diagnostic::error(
                path,
                format!("\"{value}\" is not a 6-digit hex color"),
            ));
        }
    }

    let url = config.backend.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        diagnostics.push(Diagnostic::error(
            "backend.url",
            format!("\"{url}\" must start with http:// or https://"),
        ));
    }
    if config.backend.platform.trim().is_empty() {
        diagnostics.push(Diagnostic::error("backend.platform", "platform tag is empty"));
    }
    if config.backend.timeout_secs == 0 {
        diagnostics.push(Diagnostic::warning(
            "backend.timeout_secs",
            "a zero timeout fails every backend request",
        ));
    }

    if !(1..=MAX_POLL_OPTIONS).contains(&config.polls.max_options) {
        diagnostics.push(Diagnostic::error(
            "polls.max_options",
            format!("must be between 1 and {MAX_POLL_OPTIONS}"),
        ));
    }

    if config.throttle.max_per_window == 0 {
        diagnostics.push(Diagnostic::error(
            "throttle.max_per_window",
            "must be at least 1",
        ));
    }
    if config.throttle.window_ms == 0 {
        diagnostics.push(Diagnostic::error("throttle.window_ms", "must be at least 1"));
    }

    if config.metrics.enabled && config.metrics.listen.is_none() {
        diagnostics.push(Diagnostic::warning(
            "metrics.listen",
            "metrics are enabled but no listen address is set; nothing will be exported",
        ));
    }
    if let Some(listen) = &config.metrics.listen
        && listen.parse::<std::net::SocketAddr>().is_err()
    {
        diagnostics.push(Diagnostic::error(
            "metrics.listen",
            format!("\"{listen}\" is not a socket address"),
        ));
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::Secret};

    const VALID: &str = r#"
[discord]
token = "abc"
"#;

    fn paths(result: &ValidationResult, severity: Severity) -> Vec<&str> {
        result
            .diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.path.as_str())
            .collect()
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("hello", "hello"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("tokn", "token"), 1);
        assert_eq!(levenshtein("cat", "car"), 1);
    }

    #[test]
    fn suggest_finds_close_match() {
        assert_eq!(suggest("throtle", &["throttle", "polls"], 3), Some("throttle"));
        assert_eq!(suggest("zzzzzzzz", &["throttle", "polls"], 3), None);
    }

    #[test]
    fn minimal_config_is_valid() {
        let result = validate_toml_str(VALID);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }

    #[test]
    fn default_config_needs_a_token() {
        let result = validate(&GuildbotConfig::default());
        assert_eq!(paths(&result, Severity::Error), vec!["discord.token"]);
    }

    #[test]
    fn unknown_top_level_key_with_suggestion() {
        let result = validate_toml_str(&format!("{VALID}\n[throtle]\nwindow_ms = 1\n"));
        let d = result
            .diagnostics
            .iter()
            .find(|d| d.path == "throtle")
            .expect("unknown section diagnostic");
        assert_eq!(d.severity, Severity::Error);
        assert!(d.message.contains("\"throttle\""), "{}", d.message);
    }

    #[test]
    fn unknown_nested_key_with_suggestion() {
        let result = validate_toml_str("[discord]\ntoken = \"abc\"\nembed_colour = \"ffffff\"\n");
        let d = result
            .diagnostics
            .iter()
            .find(|d| d.path == "discord.embed_colour")
            .expect("unknown field diagnostic");
        assert!(d.message.contains("embed_color"), "{}", d.message);
    }

    #[test]
    fn syntax_error_detected() {
        let result = validate_toml_str("[discord\n");
        assert!(result.has_errors());
        assert!(result.diagnostics[0].message.contains("syntax"));
    }

    #[test]
    fn type_error_detected() {
        let result = validate_toml_str("[polls]\nmax_options = \"many\"\n");
        assert!(
            result
                .diagnostics
                .iter()
                .any(|d| d.message.starts_with("type error"))
        );
    }

    #[test]
    fn semantic_errors() {
        let mut cfg = GuildbotConfig::default();
        cfg.discord.token = Secret::new("abc".into());
        cfg.discord.embed_color = "blue".into();
        cfg.backend.url = "ftp://polls".into();
        cfg.polls.max_options = 21;
        cfg.throttle.max_per_window = 0;
        cfg.throttle.window_ms = 0;

        let result = validate(&cfg);
        let errors = paths(&result, Severity::Error);
        for path in [
            "discord.embed_color",
            "backend.url",
            "polls.max_options",
            "throttle.max_per_window",
            "throttle.window_ms",
        ] {
            assert!(errors.contains(&path), "missing {path} in {errors:?}");
        }
        assert_eq!(result.count(Severity::Error), 5);
    }

    #[test]
    fn zero_max_options_is_error() {
        let mut cfg = GuildbotConfig::default();
        cfg.discord.token = Secret::new("abc".into());
        cfg.polls.max_options = 0;
        assert_eq!(paths(&validate(&cfg), Severity::Error), vec![
            "polls.max_options"
        ]);
    }

    #[test]
    fn metrics_without_listen_warned() {
        let result = validate_toml_str(&format!("{VALID}\n[metrics]\nenabled = true\n"));
        assert!(!result.has_errors());
        assert_eq!(paths(&result, Severity::Warning), vec!["metrics.listen"]);
    }

    #[test]
    fn bad_listen_address_is_error() {
        let result = validate_toml_str(&format!(
            "{VALID}\n[metrics]\nenabled = true\nlisten = \"nowhere\"\n"
        ));
        assert_eq!(paths(&result, Severity::Error), vec!["metrics.listen"]);
    }

    #[test]
    fn validate_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guildbot.toml");
        std::fs::write(&path, "[polls]\nmax_optoins = 3\n[discord]\ntoken = \"t\"\n").unwrap();

        let result = validate_file(&path);
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(paths(&result, Severity::Error), vec!["polls.max_optoins"]);
    }

    #[test]
    fn validate_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = validate_file(&dir.path().join("absent.toml"));
        assert!(result.has_errors());
    }

    #[test]
    fn known_keys_match_default_config() {
        let value = toml::Value::try_from(GuildbotConfig {
            metrics: crate::schema::MetricsConfig {
                enabled: false,
                listen: Some("127.0.0.1:9000".into()),
            },
            ..GuildbotConfig::default()
        })
        .expect("serialize default config");
        let mut diagnostics = Vec::new();
        check_unknown_keys(value.as_table().unwrap(), &mut diagnostics);
        assert!(
            diagnostics.is_empty(),
            "known_sections() is missing keys: {diagnostics:?}"
        );
    }
}
