//! Bot configuration: a JSON file with every field defaulted, then
//! environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::generation::RetryPolicy;

pub const DEFAULT_CONFIG_FILENAME: &str = "architect.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotConfig {
    /// The bot's own chat identity; its messages are never dispatched.
    pub user_id: String,
    pub display_name: String,
    pub log_level: String,
    /// Rooms the bot answers in. Empty means every room.
    pub allowed_rooms: Vec<String>,
    /// Events older than process start minus this skew are ignored.
    pub historical_skew_ms: u64,
    pub enable_auto_commit: bool,
    pub repo_dir: PathBuf,
    pub commands_dir: PathBuf,
    pub tests_dir: PathBuf,
    pub restart_delay_ms: u64,
    pub generation: GenerationConfig,
    pub supervisor: SupervisorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Program and arguments run before re-executing. `None` selects a
    /// `cargo build` of this package; an empty list skips the rebuild.
    pub rebuild_command: Option<Vec<String>>,
    /// Program and arguments that type-check the tree with a new artifact in
    /// place. `None` selects a `cargo check` of this package; an empty list
    /// skips the check.
    pub check_command: Option<Vec<String>>,
}

impl Default for BotConfig {
    fn default() -> Self {
        let package_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        Self {
            user_id: "@architect:localhost".to_string(),
            display_name: "The Architect".to_string(),
            log_level: "info".to_string(),
            allowed_rooms: Vec::new(),
            historical_skew_ms: 5_000,
            enable_auto_commit: true,
            repo_dir: package_dir.clone(),
            commands_dir: package_dir.join("src").join("commands"),
            tests_dir: package_dir.join("tests").join("commands"),
            restart_delay_ms: 2_000,
            generation: GenerationConfig::default(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_tokens: 2048,
            max_retries: 3,
            retry_backoff_ms: 500,
            timeout_secs: 120,
        }
    }
}

impl GenerationConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
            ..RetryPolicy::default()
        }
    }
}

impl BotConfig {
    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    /// Load from `path`, falling back to defaults when the file is absent,
    /// then apply process environment overrides.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let mut config = Self::read(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn read(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            tracing::debug!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path).map_err(|error| {
            CoreError::Internal(format!(
                "failed to read config {}: {error}",
                path.display()
            ))
        })?;
        serde_json::from_str(&data).map_err(|error| {
            CoreError::InvalidInput(format!(
                "failed to parse config {}: {error}",
                path.display()
            ))
        })
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(level) = get("ARCHITECT_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(flag) = get("ARCHITECT_AUTO_COMMIT") {
            match parse_bool(&flag) {
                Some(enabled) => self.enable_auto_commit = enabled,
                None => tracing::warn!("ignoring ARCHITECT_AUTO_COMMIT={flag}: not a boolean"),
            }
        }
        if let Some(rooms) = get("ARCHITECT_ALLOWED_ROOMS") {
            self.allowed_rooms = rooms
                .split(',')
                .map(str::trim)
                .filter(|room| !room.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(key) = get("ARCHITECT_API_KEY").or_else(|| get("ANTHROPIC_API_KEY")) {
            self.generation.api_key = Some(key);
        }
        if let Some(model) = get("ARCHITECT_MODEL") {
            self.generation.model = model;
        }
        if let Some(base_url) = get("ARCHITECT_BASE_URL") {
            self.generation.base_url = base_url;
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = BotConfig::read(&dir.path().join("absent.json")).expect("read");
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.restart_delay(), Duration::from_secs(2));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("architect.json");
        std::fs::write(
            &path,
            r#"{ "allowed_rooms": ["!room:example.org"], "generation": { "max_retries": 5 } }"#,
        )
        .expect("write config");

        let config = BotConfig::read(&path).expect("read");
        assert_eq!(config.allowed_rooms, vec!["!room:example.org".to_string()]);
        assert_eq!(config.generation.max_retries, 5);
        assert_eq!(config.generation.model, GenerationConfig::default().model);
        assert_eq!(config.historical_skew_ms, 5_000);
    }

    #[test]
    fn supervisor_commands_are_read_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("architect.json");
        std::fs::write(
            &path,
            r#"{ "supervisor": { "check_command": [], "rebuild_command": ["make", "bot"] } }"#,
        )
        .expect("write config");

        let config = BotConfig::read(&path).expect("read");
        assert_eq!(config.supervisor.check_command, Some(Vec::new()));
        assert_eq!(
            config.supervisor.rebuild_command,
            Some(vec!["make".to_string(), "bot".to_string()])
        );
    }

    #[test]
    fn malformed_file_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("architect.json");
        std::fs::write(&path, "{ not json").expect("write config");
        let err = BotConfig::read(&path).expect_err("parse error");
        assert!(matches!(err, CoreError::InvalidInput(_)));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("ARCHITECT_LOG_LEVEL", "debug"),
            ("ARCHITECT_AUTO_COMMIT", "false"),
            ("ARCHITECT_ALLOWED_ROOMS", "!a:x, !b:x,"),
            ("ANTHROPIC_API_KEY", "secret"),
            ("ARCHITECT_MODEL", "custom-model"),
        ]);
        let mut config = BotConfig::default();
        config.apply_env(|key| env.get(key).map(|value| value.to_string()));

        assert_eq!(config.log_level, "debug");
        assert!(!config.enable_auto_commit);
        assert_eq!(config.allowed_rooms, vec!["!a:x".to_string(), "!b:x".to_string()]);
        assert_eq!(config.generation.api_key.as_deref(), Some("secret"));
        assert_eq!(config.generation.model, "custom-model");
        assert_eq!(config.generation.base_url, "https://api.anthropic.com/v1");
    }

    #[test]
    fn architect_key_wins_over_anthropic_key() {
        let mut config = BotConfig::default();
        config.apply_env(|key| match key {
            "ARCHITECT_API_KEY" => Some("mine".to_string()),
            "ANTHROPIC_API_KEY" => Some("shared".to_string()),
            _ => None,
        });
        assert_eq!(config.generation.api_key.as_deref(), Some("mine"));
    }

    #[test]
    fn invalid_boolean_is_ignored() {
        let mut config = BotConfig::default();
        config.apply_env(|key| (key == "ARCHITECT_AUTO_COMMIT").then(|| "maybe".to_string()));
        assert!(config.enable_auto_commit);
    }

    #[test]
    fn retry_policy_follows_generation_settings() {
        let generation = GenerationConfig {
            max_retries: 0,
            retry_backoff_ms: 50,
            ..GenerationConfig::default()
        };
        let policy = generation.retry_policy();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.initial_backoff, Duration::from_millis(50));
    }
}
