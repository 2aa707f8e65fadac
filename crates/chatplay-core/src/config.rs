use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ChatPlayError, Result};
use crate::types::normalize_identity;

/// Top-level configuration for a chatplay session.
///
/// Loaded from `~/.chatplay/config.toml` by default. Built once at startup
/// and read-only afterwards; the only runtime-mutable setting
/// (`engine.commands_enabled`) is copied into a shared switch by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatPlayConfig {
    /// Channels the session listens to.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub access: AccessConfig,
    /// Command table, keyed by tag.
    #[serde(default)]
    pub commands: BTreeMap<String, CommandConfig>,
}

impl Default for ChatPlayConfig {
    fn default() -> Self {
        Self {
            channels: vec!["mychannel".to_string()],
            general: GeneralConfig::default(),
            engine: EngineConfig::default(),
            access: AccessConfig::default(),
            commands: default_commands(),
        }
    }
}

impl ChatPlayConfig {
    /// Load, normalize and validate configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails
    /// validation. Callers treat every error here as fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Parse, normalize and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: ChatPlayConfig = toml::from_str(content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration, writing the default one first if the file is
    /// missing. Returns the config and whether it was freshly created.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool)> {
        if path.exists() {
            return Ok((Self::load(path)?, false));
        }
        warn!(
            "No configuration at {}; writing defaults",
            path.display()
        );
        let config = Self::default();
        config.save(path)?;
        Ok((config, true))
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, self.to_toml_string()?)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Render as pretty TOML, the same text `save` writes.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save, first copying any existing file to `<path>.bak`.
    ///
    /// Returns the backup path when one was written.
    pub fn save_with_backup(&self, path: &Path) -> Result<Option<PathBuf>> {
        let backup = if path.exists() {
            let backup = backup_path(path);
            std::fs::copy(path, &backup)?;
            Some(backup)
        } else {
            None
        };
        self.save(path)?;
        Ok(backup)
    }

    /// Lowercase and trim every identity list so lookups are case-insensitive.
    pub fn normalize(&mut self) {
        normalize_list(&mut self.channels);
        normalize_list(&mut self.access.superusers);
        normalize_list(&mut self.access.bots);
        self.engine.superuser_prefix = self.engine.superuser_prefix.trim().to_lowercase();
    }

    /// Check value ranges that the engine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_concurrent_tasks == 0 {
            return Err(ChatPlayError::invalid(
                "engine.max_concurrent_tasks",
                "must be at least 1",
            ));
        }
        if self.engine.poll_timeout_ms == 0 || self.engine.poll_timeout_ms >= 1000 {
            return Err(ChatPlayError::invalid(
                "engine.poll_timeout_ms",
                "must be between 1 and 999",
            ));
        }
        if self.engine.superuser_prefix.is_empty() {
            return Err(ChatPlayError::invalid(
                "engine.superuser_prefix",
                "must not be empty",
            ));
        }
        for (tag, command) in &self.commands {
            if tag.trim().is_empty() {
                return Err(ChatPlayError::invalid("commands", "tag must not be empty"));
            }
            if command.action.trim().is_empty() {
                return Err(ChatPlayError::invalid(
                    format!("commands.{tag}.action"),
                    "must not be empty",
                ));
            }
        }
        Ok(())
    }
}

/// Normalize in place, dropping blanks and later duplicates.
fn normalize_list(items: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for item in items.iter_mut() {
        *item = normalize_identity(item);
    }
    items.retain(|item| !item.is_empty() && seen.insert(item.clone()));
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Read chat from the local console instead of a live feed.
    pub offline: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            offline: true,
        }
    }
}

/// Dispatch and execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on actions running at the same time.
    pub max_concurrent_tasks: usize,
    /// Worker pool size. Zero means "same as `max_concurrent_tasks`".
    pub worker_threads: usize,
    /// Minimum spacing between two accepted dispatches, in milliseconds.
    pub min_dispatch_interval_ms: u64,
    /// How long one poll of the message source may wait, in milliseconds.
    pub poll_timeout_ms: u64,
    /// Initial state of the global command switch.
    pub commands_enabled: bool,
    /// Prefix marking a superuser invocation, e.g. `!skip`.
    pub superuser_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 8,
            worker_threads: 0,
            min_dispatch_interval_ms: 500,
            poll_timeout_ms: 100,
            commands_enabled: true,
            superuser_prefix: "!".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn min_dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.min_dispatch_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Effective worker pool size.
    pub fn worker_threads(&self) -> usize {
        if self.worker_threads == 0 {
            self.max_concurrent_tasks
        } else {
            self.worker_threads
        }
    }
}

/// Who may do what.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Usernames allowed to elevate with the superuser prefix.
    pub superusers: Vec<String>,
    /// Usernames whose unmatched messages trigger the `random` tag.
    pub bots: Vec<String>,
    /// Optional file listing blocked users and channels, one per line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocklist_path: Option<String>,
}

/// Who may trigger a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    #[default]
    Public,
    SuperuserOnly,
}

/// One `[commands.<tag>]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Chat strings that trigger this command; the first is shown to viewers.
    pub aliases: Vec<String>,
    #[serde(default)]
    pub privilege: Privilege,
    /// Handler kind, e.g. `announce`, `wait`, `shell`.
    pub action: String,
    /// Handler-specific parameters.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl CommandConfig {
    pub fn new(aliases: &[&str], action: &str) -> Self {
        Self {
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            privilege: Privilege::Public,
            action: action.to_string(),
            params: serde_json::Map::new(),
        }
    }

    pub fn superuser_only(mut self) -> Self {
        self.privilege = Privilege::SuperuserOnly;
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }
}

fn default_commands() -> BTreeMap<String, CommandConfig> {
    let mut commands = BTreeMap::new();
    commands.insert(
        "jump".to_string(),
        CommandConfig::new(&["jump", "j"], "announce").with_param("message", "Jump!"),
    );
    commands.insert(
        "hold".to_string(),
        CommandConfig::new(&["hold", "wait"], "wait").with_param("millis", 1000),
    );
    commands.insert(
        "random".to_string(),
        CommandConfig::new(&["random"], "random").superuser_only(),
    );
    commands.insert(
        "toggle".to_string(),
        CommandConfig::new(&["toggle"], "toggle_commands").superuser_only(),
    );
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_temp_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ChatPlayConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.engine.max_concurrent_tasks, 8);
        assert_eq!(config.engine.min_dispatch_interval_ms, 500);
        assert_eq!(config.engine.superuser_prefix, "!");
        assert!(config.engine.commands_enabled);
        assert!(config.commands.contains_key("random"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r##"
channels = ["MyStream", "#Other"]

[general]
log_level = "debug"
offline = false

[engine]
max_concurrent_tasks = 2
min_dispatch_interval_ms = 0
superuser_prefix = "!"

[access]
superusers = ["Alice"]
bots = ["AutoBot"]

[commands.skip]
aliases = ["skip", "next"]
action = "announce"

[commands.skip.params]
message = "Skipping"

[commands.random]
aliases = ["random"]
privilege = "superuser_only"
action = "random"
"##;
        let file = create_temp_config(content);
        let config = ChatPlayConfig::load(file.path()).unwrap();
        assert_eq!(config.channels, vec!["mystream", "other"]);
        assert_eq!(config.general.log_level, "debug");
        assert!(!config.general.offline);
        assert_eq!(config.engine.max_concurrent_tasks, 2);
        assert_eq!(config.engine.worker_threads(), 2);
        assert_eq!(config.engine.min_dispatch_interval(), Duration::ZERO);
        assert_eq!(config.access.superusers, vec!["alice"]);
        assert_eq!(config.access.bots, vec!["autobot"]);

        let skip = &config.commands["skip"];
        assert_eq!(skip.aliases, vec!["skip", "next"]);
        assert_eq!(skip.privilege, Privilege::Public);
        assert_eq!(skip.params["message"], "Skipping");
        assert_eq!(config.commands["random"].privilege, Privilege::SuperuserOnly);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = ChatPlayConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.engine.poll_timeout_ms, 100);
        assert!(config.commands.is_empty());
        assert!(config.channels.is_empty());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let err = ChatPlayConfig::from_toml_str("[engine]\nmax_concurrent_tasks = 0\n").unwrap_err();
        assert!(matches!(err, ChatPlayError::InvalidConfig { .. }));
        assert!(err.to_string().contains("max_concurrent_tasks"));
    }

    #[test]
    fn test_poll_timeout_must_be_sub_second() {
        let err = ChatPlayConfig::from_toml_str("[engine]\npoll_timeout_ms = 1000\n").unwrap_err();
        assert!(err.to_string().contains("poll_timeout_ms"));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let err =
            ChatPlayConfig::from_toml_str("[engine]\nsuperuser_prefix = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("superuser_prefix"));
    }

    #[test]
    fn test_command_without_action_rejected() {
        let content = r#"
[commands.skip]
aliases = ["skip"]
action = ""
"#;
        let err = ChatPlayConfig::from_toml_str(content).unwrap_err();
        assert!(err.to_string().contains("commands.skip.action"));
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let file = create_temp_config("channels = [[[");
        assert!(matches!(
            ChatPlayConfig::load(file.path()),
            Err(ChatPlayError::Config(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = ChatPlayConfig::default();
        config.save(&path).unwrap();

        let reloaded = ChatPlayConfig::load(&path).unwrap();
        assert_eq!(reloaded.channels, config.channels);
        assert_eq!(reloaded.commands, config.commands);
        assert_eq!(
            reloaded.engine.max_concurrent_tasks,
            config.engine.max_concurrent_tasks
        );
    }

    #[test]
    fn test_toml_string_parses_back() {
        let text = ChatPlayConfig::default().to_toml_string().unwrap();
        assert!(text.contains("[engine]"));
        let parsed = ChatPlayConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.commands, ChatPlayConfig::default().commands);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let (config, created) = ChatPlayConfig::load_or_create(&path).unwrap();
        assert!(created);
        assert!(path.exists());
        assert_eq!(config.commands.len(), ChatPlayConfig::default().commands.len());

        let (_, created_again) = ChatPlayConfig::load_or_create(&path).unwrap();
        assert!(!created_again);
    }

    #[test]
    fn test_save_with_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = ChatPlayConfig::default();
        assert!(config.save_with_backup(&path).unwrap().is_none());

        let backup = config.save_with_backup(&path).unwrap().unwrap();
        assert_eq!(backup, dir.path().join("config.toml.bak"));
        assert!(backup.exists());
    }

    #[test]
    fn test_normalize_dedups_identities() {
        let mut config = ChatPlayConfig::default();
        config.access.bots = vec!["Bot".into(), "bot".into(), "  ".into()];
        config.normalize();
        assert_eq!(config.access.bots, vec!["bot"]);
    }

    #[test]
    fn test_normalize_drops_non_adjacent_duplicates() {
        let mut config = ChatPlayConfig::default();
        config.access.superusers = vec!["Bot".into(), "alice".into(), "bot".into(), "ALICE ".into()];
        config.normalize();
        assert_eq!(config.access.superusers, vec!["bot", "alice"]);
    }
}
