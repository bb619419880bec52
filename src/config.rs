//! Configuration file support for VTAT.
//!
//! Settings are stored as versioned JSON. Missing sections and fields fall
//! back to their defaults so older files keep loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::format::RetryPolicy;
use crate::keybindings::KeyBindings;
use crate::model::InterpolationType;
use crate::undo::UndoConfig;

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get the display name for this log level.
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
        }
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Engine configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Version of the configuration file format
    pub version: u32,

    #[serde(default)]
    pub preferences: Preferences,

    #[serde(default)]
    pub timeline: TimelineSettings,

    #[serde(default)]
    pub tracking: TrackingSettings,

    #[serde(default)]
    pub autosave: AutoSaveSettings,

    #[serde(default)]
    pub keybindings: KeyBindings,
}

/// User preferences section of the config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    /// Log verbosity level
    pub log_level: LogLevel,
}

/// Frame navigation and editing defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineSettings {
    /// Frames moved by Shift+arrow
    pub large_step: u32,
    /// Segment type for newly created segments
    pub default_interpolation: InterpolationType,
    /// Maximum number of undo steps
    pub undo_history: usize,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            large_step: constants::LARGE_FRAME_STEP,
            default_interpolation: InterpolationType::Linear,
            undo_history: constants::UNDO_HISTORY_SIZE,
        }
    }
}

impl TimelineSettings {
    pub fn undo_config(&self) -> UndoConfig {
        UndoConfig {
            max_history: self.undo_history,
        }
    }
}

/// AI tracking defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingSettings {
    pub timeout_ms: u64,
    /// Keyframe interval for accepted tracks (`None` keeps every detection)
    pub default_decimation: Option<u32>,
    /// Threshold for accepting all tracks at once
    pub accept_confidence: f32,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            timeout_ms: constants::DEFAULT_TRACKING_TIMEOUT_MS,
            default_decimation: Some(constants::DEFAULT_DECIMATION_INTERVAL),
            accept_confidence: constants::DEFAULT_ACCEPT_CONFIDENCE,
        }
    }
}

impl TrackingSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Background save settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoSaveSettings {
    pub enabled: bool,
    pub debounce_ms: u64,
    pub min_interval_ms: u64,
    pub max_retries: u32,
    pub backoff_ms: u64,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: constants::DEFAULT_AUTOSAVE_DEBOUNCE_MS,
            min_interval_ms: constants::DEFAULT_AUTOSAVE_MIN_INTERVAL_MS,
            max_retries: constants::DEFAULT_SAVE_RETRIES,
            backoff_ms: constants::DEFAULT_SAVE_BACKOFF_MS,
        }
    }
}

impl AutoSaveSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            initial_backoff: Duration::from_millis(self.backoff_ms),
            max_backoff: Duration::from_millis(constants::MAX_SAVE_BACKOFF_MS),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            preferences: Preferences::default(),
            timeline: TimelineSettings::default(),
            tracking: TrackingSettings::default(),
            autosave: AutoSaveSettings::default(),
            keybindings: KeyBindings::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }

    /// Get the default filename for the config file.
    pub fn default_filename() -> &'static str {
        "vtat-config.json"
    }

    /// Get the default config file path.
    pub fn default_path() -> Option<PathBuf> {
        // Try to use XDG config directory, fall back to home directory
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("vtat").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home| {
                home.join(".config")
                    .join("vtat")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Try to load configuration from the default path.
    /// Returns None if the file doesn't exist or can't be read.
    pub fn load_from_default_path() -> Option<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return None;
        }

        match Self::load(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to load config file {:?}: {}", path, e);
                None
            }
        }
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Save configuration to the default path.
    pub fn save_to_default_path(&self) -> Result<(), ConfigError> {
        let path = Self::default_path().ok_or_else(|| {
            ConfigError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not determine config directory",
            ))
        })?;
        self.save(&path)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keybindings::{ContextFlags, Key, Modifiers, TimelineCommand};

    #[test]
    fn test_config_roundtrip() {
        let mut config = EngineConfig::new();
        config.preferences.log_level = LogLevel::Debug;
        config.timeline.large_step = 25;
        config.tracking.default_decimation = None;

        let json = config.to_json().unwrap();
        let parsed = EngineConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = EngineConfig::from_json(r#"{"version": 1}"#).unwrap();
        assert_eq!(config, EngineConfig::default());

        let config =
            EngineConfig::from_json(r#"{"version": 1, "timeline": {"largeStep": 5}}"#).unwrap();
        assert_eq!(config.timeline.large_step, 5);
        assert_eq!(config.timeline.undo_history, constants::UNDO_HISTORY_SIZE);
    }

    #[test]
    fn test_version_too_new() {
        let json = format!(r#"{{"version": {}}}"#, CONFIG_VERSION + 1);
        assert!(matches!(
            EngineConfig::from_json(&json),
            Err(ConfigError::VersionTooNew { .. })
        ));
    }

    #[test]
    fn test_log_level_filter() {
        assert_eq!(LogLevel::Warn.to_level_filter(), log::LevelFilter::Warn);
        let json = r#"{"version": 1, "preferences": {"logLevel": "trace"}}"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.preferences.log_level, LogLevel::Trace);
    }

    #[test]
    fn test_custom_keybindings_load() {
        let json = r#"{"version": 1, "keybindings": [
            {"chord": {"key": "space"}, "command": "toggleVisibility"}
        ]}"#;
        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(
            config
                .keybindings
                .command_for(Key::Space, Modifiers::NONE, &ContextFlags::default()),
            Some(TimelineCommand::ToggleVisibility)
        );
        assert_eq!(config.keybindings.bindings().len(), 1);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = std::env::temp_dir().join(format!("vtat-config-test-{}", std::process::id()));
        let path = dir.join("nested").join(EngineConfig::default_filename());
        let config = EngineConfig::new();
        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let settings = AutoSaveSettings {
            max_retries: 0,
            ..Default::default()
        };
        assert_eq!(settings.retry_policy().max_attempts, 1);
    }
}
