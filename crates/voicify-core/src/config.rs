//! Configuration for the voicify engine.
//!
//! Values come from, in increasing precedence:
//! - built-in defaults
//! - `<config dir>/voicify/config.toml` (or an explicit file)
//! - `VOICIFY_*` environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Sections
// ============================================================================

/// Voice command resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Largest edit distance at which a transcript still selects a command.
    #[serde(default = "default_distance_threshold")]
    pub distance_threshold: usize,
}

fn default_distance_threshold() -> usize {
    100
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            distance_threshold: default_distance_threshold(),
        }
    }
}

/// Capture-side filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Activations closer than this to the previous recorded one are
    /// treated as duplicates and dropped.
    #[serde(default = "default_min_action_gap_ms")]
    pub min_action_gap_ms: u64,
}

fn default_min_action_gap_ms() -> u64 {
    500
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            min_action_gap_ms: default_min_action_gap_ms(),
        }
    }
}

/// Replay timing and location bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Height of the top band treated as static system chrome, in pixels.
    #[serde(default = "default_static_region_height")]
    pub static_region_height: i32,

    /// Pause between the last action and reading output regions.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Extra hold after a selection arrives, absorbing trailing duplicates.
    #[serde(default = "default_selection_settle_ms")]
    pub selection_settle_ms: u64,

    /// Longest wait for a selection notification after list navigation.
    #[serde(default = "default_selection_timeout_ms")]
    pub selection_timeout_ms: u64,

    /// Upper bound on the recorded pause reproduced between two actions.
    #[serde(default = "default_max_action_delay_ms")]
    pub max_action_delay_ms: u64,

    /// Most list items visited while searching for a recorded item.
    #[serde(default = "default_max_list_items")]
    pub max_list_items: usize,

    /// Parent levels climbed from a toggle's label to its row.
    #[serde(default = "default_toggle_ancestor_depth")]
    pub toggle_ancestor_depth: usize,
}

fn default_static_region_height() -> i32 {
    60
}

fn default_settle_delay_ms() -> u64 {
    5000
}

fn default_selection_settle_ms() -> u64 {
    100
}

fn default_selection_timeout_ms() -> u64 {
    3000
}

fn default_max_action_delay_ms() -> u64 {
    10_000
}

fn default_max_list_items() -> usize {
    200
}

fn default_toggle_ancestor_depth() -> usize {
    2
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            static_region_height: default_static_region_height(),
            settle_delay_ms: default_settle_delay_ms(),
            selection_settle_ms: default_selection_settle_ms(),
            selection_timeout_ms: default_selection_timeout_ms(),
            max_action_delay_ms: default_max_action_delay_ms(),
            max_list_items: default_max_list_items(),
            toggle_ancestor_depth: default_toggle_ancestor_depth(),
        }
    }
}

impl ReplayConfig {
    /// Same bounds, but no pacing or settle pauses. Used for dry runs.
    pub fn without_waits(mut self) -> Self {
        self.settle_delay_ms = 0;
        self.selection_settle_ms = 0;
        self.max_action_delay_ms = 0;
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn selection_settle(&self) -> Duration {
        Duration::from_millis(self.selection_settle_ms)
    }

    pub fn selection_timeout(&self) -> Duration {
        Duration::from_millis(self.selection_timeout_ms)
    }

    pub fn max_action_delay(&self) -> Duration {
        Duration::from_millis(self.max_action_delay_ms)
    }
}

/// Toolkit class names that trigger special handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfig {
    #[serde(default = "default_toggle_class")]
    pub toggle_class: String,

    #[serde(default = "default_list_class")]
    pub list_class: String,
}

fn default_toggle_class() -> String {
    "android.widget.Switch".to_string()
}

fn default_list_class() -> String {
    "android.widget.ListView".to_string()
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            toggle_class: default_toggle_class(),
            list_class: default_list_class(),
        }
    }
}

/// Where the catalog lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Catalog file. Defaults to `<data dir>/voicify/catalog.json`.
    pub catalog_path: Option<PathBuf>,
}

// ============================================================================
// VoicifyConfig
// ============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoicifyConfig {
    #[serde(default)]
    pub matching: MatchingConfig,

    #[serde(default)]
    pub recording: RecordingConfig,

    #[serde(default)]
    pub replay: ReplayConfig,

    #[serde(default)]
    pub widgets: WidgetConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// File this configuration was read from.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

impl VoicifyConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the global config file (if present) plus environment.
    pub fn load() -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!("Loading global config from {:?}", global_path);
                config = Self::load_from_file(&global_path)?;
            }
        }

        let config = config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from the default locations when `None`.
    pub fn load_from(path: Option<&Path>) -> ConfigResult<Self> {
        match path {
            Some(path) => {
                let config = Self::load_from_file(path)?.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            None => Self::load(),
        }
    }

    /// Parse a single file without applying environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.loaded_from = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn apply_env_overrides(self) -> Self {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `VOICIFY_*` overrides read through `lookup`. Unparseable values
    /// are ignored.
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("VOICIFY_CATALOG_PATH") {
            self.storage.catalog_path = Some(PathBuf::from(path));
        }

        if let Some(threshold) = lookup("VOICIFY_DISTANCE_THRESHOLD").and_then(|v| v.parse().ok()) {
            debug!("Distance threshold from env: {}", threshold);
            self.matching.distance_threshold = threshold;
        }

        if let Some(gap) = lookup("VOICIFY_MIN_ACTION_GAP_MS").and_then(|v| v.parse().ok()) {
            self.recording.min_action_gap_ms = gap;
        }

        if let Some(delay) = lookup("VOICIFY_SETTLE_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.replay.settle_delay_ms = delay;
        }

        if let Some(timeout) = lookup("VOICIFY_SELECTION_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.replay.selection_timeout_ms = timeout;
        }

        if let Some(delay) = lookup("VOICIFY_MAX_ACTION_DELAY_MS").and_then(|v| v.parse().ok()) {
            self.replay.max_action_delay_ms = delay;
        }

        self
    }

    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.catalog_path = Some(path.into());
        self
    }

    pub fn with_replay(mut self, replay: ReplayConfig) -> Self {
        self.replay = replay;
        self
    }

    /// Save configuration to a file, creating its directory.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        std::fs::write(path, content)?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("voicify").join("config.toml"))
    }

    pub fn default_catalog_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("voicify").join("catalog.json"))
    }

    /// Configured catalog location, falling back to the data directory.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.storage
            .catalog_path
            .clone()
            .or_else(Self::default_catalog_path)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.replay.selection_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "Selection timeout must be greater than 0".to_string(),
            ));
        }

        if self.replay.max_list_items == 0 {
            return Err(ConfigError::InvalidConfig(
                "List item bound must be greater than 0".to_string(),
            ));
        }

        if self.replay.static_region_height < 0 {
            return Err(ConfigError::InvalidConfig(
                "Static region height cannot be negative".to_string(),
            ));
        }

        if self.widgets.toggle_class.trim().is_empty() || self.widgets.list_class.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "Widget class names cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
