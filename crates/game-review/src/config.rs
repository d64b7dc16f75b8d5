//! Review configuration loaded from TOML.
//!
//! Analysis depth is a policy decision made here, outside the scheduler:
//! the configured [`AnalysisMode`] resolves to a [`SearchDepth`] which is
//! all the scheduler ever sees.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// A search depth guaranteed to lie in `1..=30`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SearchDepth(u32);

impl SearchDepth {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 30;

    /// Clamp an arbitrary requested depth into the supported range.
    pub fn clamped(depth: i64) -> Self {
        Self(depth.clamp(Self::MIN as i64, Self::MAX as i64) as u32)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for SearchDepth {
    fn default() -> Self {
        Self(AnalysisMode::DEFAULT_CUSTOM_DEPTH)
    }
}

impl std::fmt::Display for SearchDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Depth preset selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Quick pass.
    #[default]
    Low,
    /// Slow, deeper pass.
    High,
    /// User-chosen depth.
    Custom,
}

impl AnalysisMode {
    pub const LOW_DEPTH: u32 = 12;
    pub const HIGH_DEPTH: u32 = 18;
    pub const DEFAULT_CUSTOM_DEPTH: u32 = 15;

    /// Resolve the preset to a concrete depth. `custom` only matters for
    /// [`AnalysisMode::Custom`] and is clamped into range.
    pub fn depth(self, custom: i64) -> SearchDepth {
        match self {
            AnalysisMode::Low => SearchDepth(Self::LOW_DEPTH),
            AnalysisMode::High => SearchDepth(Self::HIGH_DEPTH),
            AnalysisMode::Custom => SearchDepth::clamped(custom),
        }
    }
}

impl std::str::FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(AnalysisMode::Low),
            "high" => Ok(AnalysisMode::High),
            "custom" => Ok(AnalysisMode::Custom),
            other => Err(format!("unknown analysis mode '{}'", other)),
        }
    }
}

/// Top-level review configuration.
///
/// Uses `review.toml` in the current directory by default. Every field has
/// a default, so an empty or missing file yields a usable configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReviewConfig {
    /// Path to the UCI analysis engine. Defaults to "stockfish" (assumes it's in PATH).
    #[serde(default = "default_engine_path")]
    pub engine_path: String,
    /// Depth preset.
    #[serde(default)]
    pub mode: AnalysisMode,
    /// Depth used when `mode = "custom"`.
    #[serde(default = "default_custom_depth")]
    pub custom_depth: i64,
    /// Emit a stall event when a single position takes longer than this.
    #[serde(default)]
    pub stall_warning_secs: Option<u64>,
}

fn default_engine_path() -> String {
    "stockfish".to_string()
}

fn default_custom_depth() -> i64 {
    AnalysisMode::DEFAULT_CUSTOM_DEPTH as i64
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            mode: AnalysisMode::default(),
            custom_depth: default_custom_depth(),
            stall_warning_secs: None,
        }
    }
}

impl ReviewConfig {
    /// Loads the configuration from [`Self::config_path()`], falling back to
    /// defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Loads the configuration from an explicit path, with the same
    /// missing-file fallback as [`Self::load()`].
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Returns the path to the configuration file.
    pub fn config_path() -> PathBuf {
        PathBuf::from("review.toml")
    }

    /// The search depth this configuration asks for.
    pub fn depth(&self) -> SearchDepth {
        self.mode.depth(self.custom_depth)
    }

    pub fn stall_warning(&self) -> Option<Duration> {
        self.stall_warning_secs.map(Duration::from_secs)
    }
}
