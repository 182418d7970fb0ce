use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use trellis_util::errors::{TrellisError, TrellisResult};

/// Global user configuration loaded from `~/.trellis/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub walk: WalkConfig,

    #[serde(default)]
    pub solver: SolverConfig,

    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Graph walk settings from `[walk]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkConfig {
    #[serde(
        default = "default_max_concurrent_lookups",
        rename = "max-concurrent-lookups"
    )]
    pub max_concurrent_lookups: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: default_max_concurrent_lookups(),
        }
    }
}

fn default_max_concurrent_lookups() -> usize {
    8
}

/// Constraint solver settings from `[solver]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Cap on search steps; unbounded when absent.
    #[serde(default, rename = "max-steps")]
    pub max_steps: Option<usize>,
}

/// How a category of analysis finding is treated by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ignore,
    Warn,
    Error,
}

/// Severity of each finding category from `[policy]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "warn")]
    pub downgrades: Severity,
    #[serde(default = "warn")]
    pub conflicts: Severity,
    #[serde(default = "error")]
    pub cycles: Severity,
    #[serde(default = "error")]
    pub unresolved: Severity,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            downgrades: Severity::Warn,
            conflicts: Severity::Warn,
            cycles: Severity::Error,
            unresolved: Severity::Error,
        }
    }
}

fn warn() -> Severity {
    Severity::Warn
}

fn error() -> Severity {
    Severity::Error
}

impl GlobalConfig {
    /// Load the global configuration from `~/.trellis/config.toml`, or return defaults if the file doesn't exist.
    pub fn load() -> TrellisResult<Self> {
        let path = Self::default_path();
        if path.is_file() {
            Self::from_path(&path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load the configuration from an explicit path. The file must exist.
    pub fn from_path(path: &Path) -> TrellisResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| TrellisError::Config {
            message: format!("Failed to read config {}: {e}", path.display()),
        })?;
        Self::parse_toml(&content)
    }

    pub fn parse_toml(content: &str) -> TrellisResult<Self> {
        toml::from_str(content).map_err(|e| TrellisError::Config {
            message: format!("Failed to parse config: {e}"),
        })
    }

    /// Returns the default path to the global config file.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }
}

/// Returns the path to the trellis data directory (`~/.trellis/`).
pub fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".trellis")
}
