//! Configuration file schema for ahkmeta.
//!
//! Looked up as `ahkmeta.yaml` or `.ahkmeta.yaml` in the working directory,
//! then in the platform config directory. Every field has a default, so an
//! empty file (or no file) is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::DEFAULT_TTL;

/// File names searched for, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["ahkmeta.yaml", ".ahkmeta.yaml"];

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Glob patterns for paths to skip when walking directories (e.g., "**/vendor/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
}

/// Metadata cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Whether results are cached between queries (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Entry time-to-live in seconds (default: 300)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Analysis limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Files larger than this are skipped (default: 4 MiB)
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// File extensions treated as AutoHotkey sources (default: ahk, ahk2)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            extensions: default_extensions(),
        }
    }
}

/// Logging settings; `AHKMETA_LOG` overrides `level`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_max_file_bytes() -> u64 {
    4 * 1024 * 1024
}

fn default_extensions() -> Vec<String> {
    vec!["ahk".to_string(), "ahk2".to_string()]
}

fn default_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise the first file found by
    /// `discover` is used, falling back to defaults.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => discover(dir),
        };
        let config = match path {
            Some(path) => {
                let config = Config::parse_file(&path)?;
                tracing::debug!(path = %path.display(), "loaded config");
                config
            }
            None => Config::default(),
        };
        validate(&config)?;
        Ok(config)
    }

    /// Check if a path should be excluded based on excluded_paths patterns.
    /// Uses globset for matching, which supports `**` for recursive directory matching.
    pub fn is_path_excluded(&self, path: &Path) -> bool {
        if self.excluded_paths.is_empty() {
            return false;
        }

        let path_str = path.to_string_lossy();

        for pattern in &self.excluded_paths {
            if let Ok(glob) = globset::Glob::new(pattern) {
                let matcher = glob.compile_matcher();
                if matcher.is_match(&*path_str) {
                    return true;
                }
            }
        }
        false
    }

    /// Whether `path` has one of the configured source extensions.
    pub fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.analysis
                    .extensions
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// Find a config file in `dir`, then in the platform config directory.
pub fn discover(dir: &Path) -> Option<PathBuf> {
    let local = CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file());
    if local.is_some() {
        return local;
    }

    let dirs = ProjectDirs::from("", "", "ahkmeta")?;
    let global = dirs.config_dir().join(CONFIG_FILE_NAMES[0]);
    global.is_file().then_some(global)
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    crate::logging::parse_log_level(&config.logging.level)
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    if config.cache.enabled && config.cache.ttl_secs == 0 {
        return Err(ConfigError::Invalid(
            "cache.ttl_secs must be positive when the cache is enabled".to_string(),
        ));
    }

    if config.analysis.extensions.is_empty() {
        return Err(ConfigError::Invalid(
            "analysis.extensions must not be empty".to_string(),
        ));
    }
    for ext in &config.analysis.extensions {
        if ext.is_empty() || ext.starts_with('.') {
            return Err(ConfigError::Invalid(format!(
                "invalid extension {:?}, expected a bare extension like \"ahk\"",
                ext
            )));
        }
    }

    for pattern in &config.excluded_paths {
        globset::Glob::new(pattern).map_err(|e| {
            ConfigError::Invalid(format!("invalid excluded_paths pattern {:?}: {}", pattern, e))
        })?;
    }

    Ok(())
}
