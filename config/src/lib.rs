//! Configuration loading for jjgate.
//!
//! Reads `~/.jjgate/config.toml` (or the file named by `JJGATE_CONFIG`).
//! A missing file is not an error: every field has a default.

use std::path::{Path, PathBuf};

use jjgate_tools::{VcsConfig, VcsSettings};
use serde::Deserialize;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "JJGATE_CONFIG";
/// Environment override for `[vcs] binary`.
pub const JJ_BIN_ENV: &str = "JJGATE_JJ_BIN";
/// Environment override for `[vcs] timeout_ms`.
pub const TIMEOUT_ENV: &str = "JJGATE_TIMEOUT_MS";

#[derive(Debug, Default, Deserialize)]
pub struct JjgateConfig {
    pub vcs: Option<VcsConfig>,
    pub log: Option<LogConfig>,
}

/// Logging configuration.
///
/// ```toml
/// [log]
/// filter = "jjgate_tools=debug,info"
/// file = "/tmp/jjgate.log"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
    /// Log file path. Defaults to `~/.jjgate/logs/jjgate.log`.
    pub file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl JjgateConfig {
    /// Load from the default location. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Resolved driver settings, with environment overrides applied.
    #[must_use]
    pub fn vcs_settings(&self) -> VcsSettings {
        self.vcs_settings_with(|key| std::env::var(key).ok())
    }

    fn vcs_settings_with(&self, env: impl Fn(&str) -> Option<String>) -> VcsSettings {
        let mut vcs = self.vcs.clone().unwrap_or_default();
        if let Some(binary) = env(JJ_BIN_ENV).filter(|s| !s.trim().is_empty()) {
            vcs.binary = Some(binary);
        }
        if let Some(raw) = env(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => vcs.timeout_ms = Some(ms),
                Err(_) => tracing::warn!("Ignoring invalid {TIMEOUT_ENV}={raw:?}"),
            }
        }
        VcsSettings::from_config(&vcs)
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.log.as_ref().and_then(|log| log.filter.as_deref())
    }

    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        self.log.as_ref().and_then(|log| log.file.as_deref())
    }
}

/// `$JJGATE_CONFIG`, else `~/.jjgate/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(explicit));
    }
    jjgate_dir().map(|dir| dir.join("config.toml"))
}

/// `~/.jjgate`, home of the config file and logs.
pub fn jjgate_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".jjgate"))
}
