//! Configuration types used by the jj driver.
//!
//! These live here rather than in `jjgate-config` so the driver can be
//! constructed without pulling in file loading.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_JJ_BINARY: &str = "jj";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const MIN_TIMEOUT_MS: u64 = 100;
pub const MAX_TIMEOUT_MS: u64 = 300_000;
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BOOKMARK: &str = "main";

/// Raw `[vcs]` table.
///
/// ```toml
/// [vcs]
/// binary = "jj"
/// timeout_ms = 10000
/// remote = "origin"
/// bookmark = "main"
/// working_dir = "."
/// ```
#[derive(Debug, Default, Clone, Deserialize)]
pub struct VcsConfig {
    /// Override the jj binary (name looked up in PATH, or a path).
    pub binary: Option<String>,
    /// Per-invocation timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Remote used for fetch, push and remote-tracked refs.
    pub remote: Option<String>,
    /// The publishable bookmark.
    pub bookmark: Option<String>,
    /// Repository directory. Defaults to the process working directory.
    pub working_dir: Option<PathBuf>,
}

/// Resolved settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsSettings {
    pub binary: String,
    pub timeout: Duration,
    pub remote: String,
    pub bookmark: String,
    pub working_dir: PathBuf,
}

impl Default for VcsSettings {
    fn default() -> Self {
        Self::from_config(&VcsConfig::default())
    }
}

impl VcsSettings {
    #[must_use]
    pub fn from_config(config: &VcsConfig) -> Self {
        let timeout_ms = config
            .timeout_ms
            .unwrap_or(DEFAULT_TIMEOUT_MS)
            .clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS);
        Self {
            binary: non_blank(config.binary.as_deref()).unwrap_or(DEFAULT_JJ_BINARY).to_string(),
            timeout: Duration::from_millis(timeout_ms),
            remote: non_blank(config.remote.as_deref()).unwrap_or(DEFAULT_REMOTE).to_string(),
            bookmark: non_blank(config.bookmark.as_deref())
                .unwrap_or(DEFAULT_BOOKMARK)
                .to_string(),
            working_dir: config
                .working_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// `<bookmark>@<remote>`, the remote-tracked publishable ref.
    #[must_use]
    pub fn remote_tracked_bookmark(&self) -> String {
        format!("{}@{}", self.bookmark, self.remote)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
