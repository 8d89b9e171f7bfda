//! Best-effort, never-failing view of the repository.
//!
//! Every probe degrades to a safe default when the driver fails: the gate must
//! not wedge the agent because `jj` is slow, missing, or the directory is not a
//! repository. Absence of evidence of work in progress reads as "not unlocked".

use std::sync::Arc;
use std::time::Duration;

use crate::vcs::{VcsDriver, VcsError, bounded};

/// Read-only projections of the working copy with default-value fallbacks.
#[derive(Clone)]
pub struct VcsProbe {
    driver: Arc<dyn VcsDriver>,
    timeout: Duration,
}

impl std::fmt::Debug for VcsProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcsProbe")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl VcsProbe {
    #[must_use]
    pub fn new(driver: Arc<dyn VcsDriver>, timeout: Duration) -> Self {
        Self { driver, timeout }
    }

    /// Whether the working directory is inside a repository. Default `false`.
    pub async fn is_repository(&self) -> bool {
        let result = bounded(self.timeout, "jj root", self.driver.root()).await;
        absorb("root", result.map(|_| true), false)
    }

    /// Trimmed description of the working-copy change. Default empty.
    pub async fn current_description(&self) -> String {
        let result = bounded(self.timeout, "jj log", self.driver.current_description()).await;
        absorb("description", result, String::new())
            .trim()
            .to_string()
    }

    /// `true` when the diff stat lists at least one changed file. Default `false`.
    pub async fn has_working_changes(&self) -> bool {
        !self.diff_summary().await.trim().is_empty()
    }

    /// Changed file names, one per line. Default empty.
    pub async fn diff_file_list(&self) -> String {
        let result = bounded(self.timeout, "jj diff --name-only", self.driver.diff_name_only()).await;
        absorb("diff_name_only", result, String::new())
    }

    /// Diff stat of the working copy. Empty when the change is clean or on failure.
    ///
    /// `jj diff --stat` always ends with a totals line, so a clean change prints
    /// `0 files changed, 0 insertions(+), 0 deletions(-)` rather than nothing.
    pub async fn diff_summary(&self) -> String {
        let result = bounded(self.timeout, "jj diff --stat", self.driver.diff_stat()).await;
        let stat = absorb("diff_stat", result, String::new());
        if stat_lists_changes(&stat) {
            stat
        } else {
            String::new()
        }
    }

    /// Output of `jj status`. Default empty.
    pub async fn working_copy_status(&self) -> String {
        let result = bounded(self.timeout, "jj status", self.driver.status()).await;
        absorb("status", result, String::new())
    }

    /// Short change id of the working-copy change. Default empty.
    pub async fn current_change_short_id(&self) -> String {
        let result = bounded(
            self.timeout,
            "jj log",
            self.driver.current_change_short_id(),
        )
        .await;
        absorb("change_id", result, String::new()).trim().to_string()
    }

    /// Description and diff checked independently, combined with OR.
    pub async fn shows_work_in_progress(&self) -> bool {
        let (description, changed) =
            tokio::join!(self.current_description(), self.has_working_changes());
        tracing::debug!(
            has_description = !description.is_empty(),
            changed,
            "probed working copy"
        );
        !description.is_empty() || changed
    }
}

/// Whether a diff stat mentions anything beyond a zero totals line.
fn stat_lists_changes(stat: &str) -> bool {
    stat.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .any(|line| !line.starts_with("0 files changed"))
}

fn absorb<T>(probe: &'static str, result: Result<T, VcsError>, default: T) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            tracing::debug!(probe, %error, "vcs probe failed, using default");
            default
        }
    }
}
