//! VCS driver seam and the `jj` subprocess driver.
//!
//! The gate never interprets repository contents itself. Everything it knows
//! about the working copy comes through [`VcsDriver`], whose operations may
//! fail for any reason (missing binary, not a repository, timeout, non-zero
//! exit). Callers decide whether a failure is absorbed (see
//! [`crate::probe::VcsProbe`]) or reported.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time;

use crate::config::VcsSettings;
use crate::process::ChildGuard;

const MAX_STDOUT_BYTES: usize = 1_000_000;
const MAX_STDERR_BYTES: usize = 64_000;
const MAX_STDERR_REPORT_CHARS: usize = 2_000;

/// Boxed future returned by driver operations.
pub type VcsFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, VcsError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VcsError {
    #[error("{binary} not found in PATH")]
    NotFound { binary: String },
    #[error("failed to spawn {binary}: {message}")]
    Spawn { binary: String, message: String },
    #[error("`{command}` timed out after {} ms", .elapsed.as_millis())]
    Timeout { command: String, elapsed: Duration },
    #[error("`{command}` failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Operations the gate needs from the underlying version-control tool.
///
/// Targets are revset strings (`@` is the working-copy change).
pub trait VcsDriver: Send + Sync {
    /// Succeeds only inside a repository.
    fn root(&self) -> VcsFut<'_, String>;
    /// Description text of the working-copy change.
    fn current_description(&self) -> VcsFut<'_, String>;
    fn diff_stat(&self) -> VcsFut<'_, String>;
    fn diff_name_only(&self) -> VcsFut<'_, String>;
    fn status(&self) -> VcsFut<'_, String>;
    fn fetch(&self) -> VcsFut<'_, ()>;
    /// Create a new change on top of `base`. An empty description leaves it undescribed.
    fn new_change<'a>(&'a self, base: &'a str, description: &'a str) -> VcsFut<'a, ()>;
    fn current_change_short_id(&self) -> VcsFut<'_, String>;
    fn bookmark_move<'a>(&'a self, name: &'a str, target: &'a str) -> VcsFut<'a, ()>;
    fn bookmark_create<'a>(&'a self, name: &'a str, target: &'a str) -> VcsFut<'a, ()>;
    fn push<'a>(&'a self, bookmark: &'a str) -> VcsFut<'a, ()>;
}

/// Bound a driver call by `limit`, mapping expiry to [`VcsError::Timeout`].
///
/// [`JjDriver`] already enforces its own timeout; this bound covers any driver.
pub async fn bounded<T>(
    limit: Duration,
    command: &str,
    fut: impl Future<Output = Result<T, VcsError>>,
) -> Result<T, VcsError> {
    match time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(VcsError::Timeout {
            command: command.to_string(),
            elapsed: limit,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JjCommand<'a> {
    Root,
    Description,
    DiffStat,
    DiffNameOnly,
    Status,
    Fetch { remote: &'a str },
    New { base: &'a str, description: &'a str },
    ShortId,
    BookmarkMove { name: &'a str, target: &'a str },
    BookmarkCreate { name: &'a str, target: &'a str },
    Push { remote: &'a str, bookmark: &'a str },
}

impl JjCommand<'_> {
    fn args(self) -> Vec<String> {
        let args: Vec<&str> = match self {
            Self::Root => vec!["root"],
            Self::Description => vec!["log", "-r", "@", "--no-graph", "-T", "description"],
            Self::DiffStat => vec!["diff", "--stat"],
            Self::DiffNameOnly => vec!["diff", "--name-only"],
            Self::Status => vec!["status"],
            Self::Fetch { remote } => vec!["git", "fetch", "--remote", remote],
            Self::New { base, description } if description.is_empty() => vec!["new", base],
            Self::New { base, description } => {
                return vec![
                    "new".to_string(),
                    base.to_string(),
                    format!("--message={description}"),
                ];
            }
            Self::ShortId => vec!["log", "-r", "@", "--no-graph", "-T", "change_id.short()"],
            Self::BookmarkMove { name, target } => vec!["bookmark", "move", name, "--to", target],
            Self::BookmarkCreate { name, target } => {
                vec!["bookmark", "create", name, "-r", target]
            }
            Self::Push { remote, bookmark } => {
                vec!["git", "push", "--remote", remote, "-b", bookmark]
            }
        };
        args.into_iter().map(str::to_string).collect()
    }
}

/// [`VcsDriver`] backed by the `jj` command line.
#[derive(Debug, Clone)]
pub struct JjDriver {
    settings: VcsSettings,
}

impl JjDriver {
    #[must_use]
    pub fn new(settings: VcsSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &VcsSettings {
        &self.settings
    }

    fn resolve_binary(&self) -> Result<PathBuf, VcsError> {
        which::which(&self.settings.binary).map_err(|_| VcsError::NotFound {
            binary: self.settings.binary.clone(),
        })
    }

    /// Run a jj subcommand and return its stdout on success.
    async fn run(&self, command: JjCommand<'_>) -> Result<String, VcsError> {
        let subcommand_args = command.args();
        let command_line = format!("jj {}", subcommand_args.join(" "));
        let binary = self.resolve_binary()?;

        let mut cmd = Command::new(&binary);
        cmd.arg("--color=never")
            .arg("--no-pager")
            .args(&subcommand_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(&self.settings.working_dir);

        #[cfg(unix)]
        crate::process::set_new_process_group(&mut cmd);

        let spawn_error = |message: String| VcsError::Spawn {
            binary: self.settings.binary.clone(),
            message,
        };

        let child = cmd.spawn().map_err(|e| spawn_error(e.to_string()))?;
        let mut guard = ChildGuard::new(child);
        let Some(child) = guard.child_mut() else {
            return Err(spawn_error("child handle missing".to_string()));
        };

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error("failed to capture stderr".to_string()))?;

        let stdout_task = tokio::spawn(read_to_end_limited(stdout, MAX_STDOUT_BYTES));
        let stderr_task = tokio::spawn(read_to_end_limited(stderr, MAX_STDERR_BYTES));

        let timeout = self.settings.timeout;
        let waited = time::timeout(timeout, child.wait()).await;
        let status = match waited {
            Ok(res) => res.map_err(|e| spawn_error(e.to_string()))?,
            Err(_) => {
                // jj may have spawned ssh or git helpers; take down the whole group.
                guard.kill_tree();
                if let Some(child) = guard.child_mut() {
                    let _ = child.wait().await;
                }
                guard.disarm();
                stdout_task.abort();
                stderr_task.abort();
                tracing::debug!(command = %command_line, ?timeout, "jj timed out");
                return Err(VcsError::Timeout {
                    command: command_line,
                    elapsed: timeout,
                });
            }
        };
        guard.disarm();

        let stdout_bytes = stdout_task.await.unwrap_or_default();
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            return Err(VcsError::Failed {
                command: command_line,
                status: status
                    .code()
                    .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit {c}")),
                stderr: clip(stderr.trim(), MAX_STDERR_REPORT_CHARS),
            });
        }

        Ok(String::from_utf8_lossy(&stdout_bytes).into_owned())
    }

    async fn run_unit(&self, command: JjCommand<'_>) -> Result<(), VcsError> {
        self.run(command).await.map(|_| ())
    }
}

impl VcsDriver for JjDriver {
    fn root(&self) -> VcsFut<'_, String> {
        Box::pin(self.run(JjCommand::Root))
    }

    fn current_description(&self) -> VcsFut<'_, String> {
        Box::pin(self.run(JjCommand::Description))
    }

    fn diff_stat(&self) -> VcsFut<'_, String> {
        Box::pin(self.run(JjCommand::DiffStat))
    }

    fn diff_name_only(&self) -> VcsFut<'_, String> {
        Box::pin(self.run(JjCommand::DiffNameOnly))
    }

    fn status(&self) -> VcsFut<'_, String> {
        Box::pin(self.run(JjCommand::Status))
    }

    fn fetch(&self) -> VcsFut<'_, ()> {
        Box::pin(self.run_unit(JjCommand::Fetch {
            remote: &self.settings.remote,
        }))
    }

    fn new_change<'a>(&'a self, base: &'a str, description: &'a str) -> VcsFut<'a, ()> {
        Box::pin(self.run_unit(JjCommand::New { base, description }))
    }

    fn current_change_short_id(&self) -> VcsFut<'_, String> {
        Box::pin(self.run(JjCommand::ShortId))
    }

    fn bookmark_move<'a>(&'a self, name: &'a str, target: &'a str) -> VcsFut<'a, ()> {
        Box::pin(self.run_unit(JjCommand::BookmarkMove { name, target }))
    }

    fn bookmark_create<'a>(&'a self, name: &'a str, target: &'a str) -> VcsFut<'a, ()> {
        Box::pin(self.run_unit(JjCommand::BookmarkCreate { name, target }))
    }

    fn push<'a>(&'a self, bookmark: &'a str) -> VcsFut<'a, ()> {
        Box::pin(self.run_unit(JjCommand::Push {
            remote: &self.settings.remote,
            bookmark,
        }))
    }
}

async fn read_to_end_limited<R: tokio::io::AsyncRead + Unpin + Send + 'static>(
    mut reader: R,
    max_bytes: usize,
) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 8192];

    loop {
        let n = match reader.read(&mut tmp).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        let remaining = max_bytes.saturating_sub(buf.len());
        // Keep draining so the child never blocks on a full pipe.
        if remaining == 0 {
            continue;
        }
        buf.extend_from_slice(&tmp[..remaining.min(n)]);
    }

    buf
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
