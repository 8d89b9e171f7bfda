//! `jj_push` tool: two-phase publish of the current checkpoint.
//!
//! Without `confirm` the tool only describes what would be pushed. With
//! `confirm = true` it moves the bookmark, pushes, re-locks the session, and
//! opens a fresh undescribed change. No pending state is kept between the two
//! calls; each one reads the repository fresh.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::gate::Gatekeeper;
use crate::{RiskLevel, ToolCtx, ToolError, ToolExecutor, ToolFut, parse_args};

/// Revset of the change being published.
const PUBLISH_TARGET: &str = "@";

#[derive(Debug, Default, Deserialize)]
struct PublishArgs {
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug)]
pub struct PublishTool {
    gate: Arc<Gatekeeper>,
}

impl PublishTool {
    #[must_use]
    pub fn new(gate: Arc<Gatekeeper>) -> Self {
        Self { gate }
    }

    fn wants_confirm(args: &Value) -> bool {
        args.get("confirm")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    async fn preview(&self) -> String {
        let probe = self.gate.probe();
        let (description, summary) = tokio::join!(probe.current_description(), probe.diff_summary());
        if description.is_empty() && summary.trim().is_empty() {
            return "Nothing to push: the current change has no description and no changes."
                .to_string();
        }

        let files = probe.diff_file_list().await;
        let settings = self.gate.settings();
        let mut out = format!(
            "Ready to push `{}` to {}.\n\nDescription: {}\n\nFiles:\n",
            settings.bookmark,
            settings.remote,
            if description.is_empty() {
                "(none)"
            } else {
                description.as_str()
            }
        );
        let file_lines: Vec<&str> = files
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if file_lines.is_empty() {
            out.push_str("  (none)\n");
        }
        for file in file_lines {
            out.push_str(&format!("  {file}\n"));
        }
        out.push_str(&format!("\nDiff summary:\n{}\n", summary.trim_end()));
        out.push_str(
            "\nShow this to the user and ask for approval. Only after they approve, \
             call jj_push again with confirm: true.",
        );
        out
    }

    async fn publish(&self, ctx: &ToolCtx) -> Result<String, ToolError> {
        let settings = self.gate.settings();
        let bookmark = settings.bookmark.as_str();
        let driver = self.gate.driver();

        let moved = self
            .gate
            .attempt(
                "jj bookmark move",
                driver.bookmark_move(bookmark, PUBLISH_TARGET),
            )
            .await;
        if let Err(move_error) = moved {
            tracing::debug!(%move_error, bookmark, "bookmark move failed, creating");
            if let Err(create_error) = self
                .gate
                .attempt(
                    "jj bookmark create",
                    driver.bookmark_create(bookmark, PUBLISH_TARGET),
                )
                .await
            {
                return Err(ToolError::ExecutionFailed {
                    tool: self.name().to_string(),
                    message: format!(
                        "Could not point `{bookmark}` at the current change.\n  move: {move_error}\n  create: {create_error}\n\n\
                         Nothing was pushed. To recover manually, run:\n\n    \
                         jj bookmark set {bookmark} -r {PUBLISH_TARGET} && jj git push --remote {} -b {bookmark}",
                        settings.remote
                    ),
                });
            }
        }

        if let Err(error) = self.gate.attempt("jj git push", driver.push(bookmark)).await {
            return Err(ToolError::ExecutionFailed {
                tool: self.name().to_string(),
                message: format!(
                    "Push failed: {error}\n\nThe session state is unchanged. To push manually, run:\n\n    \
                     jj git push --remote {} -b {bookmark}",
                    settings.remote
                ),
            });
        }
        tracing::info!(session = %ctx.session_id, bookmark, remote = %settings.remote, "pushed");

        self.gate.relock(&ctx.session_id).await;

        // Best effort: the session is already re-locked, and the next `jj`
        // call creates its own checkpoint anyway. Falling back to `@` still
        // moves the working copy off the pushed, described change, so a
        // re-probe does not unlock on it.
        let fresh_bases = [
            settings.remote_tracked_bookmark(),
            PUBLISH_TARGET.to_string(),
        ];
        if let Err(failures) = self.gate.open_checkpoint(&fresh_bases, "").await
        {
            for failure in failures {
                tracing::warn!(base = %failure.base, error = %failure.error, "fresh checkpoint after push failed");
            }
        }

        Ok(format!(
            "Pushed `{bookmark}` to {}.\n\
             File edits are locked again for this session. Call `jj` with a description \
             before making further changes.",
            settings.remote
        ))
    }
}

impl ToolExecutor for PublishTool {
    fn name(&self) -> &'static str {
        "jj_push"
    }

    fn description(&self) -> &'static str {
        "Publish the current change: moves the main bookmark to it and pushes to the \
         remote. Call without arguments first to get a preview for the user; call again \
         with confirm: true only after the user approves."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "confirm": {
                    "type": "boolean",
                    "default": false,
                    "description": "Set to true only after the user approved the preview"
                }
            }
        })
    }

    fn is_side_effecting(&self, args: &Value) -> bool {
        Self::wants_confirm(args)
    }

    fn risk_level(&self, args: &Value) -> RiskLevel {
        if Self::wants_confirm(args) {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }

    fn approval_summary(&self, args: &Value) -> Result<String, ToolError> {
        let typed: PublishArgs = parse_args(args)?;
        let settings = self.gate.settings();
        Ok(if typed.confirm {
            format!("jj git push --remote {} -b {}", settings.remote, settings.bookmark)
        } else {
            "Preview jj push".to_string()
        })
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: PublishArgs = parse_args(&args)?;
            if typed.confirm {
                self.publish(ctx).await
            } else {
                Ok(self.preview().await)
            }
        })
    }
}
