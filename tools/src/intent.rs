//! `jj` tool: declare intent by opening a described checkpoint.
//!
//! The only way for the agent itself to unlock its session. The description is
//! shape-checked, then a new jj change is created on top of the publishable
//! bookmark (remote-tracked first, local second).

use std::sync::Arc;

use jjgate_types::IntentDescription;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::gate::{CheckpointAttempt, Gatekeeper};
use crate::{ToolCtx, ToolError, ToolExecutor, ToolFut, parse_args};

#[derive(Debug, Deserialize)]
struct IntentArgs {
    description: String,
}

#[derive(Debug)]
pub struct IntentTool {
    gate: Arc<Gatekeeper>,
}

impl IntentTool {
    #[must_use]
    pub fn new(gate: Arc<Gatekeeper>) -> Self {
        Self { gate }
    }

    /// Base refs to try, in order.
    fn base_candidates(&self) -> Vec<String> {
        let settings = self.gate.settings();
        vec![
            settings.remote_tracked_bookmark(),
            settings.bookmark.clone(),
        ]
    }
}

impl ToolExecutor for IntentTool {
    fn name(&self) -> &'static str {
        "jj"
    }

    fn description(&self) -> &'static str {
        "Declare what you are about to do before editing files. Creates a new jj change \
         with this description on top of the main bookmark and unlocks file edits for \
         this session. Use a short sentence of at least two words, e.g. \
         \"Add retry to the upload client\"."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "What you are about to do (at least 10 characters and 2 words)"
                }
            },
            "required": ["description"]
        })
    }

    fn is_side_effecting(&self, _args: &Value) -> bool {
        true
    }

    fn approval_summary(&self, args: &Value) -> Result<String, ToolError> {
        let typed: IntentArgs = parse_args(args)?;
        Ok(format!("jj new -m \"{}\"", typed.description.trim()))
    }

    fn execute<'a>(&'a self, args: Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let typed: IntentArgs = parse_args(&args)?;
            let description = match IntentDescription::new(&typed.description) {
                Ok(description) => description,
                Err(rejection) => {
                    tracing::debug!(session = %ctx.session_id, %rejection, "intent rejected");
                    return Ok(format!(
                        "Rejected: {rejection}\n\nThe session is still locked."
                    ));
                }
            };

            // Best effort: a stale remote-tracked ref is still a usable base.
            if let Err(error) = self
                .gate
                .attempt("jj git fetch", self.gate.driver().fetch())
                .await
            {
                tracing::warn!(%error, "fetch before checkpoint failed, continuing");
            }

            let bases = self.base_candidates();
            let base = match self
                .gate
                .open_checkpoint(&bases, description.as_str())
                .await
            {
                Ok(base) => base,
                Err(failures) => {
                    return Err(ToolError::ExecutionFailed {
                        tool: self.name().to_string(),
                        message: checkpoint_failure_report(&failures, &description),
                    });
                }
            };

            self.gate.unlock(&ctx.session_id).await;

            let change_id = self.gate.probe().current_change_short_id().await;
            let change_id = if change_id.is_empty() {
                "(unknown)".to_string()
            } else {
                change_id
            };
            Ok(format!(
                "Checkpoint {change_id} created on {base}: \"{description}\"\n\
                 File edits are unlocked for this session."
            ))
        })
    }
}

fn checkpoint_failure_report(failures: &[CheckpointAttempt], description: &IntentDescription) -> String {
    let mut report = String::from("Could not create a checkpoint. The session is still locked.\n");
    for failure in failures {
        report.push_str(&format!("  {}: {}\n", failure.base, failure.error));
    }
    let fallback = failures
        .last()
        .map_or("@", |failure| failure.base.as_str());
    report.push_str(&format!(
        "\nTo recover manually, run:\n\n    jj new {fallback} -m \"{description}\"\n"
    ));
    report
}
