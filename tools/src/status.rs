//! `jj_status` tool: read-only snapshot of the gate and the working copy.

use std::sync::Arc;

use jjgate_types::GateState;
use serde_json::{Value, json};

use crate::gate::Gatekeeper;
use crate::{ToolCtx, ToolError, ToolExecutor, ToolFut};

#[derive(Debug)]
pub struct StatusTool {
    gate: Arc<Gatekeeper>,
}

impl StatusTool {
    #[must_use]
    pub fn new(gate: Arc<Gatekeeper>) -> Self {
        Self { gate }
    }
}

fn gate_line(state: Option<&GateState>) -> String {
    match state {
        None => "unknown session (treated as locked)".to_string(),
        Some(GateState {
            unlocked: true,
            parent: Some(parent),
        }) => format!("unlocked (inherited from {parent})"),
        Some(state) => state.label().to_string(),
    }
}

fn or_placeholder<'a>(text: &'a str, placeholder: &'a str) -> &'a str {
    let trimmed = text.trim_end();
    if trimmed.trim().is_empty() {
        placeholder
    } else {
        trimmed
    }
}

impl ToolExecutor for StatusTool {
    fn name(&self) -> &'static str {
        "jj_status"
    }

    fn description(&self) -> &'static str {
        "Show whether file edits are unlocked for this session, plus the current jj \
         change description, working-copy status, and diff summary. Read-only."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    fn is_side_effecting(&self, _args: &Value) -> bool {
        false
    }

    fn approval_summary(&self, _args: &Value) -> Result<String, ToolError> {
        Ok("jj status".to_string())
    }

    fn execute<'a>(&'a self, _args: Value, ctx: &'a mut ToolCtx) -> ToolFut<'a> {
        Box::pin(async move {
            let state = self.gate.state(&ctx.session_id).await;
            let probe = self.gate.probe();
            let (description, status, summary) = tokio::join!(
                probe.current_description(),
                probe.working_copy_status(),
                probe.diff_summary()
            );

            Ok(format!(
                "Gate: {}\nDescription: {}\n\nWorking copy:\n{}\n\nDiff summary:\n{}",
                gate_line(state.as_ref()),
                or_placeholder(&description, "(none)"),
                or_placeholder(&status, "(unavailable)"),
                or_placeholder(&summary, "(no changes)"),
            ))
        })
    }
}
