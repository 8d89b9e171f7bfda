//! Checkpoint gate for coding agents - VCS driver, gate state machine, and the
//! tools exposed to the agent.
//!
//! The agent must declare intent (create a jj change with a description)
//! before any file-mutating tool runs. [`Gatekeeper`] holds the per-session
//! lock; the `jj`, `jj_push`, and `jj_status` tools drive it.

pub mod config;
pub mod gate;
pub mod intent;
pub mod probe;
pub mod process;
pub mod publish;
pub mod registry;
pub mod status;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod vcs;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use jjgate_types::{SessionId, ToolDefinition};
use serde_json::Value;

pub use config::{VcsConfig, VcsSettings};
pub use gate::{Admission, GateError, Gatekeeper};
pub use probe::VcsProbe;
pub use registry::SessionRegistry;
pub use vcs::{JjDriver, VcsDriver, VcsError, VcsFut};

/// Tool execution future type alias.
pub type ToolFut<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;

/// Risk level for approval prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Error types for tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Bad tool args: {message}")]
    BadArgs { message: String },
    #[error("Tool execution failed: {tool}: {message}")]
    ExecutionFailed { tool: String, message: String },
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },
    #[error("Duplicate tool registered: {name}")]
    DuplicateTool { name: String },
}

/// A tool the agent can call directly.
pub trait ToolExecutor: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn schema(&self) -> Value;
    fn is_side_effecting(&self, args: &Value) -> bool;
    fn risk_level(&self, args: &Value) -> RiskLevel {
        if self.is_side_effecting(args) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
    fn approval_summary(&self, args: &Value) -> Result<String, ToolError>;
    fn execute<'a>(&'a self, args: Value, ctx: &'a mut ToolCtx) -> ToolFut<'a>;
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone()).map_err(|e| ToolError::BadArgs {
        message: e.to_string(),
    })
}

/// Per-call tool context.
#[derive(Debug, Clone)]
pub struct ToolCtx {
    /// Session the call was made from.
    pub session_id: SessionId,
}

impl ToolCtx {
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id }
    }
}

/// Tool registry for executors.
#[derive(Default)]
pub struct ToolRegistry {
    executors: HashMap<String, Box<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn register(&mut self, executor: Box<dyn ToolExecutor>) -> Result<(), ToolError> {
        let name = executor.name().to_string();
        if self.executors.contains_key(&name) {
            return Err(ToolError::DuplicateTool { name });
        }
        self.executors.insert(name, executor);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&dyn ToolExecutor, ToolError> {
        self.executors
            .get(name)
            .map(AsRef::as_ref)
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
            })
    }

    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .executors
            .values()
            .map(|exec| ToolDefinition::new(exec.name(), exec.description(), exec.schema()))
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Look up, validate, and run a tool call.
    pub async fn execute(&self, name: &str, args: Value, ctx: &mut ToolCtx) -> Result<String, ToolError> {
        let executor = self.lookup(name)?;
        validate_args(&executor.schema(), &args)?;
        let summary = executor.approval_summary(&args)?;
        tracing::info!(
            session = %ctx.session_id,
            tool = name,
            risk = ?executor.risk_level(&args),
            %summary,
            "executing tool"
        );
        executor.execute(args, ctx).await
    }
}

/// Register the `jj`, `jj_push`, and `jj_status` tools.
pub fn register_builtins(registry: &mut ToolRegistry, gate: &Arc<Gatekeeper>) -> Result<(), ToolError> {
    registry.register(Box::new(intent::IntentTool::new(gate.clone())))?;
    registry.register(Box::new(publish::PublishTool::new(gate.clone())))?;
    registry.register(Box::new(status::StatusTool::new(gate.clone())))?;
    Ok(())
}

/// Validate arguments against a JSON schema.
pub fn validate_args(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ToolError::BadArgs {
        message: format!("Invalid tool schema: {e}"),
    })?;
    if let Err(err) = validator.validate(args) {
        return Err(ToolError::BadArgs {
            message: err.to_string(),
        });
    }
    Ok(())
}
