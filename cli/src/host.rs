//! Dispatches protocol requests to the gate and the exposed tools.

use std::sync::Arc;

use jjgate_tools::{Gatekeeper, ToolCtx, ToolError, ToolRegistry, register_builtins};

use crate::protocol::{Envelope, Request, Response};

/// Fallback line if a response cannot be encoded.
const ENCODE_FAILURE: &str = r#"{"ok":false,"error":"failed to encode response"}"#;

pub struct Host {
    gate: Arc<Gatekeeper>,
    tools: ToolRegistry,
}

impl Host {
    pub fn new(gate: Arc<Gatekeeper>) -> Result<Self, ToolError> {
        let mut tools = ToolRegistry::default();
        register_builtins(&mut tools, &gate)?;
        Ok(Self { gate, tools })
    }

    #[must_use]
    pub fn gate(&self) -> &Arc<Gatekeeper> {
        &self.gate
    }

    /// Handle one raw input line. Blank lines produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<Envelope>(line) {
            Ok(envelope) => self.handle(envelope.request).await.with_id(envelope.id),
            Err(err) => {
                tracing::warn!(%err, "invalid request line");
                Response::error(format!("invalid request: {err}"))
            }
        };

        Some(serde_json::to_string(&response).unwrap_or_else(|err| {
            tracing::error!(%err, "failed to encode response");
            ENCODE_FAILURE.to_string()
        }))
    }

    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::SessionCreated { info } => {
                self.gate.on_session_created(info.id, info.parent_id).await;
                Response::ok()
            }
            Request::SessionDeleted { info } => {
                self.gate.on_session_deleted(&info.id).await;
                Response::ok()
            }
            Request::ToolExecuteBefore { session_id, tool } => {
                match self.gate.check_tool(&session_id, &tool).await {
                    Ok(admission) => {
                        tracing::debug!(session = %session_id, tool = %tool, ?admission, "tool admitted");
                        Response::ok()
                    }
                    Err(denial) => Response::blocked(denial.to_string()),
                }
            }
            Request::ToolCall {
                session_id,
                tool,
                args,
            } => {
                let mut ctx = ToolCtx::new(session_id);
                match self.tools.execute(&tool, args, &mut ctx).await {
                    Ok(output) => Response::output(output),
                    Err(err) => {
                        tracing::warn!(tool = %tool, %err, "tool call failed");
                        Response::error(err.to_string())
                    }
                }
            }
            Request::ToolsList => Response::tools(self.tools.definitions()),
        }
    }
}
