//! JSON-lines wire types spoken with the host agent.
//!
//! One request object per stdin line, one response object per stdout line.

use jjgate_types::{SessionId, ToolDefinition};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request line: the optional correlation `id` plus the typed request.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub request: Request,
}

#[derive(Debug, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    #[serde(rename = "parentID", default)]
    pub parent_id: Option<SessionId>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "session.created")]
    SessionCreated { info: SessionInfo },
    #[serde(rename = "session.deleted")]
    SessionDeleted { info: SessionInfo },
    /// Gate check issued before the host runs any tool.
    #[serde(rename = "tool.execute.before")]
    ToolExecuteBefore {
        #[serde(rename = "sessionID")]
        session_id: SessionId,
        tool: String,
    },
    /// Invocation of one of the tools this process exposes.
    #[serde(rename = "tool.call")]
    ToolCall {
        #[serde(rename = "sessionID")]
        session_id: SessionId,
        tool: String,
        #[serde(default = "empty_args")]
        args: Value,
    },
    #[serde(rename = "tools.list")]
    ToolsList,
}

fn empty_args() -> Value {
    Value::Object(serde_json::Map::new())
}

#[derive(Debug, Default, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
}

impl Response {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            ok: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn output(output: String) -> Self {
        Self {
            ok: true,
            output: Some(output),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn tools(tools: Vec<ToolDefinition>) -> Self {
        Self {
            ok: true,
            tools: Some(tools),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// A gate denial. `error` carries the corrective instruction.
    #[must_use]
    pub fn blocked(message: impl Into<String>) -> Self {
        Self {
            blocked: true,
            ..Self::error(message)
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: Option<Value>) -> Self {
        self.id = id;
        self
    }
}
