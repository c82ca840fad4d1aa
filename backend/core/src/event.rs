use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::{ToolCallRequest, ToolCallResponse};

/// A discrete unit emitted by the agent client's streamed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A text fragment of the agent's reply.
    Content(String),
    /// The agent asked for a tool invocation.
    ToolCallRequest(ToolCallRequest),
}

/// One line of JSONL-mode output: a typed payload plus its emission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(flatten)]
    pub payload: RecordPayload,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RecordPayload {
    Token(String),
    ToolCall(ToolCallRecord),
    ToolResult(ToolResultRecord),
}

/// `data` shape of a `tool_call` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub args: Map<String, Value>,
    pub call_id: String,
}

/// `data` shape of a `tool_result` record. `error` is always present,
/// null on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultRecord {
    pub call_id: String,
    pub name: String,
    pub result: String,
    pub error: Option<String>,
}

impl StreamRecord {
    fn stamped(payload: RecordPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn token(text: impl Into<String>) -> Self {
        Self::stamped(RecordPayload::Token(text.into()))
    }

    /// Record for a tool-call request; `call_id` is the resolved identifier.
    pub fn tool_call(request: &ToolCallRequest, call_id: &str) -> Self {
        Self::stamped(RecordPayload::ToolCall(ToolCallRecord {
            name: request.name.clone(),
            args: request.args.clone(),
            call_id: call_id.to_string(),
        }))
    }

    pub fn tool_result(call_id: &str, name: &str, response: &ToolCallResponse) -> Self {
        Self::stamped(RecordPayload::ToolResult(ToolResultRecord {
            call_id: call_id.to_string(),
            name: name.to_string(),
            result: response.result_summary(),
            error: response.error.clone(),
        }))
    }
}
