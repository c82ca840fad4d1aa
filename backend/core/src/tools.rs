use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::message::ContentPart;
use crate::traits::Tool;

/// A tool invocation requested by the agent during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier supplied by the agent; synthesized when absent.
    #[serde(default)]
    pub call_id: Option<String>,
    pub name: String,
    /// Argument mapping; an absent mapping means no arguments.
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub is_client_initiated: bool,
    #[serde(default)]
    pub prompt_id: String,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            call_id: None,
            name: name.into(),
            args,
            is_client_initiated: false,
            prompt_id: String::new(),
        }
    }

    /// Resolve the call identifier: the provided one verbatim, or
    /// `<name>-<millis>` synthesized from the current time.
    pub fn resolved_call_id(&self) -> String {
        match &self.call_id {
            Some(id) => id.clone(),
            None => format!("{}-{}", self.name, Utc::now().timestamp_millis()),
        }
    }
}

/// Response parts as tools produce them: either a bare string or an already
/// shaped content part, singly or in sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePart {
    Text(String),
    Part(ContentPart),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseParts {
    One(ResponsePart),
    Many(Vec<ResponsePart>),
}

impl ResponseParts {
    /// Flatten into ordered content parts. Bare strings become text parts,
    /// shaped parts pass through, empty entries are skipped.
    pub fn normalize(self) -> Vec<ContentPart> {
        let items = match self {
            Self::One(part) => vec![part],
            Self::Many(parts) => parts,
        };
        items
            .into_iter()
            .filter_map(|part| match part {
                ResponsePart::Text(text) if text.is_empty() => None,
                ResponsePart::Text(text) => Some(ContentPart::text(text)),
                ResponsePart::Part(ContentPart::Data { data: Value::Null }) => None,
                ResponsePart::Part(part) => Some(part),
            })
            .collect()
    }
}

/// What a tool execution produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResponse {
    /// Error message when the execution failed.
    pub error: Option<String>,
    /// Short human-readable result string.
    pub display: Option<String>,
    /// Parts fed back to the agent on the next turn.
    pub parts: Option<ResponseParts>,
}

impl ToolCallResponse {
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// The result string recorded for this call: the display string when
    /// present, else the error message, else `"Success"`.
    pub fn result_summary(&self) -> String {
        self.display
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Success".to_string())
    }

    /// Normalized response parts, empty when the tool produced none.
    pub fn into_parts(self) -> Vec<ContentPart> {
        self.parts.map(ResponseParts::normalize).unwrap_or_default()
    }
}

/// Successful output of a single [`Tool`] execution.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub display: Option<String>,
    pub parts: Option<ResponseParts>,
}

impl From<ToolOutput> for ToolCallResponse {
    fn from(output: ToolOutput) -> Self {
        Self {
            error: None,
            display: output.display,
            parts: output.parts,
        }
    }
}

/// Name-keyed registry of the tools an executor can dispatch to.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }
}
