use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use capforge_core::{ToolCallRequest, ToolCallResponse, ToolExecutor, ToolRegistry};

/// Dispatches tool calls to a name-keyed registry.
///
/// Every failure — unknown tool, cancellation, or an error from the tool
/// itself — comes back inside the response so a single bad call never ends
/// the session.
pub struct RegistryExecutor {
    registry: ToolRegistry,
}

impl RegistryExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Executor preloaded with the standard capforge tool set.
    pub fn with_default_tools(max_read_bytes: u64) -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(capforge_tools::ReadFileTool::new(max_read_bytes)));
        registry.register(Arc::new(capforge_tools::CaptureInfoTool));
        Self::new(registry)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.list()
    }
}

#[async_trait]
impl ToolExecutor for RegistryExecutor {
    async fn execute(
        &self,
        request: ToolCallRequest,
        cancel: CancellationToken,
    ) -> ToolCallResponse {
        if cancel.is_cancelled() {
            return ToolCallResponse::from_error(format!(
                "tool {} canceled before dispatch",
                request.name
            ));
        }

        let Some(tool) = self.registry.get(&request.name) else {
            warn!(tool = %request.name, "Unknown tool requested");
            return ToolCallResponse::from_error(format!("unknown tool: {}", request.name));
        };

        debug!(tool = %request.name, call_id = ?request.call_id, "Executing tool");
        tokio::select! {
            _ = cancel.cancelled() => {
                ToolCallResponse::from_error(format!("tool {} canceled", request.name))
            }
            result = tool.execute(Value::Object(request.args.clone())) => match result {
                Ok(output) => output.into(),
                Err(e) => {
                    warn!(tool = %request.name, error = %e, "Tool execution failed");
                    ToolCallResponse::from_error(e.to_string())
                }
            }
        }
    }
}
