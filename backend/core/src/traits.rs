use anyhow::Result;
use async_trait::async_trait;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::error::CapError;
use crate::event::AgentEvent;
use crate::message::ContentPart;
use crate::tools::{ToolCallRequest, ToolCallResponse, ToolOutput};

/// Ordered, single-consumer stream of events from one exchange.
pub type EventStream = ReceiverStream<AgentEvent>;

/// The conversational agent behind the session: accepts message parts and
/// streams back content fragments and tool-call requests.
///
/// Implementations own the model transport entirely; the driver only consumes
/// the event stream and honors the shared cancellation token.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Open one streamed exchange for the given message parts.
    async fn send_message_stream(
        &self,
        parts: Vec<ContentPart>,
        cancel: CancellationToken,
        prompt_id: &str,
    ) -> Result<EventStream, CapError>;
}

/// Executes tool calls on behalf of the session, one at a time.
///
/// Failures are per-call: they come back inside the response, never as a
/// session-fatal error.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        request: ToolCallRequest,
        cancel: CancellationToken,
    ) -> ToolCallResponse;
}

/// A capability an executor can dispatch to by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of the tool (e.g. "capture_info").
    fn name(&self) -> &str;

    /// Description for the agent's tool listing.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput>;
}
