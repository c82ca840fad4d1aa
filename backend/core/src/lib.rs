pub mod error;
pub mod event;
pub mod message;
pub mod tools;
pub mod traits;

pub use error::CapError;
pub use event::{AgentEvent, RecordPayload, StreamRecord, ToolCallRecord, ToolResultRecord};
pub use message::{ContentPart, Message, Role};
pub use tools::{
    ResponsePart, ResponseParts, ToolCallRequest, ToolCallResponse, ToolOutput, ToolRegistry,
};
pub use traits::{AgentClient, EventStream, Tool, ToolExecutor};
