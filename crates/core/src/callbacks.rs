//! The observer interface between the message handler and the presentation layer.

use crate::error::SessionError;
use crate::events::{
    AgentResponsePart, AgentToolResponse, AudioChunk, ConversationMessage, ConversationMetadata,
    InterruptionEvent, McpConnectionStatus, McpToolCall, ToolCallRequest,
};
use serde_json::Value;

/// One method per kind of session event.
///
/// Every method defaults to doing nothing, so implementors only override the
/// events they care about. Methods are called from the routing task and must
/// not block.
#[allow(unused_variables)]
pub trait SessionCallbacks: Send + Sync {
    fn on_conversation_metadata(&self, metadata: &ConversationMetadata) {}

    /// A finalized user transcript or agent response.
    fn on_message(&self, message: &ConversationMessage) {}

    fn on_agent_response_part(&self, part: &AgentResponsePart) {}

    fn on_audio(&self, chunk: &AudioChunk) {}

    fn on_interruption(&self, event: &InterruptionEvent) {}

    /// The agent asked for a client tool that is not registered.
    fn on_unhandled_client_tool_call(&self, request: &ToolCallRequest) {}

    fn on_mcp_tool_call(&self, call: &McpToolCall) {}

    fn on_mcp_connection_status(&self, status: &McpConnectionStatus) {}

    fn on_agent_tool_response(&self, response: &AgentToolResponse) {}

    /// The agent invoked its end-call tool.
    fn on_end_call_requested(&self) {}

    /// Every inbound event except keepalive pings, as received.
    fn on_debug(&self, event: &Value) {}

    fn on_error(&self, error: &SessionError) {}
}
