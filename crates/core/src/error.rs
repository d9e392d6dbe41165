use thiserror::Error;

/// Failures surfaced through `SessionCallbacks::on_error`.
///
/// None of these end the session. Each one is scoped to a single inbound
/// event, a single tool invocation or a single outbound send.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Inbound stream error: {0}")]
    Stream(String),
    #[error("Malformed `{event_type}` event: {source}")]
    MalformedPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Client tool `{tool_name}` ({tool_call_id}) failed: {reason}")]
    ToolFailed {
        tool_name: String,
        tool_call_id: String,
        reason: String,
    },
    #[error("Failed to send `{message_type}`: {reason}")]
    SendFailed {
        message_type: &'static str,
        reason: String,
    },
}
