//! Inbound event model.
//!
//! Every frame the agent sends is a JSON object carrying a `type`
//! discriminator. [`EventType`] closes the set of discriminators this client
//! understands, and [`InboundEvent`] pairs each of them with its parsed
//! payload. Payloads are parsed lazily, one event at a time, so a malformed
//! frame only ever affects itself.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Name of the system tool the agent invokes to hang up.
pub const END_CALL_TOOL: &str = "end_call";

/// The `type` discriminator of an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    ConversationInitiationMetadata,
    UserTranscript,
    AgentResponse,
    AgentChatResponsePart,
    Audio,
    Interruption,
    Ping,
    ClientToolCall,
    McpToolCall,
    McpConnectionStatus,
    AgentToolResponse,
    VadScore,
    InternalTentativeAgentResponse,
    AgentResponseCorrection,
    Unknown(String),
}

/// What happens when the payload of a known discriminator fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Logged and passed to the error callback.
    Report,
    /// Logged only.
    Swallow,
}

impl EventType {
    /// Reads the discriminator of a raw event, if it has one.
    pub fn of(raw: &Value) -> Option<Self> {
        raw.get("type").and_then(Value::as_str).map(Self::from)
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventType::ConversationInitiationMetadata => "conversation_initiation_metadata",
            EventType::UserTranscript => "user_transcript",
            EventType::AgentResponse => "agent_response",
            EventType::AgentChatResponsePart => "agent_chat_response_part",
            EventType::Audio => "audio",
            EventType::Interruption => "interruption",
            EventType::Ping => "ping",
            EventType::ClientToolCall => "client_tool_call",
            EventType::McpToolCall => "mcp_tool_call",
            EventType::McpConnectionStatus => "mcp_connection_status",
            EventType::AgentToolResponse => "agent_tool_response",
            EventType::VadScore => "vad_score",
            EventType::InternalTentativeAgentResponse => "internal_tentative_agent_response",
            EventType::AgentResponseCorrection => "agent_response_correction",
            EventType::Unknown(other) => other,
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        match self {
            EventType::McpToolCall
            | EventType::McpConnectionStatus
            | EventType::AgentToolResponse => FailurePolicy::Swallow,
            _ => FailurePolicy::Report,
        }
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        match value {
            "conversation_initiation_metadata" => EventType::ConversationInitiationMetadata,
            "user_transcript" => EventType::UserTranscript,
            "agent_response" => EventType::AgentResponse,
            "agent_chat_response_part" => EventType::AgentChatResponsePart,
            "audio" => EventType::Audio,
            "interruption" => EventType::Interruption,
            "ping" => EventType::Ping,
            "client_tool_call" => EventType::ClientToolCall,
            "mcp_tool_call" => EventType::McpToolCall,
            "mcp_connection_status" => EventType::McpConnectionStatus,
            "agent_tool_response" => EventType::AgentToolResponse,
            "vad_score" => EventType::VadScore,
            "internal_tentative_agent_response" => EventType::InternalTentativeAgentResponse,
            "agent_response_correction" => EventType::AgentResponseCorrection,
            other => EventType::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Payloads ---

/// Sent once by the agent when the conversation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub conversation_id: String,
    #[serde(default)]
    pub agent_output_audio_format: Option<String>,
    #[serde(default)]
    pub user_input_audio_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionEvent {
    #[serde(default)]
    pub user_transcript: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(default)]
    pub agent_response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePartType {
    Start,
    Delta,
    Stop,
}

/// A fragment of a streamed text response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponsePart {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type")]
    pub part_type: ResponsePartType,
}

/// An opaque base64 audio fragment of the agent's voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioChunk {
    pub audio_base_64: String,
    #[serde(default)]
    pub event_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterruptionEvent {
    pub event_id: u64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingEvent {
    pub event_id: u64,
    #[serde(default)]
    pub ping_ms: Option<u64>,
}

/// A request from the agent to run a tool registered on this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Absent and `null` parameters both read as an empty object.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parameters: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum McpToolCallState {
    Loading,
    AwaitingApproval,
    Success,
    Failure,
    #[serde(other)]
    Unknown,
}

/// A tool call the agent routes to an MCP server rather than to this client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpToolCall {
    pub service_id: String,
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub tool_description: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
    pub state: McpToolCallState,
    #[serde(default)]
    pub approval_timeout_secs: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpIntegration {
    pub integration_id: String,
    #[serde(default)]
    pub integration_type: String,
    #[serde(default)]
    pub is_connected: bool,
    #[serde(default)]
    pub tool_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpConnectionStatus {
    #[serde(default)]
    pub integrations: Vec<McpIntegration>,
}

/// Reports a tool the agent ran on its own side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentToolResponse {
    pub tool_name: String,
    pub tool_call_id: String,
    #[serde(default)]
    pub tool_type: String,
    #[serde(default)]
    pub is_error: bool,
}

impl AgentToolResponse {
    pub fn is_end_call(&self) -> bool {
        self.tool_name == END_CALL_TOOL
    }
}

/// Who produced a finalized conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    User,
    Agent,
}

impl fmt::Display for MessageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageSource::User => write!(f, "user"),
            MessageSource::Agent => write!(f, "agent"),
        }
    }
}

/// A finalized line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationMessage {
    pub source: MessageSource,
    pub text: String,
}

// --- Typed events ---

/// An inbound event with its payload parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ConversationMetadata(ConversationMetadata),
    UserTranscript(TranscriptionEvent),
    AgentResponse(AgentResponse),
    AgentResponsePart(AgentResponsePart),
    Audio(AudioChunk),
    Interruption(InterruptionEvent),
    Ping(PingEvent),
    ClientToolCall(ToolCallRequest),
    McpToolCall(McpToolCall),
    McpConnectionStatus(McpConnectionStatus),
    AgentToolResponse(AgentToolResponse),
    Diagnostic(EventType),
    Unknown(String),
}

impl InboundEvent {
    /// Parses the payload that belongs to `event_type` out of `raw`.
    pub fn parse(event_type: &EventType, raw: &Value) -> Result<Self, serde_json::Error> {
        let event = match event_type {
            EventType::ConversationInitiationMetadata => InboundEvent::ConversationMetadata(
                payload(raw, "conversation_initiation_metadata_event")?,
            ),
            EventType::UserTranscript => {
                InboundEvent::UserTranscript(payload(raw, "user_transcription_event")?)
            }
            EventType::AgentResponse => {
                InboundEvent::AgentResponse(payload(raw, "agent_response_event")?)
            }
            EventType::AgentChatResponsePart => {
                InboundEvent::AgentResponsePart(payload(raw, "text_response_part")?)
            }
            EventType::Audio => InboundEvent::Audio(payload(raw, "audio_event")?),
            EventType::Interruption => {
                InboundEvent::Interruption(payload(raw, "interruption_event")?)
            }
            EventType::Ping => InboundEvent::Ping(payload(raw, "ping_event")?),
            EventType::ClientToolCall => {
                InboundEvent::ClientToolCall(payload(raw, "client_tool_call")?)
            }
            EventType::McpToolCall => InboundEvent::McpToolCall(payload(raw, "mcp_tool_call")?),
            EventType::McpConnectionStatus => {
                InboundEvent::McpConnectionStatus(payload(raw, "mcp_connection_status")?)
            }
            EventType::AgentToolResponse => {
                InboundEvent::AgentToolResponse(payload(raw, "agent_tool_response")?)
            }
            EventType::VadScore
            | EventType::InternalTentativeAgentResponse
            | EventType::AgentResponseCorrection => InboundEvent::Diagnostic(event_type.clone()),
            EventType::Unknown(other) => InboundEvent::Unknown(other.clone()),
        };
        Ok(event)
    }
}

/// Deserializes the sub-object stored under `key`. A missing key parses as
/// `null`, which fails for every struct payload.
fn payload<T: DeserializeOwned>(raw: &Value, key: &str) -> Result<T, serde_json::Error> {
    T::deserialize(raw.get(key).unwrap_or(&Value::Null))
}
