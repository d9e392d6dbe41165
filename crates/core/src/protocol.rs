//! Defines the messages this client sends to the agent.

use serde::Serialize;
use serde_json::{Map, Value};

/// Messages sent from the client to the agent.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Answers a keepalive `ping`, echoing its identifier.
    Pong { event_id: u64 },
    /// The result of a client tool, correlated with the originating call.
    ClientToolResult { tool_call_id: String, result: Value },
    /// A typed user turn, as an alternative to speech.
    UserMessage { text: String },
    /// Background information for the agent that does not start a turn.
    ContextualUpdate { text: String },
    /// Tells the agent the user is active so it holds back its next turn.
    UserActivity,
    /// Rates the agent response identified by `event_id`.
    Feedback { score: FeedbackScore, event_id: u64 },
    /// Per-conversation overrides, sent right after connecting.
    ConversationInitiationClientData(ConversationInitiation),
}

impl OutboundMessage {
    /// The wire discriminator, used in logs and error reports.
    pub fn message_type(&self) -> &'static str {
        match self {
            OutboundMessage::Pong { .. } => "pong",
            OutboundMessage::ClientToolResult { .. } => "client_tool_result",
            OutboundMessage::UserMessage { .. } => "user_message",
            OutboundMessage::ContextualUpdate { .. } => "contextual_update",
            OutboundMessage::UserActivity => "user_activity",
            OutboundMessage::Feedback { .. } => "feedback",
            OutboundMessage::ConversationInitiationClientData(_) => {
                "conversation_initiation_client_data"
            }
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackScore {
    Like,
    Dislike,
}

/// Overrides applied to the agent for a single conversation.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ConversationInitiation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_config_override: Option<ConversationOverride>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub dynamic_variables: Map<String, Value>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ConversationOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsOverride>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct AgentOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PromptOverride {
    pub prompt: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TtsOverride {
    pub voice_id: String,
}
