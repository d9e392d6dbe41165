//! Where to connect, and what to tell the agent once connected.

use crate::error::ConnectError;
use crate::signed_url::fetch_signed_url;
use convai_core::protocol::ConversationInitiation;
use reqwest::Url;
use secrecy::SecretString;

pub const DEFAULT_API_BASE: &str = "https://api.elevenlabs.io";
pub const DEFAULT_WS_BASE: &str = "wss://api.elevenlabs.io";

/// How the conversation endpoint is obtained.
#[derive(Debug)]
pub enum ConnectionTarget {
    /// An agent that accepts unauthenticated connections.
    PublicAgent { agent_id: String },
    /// An agent that requires a signed URL, fetched with the API key.
    PrivateAgent {
        agent_id: String,
        api_key: SecretString,
    },
    /// A signed URL obtained elsewhere, typically by a backend.
    SignedUrl(String),
}

#[derive(Debug)]
pub struct ConnectionConfig {
    pub target: ConnectionTarget,
    pub api_base: String,
    pub ws_base: String,
    /// Sent as `conversation_initiation_client_data` right after connecting.
    pub initiation: Option<ConversationInitiation>,
}

impl ConnectionConfig {
    pub fn new(target: ConnectionTarget) -> Self {
        Self {
            target,
            api_base: DEFAULT_API_BASE.to_string(),
            ws_base: DEFAULT_WS_BASE.to_string(),
            initiation: None,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_ws_base(mut self, ws_base: impl Into<String>) -> Self {
        self.ws_base = ws_base.into();
        self
    }

    pub fn with_initiation(mut self, initiation: ConversationInitiation) -> Self {
        self.initiation = Some(initiation);
        self
    }

    /// Resolves the websocket URL, fetching a signed URL for private agents.
    pub async fn resolve_url(&self, http: &reqwest::Client) -> Result<String, ConnectError> {
        match &self.target {
            ConnectionTarget::SignedUrl(url) => Ok(url.clone()),
            ConnectionTarget::PublicAgent { agent_id } => {
                public_agent_url(&self.ws_base, agent_id).map(String::from)
            }
            ConnectionTarget::PrivateAgent { agent_id, api_key } => {
                fetch_signed_url(http, &self.api_base, agent_id, api_key).await
            }
        }
    }
}

/// The conversation endpoint of a public agent.
pub fn public_agent_url(ws_base: &str, agent_id: &str) -> Result<Url, ConnectError> {
    let base = format!("{}/v1/convai/conversation", ws_base.trim_end_matches('/'));
    Url::parse_with_params(&base, &[("agent_id", agent_id)])
        .map_err(|e| ConnectError::InvalidUrl(format!("{base}: {e}")))
}
