use convai_core::protocol::{AgentOverride, ConversationInitiation, ConversationOverride};
use convai_realtime::{ConnectionConfig, ConnectionTarget, DEFAULT_API_BASE, DEFAULT_WS_BASE};
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
///
/// CLI flags are applied on top by the binary before the connection config
/// is derived.
#[derive(Debug)]
pub struct Config {
    pub agent_id: Option<String>,
    pub api_key: Option<SecretString>,
    pub signed_url: Option<String>,
    pub api_base: String,
    pub ws_base: String,
    pub log_level: Level,
    pub audio_out_path: Option<PathBuf>,
    pub language: Option<String>,
    pub first_message: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let ws_base =
            std::env::var("ELEVENLABS_WS_BASE").unwrap_or_else(|_| DEFAULT_WS_BASE.to_string());
        if !(ws_base.starts_with("ws://") || ws_base.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue(
                "ELEVENLABS_WS_BASE".to_string(),
                format!("'{}' is not a ws:// or wss:// URL", ws_base),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            agent_id: non_empty_var("ELEVENLABS_AGENT_ID"),
            api_key: non_empty_var("ELEVENLABS_API_KEY").map(SecretString::from),
            signed_url: non_empty_var("ELEVENLABS_SIGNED_URL"),
            api_base: std::env::var("ELEVENLABS_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            ws_base,
            log_level,
            audio_out_path: non_empty_var("AUDIO_OUT_PATH").map(PathBuf::from),
            language: non_empty_var("AGENT_LANGUAGE"),
            first_message: non_empty_var("AGENT_FIRST_MESSAGE"),
        })
    }

    /// Overrides sent with `conversation_initiation_client_data`, if any are configured.
    pub fn initiation(&self) -> Option<ConversationInitiation> {
        if self.language.is_none() && self.first_message.is_none() {
            return None;
        }
        Some(ConversationInitiation {
            conversation_config_override: Some(ConversationOverride {
                agent: Some(AgentOverride {
                    language: self.language.clone(),
                    first_message: self.first_message.clone(),
                    ..Default::default()
                }),
                tts: None,
            }),
            ..Default::default()
        })
    }

    /// Picks the connection target: a signed URL wins, then a private agent
    /// (agent id plus API key), then a public agent.
    pub fn into_connection_config(self) -> Result<ConnectionConfig, ConfigError> {
        let initiation = self.initiation();
        let target = match (self.signed_url, self.agent_id, self.api_key) {
            (Some(url), _, _) => ConnectionTarget::SignedUrl(url),
            (None, Some(agent_id), Some(api_key)) => {
                ConnectionTarget::PrivateAgent { agent_id, api_key }
            }
            (None, Some(agent_id), None) => ConnectionTarget::PublicAgent { agent_id },
            (None, None, _) => {
                return Err(ConfigError::MissingVar(
                    "ELEVENLABS_AGENT_ID or ELEVENLABS_SIGNED_URL must be set".to_string(),
                ));
            }
        };

        let mut config = ConnectionConfig::new(target)
            .with_api_base(self.api_base)
            .with_ws_base(self.ws_base);
        config.initiation = initiation;
        Ok(config)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}
