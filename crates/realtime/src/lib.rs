//! Websocket client for conversational agents.
//!
//! Resolves the conversation endpoint (public agent, private agent through a
//! signed URL, or a signed URL handed in directly), opens the websocket and
//! drives a [`convai_core::MessageHandler`] over it.

pub mod config;
pub mod connection;
pub mod conversation;
pub mod error;
pub mod signed_url;

pub use config::{ConnectionConfig, ConnectionTarget, DEFAULT_API_BASE, DEFAULT_WS_BASE};
pub use connection::{WsTransport, connect};
pub use conversation::Conversation;
pub use error::ConnectError;
