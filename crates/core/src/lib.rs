//! Session protocol core for realtime conversational agents.
//!
//! This crate sits between a transport that yields decoded JSON frames and the
//! application that presents a conversation. It routes agent events to
//! [`SessionCallbacks`], answers keepalive pings, tracks the session sequence
//! and runs client tools the agent asks for. It never opens connections
//! itself: sending goes through a [`Transport`].

pub mod callbacks;
pub mod error;
pub mod events;
pub mod handler;
pub mod protocol;
pub mod sequence;
pub mod tools;
pub mod transport;

pub use callbacks::SessionCallbacks;
pub use error::SessionError;
pub use events::{ConversationMessage, EventType, InboundEvent, MessageSource};
pub use handler::MessageHandler;
pub use protocol::OutboundMessage;
pub use sequence::{SequenceReader, SessionSequence};
pub use tools::{ClientTool, FnTool, ToolRegistry, ToolResult};
pub use transport::{InboundStream, Transport};
