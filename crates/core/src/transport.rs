use crate::protocol::OutboundMessage;
use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

/// The decoded inbound frames of a connection, in delivery order.
///
/// An `Err` item is a transport-level problem (a read or decode failure);
/// the stream keeps going until the transport ends it.
pub type InboundStream = Pin<Box<dyn Stream<Item = Result<Value>> + Send>>;

/// The outbound half of a connection to the agent.
///
/// Implementations must tolerate concurrent calls, since completed tool
/// invocations send their results independently of each other.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<()>;
}
