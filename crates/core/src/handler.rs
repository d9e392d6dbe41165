//! Session-level handling of the agent's event stream.
//!
//! A [`MessageHandler`] owns one subscription to the inbound stream. It routes
//! each event by its discriminator, keeps the session sequence current,
//! answers keepalive pings and runs client tool calls in their own tasks so
//! the stream keeps flowing while a tool executes.

use crate::callbacks::SessionCallbacks;
use crate::error::SessionError;
use crate::events::{
    ConversationMessage, EventType, FailurePolicy, InboundEvent, MessageSource, PingEvent,
    ToolCallRequest,
};
use crate::protocol::OutboundMessage;
use crate::sequence::{SequenceReader, SessionSequence};
use crate::tools::{ClientTool, ToolRegistry};
use crate::transport::{InboundStream, Transport};
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Routes the events of a single conversation.
///
/// Dropping the handler disposes it. In-flight client tools are not
/// cancelled by `stop_listening` or `dispose`; once disposed, their results
/// are discarded instead of sent.
pub struct MessageHandler {
    shared: Arc<Shared>,
    listener: Option<JoinHandle<()>>,
}

/// State reachable from the routing task and from every tool task.
struct Shared {
    transport: Arc<dyn Transport>,
    tools: Arc<ToolRegistry>,
    callbacks: Arc<dyn SessionCallbacks>,
    sequence: SessionSequence,
    disposed: AtomicBool,
}

impl MessageHandler {
    pub fn new(
        transport: Arc<dyn Transport>,
        tools: Arc<ToolRegistry>,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                tools,
                callbacks,
                sequence: SessionSequence::new(),
                disposed: AtomicBool::new(false),
            }),
            listener: None,
        }
    }

    /// Read-only access to the latest observed `event_id`.
    pub fn sequence(&self) -> SequenceReader {
        self.shared.sequence.reader()
    }

    pub fn current_event_id(&self) -> u64 {
        self.shared.sequence.current()
    }

    /// Starts routing events from `stream` on a background task.
    ///
    /// Only one subscription is active at a time: calling this while already
    /// listening aborts the previous subscription and replaces it.
    pub fn start_listening(&mut self, stream: InboundStream) {
        if self.is_disposed() {
            warn!("Ignoring start_listening on a disposed message handler.");
            return;
        }
        if let Some(previous) = self.listener.take() {
            if !previous.is_finished() {
                warn!("Replacing the active inbound subscription.");
            }
            previous.abort();
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(
            async move { shared.consume(stream).await }.instrument(info_span!("message_handler")),
        );
        self.listener = Some(handle);
    }

    /// Detaches from the inbound stream. Safe to call when not listening.
    pub fn stop_listening(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
            debug!("Stopped listening for agent events.");
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listener
            .as_ref()
            .is_some_and(|listener| !listener.is_finished())
    }

    /// Stops listening for good. Tool results that complete afterwards are dropped.
    pub fn dispose(&mut self) {
        self.stop_listening();
        if !self.shared.disposed.swap(true, Ordering::AcqRel) {
            debug!("Message handler disposed.");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Routes a single decoded event, exactly as the listening task would.
    pub async fn handle_message(&self, raw: Value) {
        self.shared.route(raw).await;
    }
}

impl Drop for MessageHandler {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Shared {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    async fn consume(self: Arc<Self>, mut stream: InboundStream) {
        info!("Listening for agent events.");
        while let Some(item) = stream.next().await {
            match item {
                Ok(raw) => self.route(raw).await,
                Err(e) => {
                    let err = SessionError::Stream(format!("{e:#}"));
                    error!(error = %err, "Inbound stream reported an error.");
                    self.callbacks.on_error(&err);
                }
            }
        }
        info!("Inbound stream ended.");
    }

    async fn route(self: &Arc<Self>, raw: Value) {
        if self.is_disposed() {
            debug!("Dropping event received after dispose.");
            return;
        }
        let Some(event_type) = EventType::of(&raw) else {
            debug!("Discarding event without a `type` discriminator.");
            return;
        };

        // The sequence moves before dispatch so handlers see the new value,
        // and regardless of whether the payload turns out to be valid.
        if let Some(event_id) = raw.get("event_id").and_then(Value::as_u64) {
            if !self.sequence.observe(event_id) {
                debug!(
                    event_id,
                    current = self.sequence.current(),
                    "Ignoring out-of-order event_id."
                );
            }
        }

        if event_type != EventType::Ping {
            self.callbacks.on_debug(&raw);
        }

        match InboundEvent::parse(&event_type, &raw) {
            Ok(event) => self.dispatch(event).await,
            Err(source) => self.payload_failed(event_type, source),
        }
    }

    async fn dispatch(self: &Arc<Self>, event: InboundEvent) {
        match event {
            InboundEvent::ConversationMetadata(metadata) => {
                info!(conversation_id = %metadata.conversation_id, "Conversation initiated.");
                self.callbacks.on_conversation_metadata(&metadata);
            }
            InboundEvent::UserTranscript(transcript) => {
                self.emit_message(MessageSource::User, transcript.user_transcript);
            }
            InboundEvent::AgentResponse(response) => {
                self.emit_message(MessageSource::Agent, response.agent_response);
            }
            InboundEvent::AgentResponsePart(part) => self.callbacks.on_agent_response_part(&part),
            InboundEvent::Audio(chunk) => self.callbacks.on_audio(&chunk),
            InboundEvent::Interruption(interruption) => {
                debug!(event_id = interruption.event_id, "Agent was interrupted.");
                self.callbacks.on_interruption(&interruption);
            }
            InboundEvent::Ping(ping) => self.send_pong(ping).await,
            InboundEvent::ClientToolCall(request) => self.invoke_client_tool(request),
            InboundEvent::McpToolCall(call) => self.callbacks.on_mcp_tool_call(&call),
            InboundEvent::McpConnectionStatus(status) => {
                self.callbacks.on_mcp_connection_status(&status)
            }
            InboundEvent::AgentToolResponse(response) => {
                self.callbacks.on_agent_tool_response(&response);
                if response.is_end_call() {
                    info!("Agent requested the end of the session.");
                    self.callbacks.on_end_call_requested();
                }
            }
            InboundEvent::Diagnostic(event_type) => {
                debug!(%event_type, "Diagnostic event.");
            }
            InboundEvent::Unknown(event_type) => {
                debug!(%event_type, "Unknown event type.");
            }
        }
    }

    fn payload_failed(&self, event_type: EventType, source: serde_json::Error) {
        match event_type.failure_policy() {
            FailurePolicy::Report => {
                let err = SessionError::MalformedPayload {
                    event_type: event_type.to_string(),
                    source,
                };
                error!(error = %err, "Failed to handle event.");
                self.callbacks.on_error(&err);
            }
            FailurePolicy::Swallow => {
                warn!(%event_type, error = %source, "Ignoring malformed event.");
            }
        }
    }

    fn emit_message(&self, source: MessageSource, text: String) {
        if text.trim().is_empty() {
            debug!(%source, "Skipping empty message.");
            return;
        }
        self.callbacks
            .on_message(&ConversationMessage { source, text });
    }

    async fn send_pong(&self, ping: PingEvent) {
        debug!(event_id = ping.event_id, ping_ms = ?ping.ping_ms, "Answering keepalive ping.");
        let pong = OutboundMessage::Pong {
            event_id: ping.event_id,
        };
        if let Err(e) = self.transport.send(pong).await {
            let err = SessionError::SendFailed {
                message_type: "pong",
                reason: format!("{e:#}"),
            };
            warn!(error = %err, "Keepalive reply failed.");
            self.callbacks.on_error(&err);
        }
    }

    /// Starts a client tool without waiting for it.
    fn invoke_client_tool(self: &Arc<Self>, request: ToolCallRequest) {
        let Some(tool) = self.tools.get(&request.tool_name) else {
            warn!(
                tool_name = %request.tool_name,
                tool_call_id = %request.tool_call_id,
                "No client tool registered under this name."
            );
            self.callbacks.on_unhandled_client_tool_call(&request);
            return;
        };

        let span = info_span!(
            "client_tool",
            tool_name = %request.tool_name,
            tool_call_id = %request.tool_call_id
        );
        let shared = Arc::clone(self);
        tokio::spawn(async move { shared.run_client_tool(tool, request).await }.instrument(span));
    }

    async fn run_client_tool(&self, tool: Arc<dyn ClientTool>, request: ToolCallRequest) {
        let ToolCallRequest {
            tool_call_id,
            tool_name,
            parameters,
        } = request;
        debug!("Executing client tool.");

        let outcome = AssertUnwindSafe(tool.execute(parameters))
            .catch_unwind()
            .await;
        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                self.tool_failed(tool_name, tool_call_id, format!("{e:#}"));
                return;
            }
            Err(panic) => {
                self.tool_failed(tool_name, tool_call_id, panic_message(panic.as_ref()));
                return;
            }
        };

        let Some(result) = result.filter(|value| !value.is_null()) else {
            debug!("Client tool returned no result; nothing to send.");
            return;
        };
        if self.is_disposed() {
            debug!("Handler disposed while the tool ran; dropping its result.");
            return;
        }
        let message = OutboundMessage::ClientToolResult {
            tool_call_id,
            result,
        };
        match self.transport.send(message).await {
            Ok(()) => debug!("Client tool result sent."),
            Err(e) => warn!(error = %format!("{e:#}"), "Failed to send client tool result."),
        }
    }

    fn tool_failed(&self, tool_name: String, tool_call_id: String, reason: String) {
        let err = SessionError::ToolFailed {
            tool_name,
            tool_call_id,
            reason,
        };
        error!(error = %err, "Client tool failed.");
        self.callbacks.on_error(&err);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
