//! Terminal presentation of a conversation.

use crate::audio::{AudioRecorder, parse_sample_rate};
use convai_core::{SessionCallbacks, SessionError};
use convai_core::events::{
    AgentResponsePart, AgentToolResponse, AudioChunk, ConversationMessage, ConversationMetadata,
    InterruptionEvent, McpConnectionStatus, McpToolCall, MessageSource, ResponsePartType,
    ToolCallRequest,
};
use convai_core::protocol::FeedbackScore;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// A line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Context(String),
    Feedback(FeedbackScore),
    Active,
    Quit,
}

impl Command {
    /// Parses one input line. Blank lines and bare `/context` yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (head, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(head, rest)| (head, rest.trim()));
        match head {
            "/quit" | "/exit" => Some(Self::Quit),
            "/like" => Some(Self::Feedback(FeedbackScore::Like)),
            "/dislike" => Some(Self::Feedback(FeedbackScore::Dislike)),
            "/active" => Some(Self::Active),
            "/context" if rest.is_empty() => None,
            "/context" => Some(Self::Context(rest.to_string())),
            _ => Some(Self::Say(line.to_string())),
        }
    }
}

/// Prints the conversation and records the agent's audio.
pub struct ConsoleCallbacks {
    out: Mutex<Box<dyn Write + Send>>,
    recorder: Option<Mutex<AudioRecorder>>,
    end_call: Arc<Notify>,
    streaming: Mutex<bool>,
}

impl ConsoleCallbacks {
    pub fn new(end_call: Arc<Notify>) -> Self {
        Self::with_writer(Box::new(io::stdout()), end_call)
    }

    pub fn with_writer(out: Box<dyn Write + Send>, end_call: Arc<Notify>) -> Self {
        Self {
            out: Mutex::new(out),
            recorder: None,
            end_call,
            streaming: Mutex::new(false),
        }
    }

    pub fn with_recorder(mut self, recorder: AudioRecorder) -> Self {
        self.recorder = Some(Mutex::new(recorder));
        self
    }

    /// Seconds of agent audio recorded, if recording.
    pub fn recorded_secs(&self) -> Option<f64> {
        let recorder = self.recorder.as_ref()?.lock().ok()?;
        Some(recorder.duration_secs())
    }

    fn print(&self, args: fmt::Arguments<'_>) {
        if let Ok(mut out) = self.out.lock() {
            if let Err(e) = out.write_fmt(args).and_then(|_| out.flush()) {
                warn!(error = %e, "Failed to write to the console.");
            }
        }
    }

    /// Terminates a partially streamed response line, if one is open.
    fn finish_stream(&self) {
        let open = self
            .streaming
            .lock()
            .map(|mut streaming| std::mem::replace(&mut *streaming, false))
            .unwrap_or(false);
        if open {
            self.print(format_args!("\n"));
        }
    }
}

impl SessionCallbacks for ConsoleCallbacks {
    fn on_conversation_metadata(&self, metadata: &ConversationMetadata) {
        info!(
            conversation_id = %metadata.conversation_id,
            output_format = ?metadata.agent_output_audio_format,
            "Conversation metadata received."
        );
        let rate = metadata
            .agent_output_audio_format
            .as_deref()
            .and_then(parse_sample_rate);
        if let (Some(rate), Some(recorder)) = (rate, &self.recorder) {
            if let Ok(mut recorder) = recorder.lock() {
                recorder.set_sample_rate(rate);
            }
        }
    }

    fn on_message(&self, message: &ConversationMessage) {
        if message.source == MessageSource::Agent && self.streaming.lock().is_ok_and(|s| *s) {
            // Already shown as it streamed.
            self.finish_stream();
            return;
        }
        self.finish_stream();
        self.print(format_args!("{}: {}\n", message.source, message.text));
    }

    fn on_agent_response_part(&self, part: &AgentResponsePart) {
        match part.part_type {
            ResponsePartType::Start => {
                self.finish_stream();
                if let Ok(mut streaming) = self.streaming.lock() {
                    *streaming = true;
                }
                self.print(format_args!("agent: {}", part.text));
            }
            ResponsePartType::Delta => self.print(format_args!("{}", part.text)),
            ResponsePartType::Stop => {
                if !part.text.is_empty() {
                    self.print(format_args!("{}", part.text));
                }
            }
        }
    }

    fn on_audio(&self, chunk: &AudioChunk) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        let Ok(mut recorder) = recorder.lock() else {
            return;
        };
        if let Err(e) = recorder.write_chunk(&chunk.audio_base_64) {
            error!(error = %e, "Failed to record agent audio.");
        }
    }

    fn on_interruption(&self, event: &InterruptionEvent) {
        self.finish_stream();
        info!(event_id = event.event_id, reason = ?event.reason, "Agent was interrupted.");
        self.print(format_args!("[interrupted]\n"));
    }

    fn on_unhandled_client_tool_call(&self, request: &ToolCallRequest) {
        warn!(
            tool_name = %request.tool_name,
            tool_call_id = %request.tool_call_id,
            parameters = %serde_json::Value::Object(request.parameters.clone()),
            "Agent called a client tool this console does not provide."
        );
    }

    fn on_mcp_tool_call(&self, call: &McpToolCall) {
        info!(
            service_id = %call.service_id,
            tool_name = %call.tool_name,
            state = ?call.state,
            "MCP tool call update."
        );
    }

    fn on_mcp_connection_status(&self, status: &McpConnectionStatus) {
        for integration in &status.integrations {
            info!(
                integration_id = %integration.integration_id,
                connected = integration.is_connected,
                tools = integration.tool_count,
                "MCP integration status."
            );
        }
    }

    fn on_agent_tool_response(&self, response: &AgentToolResponse) {
        info!(
            tool_name = %response.tool_name,
            tool_type = %response.tool_type,
            is_error = response.is_error,
            "Agent ran a tool."
        );
    }

    fn on_end_call_requested(&self) {
        self.finish_stream();
        self.print(format_args!("[agent ended the call]\n"));
        self.end_call.notify_one();
    }

    fn on_debug(&self, event: &serde_json::Value) {
        debug!(event_type = ?event.get("type"), "Agent event.");
    }

    fn on_error(&self, error: &SessionError) {
        error!(error = %error, "Session error.");
    }
}
