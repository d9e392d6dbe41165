//! A live conversation with an agent.

use crate::config::ConnectionConfig;
use crate::connection::{WsTransport, connect};
use anyhow::{Context, Result, bail};
use convai_core::protocol::FeedbackScore;
use convai_core::{
    MessageHandler, OutboundMessage, SequenceReader, SessionCallbacks, ToolRegistry, Transport,
};
use std::sync::Arc;
use tracing::{info, instrument};

/// Owns the websocket and the message handler of one conversation.
///
/// Inbound events are routed in the background from the moment `start`
/// returns. The methods here cover what the user side can say to the agent.
pub struct Conversation {
    handler: MessageHandler,
    transport: Arc<WsTransport>,
}

impl Conversation {
    /// Connects to the agent and starts routing its events to `callbacks`.
    #[instrument(name = "conversation_start", skip_all)]
    pub async fn start(
        config: ConnectionConfig,
        tools: Arc<ToolRegistry>,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<Self> {
        let http = reqwest::Client::new();
        let url = config
            .resolve_url(&http)
            .await
            .context("Failed to resolve the conversation endpoint")?;
        let (transport, inbound) = connect(&url)
            .await
            .context("Failed to connect to the agent")?;
        let transport = Arc::new(transport);

        if let Some(initiation) = config.initiation {
            transport
                .send(OutboundMessage::ConversationInitiationClientData(initiation))
                .await?;
        }

        info!(client_tools = ?tools.names(), "Conversation started.");
        let mut handler = MessageHandler::new(transport.clone(), tools, callbacks);
        handler.start_listening(inbound);

        Ok(Self { handler, transport })
    }

    pub async fn send_user_message(&self, text: impl Into<String>) -> Result<()> {
        self.transport
            .send(OutboundMessage::UserMessage { text: text.into() })
            .await
    }

    pub async fn send_contextual_update(&self, text: impl Into<String>) -> Result<()> {
        self.transport
            .send(OutboundMessage::ContextualUpdate { text: text.into() })
            .await
    }

    pub async fn send_user_activity(&self) -> Result<()> {
        self.transport.send(OutboundMessage::UserActivity).await
    }

    /// Rates the most recent agent event.
    ///
    /// Feedback is tagged with the session sequence, which only advances on a
    /// top-level `event_id`. Ids nested inside payloads such as
    /// `audio_event.event_id` or `interruption_event.event_id` are not
    /// tracked, so against a server that only sends nested ids the sequence
    /// stays at 0 and this returns an error.
    pub async fn send_feedback(&self, score: FeedbackScore) -> Result<()> {
        let event_id = self.handler.current_event_id();
        if event_id == 0 {
            bail!("No agent event has been received yet, nothing to rate.");
        }
        self.transport
            .send(OutboundMessage::Feedback { score, event_id })
            .await
    }

    pub fn current_event_id(&self) -> u64 {
        self.handler.current_event_id()
    }

    pub fn sequence(&self) -> SequenceReader {
        self.handler.sequence()
    }

    /// Whether inbound events are still being routed.
    pub fn is_listening(&self) -> bool {
        self.handler.is_listening()
    }

    /// Stops routing events and closes the websocket.
    pub async fn end(mut self) -> Result<()> {
        self.handler.dispose();
        self.transport.close().await?;
        info!("Conversation ended.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionTarget;
    use convai_core::protocol::{AgentOverride, ConversationInitiation, ConversationOverride};
    use convai_core::{ConversationMessage, SessionError};
    use futures_util::{SinkExt, StreamExt};
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};

    #[derive(Default)]
    struct Recorder {
        messages: Mutex<Vec<ConversationMessage>>,
        errors: Mutex<Vec<String>>,
    }

    impl SessionCallbacks for Recorder {
        fn on_message(&self, message: &ConversationMessage) {
            self.messages.lock().unwrap().push(message.clone());
        }
        fn on_error(&self, error: &SessionError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    type ServerSocket = WebSocketStream<TcpStream>;

    /// Starts a conversation against a local websocket server and returns both ends.
    async fn start_pair(
        initiation: Option<ConversationInitiation>,
        tools: ToolRegistry,
    ) -> (Conversation, ServerSocket, Arc<Recorder>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            accept_async(tcp).await.unwrap()
        });

        let mut config = ConnectionConfig::new(ConnectionTarget::SignedUrl(url));
        config.initiation = initiation;
        let recorder = Arc::new(Recorder::default());
        let conversation = Conversation::start(config, Arc::new(tools), recorder.clone())
            .await
            .unwrap();
        let socket = server.await.unwrap();
        (conversation, socket, recorder)
    }

    async fn push(socket: &mut ServerSocket, event: Value) {
        socket
            .send(Message::Text(event.to_string().into()))
            .await
            .unwrap();
    }

    async fn next_json(socket: &mut ServerSocket) -> Value {
        timeout(Duration::from_secs(2), async {
            loop {
                match socket.next().await {
                    Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                    Some(Ok(_)) => continue,
                    other => panic!("server socket ended: {other:?}"),
                }
            }
        })
        .await
        .expect("timed out waiting for a client frame")
    }

    async fn eventually<F: FnMut() -> bool>(mut condition: F) {
        timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_initiation_is_sent_first() {
        let initiation = ConversationInitiation {
            conversation_config_override: Some(ConversationOverride {
                agent: Some(AgentOverride {
                    language: Some("es".to_string()),
                    ..Default::default()
                }),
                tts: None,
            }),
            ..Default::default()
        };
        let (conversation, mut socket, _) = start_pair(Some(initiation), ToolRegistry::new()).await;

        assert_eq!(
            next_json(&mut socket).await,
            json!({
                "type": "conversation_initiation_client_data",
                "conversation_config_override": {"agent": {"language": "es"}}
            })
        );
        conversation.end().await.unwrap();
    }

    #[tokio::test]
    async fn test_ping_and_client_tool_over_websocket() {
        let tools = ToolRegistry::new().with_fn("get_time", |_params| async {
            Ok(Some(json!({"time": "12:00"})))
        });
        let (conversation, mut socket, _) = start_pair(None, tools).await;

        push(
            &mut socket,
            json!({"type": "ping", "ping_event": {"event_id": 7, "ping_ms": 20}}),
        )
        .await;
        assert_eq!(
            next_json(&mut socket).await,
            json!({"type": "pong", "event_id": 7})
        );

        push(
            &mut socket,
            json!({
                "type": "client_tool_call",
                "client_tool_call": {"tool_name": "get_time", "tool_call_id": "call_1", "parameters": {}}
            }),
        )
        .await;
        assert_eq!(
            next_json(&mut socket).await,
            json!({"type": "client_tool_result", "tool_call_id": "call_1", "result": {"time": "12:00"}})
        );

        conversation.end().await.unwrap();
    }

    #[tokio::test]
    async fn test_client_messages_and_feedback() {
        let (conversation, mut socket, recorder) = start_pair(None, ToolRegistry::new()).await;

        let err = conversation
            .send_feedback(FeedbackScore::Like)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nothing to rate"));

        push(
            &mut socket,
            json!({"type": "agent_response", "event_id": 5, "agent_response_event": {"agent_response": "Hello!"}}),
        )
        .await;
        eventually(|| conversation.current_event_id() == 5).await;
        assert_eq!(recorder.messages.lock().unwrap()[0].text, "Hello!");

        conversation.send_feedback(FeedbackScore::Like).await.unwrap();
        assert_eq!(
            next_json(&mut socket).await,
            json!({"type": "feedback", "score": "like", "event_id": 5})
        );

        conversation.send_user_message("What time is it?").await.unwrap();
        assert_eq!(
            next_json(&mut socket).await,
            json!({"type": "user_message", "text": "What time is it?"})
        );

        conversation
            .send_contextual_update("User is on the pricing page")
            .await
            .unwrap();
        assert_eq!(
            next_json(&mut socket).await,
            json!({"type": "contextual_update", "text": "User is on the pricing page"})
        );

        conversation.send_user_activity().await.unwrap();
        assert_eq!(next_json(&mut socket).await, json!({"type": "user_activity"}));

        assert_eq!(conversation.sequence().current(), 5);
        conversation.end().await.unwrap();
    }

    #[tokio::test]
    async fn test_nested_event_ids_do_not_enable_feedback() {
        let (conversation, mut socket, recorder) = start_pair(None, ToolRegistry::new()).await;

        push(
            &mut socket,
            json!({"type": "audio", "audio_event": {"audio_base_64": "AAA=", "event_id": 12}}),
        )
        .await;
        push(
            &mut socket,
            json!({"type": "user_transcript", "user_transcription_event": {"user_transcript": "hi"}}),
        )
        .await;
        eventually(|| !recorder.messages.lock().unwrap().is_empty()).await;

        assert_eq!(conversation.current_event_id(), 0);
        assert!(conversation.send_feedback(FeedbackScore::Dislike).await.is_err());
        conversation.end().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_frames_are_reported_and_close_ends_routing() {
        let (conversation, mut socket, recorder) = start_pair(None, ToolRegistry::new()).await;
        assert!(conversation.is_listening());

        socket
            .send(Message::Text("{not json".to_string().into()))
            .await
            .unwrap();
        push(
            &mut socket,
            json!({"type": "user_transcript", "user_transcription_event": {"user_transcript": "hi"}}),
        )
        .await;
        eventually(|| !recorder.messages.lock().unwrap().is_empty()).await;
        {
            let errors = recorder.errors.lock().unwrap();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("not JSON"));
        }

        socket.close(None).await.unwrap();
        eventually(|| !conversation.is_listening()).await;
    }
}
