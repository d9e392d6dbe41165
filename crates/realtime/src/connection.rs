//! The websocket that carries a conversation.

use crate::error::ConnectError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use convai_core::{InboundStream, OutboundMessage, Transport};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use serde_json::Value;
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc},
};
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message as WsMessage,
};
use tracing::{Instrument, debug, info, info_span, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Frames buffered between the socket reader and the message handler.
const INBOUND_BUFFER: usize = 256;

/// The sending half of the agent websocket.
///
/// Sends from concurrent tasks are serialized by the sink mutex.
pub struct WsTransport {
    sink: Mutex<SplitSink<WsStream, WsMessage>>,
}

impl WsTransport {
    /// Sends a close frame to the agent.
    pub async fn close(&self) -> Result<()> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .context("Failed to close the agent websocket")
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, message: OutboundMessage) -> Result<()> {
        let message_type = message.message_type();
        let serialized = serde_json::to_string(&message)?;
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(serialized.into()))
            .await
            .with_context(|| format!("Failed to send `{message_type}`"))?;
        debug!(message_type, "Sent message to agent.");
        Ok(())
    }
}

/// Opens the websocket at `url`.
///
/// Returns the sending half and a stream of decoded inbound frames. A reader
/// task drains the socket until the agent closes it or a read fails.
pub async fn connect(url: &str) -> Result<(WsTransport, InboundStream), ConnectError> {
    let (ws_stream, response) = connect_async(url).await?;
    info!(status = %response.status(), "Connected to agent websocket.");

    let (sink, stream) = ws_stream.split();
    let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
    tokio::spawn(read_frames(stream, tx).instrument(info_span!("ws_reader")));

    Ok((
        WsTransport {
            sink: Mutex::new(sink),
        },
        Box::pin(ReceiverStream::new(rx)),
    ))
}

async fn read_frames(mut stream: SplitStream<WsStream>, tx: mpsc::Sender<Result<Value>>) {
    while let Some(frame) = stream.next().await {
        let item = match frame {
            Ok(WsMessage::Text(text)) => {
                serde_json::from_str(&text).context("Agent sent a text frame that is not JSON")
            }
            Ok(WsMessage::Binary(data)) => {
                serde_json::from_slice(&data).context("Agent sent a binary frame that is not JSON")
            }
            Ok(WsMessage::Close(close_frame)) => {
                info!(?close_frame, "Agent closed the websocket.");
                break;
            }
            // Control frames are answered by tungstenite itself.
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "Error reading from agent websocket.");
                let _ = tx
                    .send(Err(anyhow::Error::new(e).context("Websocket read failed")))
                    .await;
                break;
            }
        };
        if tx.send(item).await.is_err() {
            debug!("Inbound receiver dropped; stopping websocket reader.");
            break;
        }
    }
    debug!("Websocket reader finished.");
}
