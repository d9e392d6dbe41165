use thiserror::Error;

/// Failures while locating or opening the agent's websocket.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),
    #[error("Signed URL request failed: {0}")]
    SignedUrl(#[from] reqwest::Error),
    #[error("Websocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),
}
