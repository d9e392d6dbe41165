//! Signed conversation URLs for agents that require authentication.

use crate::error::ConnectError;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, instrument};

#[derive(Deserialize, Debug)]
struct SignedUrlResponse {
    signed_url: String,
}

/// Asks the REST API for a short-lived websocket URL for `agent_id`.
#[instrument(skip(http, api_key))]
pub async fn fetch_signed_url(
    http: &reqwest::Client,
    api_base: &str,
    agent_id: &str,
    api_key: &SecretString,
) -> Result<String, ConnectError> {
    let endpoint = format!(
        "{}/v1/convai/conversation/get-signed-url",
        api_base.trim_end_matches('/')
    );
    let url = Url::parse_with_params(&endpoint, &[("agent_id", agent_id)])
        .map_err(|e| ConnectError::InvalidUrl(format!("{endpoint}: {e}")))?;

    let response = http
        .get(url)
        .header("xi-api-key", api_key.expose_secret())
        .send()
        .await?
        .error_for_status()?;
    let body: SignedUrlResponse = response.json().await?;
    debug!("Obtained signed conversation URL.");
    Ok(body.signed_url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// Serves a single HTTP response and hands back the raw request it received.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (base, handle)
    }

    #[tokio::test]
    async fn test_fetch_signed_url() {
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"signed_url": "wss://api.example.test/v1/convai/conversation?conversation_signature=sig"}"#,
        )
        .await;

        let key = SecretString::from("test-key".to_string());
        let url = fetch_signed_url(&local_client(), &base, "agent_42", &key)
            .await
            .unwrap();
        assert_eq!(
            url,
            "wss://api.example.test/v1/convai/conversation?conversation_signature=sig"
        );

        let request = server.await.unwrap();
        assert!(request.starts_with(
            "GET /v1/convai/conversation/get-signed-url?agent_id=agent_42 HTTP/1.1"
        ));
        assert!(request.to_lowercase().contains("xi-api-key: test-key"));
    }

    #[tokio::test]
    async fn test_fetch_signed_url_http_error() {
        let (base, server) =
            serve_once("HTTP/1.1 401 Unauthorized", r#"{"detail": "invalid key"}"#).await;

        let key = SecretString::from("bad-key".to_string());
        let err = fetch_signed_url(&local_client(), &base, "agent_42", &key)
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectError::SignedUrl(_)));
        server.await.unwrap();
    }
}
