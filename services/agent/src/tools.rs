//! Client tools offered to the agent by the console app.

use anyhow::{Result, bail};
use convai_core::{ToolRegistry, ToolResult};
use serde_json::{Map, Value, json};
use tracing::info;

pub const GET_TIME: &str = "get_time";
pub const LOG_MESSAGE: &str = "log_message";

pub fn default_registry() -> ToolRegistry {
    ToolRegistry::new()
        .with_fn(GET_TIME, |_parameters| async { get_time() })
        .with_fn(LOG_MESSAGE, |parameters| async move { log_message(&parameters) })
}

/// Local wall-clock time as `{"time": "HH:MM"}`.
fn get_time() -> Result<ToolResult> {
    let now = chrono::Local::now();
    Ok(Some(json!({ "time": now.format("%H:%M").to_string() })))
}

/// Logs the `message` parameter. Fire-and-forget: the agent gets no reply.
fn log_message(parameters: &Map<String, Value>) -> Result<ToolResult> {
    let Some(message) = parameters.get("message").and_then(Value::as_str) else {
        bail!("`message` parameter is missing or not a string");
    };
    info!(message, "Agent asked to log a message.");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_registry_names() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec![GET_TIME, LOG_MESSAGE]);
    }

    #[tokio::test]
    async fn test_get_time_format() {
        let tool = default_registry().get(GET_TIME).unwrap();
        let result = tool.execute(Map::new()).await.unwrap().unwrap();

        let time = result["time"].as_str().unwrap();
        assert_eq!(time.len(), 5);
        assert!(chrono::NaiveTime::parse_from_str(time, "%H:%M").is_ok());
    }

    #[tokio::test]
    async fn test_log_message_is_fire_and_forget() {
        let tool = default_registry().get(LOG_MESSAGE).unwrap();

        let mut parameters = Map::new();
        parameters.insert("message".to_string(), json!("hello"));
        assert!(tool.execute(parameters).await.unwrap().is_none());

        let err = tool.execute(Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("message"));
    }
}
