//! Backend collaborator interface
//!
//! The terminal talks to a chat backend through two calls: a health probe and
//! a streamed chat request. The trait keeps the command layer independent of
//! the HTTP client so it can be driven by a scripted backend in tests.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("Request failed with status code {0}")]
    Status(u16),

    #[error("No response body")]
    MissingBody,

    #[error("Invalid health payload: {0}")]
    InvalidPayload(String),

    #[error("Request cancelled")]
    Cancelled,

    /// Transport failure reported by a non-HTTP backend
    #[error("{0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Body fragments of a streamed response, in arrival order
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Health probe result
#[derive(Debug, Clone, PartialEq)]
pub struct HealthStatus {
    /// Payload exactly as returned
    pub payload: Value,
    /// Whether the server holds its own API key
    pub server_key_configured: bool,
}

impl HealthStatus {
    pub fn from_payload(payload: Value) -> Self {
        let server_key_configured = payload
            .get("server_api_key_set")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Self {
            payload,
            server_key_configured,
        }
    }
}

/// Chat request body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub developer_message: String,
    pub user_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET {base}/health`
    async fn health(&self) -> Result<HealthStatus>;

    /// `POST {base}/chat`; resolves once headers arrive, body follows as a stream
    async fn chat(&self, request: &ChatRequest) -> Result<FragmentStream>;

    /// Human-readable endpoint, shown in the banner
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_health_flag_derived_from_payload() {
        let status = HealthStatus::from_payload(json!({"status": "ok", "server_api_key_set": true}));
        assert!(status.server_key_configured);

        let status = HealthStatus::from_payload(json!({"status": "ok"}));
        assert!(!status.server_key_configured);
    }

    #[test]
    fn test_chat_request_omits_missing_key() {
        let request = ChatRequest {
            developer_message: "sys".into(),
            user_message: "hi".into(),
            api_key: None,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body, json!({"developer_message": "sys", "user_message": "hi"}));

        let request = ChatRequest {
            api_key: Some("sk-1".into()),
            ..request
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["api_key"], "sk-1");
    }
}
