//! HTTP backend over reqwest

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::backend::{Backend, BackendError, ChatRequest, FragmentStream, HealthStatus, Result};
use crate::config::Config;

pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, Client::builder().build()?)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Self::with_client(&config.api_base_url, builder.build()?)
    }

    fn with_client(base_url: &str, http: Client) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        info!("Backend endpoint: {}", base_url);
        Ok(Self { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn health(&self) -> Result<HealthStatus> {
        let resp = self.http.get(self.url("health")).send().await?;

        let status = resp.status();
        if !status.is_success() {
            warn!("Health probe returned {}", status);
            return Err(BackendError::Status(status.as_u16()));
        }

        let payload: Value = resp
            .json()
            .await
            .map_err(|e| BackendError::InvalidPayload(e.to_string()))?;
        Ok(HealthStatus::from_payload(payload))
    }

    async fn chat(&self, request: &ChatRequest) -> Result<FragmentStream> {
        debug!(
            "POST chat: {} chars, own key: {}",
            request.user_message.len(),
            request.api_key.is_some()
        );
        let resp = self.http.post(self.url("chat")).json(request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            warn!("Chat request returned {}", status);
            return Err(BackendError::Status(status.as_u16()));
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Err(BackendError::MissingBody);
        }

        let fragments = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(BackendError::from));
        Ok(Box::pin(fragments))
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
