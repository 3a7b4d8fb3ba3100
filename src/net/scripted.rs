//! In-memory backend for tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::json;
use tokio::sync::mpsc;

use super::backend::{Backend, BackendError, ChatRequest, FragmentStream, HealthStatus, Result};

enum ChatScript {
    Fragments(Vec<Vec<u8>>),
    Fail(String),
    /// Reply accepted without a body
    NoBody,
    /// Fragments pushed by the test while the stream is open
    Live(Option<mpsc::UnboundedReceiver<Vec<u8>>>),
}

pub struct ScriptedBackend {
    health: std::result::Result<bool, String>,
    chat: Mutex<ChatScript>,
    health_calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new(server_key: bool) -> Self {
        Self {
            health: Ok(server_key),
            chat: Mutex::new(ChatScript::Fragments(Vec::new())),
            health_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            health: Err("connection refused".into()),
            ..Self::new(false)
        }
    }

    pub fn with_fragments(self, parts: &[&[u8]]) -> Self {
        *self.chat.lock().unwrap() = ChatScript::Fragments(parts.iter().map(|p| p.to_vec()).collect());
        self
    }

    pub fn with_chat_error(self, message: &str) -> Self {
        *self.chat.lock().unwrap() = ChatScript::Fail(message.into());
        self
    }

    pub fn without_body(self) -> Self {
        *self.chat.lock().unwrap() = ChatScript::NoBody;
        self
    }

    /// Stream stays open; fragments are pushed through the returned sender
    pub fn live(self) -> (Self, mpsc::UnboundedSender<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.chat.lock().unwrap() = ChatScript::Live(Some(rx));
        (self, tx)
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn health(&self) -> Result<HealthStatus> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        match &self.health {
            Ok(configured) => Ok(HealthStatus::from_payload(
                json!({"status": "ok", "server_api_key_set": configured}),
            )),
            Err(reason) => Err(BackendError::Transport(reason.clone())),
        }
    }

    async fn chat(&self, request: &ChatRequest) -> Result<FragmentStream> {
        self.requests.lock().unwrap().push(request.clone());
        let mut script = self.chat.lock().unwrap();
        match &mut *script {
            ChatScript::Fragments(parts) => {
                Ok(Box::pin(stream::iter(parts.clone().into_iter().map(Ok))))
            }
            ChatScript::Fail(reason) => Err(BackendError::Transport(reason.clone())),
            ChatScript::NoBody => Err(BackendError::MissingBody),
            ChatScript::Live(rx) => {
                let rx = rx.take().ok_or(BackendError::MissingBody)?;
                Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|part| (Ok(part), rx))
                })))
            }
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
