//! Asynchronous command bodies
//!
//! `health` and `chat` talk to the backend, so the dispatcher hands them back
//! as a [`Job`] instead of running them inline. A job reports through a
//! [`JobSink`]: text for the transcript as it becomes available, then exactly
//! one [`JobEvent::Finished`], sent when the sink is dropped. That holds on
//! every exit path, including the task being aborted.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::{error_line, info_line, output_line, GREEN, RESET};
use crate::core::printable::PrintableFilter;
use crate::net::backend::{Backend, BackendError, ChatRequest, HealthStatus};
use crate::net::stream::{self, await_or_cancel, CancellationSignal};

const SERVER_KEY_CONFIGURED: &str =
    "Server API key is configured. You can use chat without setting your own key.";
const SERVER_KEY_MISSING: &str =
    "No server API key detected. You will need to set your own key with the setkey command.";
const KEY_NOT_SET: &str = "Error: API key not set. Use \"setkey <your_api_key>\" first.";
const PROBE_FAILED: &str =
    "Error checking server status. Use \"setkey <your_api_key>\" to set your own key.";

/// Backend work handed back by the dispatcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    Health,
    Chat {
        message: String,
        /// Local credential at dispatch time; `None` means rely on the server's
        credential: Option<String>,
    },
}

impl Job {
    /// Whether the session was marked busy for this job
    pub fn holds_busy(&self) -> bool {
        matches!(self, Job::Chat { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Job::Health => "health",
            Job::Chat { .. } => "chat",
        }
    }
}

/// Report from a running job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Text to append to the transcript verbatim
    Output(String),
    /// The job is over; sent exactly once per job
    Finished { releases_busy: bool },
}

/// Everything a job needs besides its own arguments
#[derive(Clone)]
pub struct JobContext {
    pub backend: Arc<dyn Backend>,
    pub developer_message: String,
    pub cancel: CancellationSignal,
}

/// Output side of one job
pub struct JobSink {
    tx: UnboundedSender<JobEvent>,
    cancel: CancellationSignal,
    releases_busy: bool,
}

impl JobSink {
    pub fn new(tx: UnboundedSender<JobEvent>, cancel: CancellationSignal, job: &Job) -> Self {
        Self {
            tx,
            cancel,
            releases_busy: job.holds_busy(),
        }
    }

    /// Append raw text. Dropped once cancellation has been requested.
    pub fn text(&self, text: impl Into<String>) {
        if stream::is_cancelled(Some(&self.cancel)) {
            return;
        }
        // Receiver gone means the terminal was unmounted
        let _ = self.tx.send(JobEvent::Output(text.into()));
    }

    /// Append an already coloured line
    pub fn line(&self, line: String) {
        self.text(line + "\r\n");
    }
}

impl Drop for JobSink {
    fn drop(&mut self) {
        let _ = self.tx.send(JobEvent::Finished {
            releases_busy: self.releases_busy,
        });
    }
}

/// Run `job` to completion, reporting through `sink`
pub async fn run(job: Job, ctx: JobContext, sink: JobSink) {
    debug!("Job started: {}", job.name());
    match job {
        Job::Health => health(&ctx, &sink).await,
        Job::Chat {
            message,
            credential,
        } => chat(&ctx, &sink, message, credential).await,
    }
}

async fn probe(ctx: &JobContext) -> Result<HealthStatus, BackendError> {
    await_or_cancel(ctx.backend.health(), Some(&ctx.cancel)).await?
}

async fn health(ctx: &JobContext, sink: &JobSink) {
    sink.line(info_line("Checking API health..."));

    match probe(ctx).await {
        Ok(status) => {
            sink.line(output_line(&format!("API Status: {}", status.payload)));
            if status.server_key_configured {
                sink.line(output_line(SERVER_KEY_CONFIGURED));
            } else {
                sink.line(info_line(SERVER_KEY_MISSING));
            }
        }
        Err(BackendError::Cancelled) => {}
        Err(e) => {
            warn!("Health check failed: {}", e);
            sink.line(error_line(&format!("Error checking API health: {}", e)));
        }
    }
}

async fn chat(ctx: &JobContext, sink: &JobSink, message: String, credential: Option<String>) {
    if credential.is_none() {
        match probe(ctx).await {
            Ok(status) if status.server_key_configured => {
                debug!("Using server credential");
            }
            Ok(_) => {
                sink.line(error_line(KEY_NOT_SET));
                return;
            }
            Err(BackendError::Cancelled) => return,
            Err(e) => {
                warn!("Credential probe failed: {}", e);
                sink.line(error_line(PROBE_FAILED));
                return;
            }
        }
    }

    sink.line(info_line("Sending message to AI..."));

    let request = ChatRequest {
        developer_message: ctx.developer_message.clone(),
        user_message: message,
        api_key: credential,
    };

    let fragments = match await_or_cancel(ctx.backend.chat(&request), Some(&ctx.cancel)).await {
        Ok(Ok(fragments)) => fragments,
        Ok(Err(e)) | Err(e) => {
            report_chat_error(sink, e);
            return;
        }
    };

    // Reply text may not move the cursor or touch earlier output
    let mut filter = PrintableFilter::new();
    sink.text(GREEN);
    let result = stream::consume(fragments, Some(&ctx.cancel), |text| {
        let text = filter.filter(&text);
        if !text.is_empty() {
            sink.text(normalize_newlines(&text));
        }
    })
    .await;
    if filter.in_sequence() {
        debug!("Reply ended inside a control sequence");
    }
    sink.text(format!("{RESET}\r\n"));

    match result {
        Ok(summary) => info!("Chat response streamed: {} bytes", summary.bytes),
        Err(e) => report_chat_error(sink, e),
    }
}

fn report_chat_error(sink: &JobSink, e: BackendError) {
    if matches!(e, BackendError::Cancelled) {
        return;
    }
    warn!("Chat failed: {}", e);
    sink.line(error_line(&format!("Error: {}", e)));
}

/// Bare `\n` moves down without returning to the first column
fn normalize_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = '\0';
    for ch in text.chars() {
        if ch == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(ch);
        prev = ch;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\nb"), "a\r\nb");
        assert_eq!(normalize_newlines("a\r\nb"), "a\r\nb");
        assert_eq!(normalize_newlines("plain"), "plain");
    }

    #[test]
    fn test_sink_finishes_once_on_drop() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = stream::new_cancellation();
        let job = Job::Chat {
            message: "hi".into(),
            credential: None,
        };
        let sink = JobSink::new(tx, cancel, &job);
        sink.text("x");
        drop(sink);

        assert_eq!(rx.try_recv().unwrap(), JobEvent::Output("x".into()));
        assert_eq!(
            rx.try_recv().unwrap(),
            JobEvent::Finished { releases_busy: true }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sink_silent_after_cancel() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = stream::new_cancellation();
        let sink = JobSink::new(tx, cancel.clone(), &Job::Health);
        cancel.store(true, std::sync::atomic::Ordering::SeqCst);
        sink.line("late".into());
        drop(sink);

        assert_eq!(
            rx.try_recv().unwrap(),
            JobEvent::Finished { releases_busy: false }
        );
    }
}
