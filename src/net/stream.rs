//! Streamed response consumption
//!
//! Body fragments arrive with arbitrary boundaries. One decoder lives for the
//! whole stream so multi-byte characters split across fragments come out
//! whole, and decoded text is handed on as soon as it is available.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::debug;

use super::backend::{BackendError, FragmentStream, Result};
use crate::core::decoder::Utf8StreamDecoder;

/// Shared flag; once set, in-flight requests stop at the next await point
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

pub fn new_cancellation() -> CancellationSignal {
    Arc::new(AtomicBool::new(false))
}

pub fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::SeqCst))
}

/// Await `future`, giving up as soon as the signal is raised
pub async fn await_or_cancel<F>(future: F, cancel: Option<&CancellationSignal>) -> Result<F::Output>
where
    F: Future,
{
    if cancel.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);
    loop {
        if is_cancelled(cancel) {
            return Err(BackendError::Cancelled);
        }
        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancel) {
                return Err(BackendError::Cancelled);
            }
            return Ok(output);
        }
    }
}

/// Totals for a finished stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub fragments: usize,
    pub bytes: usize,
}

/// Drain `stream`, passing decoded text to `on_text` in arrival order.
///
/// Text decoded before a transport error has already been delivered when the
/// error is returned. Nothing is delivered after cancellation.
pub async fn consume<F>(
    mut stream: FragmentStream,
    cancel: Option<&CancellationSignal>,
    mut on_text: F,
) -> Result<StreamSummary>
where
    F: FnMut(String),
{
    let mut decoder = Utf8StreamDecoder::new();
    let mut summary = StreamSummary::default();

    while let Some(fragment) = await_or_cancel(stream.next(), cancel).await? {
        let fragment = match fragment {
            Ok(fragment) => fragment,
            Err(e) => {
                flush(&mut decoder, &mut on_text);
                return Err(e);
            }
        };
        summary.fragments += 1;
        summary.bytes += fragment.len();

        let text = decoder.decode(&fragment);
        if !text.is_empty() {
            on_text(text);
        }
    }

    flush(&mut decoder, &mut on_text);
    debug!(
        "Stream finished: {} fragments, {} bytes",
        summary.fragments, summary.bytes
    );
    Ok(summary)
}

fn flush<F: FnMut(String)>(decoder: &mut Utf8StreamDecoder, on_text: &mut F) {
    if decoder.has_pending() {
        debug!("Stream ended inside a multi-byte sequence");
    }
    let tail = decoder.finish();
    if !tail.is_empty() {
        on_text(tail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn fragments(parts: Vec<Vec<u8>>) -> FragmentStream {
        Box::pin(stream::iter(parts.into_iter().map(Ok)))
    }

    async fn collect(stream: FragmentStream) -> (String, Result<StreamSummary>) {
        let mut out = String::new();
        let result = consume(stream, None, |text| out.push_str(&text)).await;
        (out, result)
    }

    #[tokio::test]
    async fn test_fragments_accumulate_in_order() {
        let parts = ["Hel", "lo, ", "Mr. A", "nderson"]
            .iter()
            .map(|s| s.as_bytes().to_vec())
            .collect();
        let (out, result) = collect(fragments(parts)).await;
        assert_eq!(out, "Hello, Mr. Anderson");
        assert_eq!(result.unwrap(), StreamSummary { fragments: 4, bytes: 19 });
    }

    #[tokio::test]
    async fn test_split_multibyte_character() {
        let bytes = "Wake up, Neo… 🐇".as_bytes();
        let ellipsis = bytes.iter().position(|&b| b == 0xE2).unwrap();
        let parts = vec![
            bytes[..ellipsis + 1].to_vec(),
            bytes[ellipsis + 1..ellipsis + 2].to_vec(),
            bytes[ellipsis + 2..bytes.len() - 2].to_vec(),
            bytes[bytes.len() - 2..].to_vec(),
        ];
        let (out, result) = collect(fragments(parts)).await;
        assert!(result.is_ok());
        assert_eq!(out, "Wake up, Neo… 🐇");
        assert!(!out.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_error_mid_stream_keeps_delivered_text() {
        let parts: Vec<Result<Vec<u8>>> = vec![
            Ok(b"partial ".to_vec()),
            Err(BackendError::Transport("connection reset".into())),
            Ok(b"never".to_vec()),
        ];
        let (out, result) = collect(Box::pin(stream::iter(parts))).await;
        assert_eq!(out, "partial ");
        assert_eq!(result.unwrap_err().to_string(), "connection reset");
    }

    #[tokio::test]
    async fn test_cancel_stops_delivery() {
        let cancel = new_cancellation();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<Vec<u8>>>();
        let stream: FragmentStream = Box::pin(receiver_stream(rx));

        tx.send(Ok(b"first".to_vec())).unwrap();

        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        let sink = seen.clone();
        let flag = cancel.clone();
        let task = tokio::spawn(async move {
            consume(stream, Some(&flag), move |text| sink.lock().unwrap().push_str(&text)).await
        });

        tokio::time::sleep(Duration::from_millis(60)).await;
        cancel.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(60)).await;
        let _ = tx.send(Ok(b"late".to_vec()));

        let result = task.await.unwrap();
        assert!(matches!(result, Err(BackendError::Cancelled)));
        assert_eq!(*seen.lock().unwrap(), "first");
    }

    fn receiver_stream<T: Send + 'static>(
        rx: tokio::sync::mpsc::UnboundedReceiver<T>,
    ) -> impl futures_util::Stream<Item = T> + Send {
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
    }
}
