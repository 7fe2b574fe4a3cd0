//! Aggregated (single-string) completions on top of the stream
//!
//! Used where incremental delivery is not needed.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::core::ChatClient;
use crate::ai::streaming::{StreamHandle, StreamHandlers};
use crate::ai::types::ChatRequest;
use crate::error::StreamError;

type Settle = Arc<Mutex<Option<oneshot::Sender<Result<String, StreamError>>>>>;

impl ChatClient {
    /// Stream a completion and return the concatenated deltas.
    ///
    /// Cancellation, through `signal` (even one already cancelled), surfaces
    /// as `Err(StreamError::Cancelled)`, never as a truncated string.
    /// Dropping the returned future (e.g. on a timeout) cancels the stream.
    pub async fn complete_aggregated(
        &self,
        request: ChatRequest,
        signal: Option<&CancellationToken>,
    ) -> Result<String, StreamError> {
        let (handlers, settled) = aggregate_handlers();
        let handle = self.start_stream_with_signal(request, handlers, signal)?;

        if signal.is_some_and(|s| s.is_cancelled()) {
            handle.cancel();
        }

        collect(handle, settled).await
    }
}

/// Wait for the stream and its settled result, cancelling the stream if dropped first
async fn collect(
    handle: StreamHandle,
    settled: oneshot::Receiver<Result<String, StreamError>>,
) -> Result<String, StreamError> {
    let _cancel_on_drop = handle.cancel_token().drop_guard();
    let completion = handle.completion().await;
    settle_outcome(settled, completion).await
}

/// Handlers that append deltas, resolve on done, reject on error
fn aggregate_handlers() -> (StreamHandlers, oneshot::Receiver<Result<String, StreamError>>) {
    let (tx, rx) = oneshot::channel();
    let settle: Settle = Arc::new(Mutex::new(Some(tx)));
    let output = Arc::new(Mutex::new(String::new()));

    let sink = Arc::clone(&output);
    let on_done = Arc::clone(&settle);
    let on_error = settle;

    let handlers = StreamHandlers::new()
        .on_delta(move |delta| sink.lock().push_str(delta))
        .on_done(move || {
            let text = std::mem::take(&mut *output.lock());
            if let Some(tx) = on_done.lock().take() {
                let _ = tx.send(Ok(text));
            }
        })
        .on_error(move |err| {
            if let Some(tx) = on_error.lock().take() {
                let _ = tx.send(Err(err.clone()));
            }
        });

    (handlers, rx)
}

/// Result settled by the handlers; when neither fired, the stream's own outcome
async fn settle_outcome(
    settled: oneshot::Receiver<Result<String, StreamError>>,
    completion: Result<(), StreamError>,
) -> Result<String, StreamError> {
    match settled.await {
        Ok(result) => result,
        Err(_) => Err(completion.err().unwrap_or(StreamError::Cancelled)),
    }
}
