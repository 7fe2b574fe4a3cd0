//! Streaming read loop
//!
//! One spawned task per stream owns the response body, the frame decoder and
//! the handlers. The body is released exactly once on every exit path.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::core::{handle_error_response, ChatClient};
use crate::ai::sse::{FrameDecoder, SseEvent};
use crate::ai::streaming::{StreamHandle, StreamHandlers};
use crate::ai::types::ChatRequest;
use crate::cancellation::StreamCancellation;
use crate::error::{StreamError, ValidationError};

impl ChatClient {
    /// Start a streaming chat completion.
    ///
    /// Validation happens here, synchronously, before any network I/O. Must be
    /// called from within a tokio runtime.
    pub fn start_stream(
        &self,
        request: ChatRequest,
        handlers: StreamHandlers,
    ) -> Result<StreamHandle, ValidationError> {
        self.start_stream_with_signal(request, handlers, None)
    }

    /// Like [`ChatClient::start_stream`], also honoring an external cancellation
    /// signal (which may already be cancelled).
    pub fn start_stream_with_signal(
        &self,
        request: ChatRequest,
        handlers: StreamHandlers,
        signal: Option<&CancellationToken>,
    ) -> Result<StreamHandle, ValidationError> {
        let builder = self.build_request(&request)?;
        let cancellation = StreamCancellation::from_signal(signal);
        let token = cancellation.token().clone();

        info!(
            "Chat stream starting: model={}, {} messages",
            self.resolve_model(&request),
            request.messages.len()
        );

        let open = async move {
            let response = builder.send().await?;
            let response = handle_error_response(response).await?;
            Ok::<_, StreamError>(Box::pin(response.bytes_stream()))
        };

        let task = tokio::spawn(run_stream(open, handlers, token));
        Ok(StreamHandle::new(cancellation, task))
    }
}

/// Open the body, pump it, and dispatch the terminal handler
pub(crate) async fn run_stream<F, S, E>(
    open: F,
    mut handlers: StreamHandlers,
    token: CancellationToken,
) -> Result<(), StreamError>
where
    F: Future<Output = Result<S, StreamError>>,
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let started = Instant::now();

    let outcome = match await_response(open, &token).await {
        Ok(body) => pump(body, &mut handlers, &token).await,
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(()) => info!("Chat stream finished after {:?}", started.elapsed()),
        Err(StreamError::Cancelled) => {
            info!("Chat stream cancelled after {:?}", started.elapsed())
        }
        Err(err) => {
            warn!("Chat stream failed after {:?}: {}", started.elapsed(), err);
            handlers.error(err);
        }
    }

    outcome
}

async fn await_response<F, S>(open: F, token: &CancellationToken) -> Result<S, StreamError>
where
    F: Future<Output = Result<S, StreamError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StreamError::Cancelled),
        opened = open => opened,
    }
}

/// Read chunks until the terminator, end of body, an error, or cancellation
pub(crate) async fn pump<S, E>(
    body: S,
    handlers: &mut StreamHandlers,
    token: &CancellationToken,
) -> Result<(), StreamError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut transport = TransportHandle::new(body);
    let mut decoder = FrameDecoder::new();
    let mut bytes_received = 0usize;
    let mut delta_count = 0usize;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            chunk = transport.next_chunk() => Some(chunk),
        };
        let Some(chunk) = chunk else {
            transport.release();
            return Err(StreamError::Cancelled);
        };

        let bytes = match chunk {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                transport.release();
                return Err(StreamError::Transport(e.to_string()));
            }
            None => {
                transport.release();
                info!(
                    "Chat stream ended without [DONE]: {} deltas, {} bytes",
                    delta_count, bytes_received
                );
                handlers.done();
                return Ok(());
            }
        };

        bytes_received += bytes.len();
        debug!(
            "SSE chunk received: {} bytes (total: {} bytes)",
            bytes.len(),
            bytes_received
        );

        for event in decoder.feed(&bytes) {
            // Cooperative: a handler may have cancelled while we dispatched
            if token.is_cancelled() {
                transport.release();
                return Err(StreamError::Cancelled);
            }
            match event {
                SseEvent::Delta(text) => {
                    delta_count += 1;
                    handlers.delta(&text);
                }
                SseEvent::Done => {
                    transport.release();
                    info!(
                        "SSE stream [DONE] marker received: {} deltas, {} bytes",
                        delta_count, bytes_received
                    );
                    handlers.done();
                    return Ok(());
                }
            }
        }
    }
}

/// Exclusive owner of the response body
struct TransportHandle<S> {
    body: Option<S>,
}

impl<S> TransportHandle<S> {
    fn new(body: S) -> Self {
        Self { body: Some(body) }
    }

    /// Drop the body. A second call is a no-op.
    fn release(&mut self) {
        if let Some(body) = self.body.take() {
            drop(body);
            debug!("Chat stream transport released");
        }
    }
}

impl<S: Stream + Unpin> TransportHandle<S> {
    async fn next_chunk(&mut self) -> Option<S::Item> {
        match self.body.as_mut() {
            Some(body) => body.next().await,
            None => None,
        }
    }
}

impl<S> Drop for TransportHandle<S> {
    fn drop(&mut self) {
        self.release();
    }
}
