//! Streaming handlers and the handle returned to callers

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cancellation::StreamCancellation;
use crate::error::StreamError;

type DeltaHandler = Box<dyn FnMut(&str) + Send>;
type DoneHandler = Box<dyn FnOnce() + Send>;
type ErrorHandler = Box<dyn FnOnce(&StreamError) + Send>;

/// Optional callbacks invoked from the stream's read loop.
///
/// Deltas arrive in stream order. At most one of `on_done` / `on_error` fires,
/// and nothing fires after it. A panicking handler is caught and logged.
#[derive(Default)]
pub struct StreamHandlers {
    on_delta: Option<DeltaHandler>,
    on_done: Option<DoneHandler>,
    on_error: Option<ErrorHandler>,
    terminated: bool,
}

impl StreamHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_delta(mut self, f: impl FnMut(&str) + Send + 'static) -> Self {
        self.on_delta = Some(Box::new(f));
        self
    }

    pub fn on_done(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_done = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&StreamError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn delta(&mut self, text: &str) {
        if self.terminated {
            return;
        }
        if let Some(handler) = self.on_delta.as_mut() {
            isolate("on_delta", || handler(text));
        }
    }

    pub(crate) fn done(&mut self) {
        if !self.terminate() {
            return;
        }
        if let Some(handler) = self.on_done.take() {
            isolate("on_done", handler);
        }
    }

    pub(crate) fn error(&mut self, err: &StreamError) {
        if !self.terminate() {
            return;
        }
        if let Some(handler) = self.on_error.take() {
            isolate("on_error", || handler(err));
        }
    }

    /// Returns false if a terminal handler already ran
    fn terminate(&mut self) -> bool {
        if self.terminated {
            return false;
        }
        self.terminated = true;
        self.on_delta = None;
        true
    }
}

impl std::fmt::Debug for StreamHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandlers")
            .field("on_delta", &self.on_delta.is_some())
            .field("on_done", &self.on_done.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("terminated", &self.terminated)
            .finish()
    }
}

fn isolate(name: &str, f: impl FnOnce()) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!("Stream handler {} panicked: {}", name, message);
    }
}

/// Handle to one in-flight stream
#[derive(Debug)]
pub struct StreamHandle {
    cancellation: StreamCancellation,
    task: JoinHandle<Result<(), StreamError>>,
}

impl StreamHandle {
    pub(crate) fn new(
        cancellation: StreamCancellation,
        task: JoinHandle<Result<(), StreamError>>,
    ) -> Self {
        Self { cancellation, task }
    }

    /// Cancel the stream.
    ///
    /// Safe to call any number of times, before the response arrives, or after
    /// the stream already finished (then it has no effect).
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Token that cancels this stream, for use from another task
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancellation.token().clone()
    }

    /// Whether the stream reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the terminal state.
    ///
    /// `Ok(())` after completion, `Err(StreamError::Cancelled)` after
    /// cancellation, the terminal error otherwise.
    pub async fn completion(self) -> Result<(), StreamError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => Err(StreamError::Cancelled),
            Err(e) => Err(StreamError::Internal(e.to_string())),
        }
    }
}
