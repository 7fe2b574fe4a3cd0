//! Cancellation support for chat streams
//!
//! Allows interrupting a stream before its response arrives or mid-body.

use tokio_util::sync::CancellationToken;

/// Wrapper around CancellationToken for one stream
#[derive(Debug, Clone)]
pub struct StreamCancellation {
    token: CancellationToken,
}

impl StreamCancellation {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Derive from an optional caller-supplied signal.
    ///
    /// The result is cancelled whenever the signal is, including when the signal
    /// was already cancelled. Cancelling the result never touches the signal.
    pub fn from_signal(signal: Option<&CancellationToken>) -> Self {
        match signal {
            Some(parent) => Self {
                token: parent.child_token(),
            },
            None => Self::new(),
        }
    }

    /// Cancel the stream. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Default for StreamCancellation {
    fn default() -> Self {
        Self::new()
    }
}
