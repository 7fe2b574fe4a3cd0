//! chatstream core
//!
//! - Incremental SSE frame decoding for chat-completion streams
//! - Cancellable, callback-driven streaming client
//! - Aggregated single-string completions
//! - Explicit client configuration (TOML file + injected environment)

pub mod ai;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod text;

pub use ai::client::ChatClient;
pub use ai::sse::{split_frames, FrameDecoder, RawEvent, SseEvent};
pub use ai::streaming::{StreamHandle, StreamHandlers};
pub use ai::types::{ChatMessage, ChatRequest, Role, StopSequences};
pub use cancellation::StreamCancellation;
pub use config::ClientConfig;
pub use error::{StreamError, ValidationError};
pub use text::strip_code_fence;
