//! Chat-completion client
//!
//! - `core`: client, endpoint and request building, error responses
//! - `stream`: the cancellable streaming read loop
//! - `aggregate`: single-string completions built on the stream

mod aggregate;
mod core;
mod stream;

pub use self::core::ChatClient;
