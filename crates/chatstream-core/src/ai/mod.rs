//! Chat-completion streaming
//!
//! - `sse`: byte/text chunks to protocol events
//! - `streaming`: handler set and cancellable stream handle
//! - `client`: HTTP request building, read loop, aggregation

pub mod client;
pub mod sse;
pub mod streaming;
pub mod types;
