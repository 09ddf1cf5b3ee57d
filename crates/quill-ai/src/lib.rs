//! quill-ai: Streaming chat transport
//!
//! This crate sends a message list to a chat endpoint and hands the reply
//! back as a stream of text fragments, hiding whether the endpoint speaks
//! server-sent events or binary event-stream frames.

pub mod error;
pub mod frames;
pub mod providers;
pub mod stream;
pub mod types;

pub use error::{Error, Result};
pub use stream::FragmentStream;
pub use types::*;
