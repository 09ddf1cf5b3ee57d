//! Fragment streams built on top of a response body

use std::pin::Pin;

use async_stream::stream;
use futures::StreamExt;
use tokio_stream::Stream;

use crate::error::{Error, Result};
use crate::frames::FrameDecoder;

/// A stream of reply text fragments in arrival order.
///
/// Fragments carry no alignment guarantee: a tag, fence or word may be split
/// across any number of them. A transport fault is yielded once as `Err`
/// and ends the stream.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Pipe a streaming response body through a frame decoder.
pub fn decode_body<D>(response: reqwest::Response, decoder: D) -> FragmentStream
where
    D: FrameDecoder + 'static,
{
    decode_chunks(response.bytes_stream(), decoder)
}

/// Decode any stream of byte chunks.
pub fn decode_chunks<S, B, E, D>(chunks: S, mut decoder: D) -> FragmentStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
    D: FrameDecoder + 'static,
{
    Box::pin(stream! {
        let mut chunks = Box::pin(chunks);
        while let Some(chunk) = chunks.next().await {
            match chunk {
                Ok(bytes) => {
                    for fragment in decoder.feed(bytes.as_ref()) {
                        yield Ok(fragment);
                    }
                }
                Err(e) => {
                    tracing::warn!("Response body failed: {}", e);
                    yield Err(Error::Stream(e.to_string()));
                    return;
                }
            }
        }
        for fragment in decoder.finish() {
            yield Ok(fragment);
        }
    })
}
