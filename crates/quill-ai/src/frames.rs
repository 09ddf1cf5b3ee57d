//! Wire-frame decoders that turn raw response bytes into text fragments.
//!
//! Two encodings are supported behind one [`FrameDecoder`] interface:
//!
//! - [`SseDecoder`]: line-delimited server-sent events whose `data:` lines
//!   carry OpenAI-style chat completion chunks.
//! - [`EventStreamDecoder`]: length-prefixed binary frames (the AWS
//!   event-stream encoding used by Bedrock `converse-stream`).
//!
//! Both decoders buffer raw bytes, so a multi-byte character or a frame
//! split across network reads is completed by the next `feed` call.

use serde_json::Value;
use tracing::{debug, warn};

/// Incremental decoder from body bytes to text fragments.
pub trait FrameDecoder: Send {
    /// Feed arbitrary bytes and drain every fragment that is now complete.
    fn feed(&mut self, bytes: &[u8]) -> Vec<String>;

    /// Flush whatever the body left behind once it has ended.
    fn finish(&mut self) -> Vec<String>;
}

/// Decoder for `data:`-prefixed server-sent event lines.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameDecoder for SseDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut fragments = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(fragment) = parse_data_line(&line) {
                fragments.push(fragment);
            }
        }

        fragments
    }

    fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        parse_data_line(&line).into_iter().collect()
    }
}

/// Extract the content delta from one SSE line.
///
/// Returns `None` for lines that carry no data (comments, `event:` fields,
/// blank keep-alives, the `[DONE]` sentinel). A data line that fails to
/// parse yields an empty fragment rather than an error.
fn parse_data_line(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix("data:")?.trim_start();

    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }

    let text = serde_json::from_str::<Value>(payload)
        .ok()
        .and_then(|value| {
            value
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str)
                .map(str::to_owned)
        });

    if text.is_none() {
        debug!("SSE data line without content delta");
    }

    Some(text.unwrap_or_default())
}

/// Bytes before the header block: total length, header length, prelude CRC.
const PRELUDE_LEN: usize = 12;
/// Prelude plus the trailing message CRC.
const MIN_FRAME_LEN: usize = PRELUDE_LEN + 4;
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Event type whose payload carries a text delta.
const CONTENT_DELTA_EVENT: &str = "contentBlockDelta";

/// Decoder for binary event-stream frames.
///
/// Frame layout: `total_len: u32 BE`, `headers_len: u32 BE`,
/// `prelude_crc: u32`, header block, JSON payload, `message_crc: u32`.
/// Checksums are not verified.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buffer: Vec<u8>,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameDecoder for EventStreamDecoder {
    fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut fragments = Vec::new();

        while let Some(total) = read_u32(&self.buffer, 0) {
            let total = total as usize;
            if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&total) {
                warn!(
                    "Dropping {} buffered bytes: implausible frame length {}",
                    self.buffer.len(),
                    total
                );
                self.buffer.clear();
                break;
            }
            if self.buffer.len() < total {
                break;
            }

            let frame: Vec<u8> = self.buffer.drain(..total).collect();
            if let Some(text) = decode_frame(&frame) {
                fragments.push(text);
            }
        }

        fragments
    }

    fn finish(&mut self) -> Vec<String> {
        if !self.buffer.is_empty() {
            debug!("Discarding {} bytes of a partial frame", self.buffer.len());
            self.buffer.clear();
        }
        Vec::new()
    }
}

/// Decode one complete frame; `None` for malformed or irrelevant frames.
fn decode_frame(frame: &[u8]) -> Option<String> {
    let headers_len = read_u32(frame, 4)? as usize;
    let headers_end = PRELUDE_LEN.checked_add(headers_len)?;
    let payload_end = frame.len().checked_sub(4)?;
    if headers_end > payload_end {
        warn!("Dropping frame: header block overruns frame");
        return None;
    }

    let Some(headers) = parse_headers(&frame[PRELUDE_LEN..headers_end]) else {
        warn!("Dropping frame: malformed header block");
        return None;
    };

    let event_type = headers
        .iter()
        .find(|(name, _)| name == ":event-type")
        .and_then(|(_, value)| value.as_deref())?;
    if event_type != CONTENT_DELTA_EVENT {
        debug!("Skipping {} frame", event_type);
        return None;
    }

    let payload: Value = match serde_json::from_slice(&frame[headers_end..payload_end]) {
        Ok(v) => v,
        Err(e) => {
            warn!("Dropping frame: bad payload: {}", e);
            return None;
        }
    };

    payload
        .pointer("/delta/text")
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Parse `name_len: u8, name, type: u8, value` triples.
///
/// Only string values are kept; every other type is skipped by its
/// encoded width.
fn parse_headers(block: &[u8]) -> Option<Vec<(String, Option<String>)>> {
    let mut headers = Vec::new();
    let mut i = 0;

    while i < block.len() {
        let name_len = *block.get(i)? as usize;
        i += 1;
        let name = std::str::from_utf8(block.get(i..i + name_len)?).ok()?.to_owned();
        i += name_len;
        let value_type = *block.get(i)?;
        i += 1;

        let value = match value_type {
            // bool true / bool false
            0 | 1 => None,
            2 => skip(&mut i, 1),
            3 => skip(&mut i, 2),
            4 => skip(&mut i, 4),
            // int64 / timestamp
            5 | 8 => skip(&mut i, 8),
            // byte array / string
            6 | 7 => {
                let len = read_u16(block, i)? as usize;
                i += 2;
                let bytes = block.get(i..i + len)?;
                i += len;
                (value_type == 7).then(|| String::from_utf8_lossy(bytes).into_owned())
            }
            // uuid
            9 => skip(&mut i, 16),
            _ => return None,
        };

        if i > block.len() {
            return None;
        }
        headers.push((name, value));
    }

    Some(headers)
}

fn skip(cursor: &mut usize, width: usize) -> Option<String> {
    *cursor += width;
    None
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn sse_chunk(content: &str) -> String {
        let chunk = serde_json::json!({"choices": [{"delta": {"content": content}}]});
        format!("data: {}\n\n", chunk)
    }

    /// Build an event-stream frame with string headers and zeroed checksums.
    pub(crate) fn frame(headers: &[(&str, &str)], payload: &[u8]) -> Vec<u8> {
        let mut block = Vec::new();
        for (name, value) in headers {
            block.push(name.len() as u8);
            block.extend_from_slice(name.as_bytes());
            block.push(7);
            block.extend_from_slice(&(value.len() as u16).to_be_bytes());
            block.extend_from_slice(value.as_bytes());
        }
        let total = PRELUDE_LEN + block.len() + payload.len() + 4;
        let mut out = Vec::new();
        out.extend_from_slice(&(total as u32).to_be_bytes());
        out.extend_from_slice(&(block.len() as u32).to_be_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&block);
        out.extend_from_slice(payload);
        out.extend_from_slice(&[0; 4]);
        out
    }

    pub(crate) fn delta_frame(text: &str) -> Vec<u8> {
        let payload = serde_json::json!({"contentBlockIndex": 0, "delta": {"text": text}});
        frame(
            &[
                (":event-type", CONTENT_DELTA_EVENT),
                (":content-type", "application/json"),
                (":message-type", "event"),
            ],
            payload.to_string().as_bytes(),
        )
    }

    #[test]
    fn test_sse_single_chunk() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(sse_chunk("Hello").as_bytes());
        assert_eq!(out, vec!["Hello".to_string()]);
    }

    #[test]
    fn test_sse_line_split_across_feeds() {
        let body = format!("{}{}", sse_chunk("Hel"), sse_chunk("lo"));
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        for byte in body.as_bytes() {
            out.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(out.concat(), "Hello");
    }

    #[test]
    fn test_sse_multibyte_char_split() {
        let body = sse_chunk("héllo ✓");
        let bytes = body.as_bytes();
        let mut decoder = SseDecoder::new();
        let mut out = Vec::new();
        for piece in bytes.chunks(3) {
            out.extend(decoder.feed(piece));
        }
        assert_eq!(out.concat(), "héllo ✓");
    }

    #[test]
    fn test_sse_done_and_comments_are_ignored() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b": keep-alive\nevent: message\ndata: [DONE]\n\n");
        assert!(out.is_empty());
    }

    #[test]
    fn test_sse_malformed_json_is_empty_fragment() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b"data: {not json\n");
        assert_eq!(out, vec![String::new()]);
    }

    #[test]
    fn test_sse_role_only_chunk_is_empty_fragment() {
        let mut decoder = SseDecoder::new();
        let out = decoder.feed(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\r\n");
        assert_eq!(out, vec![String::new()]);
    }

    #[test]
    fn test_sse_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        let line = sse_chunk("tail");
        assert!(decoder.feed(line.trim_end().as_bytes()).is_empty());
        assert_eq!(decoder.finish(), vec!["tail".to_string()]);
    }

    #[test]
    fn test_event_stream_single_frame() {
        let mut decoder = EventStreamDecoder::new();
        assert_eq!(decoder.feed(&delta_frame("Hi")), vec!["Hi".to_string()]);
    }

    #[test]
    fn test_event_stream_partial_frames_are_retained() {
        let mut body = delta_frame("Hello, ");
        body.extend(delta_frame("world"));
        let mut decoder = EventStreamDecoder::new();
        let mut out = Vec::new();
        for byte in &body {
            out.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(out, vec!["Hello, ".to_string(), "world".to_string()]);
    }

    #[test]
    fn test_event_stream_skips_other_events() {
        let stop = frame(
            &[(":event-type", "messageStop")],
            br#"{"stopReason":"end_turn"}"#,
        );
        let mut body = stop;
        body.extend(delta_frame("x"));
        let mut decoder = EventStreamDecoder::new();
        assert_eq!(decoder.feed(&body), vec!["x".to_string()]);
    }

    #[test]
    fn test_event_stream_skips_non_string_headers() {
        // :event-type preceded by an int32 header and a uuid header
        let mut block = Vec::new();
        block.push(5);
        block.extend_from_slice(b"count");
        block.push(4);
        block.extend_from_slice(&7u32.to_be_bytes());
        block.push(2);
        block.extend_from_slice(b"id");
        block.push(9);
        block.extend_from_slice(&[0xab; 16]);
        block.push(11);
        block.extend_from_slice(b":event-type");
        block.push(7);
        block.extend_from_slice(&(CONTENT_DELTA_EVENT.len() as u16).to_be_bytes());
        block.extend_from_slice(CONTENT_DELTA_EVENT.as_bytes());
        let payload = br#"{"delta":{"text":"ok"}}"#;

        let total = PRELUDE_LEN + block.len() + payload.len() + 4;
        let mut raw = Vec::new();
        raw.extend_from_slice(&(total as u32).to_be_bytes());
        raw.extend_from_slice(&(block.len() as u32).to_be_bytes());
        raw.extend_from_slice(&[0; 4]);
        raw.extend_from_slice(&block);
        raw.extend_from_slice(payload);
        raw.extend_from_slice(&[0; 4]);

        let mut decoder = EventStreamDecoder::new();
        assert_eq!(decoder.feed(&raw), vec!["ok".to_string()]);
    }

    #[test]
    fn test_event_stream_malformed_frame_is_dropped() {
        let mut bad = delta_frame("lost");
        // Claim a header block longer than the frame
        bad[4..8].copy_from_slice(&1000u32.to_be_bytes());
        let mut body = bad;
        body.extend(delta_frame("kept"));

        let mut decoder = EventStreamDecoder::new();
        assert_eq!(decoder.feed(&body), vec!["kept".to_string()]);
    }

    #[test]
    fn test_event_stream_bad_payload_is_dropped() {
        let mut body = frame(&[(":event-type", CONTENT_DELTA_EVENT)], b"{oops");
        body.extend(delta_frame("after"));
        let mut decoder = EventStreamDecoder::new();
        assert_eq!(decoder.feed(&body), vec!["after".to_string()]);
    }

    #[test]
    fn test_event_stream_implausible_length_clears_buffer() {
        let mut decoder = EventStreamDecoder::new();
        assert!(decoder.feed(&[0, 0, 0, 3, 0, 0, 0, 0]).is_empty());
        assert_eq!(decoder.feed(&delta_frame("fresh")), vec!["fresh".to_string()]);
    }

    #[test]
    fn test_event_stream_finish_discards_partial() {
        let whole = delta_frame("never");
        let mut decoder = EventStreamDecoder::new();
        assert!(decoder.feed(&whole[..whole.len() - 1]).is_empty());
        assert!(decoder.finish().is_empty());
    }
}
