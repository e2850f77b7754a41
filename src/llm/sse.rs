//! Decoder for `text/event-stream` response bodies.

use async_stream::try_stream;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::types::{AppError, AppResult};

/// Turn a byte stream into the `data:` payloads of its events.
///
/// Events are separated by a blank line; multiple `data:` lines in one event
/// are joined with `\n`. Events without data (comments, keep-alives) are
/// skipped.
pub fn data_events<S, E>(bytes: S) -> impl Stream<Item = AppResult<String>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buf: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|e| AppError::LLMApi(format!("stream interrupted: {}", e)))?;
            buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

            while let Some(pos) = find_double_newline(&buf) {
                let block: Vec<u8> = buf.drain(..pos + 2).collect();
                if let Some(data) = extract_data(&block) {
                    yield data;
                }
            }
        }

        if let Some(data) = extract_data(&buf) {
            yield data;
        }
    }
}

fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

fn extract_data(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let lines: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| data.strip_prefix(' ').unwrap_or(data))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
