use anyhow::Result;
use futures::{Stream, StreamExt};
use reqwest::Response;
use std::fmt::Display;

use super::buffering::CircularLineBuffer;
use crate::streaming::StreamEvent;
use crate::traits::EventStream;

/// Strategy pattern for parsing different vendor SSE payloads
pub trait SseLineParser: Send {
    /// Parse the payload of a `data:` line into stream events
    fn parse_data_line(&self, data: &str) -> Result<Vec<StreamEvent>>;

    /// Check if this payload signals end of stream
    fn is_done_marker(&self, data: &str) -> bool {
        data == "[DONE]"
    }
}

enum LineOutcome {
    Skip,
    Done,
    Events(Vec<StreamEvent>),
}

fn handle_line<P: SseLineParser>(parser: &P, line: &str) -> Result<LineOutcome> {
    // Only `data:` fields carry payload; `event:`, `id:` and comments are ignored
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(LineOutcome::Skip);
    };
    let data = data.trim_start();

    if data.is_empty() {
        return Ok(LineOutcome::Skip);
    }
    if parser.is_done_marker(data) {
        return Ok(LineOutcome::Done);
    }

    parser.parse_data_line(data).map(LineOutcome::Events)
}

/// Parse an HTTP response body as a server-sent event stream
pub fn parse_sse_stream<P: SseLineParser + 'static>(response: Response, parser: P) -> EventStream {
    parse_sse_bytes(response.bytes_stream(), parser)
}

/// Generic SSE parser over any chunked byte stream
///
/// The stream ends after the first `Done` event, after the first error, or
/// when the body is exhausted.
pub fn parse_sse_bytes<S, B, E, P>(bytes: S, parser: P) -> EventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
    P: SseLineParser + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut buffer = CircularLineBuffer::with_capacity(4096);

        while let Some(chunk_result) = byte_chunks.next().await {
            let bytes = match chunk_result {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(anyhow::anyhow!("Stream error: {}", e));
                    return;
                }
            };
            buffer.extend(bytes.as_ref());

            while let Some(line_result) = buffer.next_line() {
                match line_result.and_then(|line| handle_line(&parser, &line)) {
                    Ok(LineOutcome::Skip) => {}
                    Ok(LineOutcome::Done) => {
                        yield Ok(StreamEvent::Done { finish_reason: None });
                        return;
                    }
                    Ok(LineOutcome::Events(events)) => {
                        for event in events {
                            let finished = event.is_done();
                            yield Ok(event);
                            if finished {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        // Body ended without a trailing newline
        if let Some(line_result) = buffer.take_remaining() {
            match line_result.and_then(|line| handle_line(&parser, &line)) {
                Ok(LineOutcome::Skip) => {}
                Ok(LineOutcome::Done) => yield Ok(StreamEvent::Done { finish_reason: None }),
                Ok(LineOutcome::Events(events)) => {
                    for event in events {
                        yield Ok(event);
                    }
                }
                Err(e) => yield Err(e),
            }
        }
    })
}
