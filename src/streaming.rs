//! NDJSON chunk stream → Chat Completions SSE.
//!
//! Each backend chunk carrying text becomes one `data: <chunk>\n\n` event. The
//! `done` chunk is followed by exactly one `data: [DONE]\n\n` and nothing else.
//! A backend failure becomes a single `data: {"error": ...}\n\n` event that ends
//! the stream; events already sent are not retracted.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Serialize;

use crate::conversion::{completion_id, generate_chunk_to_chat_chunk, unix_now};
use crate::error::{BridgeError, Result};
use crate::models::ollama::GenerateChunk;

pub const DONE_EVENT: &str = "data: [DONE]\n\n";

#[derive(Debug, Serialize)]
struct ErrorEvent<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Frame a JSON payload as one SSE `data:` event.
pub fn sse_event<T: Serialize>(payload: &T) -> Bytes {
    let json = serde_json::to_string(payload)
        .unwrap_or_else(|err| serde_json::json!({ "error": err.to_string() }).to_string());
    Bytes::from(format!("data: {}\n\n", json))
}

/// The error-shaped event sent in place of further chunks.
pub fn error_event(err: &BridgeError) -> Bytes {
    let message = err.to_string();
    sse_event(&ErrorEvent {
        error: &message,
        details: err.details(),
    })
}

/// Translate backend chunks into SSE bytes, echoing `caller_model` in every chunk.
///
/// All chunks of one completion share an id and creation time.
pub fn chat_sse_stream<S>(
    chunks: S,
    caller_model: String,
) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + 'static
where
    S: Stream<Item = Result<GenerateChunk>> + Send + 'static,
{
    let id = completion_id();
    let created = unix_now();

    async_stream::stream! {
        let mut chunks = Box::pin(chunks);
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    if let Some(delta) = generate_chunk_to_chat_chunk(&chunk, &id, created, &caller_model) {
                        yield Ok(sse_event(&delta));
                    }
                    if chunk.done {
                        yield Ok(Bytes::from_static(DONE_EVENT.as_bytes()));
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!("Backend stream failed: {}", err);
                    yield Ok(error_event(&err));
                    break;
                }
            }
        }
    }
}

/// A stream consisting of just the error event, for failures before the first chunk.
pub fn failed_sse_stream(
    err: BridgeError,
) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> + Send + 'static {
    futures_util::stream::once(async move { Ok::<_, std::io::Error>(error_event(&err)) })
}
