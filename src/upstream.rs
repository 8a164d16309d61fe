//! HTTP client for the Ollama backend.
//!
//! `generate` waits for the whole body (120 s budget); `generate_stream` keeps the
//! connection open and decodes newline-delimited JSON as it arrives, failing once
//! the backend stays silent for a whole read budget. Nothing here retries: every
//! call is exactly one backend request.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use crate::error::{BridgeError, Result};
use crate::models::ollama::{GenerateChunk, GenerateRequest, TagsResponse};

pub const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    read_timeout: Duration,
}

impl OllamaClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            read_timeout: GENERATE_TIMEOUT,
        }
    }

    /// Longest silence tolerated from a streaming backend, headers included.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Non-streaming generation. Non-2xx answers become `BridgeError::Upstream`.
    pub async fn generate(&self, req: &GenerateRequest) -> Result<GenerateChunk> {
        let resp = self
            .http
            .post(self.url("api/generate"))
            .timeout(GENERATE_TIMEOUT)
            .json(req)
            .send()
            .await?;
        let bytes = ensure_success(resp).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| BridgeError::decode(e, &bytes))
    }

    /// Streaming generation: a lazy sequence of chunks ending after `done` or at EOF.
    ///
    /// There is no overall deadline; the response headers and every later read
    /// must each arrive within the read budget. Dropping the returned stream drops
    /// the response body and with it the backend connection.
    pub async fn generate_stream(
        &self,
        req: &GenerateRequest,
    ) -> Result<impl Stream<Item = Result<GenerateChunk>> + Send + 'static> {
        let send = self
            .http
            .post(self.url("api/generate"))
            .header(http::header::ACCEPT, "application/x-ndjson")
            .json(req)
            .send();
        let resp = tokio::time::timeout(self.read_timeout, send)
            .await
            .map_err(|_| BridgeError::UpstreamTimeout(self.read_timeout))??;
        let resp = ensure_success(resp).await?;
        Ok(ndjson_chunks(resp.bytes_stream(), self.read_timeout))
    }

    /// Names of the models the backend currently serves.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(self.url("api/tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        let bytes = ensure_success(resp).await?.bytes().await?;
        let tags: TagsResponse =
            serde_json::from_slice(&bytes).map_err(|e| BridgeError::decode(e, &bytes))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Liveness probe; true only for an HTTP 200 within the probe budget.
    pub async fn ping(&self) -> bool {
        match self
            .http
            .get(self.url("api/tags"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(err) => {
                tracing::debug!("Backend probe failed: {}", err);
                false
            }
        }
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "Backend returned an error status");
    Err(BridgeError::Upstream {
        status: status.as_u16(),
        body,
    })
}

/// Decode one NDJSON line; blank or malformed lines yield `None`.
fn decode_line(line: &[u8]) -> Option<GenerateChunk> {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<GenerateChunk>(trimmed) {
        Ok(chunk) => Some(chunk),
        Err(err) => {
            tracing::debug!("Skipping malformed backend line: {}", err);
            None
        }
    }
}

/// Turn a raw byte stream of newline-delimited JSON into generate chunks.
///
/// Ends after yielding the first chunk with `done == true`, or when the byte
/// stream closes (a trailing line without newline is still decoded). A transport
/// error, or no data for `idle`, is yielded once and ends the sequence.
pub fn ndjson_chunks<S, E>(
    bytes: S,
    idle: Duration,
) -> impl Stream<Item = Result<GenerateChunk>> + Send + 'static
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<BridgeError> + Send + 'static,
{
    async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut buf = BytesMut::new();

        'read: loop {
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line = buf.split_to(pos + 1);
                if let Some(chunk) = decode_line(&line) {
                    let done = chunk.done;
                    yield Ok(chunk);
                    if done {
                        break 'read;
                    }
                }
            }

            match tokio::time::timeout(idle, bytes.next()).await {
                Err(_) => {
                    yield Err(BridgeError::UpstreamTimeout(idle));
                    break 'read;
                }
                Ok(Some(Ok(data))) => buf.extend_from_slice(&data),
                Ok(Some(Err(err))) => {
                    yield Err(err.into());
                    break 'read;
                }
                Ok(None) => {
                    if let Some(chunk) = decode_line(&buf) {
                        yield Ok(chunk);
                    }
                    break 'read;
                }
            }
        }
    }
}
