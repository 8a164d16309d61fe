#![forbid(unsafe_code)]
#![doc = r#"
Ollama Bridge

Serve OpenAI-style Chat Completions from a local Ollama backend. Requests to
`/api/cursor/filter` are flattened into a single prompt, sent to Ollama's
`/api/generate`, and the reply (whole or streamed NDJSON) is re-encoded as a
`chat.completion` body or `chat.completion.chunk` server-sent events.

Modules
- `models`: Chat Completions and Ollama wire shapes.
- `conversion`: prompt normalization, model mapping, response translation.
- `upstream`: HTTP client for the backend (whole-body and NDJSON streaming).
- `streaming`: backend chunk stream to SSE, with `[DONE]` and error events.
- `request_log`: bounded ring buffers of recent requests.
- `server`: actix-web routes (`/api/cursor/filter`, `/health`, `/verify`, `/status`).
- `status_page`: HTML rendering for `/status`.
- `config`, `error`, `util`: configuration, error taxonomy, tracing/CORS/client setup.
"#]

pub mod config;
pub mod conversion;
pub mod error;
pub mod models;
pub mod request_log;
pub mod server;
pub mod status_page;
pub mod streaming;
pub mod upstream;
pub mod util;

pub use crate::config::BridgeConfig;
pub use crate::conversion::{
    generate_chunk_to_chat_chunk, generate_to_chat_response, messages_to_prompt,
    to_generate_request, ModelMap,
};
pub use crate::error::BridgeError;
pub use crate::request_log::{is_recognized_client, LogEntry, RequestLog, RingBuffer};
pub use crate::upstream::OllamaClient;

pub use crate::models::{chat, ollama};
