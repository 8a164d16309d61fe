//! Wire models for both sides of the bridge.
//!
//! - `chat`: the caller-facing Chat Completions shapes (request, response, stream chunk).
//! - `ollama`: the backend `generate` and `tags` shapes.

pub mod chat;
pub mod ollama;
