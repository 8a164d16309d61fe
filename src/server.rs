use actix_web::http::{header, Method};
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::json;

use crate::conversion::{generate_to_chat_response, to_generate_request};
use crate::error::{BridgeError, Result};
use crate::models::chat::{ChatRequest, ChatResponse};
use crate::request_log::{LogEntry, RequestSource};
use crate::status_page::{render_status_page, StatusView};
use crate::streaming::{chat_sse_stream, failed_sse_stream};
use crate::util::AppState;

pub const FILTER_ENDPOINT: &str = "/api/cursor/filter";
const RECENT_ENTRIES: usize = 10;
/// Editors send whole files as context; the actix default of 256 KiB is too small.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
        .service(
            web::resource(FILTER_ENDPOINT)
                .route(web::post().to(chat_filter))
                .route(web::method(Method::OPTIONS).to(preflight)),
        )
        .route("/health", web::get().to(health))
        .route("/verify", web::get().to(verify))
        .route("/status", web::get().to(status));
}

type SseStream = BoxStream<'static, std::result::Result<Bytes, std::io::Error>>;

/// Successful outcome of the bridge pipeline.
enum BridgeReply {
    Completion(ChatResponse),
    Stream(SseStream),
    /// The backend stream could not be opened; the caller still gets an SSE body.
    StreamFailed(BridgeError),
}

fn header_user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn sse_response(stream: SseStream) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(stream)
}

/// Validate, map, dispatch and translate one chat request.
async fn bridge(state: &AppState, body: &[u8], source: RequestSource) -> Result<BridgeReply> {
    let chat: ChatRequest = serde_json::from_slice(body)
        .map_err(|e| BridgeError::bad_request(format!("Invalid request body: {}", e)))?;

    tracing::info!(
        source = source.as_str(),
        model = chat.model(),
        messages = chat.messages.len(),
        stream = chat.is_stream(),
        "Bridge request received"
    );

    if chat.messages.is_empty() {
        return Err(BridgeError::bad_request("No messages provided"));
    }

    let generate = to_generate_request(&chat, &state.models);
    tracing::debug!(backend_model = %generate.model, "Resolved backend model");

    if generate.stream {
        return Ok(match state.ollama.generate_stream(&generate).await {
            Ok(chunks) => {
                BridgeReply::Stream(chat_sse_stream(chunks, chat.model().to_string()).boxed())
            }
            Err(err) => BridgeReply::StreamFailed(err),
        });
    }

    let body = state.ollama.generate(&generate).await?;
    let resp = generate_to_chat_response(&body, chat.model());
    Ok(BridgeReply::Completion(resp))
}

/// `POST /api/cursor/filter`: Chat Completions in, Ollama generate behind.
///
/// Writes exactly one log entry per request, whatever the outcome.
async fn chat_filter(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let user_agent = header_user_agent(&req);
    let source = RequestSource::from_user_agent(user_agent.as_deref().unwrap_or("unknown"));
    let record = |status: u16, data: &str| {
        let entry = LogEntry::new(FILTER_ENDPOINT, status, user_agent.as_deref(), Some(data));
        state.log.append(entry);
    };

    match bridge(&state, &body, source).await {
        Ok(BridgeReply::Completion(resp)) => {
            let preview = String::from_utf8_lossy(&body);
            record(200, &preview);
            HttpResponse::Ok().json(resp)
        }
        Ok(BridgeReply::Stream(stream)) => {
            let preview = String::from_utf8_lossy(&body);
            record(200, &preview);
            sse_response(stream)
        }
        Ok(BridgeReply::StreamFailed(err)) => {
            tracing::warn!("Backend stream could not be opened: {}", err);
            record(200, &err.to_string());
            sse_response(failed_sse_stream(err).boxed())
        }
        Err(err) => {
            let status = err.status_code();
            if status.is_server_error() {
                tracing::warn!("Bridge request failed: {}", err);
            } else {
                tracing::info!("Bridge request rejected: {}", err);
            }
            record(status.as_u16(), &err.to_string());
            err.error_response()
        }
    }
}

async fn preflight() -> HttpResponse {
    HttpResponse::Ok().json(json!({}))
}

/// Backend liveness; always 200, the backend state is reported in the body.
async fn health(state: web::Data<AppState>) -> impl Responder {
    let connected = state.ollama.ping().await;
    web::Json(json!({
        "status": "healthy",
        "ollama": if connected { "connected" } else { "disconnected" },
        "ollama_url": state.ollama.base_url(),
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}

/// Whether a recognized client has reached the bridge, with the last few requests.
async fn verify(state: web::Data<AppState>) -> impl Responder {
    let snapshot = state.log.snapshot(RECENT_ENTRIES);
    web::Json(json!({
        "bridge_running": true,
        "total_requests": snapshot.total_requests,
        "cursor_requests": snapshot.recognized_requests,
        "last_cursor_request": snapshot.last_recognized,
        "recent_requests": snapshot.recent,
        "cursor_detected": snapshot.recognized_requests > 0,
        "timestamp": chrono::Local::now().to_rfc3339(),
    }))
}

async fn status(state: web::Data<AppState>) -> HttpResponse {
    let (connected, models) = match state.ollama.list_models().await {
        Ok(models) => (true, models),
        Err(err) => {
            tracing::debug!("Model listing failed: {}", err);
            (false, Vec::new())
        }
    };
    let snapshot = state.log.snapshot(RECENT_ENTRIES);
    let masked_key = state.config.masked_api_key();

    let html = render_status_page(&StatusView {
        backend_connected: connected,
        backend_url: state.ollama.base_url(),
        default_model: state.models.default_model(),
        port: state.config.port(),
        models: &models,
        snapshot: &snapshot,
        masked_api_key: &masked_key,
    });

    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html)
}
