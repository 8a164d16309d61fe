use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::BridgeConfig;
use crate::conversion::ModelMap;
use crate::request_log::RequestLog;
use crate::upstream::OllamaClient;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Env files consulted in order; the first that loads wins.
const ENV_FILE_VARS: [&str; 3] = ["ENV_FILE", "ENVFILE", "DOTENV_PATH"];

fn load_env_file() -> Option<String> {
    let explicit = ENV_FILE_VARS
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty());

    for path in explicit.chain([".envfile".to_string()]) {
        if std::path::Path::new(&path).is_file() && dotenvy::from_filename(&path).is_ok() {
            return Some(path);
        }
    }
    dotenvy::dotenv()
        .ok()
        .map(|path| path.display().to_string())
}

/// Load an env file (never overriding set variables) and install the
/// RUST_LOG-filtered subscriber, `info` by default.
pub fn init_tracing() {
    let env_file = load_env_file();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();

    match env_file {
        Some(path) => tracing::info!(path = %path, "Loaded environment file"),
        None => tracing::debug!("No environment file found"),
    }
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Backend HTTP client. `BRIDGE_NO_PROXY` turns proxies off and
/// `BRIDGE_PROXY_URL` routes everything through one proxy; otherwise reqwest
/// picks up the usual `HTTP(S)_PROXY` variables itself.
///
/// Only connecting is bounded here; each call sets its own read budget.
pub fn build_http_client_from_env() -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("ollama-bridge/", env!("CARGO_PKG_VERSION")));

    if env_flag("BRIDGE_NO_PROXY") {
        builder = builder.no_proxy();
    } else if let Ok(url) = std::env::var("BRIDGE_PROXY_URL") {
        match reqwest::Proxy::all(url.trim()) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(err) => tracing::warn!("Ignoring BRIDGE_PROXY_URL: {}", err),
        }
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Falling back to a default HTTP client: {}", err);
        reqwest::Client::new()
    })
}

/// Shared application state, one instance per server.
pub struct AppState {
    pub config: BridgeConfig,
    pub ollama: OllamaClient,
    pub models: ModelMap,
    pub log: RequestLog,
}

impl AppState {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_client(config, build_http_client_from_env())
    }

    pub fn with_client(config: BridgeConfig, http: reqwest::Client) -> Self {
        Self {
            ollama: OllamaClient::new(http, config.ollama_url.clone()),
            models: config.model_map(),
            log: RequestLog::new(),
            config,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

/// Build a JSON error response: `{"error": msg}` plus `details` when given.
pub fn error_response(status: StatusCode, msg: &str, details: Option<String>) -> HttpResponse {
    let mut body = serde_json::json!({ "error": msg });
    if let Some(details) = details {
        body["details"] = serde_json::Value::String(details);
    }
    HttpResponse::build(status).json(body)
}

/// Build a CORS configuration from environment variables.
///
/// Environment variables:
/// - CORS_ALLOWED_ORIGINS: "*" or comma-separated origins
/// - CORS_ALLOWED_METHODS: "*" or comma-separated methods
/// - CORS_ALLOWED_HEADERS: "*" or comma-separated request header names
/// - CORS_ALLOW_CREDENTIALS: enable with 1,true,yes,on
/// - CORS_MAX_AGE: max age in seconds
///
/// Unset variables are permissive so editors can call the bridge from any origin.
pub fn cors_config_from_env() -> actix_cors::Cors {
    let mut cors = actix_cors::Cors::default();

    match std::env::var("CORS_ALLOWED_ORIGINS") {
        Ok(origins) if origins.trim() != "*" => {
            for p in origins.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                cors = cors.allowed_origin(p);
            }
        }
        _ => cors = cors.allow_any_origin(),
    }

    match std::env::var("CORS_ALLOWED_METHODS") {
        Ok(methods) if methods.trim() != "*" => {
            let methods: Vec<&str> = methods
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            if !methods.is_empty() {
                cors = cors.allowed_methods(methods);
            }
        }
        _ => cors = cors.allow_any_method(),
    }

    match std::env::var("CORS_ALLOWED_HEADERS") {
        Ok(headers) if headers.trim() != "*" => {
            for h in headers.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                cors = cors.allowed_header(h);
            }
        }
        _ => cors = cors.allow_any_header(),
    }

    if env_flag("CORS_ALLOW_CREDENTIALS") {
        cors = cors.supports_credentials();
    }

    if let Ok(secs) = std::env::var("CORS_MAX_AGE") {
        if let Ok(n) = secs.trim().parse::<usize>() {
            cors = cors.max_age(n);
        }
    }

    cors
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn error_body_includes_details_only_when_present() {
        let resp = error_response(StatusCode::BAD_REQUEST, "No messages provided", None);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v, serde_json::json!({"error": "No messages provided"}));

        let resp = error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Backend error: 404",
            Some("model not found".into()),
        );
        let body = to_bytes(resp.into_body()).await.unwrap();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["details"], "model not found");
    }
}
