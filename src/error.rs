use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use std::time::Duration;

use thiserror::Error;

/// Longest backend body excerpt echoed back in `details`.
const DETAILS_BODY_CHARS: usize = 500;

/// Failures surfaced by the bridge pipeline.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Client error; the request is never forwarded.
    #[error("{0}")]
    BadRequest(String),
    /// Connection refused, timeout or a broken transport while talking to the backend.
    #[error("Backend unavailable: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),
    /// The backend answered with a non-success status.
    #[error("Backend error: {status}")]
    Upstream { status: u16, body: String },
    /// The backend answered 2xx with a body that is not the expected JSON.
    #[error("Failed to decode backend response: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        body: String,
    },
    /// The backend sent nothing for longer than the read budget.
    #[error("Backend stopped responding for {0:?}")]
    UpstreamTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// A decode failure, keeping the head of the offending body for the caller.
    pub fn decode(source: serde_json::Error, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body)
            .chars()
            .take(DETAILS_BODY_CHARS)
            .collect();
        Self::Decode { source, body }
    }

    /// Extra context returned to the caller next to `error`.
    pub fn details(&self) -> Option<String> {
        match self {
            Self::Upstream { body, .. } => Some(body.clone()),
            Self::Decode { body, .. } => Some(body.clone()),
            Self::UpstreamUnavailable(err) => Some(err.to_string()),
            Self::UpstreamTimeout(budget) => Some(format!("no data within {:?}", budget)),
            Self::BadRequest(_) => None,
        }
    }
}

impl ResponseError for BridgeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        crate::util::error_response(self.status_code(), &self.to_string(), self.details())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_request_maps_to_400() {
        let err = BridgeError::bad_request("No messages provided");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No messages provided");
        assert!(err.details().is_none());
    }

    #[test]
    fn upstream_error_carries_status_and_body() {
        let err = BridgeError::Upstream {
            status: 404,
            body: "model not found".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Backend error: 404");
        assert_eq!(err.details().as_deref(), Some("model not found"));
    }

    #[test]
    fn decode_error_echoes_body_prefix() {
        let raw = format!("<html>{}</html>", "x".repeat(1000));
        let source = serde_json::from_str::<serde_json::Value>(&raw).unwrap_err();
        let err = BridgeError::decode(source, raw.as_bytes());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let details = err.details().unwrap();
        assert!(details.starts_with("<html>xxx"));
        assert_eq!(details.chars().count(), DETAILS_BODY_CHARS);
    }

    #[test]
    fn stalled_backend_is_a_server_error_with_details() {
        let err = BridgeError::UpstreamTimeout(Duration::from_secs(120));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Backend stopped responding for 120s");
        assert_eq!(err.details().as_deref(), Some("no data within 120s"));
    }
}
