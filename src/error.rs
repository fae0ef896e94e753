//! Error types for chatrelay.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Result type alias for chatrelay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chatrelay.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Invalid request: {0}")]
    Validation(String),

    /// Network failure, timeout, or non-success status from the inference API.
    #[error("{}", upstream_message(.status))]
    Upstream { status: Option<u16>, detail: String },

    /// Success status, but the body could not be turned into a reply.
    #[error("Upstream returned an unrecognized response (status {status})")]
    MalformedResponse { status: u16, detail: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

fn upstream_message(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("Upstream model API returned {}", code),
        None => "Upstream model API unreachable".to_string(),
    }
}

impl Error {
    /// HTTP status returned to the caller for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Config(_)
            | Error::Upstream { .. }
            | Error::MalformedResponse { .. }
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Raw upstream text surfaced in the `detail` field, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Upstream { detail, .. } | Error::MalformedResponse { detail, .. } => {
                Some(detail.as_str())
            }
            _ => None,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut body = serde_json::json!({ "error": self.to_string() });
        if let Some(detail) = self.detail() {
            body["detail"] = serde_json::Value::String(detail.to_string());
        }

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 65_536)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_maps_to_400_without_detail() {
        let response = Error::Validation("message is required".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid request: message is required");
        assert!(json.get("detail").is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_echoes_detail() {
        let response = Error::Upstream {
            status: Some(503),
            detail: "Model is currently loading".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Upstream model API returned 503");
        assert_eq!(json["detail"], "Model is currently loading");
    }

    #[test]
    fn test_unreachable_upstream_message() {
        let err = Error::Upstream {
            status: None,
            detail: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Upstream model API unreachable");
        assert_eq!(err.detail(), Some("connection refused"));
    }

    #[test]
    fn test_malformed_response_is_500() {
        let err = Error::MalformedResponse {
            status: 200,
            detail: "<html>".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("200"));
    }
}
