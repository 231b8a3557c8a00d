use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

/// Request-terminating failures, mapped 1:1 onto HTTP statuses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid webhook signature")]
    Authentication,

    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Missing secret or credential. The message names the env var to set,
    /// never its value.
    #[error("{0}")]
    Configuration(String),

    #[error("{message}")]
    Upstream {
        code: Option<i64>,
        message: String,
    },

    #[error("too many requests")]
    RateLimited { retry_after_seconds: u64 },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: serde_json::Value) -> Self {
        ApiError::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn client_code(&self) -> &'static str {
        match self {
            ApiError::Authentication => "INVALID_SIGNATURE",
            ApiError::Validation { .. } => "INVALID_BODY",
            ApiError::Configuration(_) => "NOT_CONFIGURED",
            ApiError::Upstream { .. } => "UPSTREAM_FAILED",
            ApiError::RateLimited { .. } => "RATE_LIMITED",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Authentication => StatusCode::FORBIDDEN,
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        };

        let mut body = json!({
            "ok": false,
            "error": self.client_code(),
            "message": self.to_string(),
        });
        match &self {
            ApiError::Validation {
                details: Some(details),
                ..
            } => {
                body["details"] = details.clone();
            }
            ApiError::Upstream { code, .. } => {
                body["code"] = json!(code);
            }
            _ => {}
        }

        if let ApiError::RateLimited {
            retry_after_seconds,
        } = self
        {
            return (
                status,
                [(header::RETRY_AFTER, retry_after_seconds.to_string())],
                Json(body),
            )
                .into_response();
        }

        (status, Json(body)).into_response()
    }
}
