use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("unauthorized: {message}")]
    Unauthorized {
        code: &'static str,
        message: &'static str,
    },
    #[error("not found: {message}")]
    NotFound {
        code: &'static str,
        message: &'static str,
    },
    #[error("upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },
    #[error("malformed upstream response: {message}")]
    MalformedResponse { message: String },
    #[error("entity not found: {name}")]
    EntityNotFound { name: String },
    #[error("aggregation failed: {message}")]
    AggregationFailed { message: String },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: &'static str, message: &'static str) -> Self {
        Self::Unauthorized { code, message }
    }

    pub fn not_found(code: &'static str, message: &'static str) -> Self {
        Self::NotFound { code, message }
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn entity_not_found(name: impl Into<String>) -> Self {
        Self::EntityNotFound { name: name.into() }
    }

    pub fn aggregation_failed(message: impl Into<String>) -> Self {
        Self::AggregationFailed {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }

    /// Stable machine-readable code, used in JSON-RPC error data and report markers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest { code, .. }
            | Self::Unauthorized { code, .. }
            | Self::NotFound { code, .. }
            | Self::Internal { code, .. } => code,
            Self::Upstream { .. } => "upstream_error",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::EntityNotFound { .. } => "entity_not_found",
            Self::AggregationFailed { .. } => "aggregation_failed",
        }
    }

    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message safe to hand back to a caller. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. } => message.clone(),
            Self::Unauthorized { message, .. } | Self::NotFound { message, .. } => {
                message.to_string()
            }
            Self::Upstream { message, .. } => message.clone(),
            Self::MalformedResponse { message } => message.clone(),
            Self::EntityNotFound { name } => format!("no search results for entity: {name}"),
            Self::AggregationFailed { message } => message.clone(),
            Self::Internal { .. } => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } | Self::EntityNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream { .. }
            | Self::MalformedResponse { .. }
            | Self::AggregationFailed { .. } => StatusCode::BAD_GATEWAY,
            Self::Internal { message, .. } => {
                tracing::error!(error = %message, "request failed with internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: self.code().to_string(),
                message: self.public_message(),
                details: json!({}),
            }),
        )
            .into_response()
    }
}
