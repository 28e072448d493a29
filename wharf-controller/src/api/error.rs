//! API Error Handling
//!
//! Every rejected request gets the same generic answer. The reason is only
//! logged, so a caller probing the controller cannot tell which check failed.

use axum::{
    Json,
    extract::ws::rejection::WebSocketUpgradeRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::{IngressError, Role};

/// API error type
#[derive(Debug)]
pub enum ApiError {
    Ingress(IngressError),
    InvalidKey(Role),
    Upgrade(WebSocketUpgradeRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Ingress(err) => tracing::warn!("Webhook rejected: {}", err),
            ApiError::InvalidKey(role) => tracing::warn!(role = %role, "Invalid connection key"),
            ApiError::Upgrade(err) => tracing::warn!("WebSocket upgrade failed: {}", err),
        }

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "request rejected" })),
        )
            .into_response()
    }
}

impl From<IngressError> for ApiError {
    fn from(err: IngressError) -> Self {
        ApiError::Ingress(err)
    }
}

impl From<WebSocketUpgradeRejection> for ApiError {
    fn from(err: WebSocketUpgradeRejection) -> Self {
        ApiError::Upgrade(err)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
