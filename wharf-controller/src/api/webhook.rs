//! Webhook API Handler

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};

use crate::api::AppState;
use crate::api::error::ApiResult;

/// Header carrying `<algorithm>=<hex digest>`
pub const SIGNATURE_HEADER: &str = "x-hub-signature";

/// POST /
/// Receive a push notification from the source host
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    state.ingress.handle(signature, &body)?;

    Ok(StatusCode::OK)
}
