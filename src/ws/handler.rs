//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::http::header::ORIGIN;
use axum::response::Response;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::HubError;

/// Query parameters accepted by `GET /ws`.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// One-time token obtained from `POST /login`.
    pub otp: Option<String>,
}

/// `GET /ws?otp=<token>` — Upgrade an authenticated connection to WebSocket.
///
/// # Errors
///
/// Returns [`HubError::OriginRejected`] (403) for a browser origin outside
/// the allow-list, and [`HubError::Unauthorized`] (401) for a missing,
/// unknown, expired or reused token.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response, HubError> {
    if let Some(origin) = headers.get(ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !origin_allowed(origin, &state.allowed_origins) {
            tracing::warn!(origin, "upgrade rejected: origin not allowed");
            return Err(HubError::OriginRejected(origin.to_string()));
        }
    }

    state.registry.admit(params.otp.as_deref(), ws).await
}

/// Returns `true` if `origin` may open a connection. An empty allow-list
/// admits every origin.
#[must_use]
pub fn origin_allowed(origin: &str, allowed: &[String]) -> bool {
    allowed.is_empty() || allowed.iter().any(|a| a == origin.trim_end_matches('/'))
}
