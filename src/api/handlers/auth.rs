//! Login endpoint: exchanges the bootstrap credentials for a one-time token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{LoginRequest, LoginResponse};
use crate::app_state::AppState;
use crate::error::HubError;

/// `POST /login` — Issue a one-time WebSocket admission token.
///
/// # Errors
///
/// Returns [`HubError::InvalidCredentials`] (401, empty body) when the
/// username/password pair does not match.
#[utoipa::path(
    post,
    path = "/login",
    tag = "Auth",
    summary = "Log in",
    description = "Checks the bootstrap credentials and returns a single-use token that admits one WebSocket connection within the token TTL.",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Wrong username or password"),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HubError> {
    if !state.credentials.matches(&req.username, &req.password) {
        tracing::info!(username = %req.username, "login rejected");
        return Err(HubError::InvalidCredentials);
    }

    let token = state.registry.tokens().issue().await;
    tracing::info!(username = %req.username, "login accepted, token issued");

    Ok((StatusCode::OK, Json(LoginResponse { otp: token.key })))
}

/// Auth routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}
