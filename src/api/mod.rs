//! REST API layer: login and system endpoints.

pub mod dto;
pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the REST router (`/login`, `/health`).
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth::routes())
        .merge(handlers::system::routes())
}
