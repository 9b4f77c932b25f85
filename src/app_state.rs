//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::Credentials;
use crate::ws::SessionRegistry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session registry; also owns the token store.
    pub registry: Arc<SessionRegistry>,
    /// Bootstrap login credentials.
    pub credentials: Arc<Credentials>,
    /// Browser origins allowed to open `/ws`. Empty allows all.
    pub allowed_origins: Arc<[String]>,
}

impl AppState {
    /// Bundles the shared handles.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        credentials: Credentials,
        allowed_origins: Vec<String>,
    ) -> Self {
        Self {
            registry,
            credentials: Arc::new(credentials),
            allowed_origins: allowed_origins.into(),
        }
    }
}
