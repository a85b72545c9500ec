//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Settings;
use crate::database::SessionProvider;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Settings loaded at startup.
    pub settings: Arc<Settings>,
    /// The single session provider for this process.
    pub sessions: SessionProvider,
}

impl AppState {
    /// Builds state around an already-constructed provider.
    #[must_use]
    pub fn new(settings: Settings, sessions: SessionProvider) -> Self {
        Self {
            settings: Arc::new(settings),
            sessions,
        }
    }
}

impl FromRef<AppState> for SessionProvider {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
