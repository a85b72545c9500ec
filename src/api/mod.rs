//! HTTP surface.
//!
//! Only the health endpoint lives here; it exercises the full
//! settings → pool → session path on every call.

pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Builds the router with all routes mounted.
pub fn build_router() -> Router<AppState> {
    Router::new().merge(system::routes())
}
