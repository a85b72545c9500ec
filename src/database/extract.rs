//! Axum extractor that gives each request handler its own session.
//!
//! A handler that takes a [`Session`] argument gets one acquired before it
//! runs; the session is dropped, and so released, when the handler future
//! completes or is dropped by a timeout.

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;

use super::{Session, SessionProvider};
use crate::error::AppError;

impl<S> FromRequestParts<S> for Session
where
    SessionProvider: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let provider = SessionProvider::from_ref(state);
        Ok(provider.acquire_session().await?)
    }
}
