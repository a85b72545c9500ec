//! # habit-db
//!
//! Settings and database-session plumbing for the habit gamification
//! backend.
//!
//! Settings are read once from the environment (with a `.env` fallback)
//! into an immutable [`Settings`](config::Settings) value. From it the
//! process builds exactly one connection pool, wrapped in a
//! [`SessionProvider`](database::SessionProvider) that hands each unit of
//! work its own [`Session`](database::Session) and guarantees the session
//! is released on every exit path.
//!
//! ## Architecture
//!
//! ```text
//! Environment / .env
//!     │
//!     ├── Settings (config/)
//!     │
//!     ├── build_pool ── AnyPool (database/)
//!     ├── SessionProvider ── Session per request
//!     │
//!     └── Axum handlers (api/) take `Session` as an extractor
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod database;
pub mod error;
