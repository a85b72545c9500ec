//! Database access: the shared connection pool and scoped sessions.
//!
//! [`build_pool`] creates the single pool a process uses. A
//! [`SessionProvider`] wraps that pool and is the only way the rest of the
//! application reaches the store: every unit of work borrows exactly one
//! [`Session`], which goes back to the pool when it is dropped.

pub mod extract;
pub mod pool;
pub mod session;

pub use pool::{SUPPORTED_SCHEMES, build_pool};
pub use session::{Session, SessionProvider, SessionStats};
