//! Scoped database sessions.
//!
//! A [`Session`] is the only handle request code gets on the store. It is
//! acquired from a [`SessionProvider`], owned by exactly one caller, and
//! released exactly once when dropped. Because release lives in `Drop`, it
//! runs on every exit path: normal return, `?` propagation, panic
//! unwinding, and cancellation of the future that held the session.
//!
//! The lifecycle is `unallocated → acquired → released`. A live `Session`
//! value *is* the acquired state; [`Session::release`] consumes it, so a
//! second release or any use after release does not type-check.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyConnection, AnyPool, Connection, Transaction};
use uuid::Uuid;

use super::pool::build_pool;
use crate::config::Settings;
use crate::error::SessionError;

#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time view of session lifecycle counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Sessions handed out since the provider was created.
    pub acquired: u64,
    /// Sessions returned to the pool.
    pub released: u64,
    /// Acquire attempts that ended in an error.
    pub failed: u64,
    /// Sessions currently held by callers.
    pub active: u64,
}

/// Hands out one [`Session`] per unit of work from a single shared pool.
///
/// Cloning is cheap and every clone shares the same pool and counters, so
/// a provider built once at startup can be injected wherever sessions are
/// needed.
#[derive(Debug, Clone)]
pub struct SessionProvider {
    pool: AnyPool,
    counters: Arc<Counters>,
}

impl SessionProvider {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: AnyPool) -> Self {
        Self {
            pool,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Builds the pool from `settings` without touching the store.
    ///
    /// # Errors
    ///
    /// Propagates [`build_pool`] errors.
    pub fn from_settings(settings: &Settings) -> Result<Self, SessionError> {
        Ok(Self::new(build_pool(settings)?))
    }

    /// Builds the pool and verifies the store answers a round-trip.
    ///
    /// # Errors
    ///
    /// Propagates [`build_pool`] errors, and returns
    /// [`SessionError::Unavailable`] (or `Exhausted` on timeout) if the
    /// verification session cannot be acquired or pinged.
    pub async fn connect(settings: &Settings) -> Result<Self, SessionError> {
        let provider = Self::from_settings(settings)?;
        let mut session = provider.acquire_session().await?;
        session.ping().await?;
        session.release();
        tracing::info!("database reachable");
        Ok(provider)
    }

    /// Acquires a session bound to the shared pool.
    ///
    /// Waits only when no idle, validated connection is available and the
    /// pool is at capacity.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Exhausted`] when the acquire timeout
    /// elapses, [`SessionError::Closed`] after [`close`](Self::close), and
    /// [`SessionError::Unavailable`] when a new connection cannot be opened.
    pub async fn acquire_session(&self) -> Result<Session, SessionError> {
        let started = Instant::now();
        match self.pool.acquire().await {
            Ok(conn) => {
                self.counters.acquired.fetch_add(1, Ordering::Relaxed);
                let session = Session {
                    id: Uuid::new_v4(),
                    conn,
                    acquired_at: Instant::now(),
                    counters: Arc::clone(&self.counters),
                };
                tracing::debug!(
                    session_id = %session.id,
                    wait_ms = started.elapsed().as_millis(),
                    "session acquired"
                );
                Ok(session)
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                let err = SessionError::from_acquire(e);
                tracing::warn!(error = %err, "session acquire failed");
                Err(err)
            }
        }
    }

    /// Runs `work` with a fresh session and releases it before returning.
    ///
    /// The session is released whether `work` returns `Ok`, returns `Err`,
    /// panics, or is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the acquire error converted into `E`, or whatever `work`
    /// returns.
    pub async fn with_session<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: AsyncFnOnce(&mut Session) -> Result<T, E>,
        E: From<SessionError>,
    {
        let mut session = self.acquire_session().await?;
        let result = work(&mut session).await;
        session.release();
        result
    }

    /// The shared pool backing every session.
    #[must_use]
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// Current lifecycle counters.
    #[must_use]
    pub fn stats(&self) -> SessionStats {
        let acquired = self.counters.acquired.load(Ordering::Relaxed);
        let released = self.counters.released.load(Ordering::Relaxed);
        SessionStats {
            acquired,
            released,
            failed: self.counters.failed.load(Ordering::Relaxed),
            active: acquired.saturating_sub(released),
        }
    }

    /// Closes the pool. Outstanding sessions finish normally; new acquires
    /// fail with [`SessionError::Closed`].
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!(stats = ?self.stats(), "database pool closed");
    }
}

/// One unit of work against the store.
///
/// Dereferences to the underlying connection so queries run directly
/// against it:
///
/// ```rust,ignore
/// let mut session = provider.acquire_session().await?;
/// sqlx::query("UPDATE habits SET streak = streak + 1 WHERE id = $1")
///     .bind(id)
///     .execute(&mut *session)
///     .await
///     .map_err(SessionError::from_query)?;
/// ```
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    conn: PoolConnection<Any>,
    acquired_at: Instant,
    counters: Arc<Counters>,
}

impl Session {
    /// Identifier used to correlate log lines for this session.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Round-trips to the store.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unavailable`] if the connection is dead.
    pub async fn ping(&mut self) -> Result<(), SessionError> {
        self.conn
            .ping()
            .await
            .map_err(SessionError::Unavailable)
    }

    /// Starts a transaction on this session.
    ///
    /// Uncommitted work is rolled back when the transaction is dropped.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] if `BEGIN` fails.
    pub async fn begin(&mut self) -> Result<Transaction<'_, Any>, SessionError> {
        self.conn.begin().await.map_err(SessionError::from_query)
    }

    /// Releases the session now instead of at end of scope.
    pub fn release(self) {
        drop(self);
    }
}

impl Deref for Session {
    type Target = AnyConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            session_id = %self.id,
            held_ms = self.acquired_at.elapsed().as_millis(),
            "session released"
        );
        // `conn` drops after this, returning the connection to the pool.
    }
}
