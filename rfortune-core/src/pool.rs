//! Connection Pool - Bounded, Liveness-Checked Backend Connections
//!
//! TigerStyle: explicit limits, no unbounded queueing, RAII release.
//!
//! # Policy
//!
//! ```text
//! acquire()
//!   ├─ wait ≤ acquire_timeout for a slot ──── none → PoolExhausted
//!   ├─ freshest idle connection?
//!   │    ├─ idle ≥ idle_timeout → close all idle, dial
//!   │    └─ PING fails or exceeds ping_timeout → close all idle, BackendUnavailable
//!   └─ dial (+ AUTH) ≤ dial_timeout ──────── fail → BackendUnavailable
//!
//! drop(PooledConnection)
//!   └─ idle < idle_count_max ? keep for reuse : close
//! ```
//!
//! A slot is held from `acquire()` until the connection is back on the idle
//! stack, so idle plus in-use connections never exceed `active_count_max`.
//! Nothing is retried; the caller decides.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::error::{FortuneError, FortuneResult};

// =============================================================================
// ManageConnection
// =============================================================================

/// Dials and checks connections for a pool.
#[async_trait]
pub trait ManageConnection: Send + Sync + 'static {
    /// Live connection type.
    type Connection: Send + 'static;

    /// Open a new connection, authenticating if a credential is configured.
    async fn connect(&self) -> FortuneResult<Self::Connection>;

    /// Cheap round-trip proving a reused connection is still alive.
    async fn is_valid(&self, conn: &mut Self::Connection) -> FortuneResult<()>;
}

// =============================================================================
// Pool
// =============================================================================

struct IdleConnection<C> {
    conn: C,
    idle_since: Instant,
}

struct PoolShared<M: ManageConnection> {
    manager: M,
    config: PoolConfig,
    slots: Arc<Semaphore>,
    idle: Mutex<Vec<IdleConnection<M::Connection>>>,
    open_count: AtomicUsize,
}

impl<M: ManageConnection> PoolShared<M> {
    fn idle(&self) -> MutexGuard<'_, Vec<IdleConnection<M::Connection>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop the freshest idle connection; if even that one has expired, every
    /// older one has too, so all of them are closed.
    fn take_idle(&self) -> Option<M::Connection> {
        let mut idle = self.idle();
        let entry = idle.pop()?;
        if entry.idle_since.elapsed() < self.config.idle_timeout {
            return Some(entry.conn);
        }
        let evicted = idle.len() + 1;
        idle.clear();
        drop(idle);
        self.open_count.fetch_sub(evicted, Ordering::SeqCst);
        tracing::debug!(evicted, "closed expired idle connections");
        None
    }

    fn close_idle(&self) -> usize {
        let closed = {
            let mut idle = self.idle();
            let n = idle.len();
            idle.clear();
            n
        };
        self.open_count.fetch_sub(closed, Ordering::SeqCst);
        closed
    }

    fn put_back(&self, conn: M::Connection) {
        let mut idle = self.idle();
        if idle.len() < self.config.idle_count_max && !self.slots.is_closed() {
            idle.push(IdleConnection {
                conn,
                idle_since: Instant::now(),
            });
        } else {
            drop(idle);
            drop(conn);
            self.open_count.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    /// Connections currently open, idle or in use
    pub open: usize,
    /// Connections waiting on the idle stack
    pub idle: usize,
}

/// Bounded pool of backend connections. Cheap to clone; clones share state.
pub struct ConnectionPool<M: ManageConnection> {
    shared: Arc<PoolShared<M>>,
}

impl<M: ManageConnection> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: ManageConnection> ConnectionPool<M> {
    /// Create a pool. No connection is dialed until the first `acquire()`.
    ///
    /// # Panics
    /// Panics if the config fails validation; validate user input first.
    #[must_use]
    pub fn new(manager: M, config: PoolConfig) -> Self {
        // Precondition
        assert!(
            config.validate().is_ok(),
            "invalid pool config: {config:?}"
        );

        Self {
            shared: Arc::new(PoolShared {
                manager,
                slots: Arc::new(Semaphore::new(config.active_count_max)),
                config,
                idle: Mutex::new(Vec::new()),
                open_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Pool limits.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Connection manager.
    #[must_use]
    pub fn manager(&self) -> &M {
        &self.shared.manager
    }

    /// Current occupancy.
    #[must_use]
    pub fn state(&self) -> PoolState {
        PoolState {
            open: self.shared.open_count.load(Ordering::SeqCst),
            idle: self.shared.idle().len(),
        }
    }

    /// Get a connection, reusing an idle one or dialing a new one.
    ///
    /// # Errors
    /// `PoolExhausted` when no slot frees up within `acquire_timeout`;
    /// `BackendUnavailable` when dialing, authenticating or the liveness
    /// check fails.
    pub async fn acquire(&self) -> FortuneResult<PooledConnection<M>> {
        let permit = self.acquire_slot().await?;

        if let Some(mut conn) = self.shared.take_idle() {
            return match self.check_liveness(&mut conn).await {
                Ok(()) => Ok(self.wrap(conn, permit)),
                Err(e) => {
                    drop(conn);
                    self.shared.open_count.fetch_sub(1, Ordering::SeqCst);
                    let closed = self.shared.close_idle();
                    tracing::warn!(error = %e, closed, "pooled connection failed liveness check");
                    Err(as_unavailable(e))
                }
            };
        }

        let conn = self.dial().await?;
        self.shared.open_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.wrap(conn, permit))
    }

    /// Return a connection. Dropping the guard does the same.
    pub fn release(&self, conn: PooledConnection<M>) {
        drop(conn);
    }

    /// Close idle connections and refuse further acquires.
    pub fn close(&self) {
        self.shared.slots.close();
        let closed = self.shared.close_idle();
        tracing::debug!(closed, "connection pool closed");
    }

    async fn acquire_slot(&self) -> FortuneResult<OwnedSemaphorePermit> {
        let config = &self.shared.config;
        let slots = Arc::clone(&self.shared.slots);
        let exhausted = || FortuneError::PoolExhausted {
            waited_ms: u64::try_from(config.acquire_timeout.as_millis()).unwrap_or(u64::MAX),
            active_max: config.active_count_max,
        };

        if config.acquire_timeout.is_zero() {
            return slots.try_acquire_owned().map_err(|e| match e {
                tokio::sync::TryAcquireError::Closed => FortuneError::unavailable("pool closed"),
                tokio::sync::TryAcquireError::NoPermits => exhausted(),
            });
        }

        match tokio::time::timeout(config.acquire_timeout, slots.acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(FortuneError::unavailable("pool closed")),
            Err(_) => Err(exhausted()),
        }
    }

    async fn check_liveness(&self, conn: &mut M::Connection) -> FortuneResult<()> {
        let timeout = self.shared.config.ping_timeout;
        match tokio::time::timeout(timeout, self.shared.manager.is_valid(conn)).await {
            Ok(result) => result,
            Err(_) => Err(FortuneError::unavailable(format!(
                "liveness check timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    async fn dial(&self) -> FortuneResult<M::Connection> {
        let timeout = self.shared.config.dial_timeout;
        match tokio::time::timeout(timeout, self.shared.manager.connect()).await {
            Ok(Ok(conn)) => {
                tracing::debug!("dialed new backend connection");
                Ok(conn)
            }
            Ok(Err(e)) => Err(as_unavailable(e)),
            Err(_) => Err(FortuneError::unavailable(format!(
                "dial timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    fn wrap(&self, conn: M::Connection, permit: OwnedSemaphorePermit) -> PooledConnection<M> {
        PooledConnection {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
            _permit: permit,
        }
    }
}

fn as_unavailable(e: FortuneError) -> FortuneError {
    if e.is_unavailable() {
        e
    } else {
        FortuneError::unavailable(e.to_string())
    }
}

// =============================================================================
// PooledConnection
// =============================================================================

/// A connection on loan from the pool. Returned on drop, on every exit path.
pub struct PooledConnection<M: ManageConnection> {
    conn: Option<M::Connection>,
    shared: Arc<PoolShared<M>>,
    // Released after `Drop::drop` has put the connection back.
    _permit: OwnedSemaphorePermit,
}

impl<M: ManageConnection> PooledConnection<M> {
    /// Close instead of returning to the pool, e.g. after an I/O error.
    pub fn discard(mut self) {
        if self.conn.take().is_some() {
            self.shared.open_count.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl<M: ManageConnection> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl<M: ManageConnection> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.put_back(conn);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
