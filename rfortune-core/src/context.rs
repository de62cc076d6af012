//! FortuneContext - Pool-Backed Entry Point
//!
//! TigerStyle: one shared pool, one connection per operation, returned on
//! every exit path.
//!
//! ```rust
//! use rfortune_core::{FortuneContext, PoolConfig, SimConnector};
//!
//! # async fn demo() -> rfortune_core::FortuneResult<()> {
//! let ctx = FortuneContext::new(SimConnector::with_seed(7), PoolConfig::default());
//! ctx.load_reader("zen", "breathe\n%\n".as_bytes()).await?;
//!
//! let fortune = ctx.pick_random(Some("zen")).await?;
//! assert_eq!(fortune.text, "breathe");
//! # Ok(())
//! # }
//! ```

use std::io::BufRead;
use std::path::Path;

use crate::admin::{self, ModuleStats};
use crate::backend::KvConnection;
use crate::config::PoolConfig;
use crate::error::FortuneResult;
use crate::fortune::Fortune;
use crate::loader::{self, LoadReport};
use crate::pool::{ConnectionPool, ManageConnection, PooledConnection};
use crate::selector;

/// Shared handle for every fortune operation. Cheap to clone.
pub struct FortuneContext<M: ManageConnection> {
    pool: ConnectionPool<M>,
}

impl<M: ManageConnection> Clone for FortuneContext<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<M> FortuneContext<M>
where
    M: ManageConnection,
    M::Connection: KvConnection,
{
    /// Build a context around a fresh pool.
    ///
    /// # Panics
    /// Panics if `config` is invalid; call `PoolConfig::validate` first on
    /// user input.
    #[must_use]
    pub fn new(manager: M, config: PoolConfig) -> Self {
        Self::from_pool(ConnectionPool::new(manager, config))
    }

    /// Build a context around an existing pool.
    #[must_use]
    pub fn from_pool(pool: ConnectionPool<M>) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &ConnectionPool<M> {
        &self.pool
    }

    // =========================================================================
    // Load
    // =========================================================================

    /// Load every module file in `dir`.
    ///
    /// # Errors
    /// See [`loader::load_dir`].
    pub async fn load_dir(&self, dir: impl AsRef<Path>) -> FortuneResult<LoadReport> {
        loader::load_dir(&self.pool, dir.as_ref()).await
    }

    /// Load one module from an in-memory or already-open source.
    ///
    /// # Errors
    /// `InvalidConfig` for an unusable module name; see
    /// [`loader::load_module`] otherwise.
    pub async fn load_reader<R: BufRead>(&self, module: &str, reader: R) -> FortuneResult<usize> {
        loader::validate_module_name(module)?;
        let count = loader::load_pooled(&self.pool, module, reader, Path::new(module)).await?;
        tracing::info!(module, count, "Loaded {} fortunes from {}", count, module);
        Ok(count)
    }

    // =========================================================================
    // Query
    // =========================================================================

    /// Pick one random fortune, optionally restricted to `module`.
    ///
    /// # Errors
    /// See [`selector::pick_random`].
    pub async fn pick_random(&self, module: Option<&str>) -> FortuneResult<Fortune> {
        let mut conn = self.pool.acquire().await?;
        let result = selector::pick_random(&mut *conn, module).await;
        settle(conn, result)
    }

    /// Fetch one fortune by module and id.
    ///
    /// # Errors
    /// See [`selector::fetch`].
    pub async fn fetch(&self, module: &str, id: u64) -> FortuneResult<Fortune> {
        let mut conn = self.pool.acquire().await?;
        let result = selector::fetch(&mut *conn, module, id).await;
        settle(conn, result)
    }

    /// Loaded modules with their fortune counts.
    ///
    /// # Errors
    /// Any backend error.
    pub async fn list_modules(&self) -> FortuneResult<Vec<ModuleStats>> {
        let mut conn = self.pool.acquire().await?;
        let result = admin::list_modules(&mut *conn).await;
        settle(conn, result)
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Remove one module atomically.
    ///
    /// # Errors
    /// See [`admin::clear_module`].
    pub async fn clear_module(&self, module: &str) -> FortuneResult<usize> {
        let mut conn = self.pool.acquire().await?;
        let result = admin::clear_module(&mut *conn, module).await;
        settle(conn, result)
    }

    /// Remove every module.
    ///
    /// # Errors
    /// See [`admin::clear_all`].
    pub async fn clear_all(&self) -> FortuneResult<usize> {
        let mut conn = self.pool.acquire().await?;
        let result = admin::clear_all(&mut *conn).await;
        settle(conn, result)
    }
}

/// Return the connection to the pool, or drop it if it lost the backend.
fn settle<M, T>(conn: PooledConnection<M>, result: FortuneResult<T>) -> FortuneResult<T>
where
    M: ManageConnection,
{
    if matches!(&result, Err(e) if e.is_unavailable()) {
        conn.discard();
    }
    result
}
