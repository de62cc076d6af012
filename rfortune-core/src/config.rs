//! Configuration
//!
//! Everything is supplied at process start; there is no runtime reconfiguration.

use std::time::Duration;

use crate::constants::{
    BACKEND_ADDRESS_DEFAULT, BACKEND_HOST_DEFAULT, POOL_ACQUIRE_TIMEOUT_MS_DEFAULT,
    POOL_ACTIVE_COUNT_MAX_DEFAULT, POOL_ACTIVE_COUNT_MAX_LIMIT, POOL_DIAL_TIMEOUT_MS_DEFAULT,
    POOL_IDLE_COUNT_MAX_DEFAULT, POOL_IDLE_TIMEOUT_SECS_DEFAULT, POOL_PING_TIMEOUT_MS_DEFAULT,
};
use crate::error::{FortuneError, FortuneResult};

// =============================================================================
// PoolConfig
// =============================================================================

/// Connection pool limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Idle connections kept for reuse
    pub idle_count_max: usize,
    /// Live connections, idle plus in use
    pub active_count_max: usize,
    /// Idle connections older than this are closed instead of reused
    pub idle_timeout: Duration,
    /// Bounded wait for a free slot; zero fails immediately
    pub acquire_timeout: Duration,
    /// Connect + auth deadline for a new connection
    pub dial_timeout: Duration,
    /// Liveness check deadline for a reused connection
    pub ping_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_count_max: POOL_IDLE_COUNT_MAX_DEFAULT,
            active_count_max: POOL_ACTIVE_COUNT_MAX_DEFAULT,
            idle_timeout: Duration::from_secs(POOL_IDLE_TIMEOUT_SECS_DEFAULT),
            acquire_timeout: Duration::from_millis(POOL_ACQUIRE_TIMEOUT_MS_DEFAULT),
            dial_timeout: Duration::from_millis(POOL_DIAL_TIMEOUT_MS_DEFAULT),
            ping_timeout: Duration::from_millis(POOL_PING_TIMEOUT_MS_DEFAULT),
        }
    }
}

impl PoolConfig {
    /// Set the live connection ceiling.
    #[must_use]
    pub fn with_active_count_max(mut self, n: usize) -> Self {
        self.active_count_max = n;
        self
    }

    /// Set how many idle connections are kept.
    #[must_use]
    pub fn with_idle_count_max(mut self, n: usize) -> Self {
        self.idle_count_max = n;
        self
    }

    /// Set the idle eviction timeout.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the bounded wait for a free slot.
    #[must_use]
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the dial deadline.
    #[must_use]
    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    /// Set the liveness check deadline.
    #[must_use]
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    /// Reject limits the pool cannot honour.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for a zero or oversized ceiling, or more idle
    /// than live connections.
    pub fn validate(&self) -> FortuneResult<()> {
        if self.active_count_max == 0 {
            return Err(FortuneError::InvalidConfig(
                "active connection limit must be positive".into(),
            ));
        }
        if self.active_count_max > POOL_ACTIVE_COUNT_MAX_LIMIT {
            return Err(FortuneError::InvalidConfig(format!(
                "active connection limit {} exceeds {}",
                self.active_count_max, POOL_ACTIVE_COUNT_MAX_LIMIT
            )));
        }
        if self.ping_timeout.is_zero() {
            return Err(FortuneError::InvalidConfig(
                "liveness check timeout must be positive".into(),
            ));
        }
        if self.idle_count_max > self.active_count_max {
            return Err(FortuneError::InvalidConfig(format!(
                "idle limit {} exceeds active limit {}",
                self.idle_count_max, self.active_count_max
            )));
        }
        Ok(())
    }
}

// =============================================================================
// BackendConfig
// =============================================================================

/// Where the backend lives and how to talk to it.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// `host:port`, `:port` or a `redis://` URL
    pub address: String,
    /// Shared credential sent with `AUTH` on every new connection
    pub credential: Option<String>,
    /// Pool limits
    pub pool: PoolConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::new(BACKEND_ADDRESS_DEFAULT)
    }
}

impl BackendConfig {
    /// Config for `address` with default pool limits and no credential.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            credential: None,
            pool: PoolConfig::default(),
        }
    }

    /// Set the credential. Empty strings mean "no credential".
    #[must_use]
    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential.filter(|c| !c.is_empty());
        self
    }

    /// Set pool limits.
    #[must_use]
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Connection URL without the credential (that goes through `AUTH`).
    #[must_use]
    pub fn url(&self) -> String {
        let address = self.address.trim();
        if address.starts_with("redis://") || address.starts_with("rediss://") {
            return address.to_string();
        }
        if let Some(port) = address.strip_prefix(':') {
            return format!("redis://{BACKEND_HOST_DEFAULT}:{port}/");
        }
        format!("redis://{address}/")
    }

    /// Validate address and pool limits.
    ///
    /// # Errors
    /// Returns `InvalidConfig` for an empty address or bad pool limits.
    pub fn validate(&self) -> FortuneResult<()> {
        if self.address.trim().is_empty() {
            return Err(FortuneError::InvalidConfig(
                "backend address cannot be empty".into(),
            ));
        }
        self.pool.validate()
    }
}
