//! Backend - Key-Value Connection Trait and Implementations
//!
//! TigerStyle: abstract connection with simulation-first testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    KvConnection Trait                        │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                              ↑
//!          │                              │
//! ┌────────┴────────┐           ┌────────┴────────┐
//! │  SimConnection  │           │ RedisConnection │
//! │   (testing)     │           │  (production)   │
//! └─────────────────┘           └─────────────────┘
//! ```
//!
//! Each implementation comes with a `ManageConnection` connector so both run
//! behind the same `ConnectionPool`.

mod redis;
mod sim;

use async_trait::async_trait;

use crate::error::FortuneResult;

pub use self::redis::{RedisConnection, RedisConnector};
pub use self::sim::{SimConnection, SimConnector};

// =============================================================================
// WriteOp
// =============================================================================

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Set a scalar entry
    Set {
        /// Key
        key: String,
        /// Value
        value: String,
    },
    /// Add a member to a set
    SetAdd {
        /// Set key
        key: String,
        /// Member
        member: String,
    },
    /// Remove a member from a set
    SetRemove {
        /// Set key
        key: String,
        /// Member
        member: String,
    },
    /// Delete a key of any kind
    Delete {
        /// Key
        key: String,
    },
}

impl WriteOp {
    /// `Set` op.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `SetAdd` op.
    pub fn set_add(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SetAdd {
            key: key.into(),
            member: member.into(),
        }
    }

    /// `SetRemove` op.
    pub fn set_remove(key: impl Into<String>, member: impl Into<String>) -> Self {
        Self::SetRemove {
            key: key.into(),
            member: member.into(),
        }
    }

    /// `Delete` op.
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }
}

// =============================================================================
// KvConnection
// =============================================================================

/// The backend primitives the fortune store is built on.
///
/// Commands on one connection are serialized by the backend; concurrency
/// comes from holding several connections.
#[async_trait]
pub trait KvConnection: Send {
    /// Liveness round-trip.
    async fn ping(&mut self) -> FortuneResult<()>;

    /// Add `member` to set `key`. Returns true if it was not there before.
    async fn set_add(&mut self, key: &str, member: &str) -> FortuneResult<bool>;

    /// Is `member` in set `key`?
    async fn set_is_member(&mut self, key: &str, member: &str) -> FortuneResult<bool>;

    /// One uniformly random member, `None` for an empty or missing set.
    async fn set_random_member(&mut self, key: &str) -> FortuneResult<Option<String>>;

    /// Every member of set `key`, in no particular order.
    async fn set_members(&mut self, key: &str) -> FortuneResult<Vec<String>>;

    /// Number of members in set `key`.
    async fn set_cardinality(&mut self, key: &str) -> FortuneResult<usize>;

    /// Scalar value of `key`.
    async fn get(&mut self, key: &str) -> FortuneResult<Option<String>>;

    /// Set scalar `key`.
    async fn set(&mut self, key: &str, value: &str) -> FortuneResult<()>;

    /// Atomically increment counter `key` and return the new value.
    async fn incr(&mut self, key: &str) -> FortuneResult<u64>;

    /// Apply every op or none of them.
    async fn exec_atomic(&mut self, ops: &[WriteOp]) -> FortuneResult<()>;
}
