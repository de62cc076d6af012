//! rfortune Core - Fortunes in a Key-Value Store
//!
//! TigerStyle: explicit key-space, typed failures, simulation-first testing.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              rfortune Core                   │
//! ├─────────────────────────────────────────────┤
//! │  Loader      │ module files → key-space     │
//! │  Selector    │ two-stage random pick        │
//! │  Render      │ plain text / HTML fragment   │
//! ├─────────────────────────────────────────────┤
//! │  Schema      │ fmods, fmod/<m>, f/<id>, fid │
//! │  Pool        │ bounded, PING on borrow      │
//! │  Backend     │ Redis │ Sim (fault inject)   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use rfortune_core::{FortuneContext, SimConnector, PoolConfig};
//!
//! # async fn demo() -> rfortune_core::FortuneResult<()> {
//! let ctx = FortuneContext::new(SimConnector::with_seed(42), PoolConfig::default());
//!
//! ctx.load_reader("proverbs", "a\n%\nb\n%\n".as_bytes()).await?;
//! let fortune = ctx.pick_random(None).await?;
//! println!("{}", fortune.as_plain_text(true));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod admin;
pub mod backend;
pub mod config;
pub mod constants;
pub mod context;
pub mod dst;
pub mod error;
pub mod fortune;
pub mod loader;
pub mod pool;
pub mod schema;
pub mod selector;

// Re-export common types
pub use admin::ModuleStats;
pub use backend::{
    KvConnection, RedisConnection, RedisConnector, SimConnection, SimConnector, WriteOp,
};
pub use config::{BackendConfig, PoolConfig};
pub use constants::*;
pub use context::FortuneContext;
pub use dst::{DeterministicRng, FaultConfig, FaultInjector, FaultType, SimConfig};
pub use error::{FortuneError, FortuneResult};
pub use fortune::Fortune;
pub use loader::{LoadReport, ModuleFailure, ModuleLoad, ModuleParser};
pub use pool::{ConnectionPool, ManageConnection, PoolState, PooledConnection};
