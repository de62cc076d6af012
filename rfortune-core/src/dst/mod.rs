//! DST - Deterministic Simulation Testing
//!
//! Seeded randomness and fault injection for the in-memory backend.
//!
//! # Usage
//!
//! ```rust
//! use rfortune_core::dst::{SimConfig, FaultConfig, FaultType};
//! use rfortune_core::SimConnector;
//!
//! let connector = SimConnector::new(SimConfig::with_seed(42))
//!     .with_fault(FaultConfig::new(FaultType::Write, 0.1));
//! ```
//!
//! Run with explicit seed for reproducibility:
//! ```bash
//! DST_SEED=12345 cargo test
//! ```

mod config;
mod fault;
mod rng;

pub use config::SimConfig;
pub use fault::{FaultConfig, FaultInjector, FaultType};
pub use rng::DeterministicRng;
