//! TigerStyle Constants
//!
//! Limits and names carry their unit as a suffix (`_MS`, `_SECS`, `_COUNT_MAX`).

// =============================================================================
// Key-Space
// =============================================================================

/// Set of every loaded module name.
pub const MODULE_SET_KEY: &str = "fmods";

/// Prefix of the per-module set of fortune ids (`fmod/<module>`).
pub const MODULE_FORTUNE_SET_PREFIX: &str = "fmod/";

/// Prefix of the per-fortune text entry (`f/<id>`).
pub const FORTUNE_TEXT_PREFIX: &str = "f/";

/// Counter used to mint fortune ids.
pub const ID_COUNTER_KEY: &str = "fid";

/// Prefix of a fortune's display path (`fortunes/<module>/<id>`).
pub const FORTUNE_PATH_PREFIX: &str = "fortunes/";

// =============================================================================
// Module Files
// =============================================================================

/// A line consisting of exactly this text terminates a record.
pub const RECORD_DELIMITER: &str = "%";

/// Extension of `strfile` index files that sit next to fortune files.
pub const STRFILE_INDEX_EXTENSION: &str = "dat";

/// Maximum module name length in bytes.
pub const MODULE_NAME_BYTES_MAX: usize = 256;

// =============================================================================
// Pool
// =============================================================================

/// Default maximum idle connections kept by the pool.
pub const POOL_IDLE_COUNT_MAX_DEFAULT: usize = 3;

/// Default maximum live connections (idle + in use).
pub const POOL_ACTIVE_COUNT_MAX_DEFAULT: usize = 20;

/// Default idle time after which a pooled connection is evicted.
pub const POOL_IDLE_TIMEOUT_SECS_DEFAULT: u64 = 240;

/// Default bounded wait for a free connection slot.
pub const POOL_ACQUIRE_TIMEOUT_MS_DEFAULT: u64 = 2_000;

/// Default dial (connect + auth) timeout.
pub const POOL_DIAL_TIMEOUT_MS_DEFAULT: u64 = 2_000;

/// Default deadline for the liveness PING on a reused connection.
pub const POOL_PING_TIMEOUT_MS_DEFAULT: u64 = 1_000;

/// Hard ceiling on live connections a pool may be configured with.
pub const POOL_ACTIVE_COUNT_MAX_LIMIT: usize = 1_024;

// =============================================================================
// Backend
// =============================================================================

/// Default backend address.
pub const BACKEND_ADDRESS_DEFAULT: &str = "127.0.0.1:6379";

/// Host used when an address is given as `:port`.
pub const BACKEND_HOST_DEFAULT: &str = "127.0.0.1";

// =============================================================================
// Simulation
// =============================================================================

/// Environment variable holding the simulation seed.
pub const DST_SEED_ENV: &str = "DST_SEED";

/// Maximum probability accepted by a fault configuration.
pub const DST_FAULT_PROBABILITY_MAX: f64 = 1.0;
