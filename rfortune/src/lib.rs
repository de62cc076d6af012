//! rfortune - Random Fortunes from a Key-Value Store
//!
//! Command-line and HTTP front ends over [`rfortune_core`].
//!
//! ```text
//! fortune [MODULE] [-v]      print one random fortune
//! fortune load <DIR>         load every module file in DIR
//! fortune serve              serve fragments over HTTP
//! fortune modules [--json]   list modules with counts
//! fortune get <MODULE> <ID>  print one fortune by id
//! fortune clear <MODULE>     remove a module (or --all)
//! ```

pub mod cli;
pub mod commands;
pub mod http;
pub mod logging;

pub use cli::{BackendArgs, Cli, Command, QueryArgs};
pub use commands::{execute, run};

// =============================================================================
// TigerStyle Constants
// =============================================================================

/// Binary name, also the prefix of every diagnostic on stderr
pub const APP_NAME: &str = "fortune";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP bind address
pub const HTTP_BIND_ADDRESS_DEFAULT: &str = "0.0.0.0:8080";

/// Deadline for one HTTP request, backend round-trips included
pub const HTTP_REQUEST_TIMEOUT_MS_DEFAULT: u64 = 5_000;
