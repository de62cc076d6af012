//! Errors
//!
//! One taxonomy for the whole core. The selector and loader return these;
//! only the outermost layer (CLI, HTTP) turns them into exit codes or statuses.

use std::path::PathBuf;

/// Result alias used across the crate.
pub type FortuneResult<T> = Result<T, FortuneError>;

/// Everything that can go wrong talking to the fortune store.
#[derive(Debug, thiserror::Error)]
pub enum FortuneError {
    /// Dial, authentication or liveness check failed.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// No connection slot freed up within the bounded wait.
    #[error("backend unavailable: no free connection after {waited_ms}ms ({active_max} in use)")]
    PoolExhausted {
        /// How long the caller waited.
        waited_ms: u64,
        /// Configured live connection ceiling.
        active_max: usize,
    },

    /// A command failed on an established connection.
    #[error("backend command failed: {0}")]
    Backend(String),

    /// The requested module is not in the module set.
    #[error("module '{0}' not found")]
    ModuleNotFound(String),

    /// The module set is empty.
    #[error("no fortune modules loaded")]
    NoModulesLoaded,

    /// The module exists but its id set is empty.
    #[error("module '{0}' has no fortunes")]
    ModuleEmpty(String),

    /// An id is referenced by a module but has no text entry.
    #[error("data integrity violation: fortune {id} has no text")]
    DataIntegrity {
        /// The dangling fortune id.
        id: u64,
    },

    /// A module's id set holds something that is not a fortune id.
    #[error("data integrity violation: module '{module}' holds malformed id '{value}'")]
    MalformedId {
        /// Module whose set is corrupt.
        module: String,
        /// The offending member.
        value: String,
    },

    /// Lookup by id found no such fortune in the module.
    #[error("fortune {id} not found in module '{module}'")]
    FortuneNotFound {
        /// Module searched.
        module: String,
        /// Id requested.
        id: u64,
    },

    /// Reading a module file failed.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File or directory being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration rejected at startup.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FortuneError {
    /// Dial/auth/liveness failure.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Command failure on a live connection.
    pub fn command(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// File error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the backend could not be reached at all.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::PoolExhausted { .. })
    }

    /// True for the expected, user-facing "nothing to pick from" conditions.
    #[must_use]
    pub fn is_empty_scope(&self) -> bool {
        matches!(
            self,
            Self::ModuleNotFound(_) | Self::NoModulesLoaded | Self::ModuleEmpty(_)
        )
    }

    /// True when stored data breaks the key-space invariants.
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::DataIntegrity { .. } | Self::MalformedId { .. })
    }
}

impl From<redis::RedisError> for FortuneError {
    fn from(e: redis::RedisError) -> Self {
        if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() {
            Self::BackendUnavailable(e.to_string())
        } else {
            Self::Backend(e.to_string())
        }
    }
}
