//! Command-line surface.

use clap::{Args, Parser, Subcommand};
use rfortune_core::{
    BackendConfig, FortuneResult, PoolConfig, BACKEND_ADDRESS_DEFAULT,
    POOL_ACTIVE_COUNT_MAX_DEFAULT, POOL_IDLE_COUNT_MAX_DEFAULT,
};

use crate::{APP_NAME, HTTP_BIND_ADDRESS_DEFAULT};

/// Random fortunes from a Redis-backed store
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "Print a random fortune, load fortune files, or serve fortunes over HTTP")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub query: QueryArgs,

    #[command(flatten)]
    pub backend: BackendArgs,

    /// More logging (-d debug, -dd trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,
}

/// Default action: print one random fortune.
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Only draw from this module; use --module if it is named like a subcommand
    #[arg(value_name = "MODULE")]
    pub module: Option<String>,

    /// Only draw from this module, even one named `load` or `serve`
    #[arg(
        short,
        long = "module",
        id = "module_flag",
        value_name = "MODULE",
        conflicts_with = "module"
    )]
    pub module_flag: Option<String>,

    /// Prefix the fortune with `<module>:<id>`
    #[arg(short, long)]
    pub verbose: bool,
}

/// Backend address, credential and pool limits.
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Backend address: host:port, :port or redis:// URL
    #[arg(long, global = true, env = "FORTUNE_BACKEND", default_value = BACKEND_ADDRESS_DEFAULT)]
    pub backend: String,

    /// Backend password, sent with AUTH on every new connection
    #[arg(long, global = true, env = "FORTUNE_BACKEND_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Live connection ceiling
    #[arg(long, global = true, default_value_t = POOL_ACTIVE_COUNT_MAX_DEFAULT)]
    pub max_active: usize,

    /// Idle connections kept for reuse
    #[arg(long, global = true, default_value_t = POOL_IDLE_COUNT_MAX_DEFAULT)]
    pub max_idle: usize,
}

impl BackendArgs {
    /// Validated backend config.
    ///
    /// # Errors
    /// `InvalidConfig` for an empty address or impossible pool limits.
    pub fn config(&self) -> FortuneResult<BackendConfig> {
        let pool = PoolConfig::default()
            .with_active_count_max(self.max_active)
            .with_idle_count_max(self.max_idle);
        let config = BackendConfig::new(self.backend.as_str())
            .with_credential(self.password.clone())
            .with_pool(pool);
        config.validate()?;
        Ok(config)
    }
}

/// Subcommands; with none, a random fortune is printed.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load every fortune file in a directory (appends; re-loading duplicates)
    Load {
        /// Directory of module files; `~` is expanded
        #[arg(value_name = "DIR")]
        dir: String,
    },

    /// Serve one random fortune per HTTP GET, as an HTML fragment
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "FORTUNE_HTTP_BIND", default_value = HTTP_BIND_ADDRESS_DEFAULT)]
        bind: String,
    },

    /// List loaded modules with their fortune counts
    Modules {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print one fortune by module and id
    Get {
        /// Module the fortune belongs to
        module: String,

        /// Fortune id, as shown by `-v`
        id: u64,

        /// Prefix the fortune with `<module>:<id>`
        #[arg(short, long)]
        verbose: bool,
    },

    /// Remove a module and its fortunes
    Clear {
        /// Module to remove
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        module: Option<String>,

        /// Remove every module
        #[arg(long)]
        all: bool,
    },
}

impl QueryArgs {
    /// Module filter, from either the positional or `--module`.
    #[must_use]
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref().or(self.module_flag.as_deref())
    }
}

impl Cli {
    /// Log filter used when RUST_LOG is unset.
    ///
    /// Queries stay quiet so stdout carries only the fortune.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self.debug {
            0 => match self.command {
                Some(Command::Load { .. } | Command::Serve { .. }) => "info",
                _ => "warn",
            },
            1 => "debug",
            _ => "trace",
        }
    }
}
