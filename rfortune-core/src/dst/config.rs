//! SimConfig - Simulation Parameters

use crate::constants::DST_SEED_ENV;

/// Seed for one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimConfig {
    /// RNG seed
    pub seed: u64,
}

impl SimConfig {
    /// Fixed seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from `DST_SEED`, or a fresh random one. The seed is always logged
    /// so a failing run can be replayed.
    #[must_use]
    pub fn from_env_or_random() -> Self {
        let seed = std::env::var(DST_SEED_ENV)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or_else(rand::random);
        tracing::info!(seed, "DST seed (replay with {}={})", DST_SEED_ENV, seed);
        Self { seed }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::from_env_or_random()
    }
}
