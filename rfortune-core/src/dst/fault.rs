//! Fault Injection
//!
//! TigerStyle: every backend failure mode can be forced in simulation.

use crate::constants::DST_FAULT_PROBABILITY_MAX;
use crate::dst::DeterministicRng;

/// Where a fault is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultType {
    /// Opening a new connection
    Dial,
    /// `AUTH` on a new connection
    Auth,
    /// Liveness check on a reused connection
    Ping,
    /// Any read command
    Read,
    /// Any write command or batch
    Write,
}

/// A fault and how often it fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultConfig {
    /// Injection point
    pub fault_type: FaultType,
    /// Probability in `[0, 1]`
    pub probability: f64,
}

impl FaultConfig {
    /// Create a fault config.
    ///
    /// # Panics
    /// Panics if `probability` is outside `[0, 1]`.
    #[must_use]
    pub fn new(fault_type: FaultType, probability: f64) -> Self {
        assert!(
            (0.0..=DST_FAULT_PROBABILITY_MAX).contains(&probability),
            "fault probability {probability} outside [0, 1]"
        );
        Self {
            fault_type,
            probability,
        }
    }

    /// A fault that always fires.
    #[must_use]
    pub fn always(fault_type: FaultType) -> Self {
        Self::new(fault_type, 1.0)
    }
}

/// Decides, with its own seeded RNG, whether a fault fires.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: DeterministicRng,
    faults: Vec<FaultConfig>,
    injected_count: u64,
}

impl FaultInjector {
    /// Injector with no faults configured.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed),
            faults: Vec::new(),
            injected_count: 0,
        }
    }

    /// Register a fault.
    pub fn add(&mut self, fault: FaultConfig) {
        self.faults.push(fault);
    }

    /// Remove every fault of the given type.
    pub fn clear(&mut self, fault_type: FaultType) {
        self.faults.retain(|f| f.fault_type != fault_type);
    }

    /// Roll for `fault_type`.
    pub fn should_inject(&mut self, fault_type: FaultType) -> bool {
        let mut hit = false;
        for fault in self.faults.iter().filter(|f| f.fault_type == fault_type) {
            if self.rng.chance(fault.probability) {
                hit = true;
            }
        }
        if hit {
            self.injected_count += 1;
        }
        hit
    }

    /// Faults fired so far.
    #[must_use]
    pub fn injected_count(&self) -> u64 {
        self.injected_count
    }
}
