//! SimConnection - In-Memory Backend for Simulation
//!
//! TigerStyle: deterministic random members, injectable faults, and
//! connection accounting so tests can check pool bounds.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{KvConnection, WriteOp};
use crate::dst::{DeterministicRng, FaultConfig, FaultInjector, FaultType, SimConfig};
use crate::error::{FortuneError, FortuneResult};
use crate::pool::ManageConnection;

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone)]
enum SimValue {
    Scalar(String),
    Set(BTreeSet<String>),
}

#[derive(Debug)]
struct SimState {
    data: HashMap<String, SimValue>,
    rng: DeterministicRng,
    faults: FaultInjector,
}

impl SimState {
    fn wrong_type(key: &str) -> FortuneError {
        FortuneError::command(format!(
            "WRONGTYPE Operation against key '{key}' holding the wrong kind of value"
        ))
    }

    fn set(&self, key: &str) -> FortuneResult<Option<&BTreeSet<String>>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(SimValue::Set(set)) => Ok(Some(set)),
            Some(SimValue::Scalar(_)) => Err(Self::wrong_type(key)),
        }
    }

    fn set_mut(&mut self, key: &str) -> FortuneResult<&mut BTreeSet<String>> {
        let value = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| SimValue::Set(BTreeSet::new()));
        match value {
            SimValue::Set(set) => Ok(set),
            SimValue::Scalar(_) => Err(Self::wrong_type(key)),
        }
    }

    fn scalar(&self, key: &str) -> FortuneResult<Option<&str>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(SimValue::Scalar(s)) => Ok(Some(s.as_str())),
            Some(SimValue::Set(_)) => Err(Self::wrong_type(key)),
        }
    }

    fn check(&mut self, fault: FaultType) -> FortuneResult<()> {
        if self.faults.should_inject(fault) {
            return Err(match fault {
                FaultType::Dial | FaultType::Auth | FaultType::Ping => {
                    FortuneError::unavailable(format!("injected {fault:?} fault"))
                }
                FaultType::Read | FaultType::Write => {
                    FortuneError::command(format!("injected {fault:?} fault"))
                }
            });
        }
        Ok(())
    }

    /// Validate every op against a scratch copy so a failing batch leaves
    /// nothing behind.
    fn apply_atomic(&mut self, ops: &[WriteOp]) -> FortuneResult<()> {
        let mut staged = self.data.clone();
        for op in ops {
            match op {
                WriteOp::Set { key, value } => {
                    staged.insert(key.clone(), SimValue::Scalar(value.clone()));
                }
                WriteOp::SetAdd { key, member } => {
                    match staged
                        .entry(key.clone())
                        .or_insert_with(|| SimValue::Set(BTreeSet::new()))
                    {
                        SimValue::Set(set) => {
                            set.insert(member.clone());
                        }
                        SimValue::Scalar(_) => return Err(Self::wrong_type(key)),
                    }
                }
                WriteOp::SetRemove { key, member } => {
                    let emptied = match staged.get_mut(key) {
                        None => false,
                        Some(SimValue::Set(set)) => {
                            set.remove(member);
                            set.is_empty()
                        }
                        Some(SimValue::Scalar(_)) => return Err(Self::wrong_type(key)),
                    };
                    if emptied {
                        staged.remove(key);
                    }
                }
                WriteOp::Delete { key } => {
                    staged.remove(key);
                }
            }
        }
        self.data = staged;
        Ok(())
    }
}

struct SimShared {
    state: Mutex<SimState>,
    open_count: AtomicUsize,
    open_peak: AtomicUsize,
    dial_count: AtomicUsize,
    required_credential: Option<String>,
    credential: Option<String>,
}

impl SimShared {
    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// =============================================================================
// SimConnector
// =============================================================================

/// In-memory backend shared by every connection it dials.
///
/// Clones share the same key-space and counters.
#[derive(Clone)]
pub struct SimConnector {
    shared: Arc<SimShared>,
}

impl SimConnector {
    /// Empty key-space seeded from `config`.
    #[must_use]
    pub fn new(config: SimConfig) -> Self {
        Self::build(config, FaultInjector::new(config.seed), None, None)
    }

    /// Empty key-space with a fixed seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::new(SimConfig::with_seed(seed))
    }

    fn build(
        config: SimConfig,
        faults: FaultInjector,
        required_credential: Option<String>,
        credential: Option<String>,
    ) -> Self {
        Self {
            shared: Arc::new(SimShared {
                state: Mutex::new(SimState {
                    data: HashMap::new(),
                    rng: DeterministicRng::new(config.seed),
                    faults,
                }),
                open_count: AtomicUsize::new(0),
                open_peak: AtomicUsize::new(0),
                dial_count: AtomicUsize::new(0),
                required_credential,
                credential,
            }),
        }
    }

    /// Register a fault.
    #[must_use]
    pub fn with_fault(self, fault: FaultConfig) -> Self {
        self.add_fault(fault);
        self
    }

    /// Make the server demand `required` and the client offer `offered`.
    ///
    /// # Panics
    /// Panics if called after the connector has been cloned.
    #[must_use]
    pub fn with_credentials(self, required: Option<&str>, offered: Option<&str>) -> Self {
        let shared = Arc::try_unwrap(self.shared)
            .unwrap_or_else(|_| panic!("with_credentials must be called before cloning"));
        let state = shared.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        Self {
            shared: Arc::new(SimShared {
                state: Mutex::new(state),
                open_count: shared.open_count,
                open_peak: shared.open_peak,
                dial_count: shared.dial_count,
                required_credential: required.map(str::to_string),
                credential: offered.map(str::to_string),
            }),
        }
    }

    /// Register a fault on a live connector.
    pub fn add_fault(&self, fault: FaultConfig) {
        self.shared.state().faults.add(fault);
    }

    /// Remove every fault of `fault_type`.
    pub fn clear_fault(&self, fault_type: FaultType) {
        self.shared.state().faults.clear(fault_type);
    }

    /// Connections currently open.
    #[must_use]
    pub fn open_connections(&self) -> usize {
        self.shared.open_count.load(Ordering::SeqCst)
    }

    /// Most connections ever open at once.
    #[must_use]
    pub fn peak_connections(&self) -> usize {
        self.shared.open_peak.load(Ordering::SeqCst)
    }

    /// Successful dials so far.
    #[must_use]
    pub fn dial_count(&self) -> usize {
        self.shared.dial_count.load(Ordering::SeqCst)
    }

    /// Members of set `key`, bypassing faults.
    #[must_use]
    pub fn peek_set(&self, key: &str) -> BTreeSet<String> {
        match self.shared.state().data.get(key) {
            Some(SimValue::Set(set)) => set.clone(),
            _ => BTreeSet::new(),
        }
    }

    /// Scalar `key`, bypassing faults.
    #[must_use]
    pub fn peek_scalar(&self, key: &str) -> Option<String> {
        match self.shared.state().data.get(key) {
            Some(SimValue::Scalar(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Number of keys in the key-space.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.shared.state().data.len()
    }

    /// Delete `key` behind the store's back, e.g. to break an invariant.
    pub fn remove_key(&self, key: &str) {
        self.shared.state().data.remove(key);
    }

    /// Add a set member behind the store's back.
    pub fn insert_member(&self, key: &str, member: &str) {
        let mut state = self.shared.state();
        if let Ok(set) = state.set_mut(key) {
            set.insert(member.to_string());
        }
    }
}

#[async_trait]
impl ManageConnection for SimConnector {
    type Connection = SimConnection;

    async fn connect(&self) -> FortuneResult<SimConnection> {
        {
            let mut state = self.shared.state();
            state.check(FaultType::Dial)?;
            if let Some(required) = &self.shared.required_credential {
                state.check(FaultType::Auth)?;
                if self.shared.credential.as_deref() != Some(required.as_str()) {
                    return Err(FortuneError::unavailable(
                        "authentication failed: WRONGPASS invalid password",
                    ));
                }
            }
        }

        self.shared.dial_count.fetch_add(1, Ordering::SeqCst);
        let open = self.shared.open_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.open_peak.fetch_max(open, Ordering::SeqCst);

        Ok(SimConnection {
            shared: Arc::clone(&self.shared),
        })
    }

    async fn is_valid(&self, conn: &mut SimConnection) -> FortuneResult<()> {
        conn.ping().await
    }
}

// =============================================================================
// SimConnection
// =============================================================================

/// One simulated connection.
pub struct SimConnection {
    shared: Arc<SimShared>,
}

impl SimConnection {
    fn read<T>(&self, f: impl FnOnce(&mut SimState) -> FortuneResult<T>) -> FortuneResult<T> {
        let mut state = self.shared.state();
        state.check(FaultType::Read)?;
        f(&mut state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut SimState) -> FortuneResult<T>) -> FortuneResult<T> {
        let mut state = self.shared.state();
        state.check(FaultType::Write)?;
        f(&mut state)
    }
}

impl Drop for SimConnection {
    fn drop(&mut self) {
        self.shared.open_count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvConnection for SimConnection {
    async fn ping(&mut self) -> FortuneResult<()> {
        self.shared.state().check(FaultType::Ping)
    }

    async fn set_add(&mut self, key: &str, member: &str) -> FortuneResult<bool> {
        self.write(|s| Ok(s.set_mut(key)?.insert(member.to_string())))
    }

    async fn set_is_member(&mut self, key: &str, member: &str) -> FortuneResult<bool> {
        self.read(|s| Ok(s.set(key)?.is_some_and(|set| set.contains(member))))
    }

    async fn set_random_member(&mut self, key: &str) -> FortuneResult<Option<String>> {
        self.read(|s| {
            let len = match s.set(key)? {
                Some(set) if !set.is_empty() => set.len(),
                _ => return Ok(None),
            };
            let index = s.rng.index(len);
            Ok(s.set(key)?.and_then(|set| set.iter().nth(index).cloned()))
        })
    }

    async fn set_members(&mut self, key: &str) -> FortuneResult<Vec<String>> {
        self.read(|s| Ok(s.set(key)?.map(|set| set.iter().cloned().collect()).unwrap_or_default()))
    }

    async fn set_cardinality(&mut self, key: &str) -> FortuneResult<usize> {
        self.read(|s| Ok(s.set(key)?.map_or(0, BTreeSet::len)))
    }

    async fn get(&mut self, key: &str) -> FortuneResult<Option<String>> {
        self.read(|s| Ok(s.scalar(key)?.map(str::to_string)))
    }

    async fn set(&mut self, key: &str, value: &str) -> FortuneResult<()> {
        self.write(|s| {
            s.data.insert(key.to_string(), SimValue::Scalar(value.to_string()));
            Ok(())
        })
    }

    async fn incr(&mut self, key: &str) -> FortuneResult<u64> {
        self.write(|s| {
            let current = match s.scalar(key)? {
                None => 0,
                Some(v) => v.parse::<u64>().map_err(|_| {
                    FortuneError::command("ERR value is not an integer or out of range")
                })?,
            };
            let next = current + 1;
            s.data.insert(key.to_string(), SimValue::Scalar(next.to_string()));
            Ok(next)
        })
    }

    async fn exec_atomic(&mut self, ops: &[WriteOp]) -> FortuneResult<()> {
        self.write(|s| s.apply_atomic(ops))
    }
}
