use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{oneshot, Mutex};

use crate::chunk::{ChunkAssembler, ChunkResult};
use crate::id_pool::IdPool;
use crate::ids::{DeviceId, PeStatus, RequestId};
use crate::transaction::{Transaction, TransactionOutcome};

/// Default per-transaction timeout, used when [`ManagerConfig::default_timeout`]
/// is not overridden and no per-call override is passed to `begin`.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_WARNING_THRESHOLD: usize = 100;
const DEFAULT_NEAR_EXHAUSTION_THRESHOLD: usize = 10;

/// Tuning knobs for a [`TransactionManager`].
///
/// A plain public struct consumed by value, with a `Default` impl supplying
/// production defaults so most callers only override the fields they care
/// about.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Applied to `begin` calls that don't pass an explicit timeout.
    pub default_timeout: Duration,
    /// Active-transaction count above which `begin` logs a leak-risk warning.
    pub warning_threshold: usize,
    /// Free-id count below which `begin` logs a leak-risk warning.
    pub near_exhaustion_threshold: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            default_timeout: DEFAULT_TIMEOUT,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            near_exhaustion_threshold: DEFAULT_NEAR_EXHAUSTION_THRESHOLD,
        }
    }
}

/// Human-readable snapshot for logging/monitoring, not meant to be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    pub active_count: usize,
    pub ids_available: usize,
    pub ids_in_use: usize,
}

struct ManagerState {
    config: ManagerConfig,
    pool: IdPool,
    transactions: HashMap<RequestId, (Transaction, ChunkAssembler)>,
    waiters: HashMap<RequestId, oneshot::Sender<TransactionOutcome>>,
    completed: HashMap<RequestId, TransactionOutcome>,
}

impl ManagerState {
    fn new(config: ManagerConfig) -> Self {
        ManagerState {
            config,
            pool: IdPool::new(),
            transactions: HashMap::new(),
            waiters: HashMap::new(),
            completed: HashMap::new(),
        }
    }

    /// Single chokepoint for I1/I2/I6: removes the transaction and its
    /// assembler, releases the id, and either resumes a registered waiter
    /// or parks the outcome for a late `wait_for_completion` call.
    fn finalize(&mut self, id: RequestId, outcome: TransactionOutcome) {
        if self.transactions.remove(&id).is_none() {
            log::debug!("finalize() called for {id} with no active transaction; ignoring");
            return;
        }
        self.pool.release(id);

        match self.waiters.remove(&id) {
            Some(tx) => {
                // Receiver may already be dropped (caller gave up waiting);
                // that's not this manager's problem.
                let _ = tx.send(outcome);
            }
            None => {
                self.completed.insert(id, outcome);
            }
        }
    }
}

/// Coordinates [`IdPool`] and a per-transaction [`ChunkAssembler`] behind an
/// async request/response surface.
///
/// Cheaply `Clone`able: every clone shares the same underlying state behind
/// one `tokio::sync::Mutex`. All mutating operations are synchronous once
/// the lock is held; only [`TransactionManager::wait_for_completion`]
/// suspends, and it does so after releasing the lock.
#[derive(Clone)]
pub struct TransactionManager {
    state: Arc<Mutex<ManagerState>>,
}

impl TransactionManager {
    pub fn new(config: ManagerConfig) -> Self {
        TransactionManager {
            state: Arc::new(Mutex::new(ManagerState::new(config))),
        }
    }

    /// Begins a new transaction for `resource` addressed to `destination`.
    ///
    /// Returns `None` iff all 128 request ids are currently in use.
    pub async fn begin(
        &self,
        resource: impl Into<String>,
        destination: DeviceId,
        timeout: Option<Duration>,
    ) -> Option<RequestId> {
        let mut state = self.state.lock().await;
        let id = state.pool.acquire()?;

        // Defensive clear: a stale late-wait outcome from a previous
        // occupant of this id slot must never leak into a new transaction.
        state.completed.remove(&id);

        let resolved_timeout = timeout.unwrap_or(state.config.default_timeout);
        let transaction = Transaction::new(id, destination, resource.into(), resolved_timeout);
        let assembler = ChunkAssembler::new(resolved_timeout);
        state.transactions.insert(id, (transaction, assembler));

        if state.pool.available_count() < state.config.near_exhaustion_threshold {
            log::warn!(
                "id pool nearing exhaustion: {} ids available",
                state.pool.available_count()
            );
        }
        if state.transactions.len() > state.config.warning_threshold {
            log::warn!(
                "active transaction count ({}) exceeds warning threshold ({})",
                state.transactions.len(),
                state.config.warning_threshold
            );
        }

        Some(id)
    }

    /// Feeds one inbound chunk to the transaction's assembler. On
    /// `ChunkResult::Complete` the transaction is finalized with `Success`.
    pub async fn process_chunk(
        &self,
        id: RequestId,
        this_chunk: u32,
        num_chunks: u32,
        header_bytes: Bytes,
        body_bytes: Bytes,
    ) -> ChunkResult {
        let mut state = self.state.lock().await;

        let resource = match state.transactions.get(&id) {
            Some((transaction, _)) => transaction.resource.clone(),
            None => {
                log::debug!("process_chunk for unknown id {id}");
                return ChunkResult::UnknownRequestId { id };
            }
        };

        let result = {
            let (_, assembler) = state.transactions.get_mut(&id).expect("checked above");
            assembler.add_chunk(id, this_chunk, num_chunks, header_bytes, body_bytes, &resource)
        };

        if let ChunkResult::Complete { header, body } = &result {
            state.finalize(
                id,
                TransactionOutcome::Success {
                    header: header.clone(),
                    body: body.clone(),
                },
            );
        }

        result
    }

    /// Completes `id` directly with a caller-supplied header and body,
    /// bypassing the assembler (used when the transport has already
    /// reassembled the response itself).
    pub async fn complete(&self, id: RequestId, header: Bytes, body: Bytes) {
        let mut state = self.state.lock().await;
        if !state.transactions.contains_key(&id) {
            log::warn!("complete() for unknown id {id}, dropping");
            return;
        }
        state.finalize(id, TransactionOutcome::Success { header, body });
    }

    /// Completes `id` with a device-reported non-2xx status. `message` is an
    /// optional human-readable detail the caller extracted from the
    /// response (the core never parses headers itself).
    pub async fn complete_with_error(
        &self,
        id: RequestId,
        status: PeStatus,
        message: Option<String>,
    ) {
        let mut state = self.state.lock().await;
        if !state.transactions.contains_key(&id) {
            log::warn!("complete_with_error() for unknown id {id}, dropping");
            return;
        }
        state.finalize(id, TransactionOutcome::Error { status, message });
    }

    /// Cancels a single transaction, resuming its waiter with `Cancelled`.
    /// No-op if `id` is unknown.
    pub async fn cancel(&self, id: RequestId) {
        let mut state = self.state.lock().await;
        if !state.transactions.contains_key(&id) {
            return;
        }
        state.finalize(id, TransactionOutcome::Cancelled);
    }

    /// Cancels every active transaction addressed to `destination`.
    pub async fn cancel_all_for(&self, destination: DeviceId) {
        let mut state = self.state.lock().await;
        let ids: Vec<RequestId> = state
            .transactions
            .iter()
            .filter(|(_, (transaction, _))| transaction.device == destination)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            state.finalize(id, TransactionOutcome::Cancelled);
        }
    }

    /// Cancels every active transaction.
    pub async fn cancel_all(&self) {
        let mut state = self.state.lock().await;
        let ids: Vec<RequestId> = state.transactions.keys().copied().collect();
        for id in ids {
            state.finalize(id, TransactionOutcome::Cancelled);
        }
    }

    /// Sweeps all transactions whose timeout has elapsed, finalizing each
    /// with `Timeout`. Returns the ids reaped this call.
    ///
    /// Iterates transactions, not assemblers: the transaction-level timeout
    /// is authoritative even though each assembler tracks its own chunk
    /// timeout internally.
    pub async fn check_timeouts(&self) -> Vec<RequestId> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let expired: Vec<RequestId> = state
            .transactions
            .iter()
            .filter(|(_, (transaction, _))| {
                now.duration_since(transaction.created_at) > transaction.timeout
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            let partial = state
                .transactions
                .get_mut(id)
                .and_then(|(_, assembler)| assembler.take_partial(*id));
            state.finalize(*id, TransactionOutcome::Timeout { partial });
        }

        if !expired.is_empty() {
            log::debug!("check_timeouts reaped {} transaction(s)", expired.len());
        }
        expired
    }

    /// Awaits the terminal outcome of `id`.
    ///
    /// If `id` already finalized before this call (the "late wait" case),
    /// the parked outcome is returned immediately. If `id` is not and has
    /// never been an active transaction, returns `Cancelled`.
    pub async fn wait_for_completion(&self, id: RequestId) -> TransactionOutcome {
        let mut state = self.state.lock().await;

        if let Some(outcome) = state.completed.remove(&id) {
            return outcome;
        }

        if !state.transactions.contains_key(&id) {
            return TransactionOutcome::Cancelled;
        }

        let (tx, rx) = oneshot::channel();
        state.waiters.insert(id, tx);
        drop(state);

        rx.await.unwrap_or(TransactionOutcome::Cancelled)
    }

    /// Snapshot of pool and transaction-table occupancy for logging.
    pub async fn diagnostics(&self) -> Diagnostics {
        let state = self.state.lock().await;
        Diagnostics {
            active_count: state.transactions.len(),
            ids_available: state.pool.available_count(),
            ids_in_use: state.pool.used_count(),
        }
    }
}
