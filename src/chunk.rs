use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use crate::ids::RequestId;

/// Outcome of feeding a chunk to a [`ChunkAssembler`], or of a timeout sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResult {
    /// All chunks 1..N observed; `body` is their concatenation in order.
    Complete { header: Bytes, body: Bytes },
    /// Still waiting on more chunks.
    Incomplete { received: usize, total: usize },
    /// The state for `id` exceeded its timeout before completing.
    Timeout {
        id: RequestId,
        received: usize,
        total: usize,
        /// Concatenation of received chunks in ascending order, present
        /// only if chunk 1 was among them (see module docs).
        partial: Option<Bytes>,
    },
    /// A chunk arrived for an id with no pending state and `num_chunks > 1`
    /// — a duplicate late response, a response to a cancelled transaction,
    /// or an id-collision misroute. Kept distinct from `Timeout` so callers
    /// can tell the two apart.
    UnknownRequestId { id: RequestId },
    /// `num_chunks == 0`, `this_chunk == 0`, or `this_chunk > num_chunks`.
    /// No state is allocated for a rejected chunk.
    Rejected { id: RequestId },
}

/// Per-id reassembly record. `expected_chunks` is fixed at first
/// observation; `header` is set exactly once, by the first chunk to carry
/// a non-empty header.
struct ChunkState {
    expected_chunks: u32,
    received: HashMap<u32, Bytes>,
    header: Bytes,
    #[allow(dead_code)] // carried for diagnostics parity with the transaction record
    resource: String,
    start_time: Instant,
    timeout: Duration,
}

impl ChunkState {
    fn is_complete(&self) -> bool {
        (1..=self.expected_chunks).all(|n| self.received.contains_key(&n))
    }

    fn assemble_ascending(&self) -> Bytes {
        let mut body = BytesMut::new();
        for n in 1..=self.expected_chunks {
            if let Some(fragment) = self.received.get(&n) {
                body.extend_from_slice(fragment);
            }
        }
        body.freeze()
    }

    /// Concatenation for partial recovery: only meaningful (and only ever
    /// called) when chunk 1 is present, so the body starts at its true
    /// offset. Trailing gaps are simply absent from the output.
    fn assemble_partial(&self) -> Bytes {
        self.assemble_ascending()
    }
}

/// Stateful, single-owner chunk reassembler.
///
/// Not safe to share without external synchronization — every mutating
/// method takes `&mut self`, matching the single-threaded-actor model the
/// owning `TransactionManager` provides.
#[derive(Default)]
pub struct ChunkAssembler {
    default_timeout: Duration,
    pending: HashMap<RequestId, ChunkState>,
}

impl ChunkAssembler {
    /// `default_timeout` is used for any state created without an explicit
    /// per-chunk timeout, i.e. via [`ChunkAssembler::add_chunk`] (the
    /// `TransactionManager` constructs one `ChunkAssembler` per transaction
    /// configured with that transaction's own timeout, so in practice this
    /// instance only ever holds its own id's state).
    pub fn new(default_timeout: Duration) -> Self {
        ChunkAssembler {
            default_timeout,
            pending: HashMap::new(),
        }
    }

    /// Feeds one chunk into the assembler.
    pub fn add_chunk(
        &mut self,
        id: RequestId,
        this_chunk: u32,
        num_chunks: u32,
        header_bytes: Bytes,
        body_bytes: Bytes,
        resource: &str,
    ) -> ChunkResult {
        if num_chunks == 0 || this_chunk == 0 || this_chunk > num_chunks {
            log::debug!(
                "rejecting malformed chunk for {id}: \
                 this_chunk={this_chunk} num_chunks={num_chunks}"
            );
            return ChunkResult::Rejected { id };
        }

        // Fast path: single-chunk resources never touch the pending map.
        if num_chunks == 1 {
            return ChunkResult::Complete {
                header: header_bytes,
                body: body_bytes,
            };
        }

        if !self.pending.contains_key(&id) {
            self.pending.insert(
                id,
                ChunkState {
                    expected_chunks: num_chunks,
                    received: HashMap::new(),
                    header: Bytes::new(),
                    resource: resource.to_string(),
                    start_time: Instant::now(),
                    timeout: self.default_timeout,
                },
            );
        }

        let state = self.pending.get_mut(&id).expect("just inserted above");

        if state.expected_chunks != num_chunks {
            log::warn!(
                "chunk count mismatch for {id}: expected {}, got {num_chunks}; discarding chunk",
                state.expected_chunks
            );
            return ChunkResult::Incomplete {
                received: state.received.len(),
                total: state.expected_chunks as usize,
            };
        }

        if !header_bytes.is_empty() && state.header.is_empty() {
            state.header = header_bytes;
        }

        state.received.entry(this_chunk).or_insert(body_bytes);

        if state.is_complete() {
            let state = self.pending.remove(&id).expect("checked above");
            ChunkResult::Complete {
                header: state.header,
                body: state.assemble_ascending(),
            }
        } else {
            ChunkResult::Incomplete {
                received: state.received.len(),
                total: state.expected_chunks as usize,
            }
        }
    }

    /// Sweeps all pending states older than their timeout, removing and
    /// reporting each as a `ChunkResult::Timeout`.
    pub fn check_timeouts(&mut self) -> Vec<ChunkResult> {
        let now = Instant::now();
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, state)| now.duration_since(state.start_time) > state.timeout)
            .map(|(id, _)| *id)
            .collect();

        expired
            .into_iter()
            .map(|id| {
                let state = self.pending.remove(&id).expect("just collected");
                let partial = if state.received.contains_key(&1) {
                    Some(state.assemble_partial())
                } else {
                    None
                };
                ChunkResult::Timeout {
                    id,
                    received: state.received.len(),
                    total: state.expected_chunks as usize,
                    partial,
                }
            })
            .collect()
    }

    /// Removes and returns whatever partial body is available for `id`,
    /// regardless of the assembler's own per-chunk timeout clock.
    ///
    /// Used by the owning transaction manager when *its* transaction-level
    /// timeout fires — that clock is authoritative (see module docs on
    /// `TransactionManager::check_timeouts`), so recovery must not wait for
    /// the assembler's own clock to agree.
    pub fn take_partial(&mut self, id: RequestId) -> Option<Bytes> {
        let state = self.pending.remove(&id)?;
        if state.received.contains_key(&1) {
            Some(state.assemble_partial())
        } else {
            None
        }
    }

    /// Discards any pending state for `id`, if present.
    pub fn cancel(&mut self, id: RequestId) {
        self.pending.remove(&id);
    }

    /// Discards all pending state.
    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    /// Number of ids with in-progress (not yet complete, not yet timed out)
    /// reassembly state. Used by tests to confirm the single-chunk fast
    /// path allocates nothing.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
