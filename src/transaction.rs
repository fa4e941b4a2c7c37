use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::ids::{DeviceId, PeStatus, RequestId};

/// Terminal result of a transaction, delivered once to whoever is (or later
/// becomes) interested via
/// [`crate::manager::TransactionManager::wait_for_completion`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// The resource's header and body were fully reassembled and the
    /// header's status fell in the success range.
    Success { header: Bytes, body: Bytes },
    /// The resource was fully reassembled but the header's status was
    /// outside the success range. The caller, not the core, parses the
    /// header and reports this outcome via
    /// [`crate::manager::TransactionManager::complete_with_error`]; `message`
    /// is an optional human-readable detail the caller may extract from the
    /// device's response.
    Error {
        status: PeStatus,
        message: Option<String>,
    },
    /// Reassembly did not complete before the transaction's timeout.
    /// `partial` carries chunk 1's payload onward if it was received, for
    /// callers that can make partial use of it.
    Timeout { partial: Option<Bytes> },
    /// [`crate::manager::TransactionManager::cancel`] (or
    /// `cancel_all_for`) was called before the transaction finalized, or
    /// [`crate::manager::TransactionManager::wait_for_completion`] was
    /// called with an id the manager has no record of at all.
    Cancelled,
}

/// Internal bookkeeping record for one in-flight (or just-finalized)
/// transaction. Never exposed outside `manager`.
pub(crate) struct Transaction {
    #[allow(dead_code)] // carried for symmetry with the assembler's own id; not read directly
    pub(crate) id: RequestId,
    pub(crate) device: DeviceId,
    pub(crate) resource: String,
    pub(crate) created_at: Instant,
    pub(crate) timeout: Duration,
}

impl Transaction {
    pub(crate) fn new(
        id: RequestId,
        device: DeviceId,
        resource: String,
        timeout: Duration,
    ) -> Self {
        Transaction {
            id,
            device,
            resource,
            created_at: Instant::now(),
            timeout,
        }
    }
}
