use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Construction-time validation errors.
///
/// The transactional core itself never returns `Result` from its async
/// operations — abnormal runtime input (an unknown id, a malformed chunk)
/// is reported as data (a [`crate::chunk::ChunkResult`] or
/// [`crate::transaction::TransactionOutcome`] variant), not as an `Err`.
/// This type only guards the handful of values that are invalid by
/// construction.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[non_exhaustive]
pub enum Error {
    #[error("request id {0} is out of range (must be 0..=127)")]
    RequestIdOutOfRange(u8),
}
