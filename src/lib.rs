//! Core transactional engine for a MIDI Capability Inquiry Property
//! Exchange client.
//!
//! Three pieces compose the public surface: [`id_pool::IdPool`] allocates
//! the bounded 7-bit request-id namespace, [`chunk::ChunkAssembler`]
//! reassembles a numbered chunk stream into a header and body, and
//! [`manager::TransactionManager`] binds both to an async request/response
//! API. Most callers only need `manager` and `ids`; `chunk` and `id_pool`
//! are exposed for callers that want to observe reassembly directly (e.g.
//! in tests) rather than only through a `TransactionManager`.

pub mod chunk;
pub mod error;
pub mod id_pool;
pub mod ids;
pub mod manager;
pub mod ticker;
pub mod transaction;

pub use chunk::{ChunkAssembler, ChunkResult};
pub use error::{Error, Result};
pub use id_pool::IdPool;
pub use ids::{DeviceId, PeStatus, RequestId};
pub use manager::{Diagnostics, ManagerConfig, TransactionManager};
pub use ticker::TimeoutTicker;
pub use transaction::TransactionOutcome;
