//! Runtime event stream payloads.

use crate::{key::EntityKey, types::OpSeq};

/// Events emitted from the single-writer store loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A put or transaction commit was applied in memory.
    Committed {
        /// Sequence of the applied op.
        seq: OpSeq,
        /// Keys written by the op.
        keys: Vec<EntityKey>,
    },
    /// Persistence has reached at least this op sequence.
    DurableUpTo {
        /// Highest sequence known durable.
        op_seq: OpSeq,
    },
}
