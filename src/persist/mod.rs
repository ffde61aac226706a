/// SQLite-backed [`OpSink`].
pub mod sqlite;

use crate::{
    core::store::{StoreError, StoreSnapshotV1},
    op::StoredOp,
    types::OpSeq,
};

/// Failure to journal, checkpoint or replay.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// Underlying database error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Op or checkpoint body failed to encode or decode.
    #[error("serde: {0}")]
    Serde(#[from] serde_json::Error),
    /// Replayed op rejected by the store.
    #[error("store error during replay: {0}")]
    Store(#[from] StoreError),
    /// Journal row or checkpoint written by an incompatible format.
    #[error("unsupported {what} format version {found}")]
    Format {
        /// `"checkpoint"` or `"journal op"`.
        what: &'static str,
        /// Version number read from disk.
        found: u16,
    },
    /// Persistence queue is full; the write was refused before being applied.
    #[error("persistence queue full")]
    QueueFull,
    /// Persistence worker has stopped.
    #[error("persistence worker stopped")]
    WorkerStopped,
    /// Blocking journal task failed to run to completion.
    #[error("journal task failed: {0}")]
    Join(String),
    /// Sink refused a batch; it is retried on the next drain.
    #[error("journal append failed: {0}")]
    Append(String),
}

/// Result alias for persistence calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Destination for journaled ops. Only the persistence worker calls it, on a
/// blocking thread.
pub trait OpSink: Send {
    /// Appends `ops` in sequence order, returning the highest seq now durable.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;

    /// Makes everything appended so far durable.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }

    /// Records a full-state checkpoint covering every op through `through_seq`.
    fn write_snapshot(&mut self, _snapshot: &StoreSnapshotV1, _through_seq: OpSeq) -> PersistResult<()> {
        Ok(())
    }

    /// Drops journal rows a checkpoint already covers.
    fn compact_through(&mut self, _seq: OpSeq) -> PersistResult<usize> {
        Ok(0)
    }
}
