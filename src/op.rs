//! Journal entries: what the store applied, in apply order.

use serde::{Deserialize, Serialize};

use crate::{
    key::EntityKey,
    model::Entity,
    types::{EntityId, OpSeq},
};

/// Bumped whenever the serialized shape of [`Op`] changes.
pub const OP_FORMAT_VERSION: u16 = 1;

/// One applied mutation. Replaying every op in seq order rebuilds the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    /// Reserve an entity id so it is never handed out again.
    Allocate {
        /// Reserved id.
        id: EntityId,
    },
    /// Unconditional single-record write.
    Put {
        /// Written record.
        entity: Entity,
    },
    /// Validated transaction commit; all writes land together.
    Commit {
        /// Written records.
        writes: Vec<Entity>,
    },
}

impl Op {
    /// Keys of every record written by this op.
    pub fn written_keys(&self) -> Vec<EntityKey> {
        match self {
            Self::Allocate { .. } => Vec::new(),
            Self::Put { entity } => vec![entity.key()],
            Self::Commit { writes } => writes.iter().map(Entity::key).collect(),
        }
    }

    /// Short name stored alongside the journal row.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allocate { .. } => "allocate",
            Self::Put { .. } => "put",
            Self::Commit { .. } => "commit",
        }
    }
}

/// An [`Op`] stamped with its place in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOp {
    /// Strictly increasing across the store's lifetime.
    pub seq: OpSeq,
    /// Wall clock at apply time, ms since the Unix epoch.
    pub ts_ms: u64,
    /// What was applied.
    pub op: Op,
}

/// On-disk form of a [`StoredOp`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredOpEnvelope {
    /// [`OP_FORMAT_VERSION`] at write time.
    pub format_version: u16,
    /// The journaled op.
    pub stored: StoredOp,
}

impl StoredOpEnvelope {
    /// Wraps `stored` at the current format version.
    pub fn new(stored: StoredOp) -> Self {
        Self {
            format_version: OP_FORMAT_VERSION,
            stored,
        }
    }
}
