use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        indices::{self, VecIndex},
        query::QueryError,
    },
    key::{ConferenceKey, EntityKey, ProfileKey, SessionKey},
    model::{Conference, ConferenceQuery, Entity, Profile, Session, SessionQuery},
    op::{Op, StoredOp},
    types::{EntityId, OpSeq, UserId, Version},
};

/// Operation refused by the [`EntityStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A key read by the transaction changed before it committed.
    #[error("transaction contention on {0}")]
    Contention(EntityKey),
    /// Query failed validation.
    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryError),
    /// Journal replay went backwards.
    #[error("replayed op {seq} is not after latest op {latest}")]
    StaleReplay {
        /// Seq of the op being replayed.
        seq: OpSeq,
        /// Latest seq already applied.
        latest: OpSeq,
    },
}

/// A record together with the store version it was read at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The record.
    pub value: T,
    /// Seq of the op that last wrote it.
    pub version: Version,
}

/// Writes to apply atomically, valid only if every read key is still at the
/// version it was read at (0 for keys that were absent).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitRequest {
    /// Keys read, with the version seen.
    pub reads: Vec<(EntityKey, Version)>,
    /// Records to store.
    pub writes: Vec<Entity>,
}

/// Whole-store image written to checkpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshotV1 {
    /// Next id [`EntityStore::allocate_id`] hands out.
    pub next_id: EntityId,
    /// Seq of the next applied op.
    pub next_op_seq: OpSeq,
    /// Profiles in key order.
    pub profiles: Vec<Versioned<Profile>>,
    /// Conferences in key order.
    pub conferences: Vec<Versioned<Conference>>,
    /// Sessions in key order.
    pub sessions: Vec<Versioned<Session>>,
}

/// Authoritative in-memory store of profiles, conferences and sessions,
/// with per-key versions and ancestor indices.
#[derive(Debug, Default)]
pub struct EntityStore {
    profiles: HashMap<ProfileKey, Profile>,
    conferences: HashMap<ConferenceKey, Conference>,
    sessions: HashMap<SessionKey, Session>,
    versions: HashMap<EntityKey, Version>,
    conferences_by_organizer: VecIndex<UserId, ConferenceKey>,
    sessions_by_conference: VecIndex<ConferenceKey, SessionKey>,
    next_op_seq: OpSeq,
    next_id: EntityId,
}

impl EntityStore {
    /// Empty store; ids and seqs start at 1.
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            next_id: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a store, indices included, from a checkpoint image.
    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Self {
        let mut store = Self {
            next_id: snapshot.next_id,
            next_op_seq: snapshot.next_op_seq,
            ..Self::default()
        };

        let records = snapshot
            .profiles
            .into_iter()
            .map(|v| (Entity::Profile(v.value), v.version))
            .chain(
                snapshot
                    .conferences
                    .into_iter()
                    .map(|v| (Entity::Conference(v.value), v.version)),
            )
            .chain(
                snapshot
                    .sessions
                    .into_iter()
                    .map(|v| (Entity::Session(v.value), v.version)),
            );
        for (entity, version) in records {
            store.write_entity(entity, version);
        }
        store
    }

    /// Checkpoint image of the current state.
    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        StoreSnapshotV1 {
            next_id: self.next_id,
            next_op_seq: self.next_op_seq,
            profiles: self.versioned_sorted(&self.profiles, |k| EntityKey::Profile(k.clone())),
            conferences: self
                .versioned_sorted(&self.conferences, |k| EntityKey::Conference(k.clone())),
            sessions: self.versioned_sorted(&self.sessions, |k| EntityKey::Session(k.clone())),
        }
    }

    /// Hands out a fresh id; ids are never reused, including across replay.
    pub fn allocate_id(&mut self) -> (EntityId, StoredOp) {
        let id = self.next_id;
        self.next_id += 1;
        let seq = self.take_next_op_seq();
        let stored = stamped(seq, Op::Allocate { id });
        (id, stored)
    }

    /// Record and version under `key`.
    pub fn get(&self, key: &EntityKey) -> Option<Versioned<Entity>> {
        let value = match key {
            EntityKey::Profile(k) => self.profiles.get(k).cloned().map(Entity::Profile),
            EntityKey::Conference(k) => self.conferences.get(k).cloned().map(Entity::Conference),
            EntityKey::Session(k) => self.sessions.get(k).cloned().map(Entity::Session),
        }?;
        Some(Versioned {
            value,
            version: self.version(key),
        })
    }

    /// Batch [`Self::get`]; the result lines up with `keys`.
    pub fn get_multi(&self, keys: &[EntityKey]) -> Vec<Option<Versioned<Entity>>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    /// Borrowed profile.
    pub fn profile(&self, key: &ProfileKey) -> Option<&Profile> {
        self.profiles.get(key)
    }

    /// Borrowed conference.
    pub fn conference(&self, key: &ConferenceKey) -> Option<&Conference> {
        self.conferences.get(key)
    }

    /// Borrowed session.
    pub fn session(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    /// Version of `key`; 0 when absent.
    pub fn version(&self, key: &EntityKey) -> Version {
        self.versions.get(key).copied().unwrap_or(0)
    }

    /// Unconditional write of one record.
    pub fn put(&mut self, entity: Entity) -> StoredOp {
        let seq = self.take_next_op_seq();
        self.write_entity(entity.clone(), seq);
        stamped(seq, Op::Put { entity })
    }

    /// Validates every read version, then applies all writes under one op.
    pub fn commit(&mut self, request: CommitRequest) -> Result<StoredOp, StoreError> {
        if let Some((key, _)) = request
            .reads
            .iter()
            .find(|(key, version)| self.version(key) != *version)
        {
            return Err(StoreError::Contention(key.clone()));
        }

        let seq = self.take_next_op_seq();
        for entity in &request.writes {
            self.write_entity(entity.clone(), seq);
        }
        Ok(stamped(
            seq,
            Op::Commit {
                writes: request.writes,
            },
        ))
    }

    /// Runs `query`, scanning only the ancestor's conferences when it has one.
    pub fn query_conferences(&self, query: &ConferenceQuery) -> Result<Vec<Conference>, StoreError> {
        let mut candidates: Vec<&Conference> = match &query.ancestor {
            Some(parent) => self
                .conferences_by_organizer
                .get(&parent.0)
                .into_iter()
                .flatten()
                .filter_map(|k| self.conferences.get(k))
                .collect(),
            None => self.conferences.values().collect(),
        };
        candidates.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(query.execute(candidates)?)
    }

    /// Runs `query`, scanning only the ancestor's sessions when it has one.
    pub fn query_sessions(&self, query: &SessionQuery) -> Result<Vec<Session>, StoreError> {
        let mut candidates: Vec<&Session> = match &query.ancestor {
            Some(parent) => self
                .sessions_by_conference
                .get(parent)
                .into_iter()
                .flatten()
                .filter_map(|k| self.sessions.get(k))
                .collect(),
            None => self.sessions.values().collect(),
        };
        candidates.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(query.execute(candidates)?)
    }

    /// Re-applies a journaled op; its seq must be past everything applied.
    pub fn apply_replayed_op(&mut self, stored: StoredOp) -> Result<(), StoreError> {
        let latest = self.latest_op_seq();
        if stored.seq <= latest {
            return Err(StoreError::StaleReplay {
                seq: stored.seq,
                latest,
            });
        }

        match stored.op {
            Op::Allocate { id } => {
                self.next_id = self.next_id.max(id.saturating_add(1));
            }
            Op::Put { entity } => self.write_entity(entity, stored.seq),
            Op::Commit { writes } => {
                for entity in writes {
                    self.write_entity(entity, stored.seq);
                }
            }
        }
        self.bump_next_seq_from(stored.seq);
        Ok(())
    }

    /// Seq of the last applied op; 0 for a fresh store.
    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    /// Number of conferences.
    pub fn conference_count(&self) -> usize {
        self.conferences.len()
    }

    /// Number of sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn write_entity(&mut self, entity: Entity, version: Version) {
        self.versions.insert(entity.key(), version);
        match entity {
            Entity::Profile(p) => {
                self.profiles.insert(p.key.clone(), p);
            }
            Entity::Conference(c) => {
                self.next_id = self.next_id.max(c.key.id.saturating_add(1));
                indices::link(
                    &mut self.conferences_by_organizer,
                    c.key.organizer.clone(),
                    c.key.clone(),
                );
                self.conferences.insert(c.key.clone(), c);
            }
            Entity::Session(s) => {
                self.next_id = self.next_id.max(s.key.id.saturating_add(1));
                indices::link(
                    &mut self.sessions_by_conference,
                    s.key.conference.clone(),
                    s.key.clone(),
                );
                self.sessions.insert(s.key.clone(), s);
            }
        }
    }

    fn versioned_sorted<K: Ord, T: Clone>(
        &self,
        map: &HashMap<K, T>,
        to_key: impl Fn(&K) -> EntityKey,
    ) -> Vec<Versioned<T>> {
        let mut entries: Vec<(&K, &T)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(k, value)| Versioned {
                value: value.clone(),
                version: self.version(&to_key(k)),
            })
            .collect()
    }

    fn take_next_op_seq(&mut self) -> OpSeq {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        seq
    }

    fn bump_next_seq_from(&mut self, seq: OpSeq) {
        self.next_op_seq = self.next_op_seq.max(seq.saturating_add(1));
    }
}

fn stamped(seq: OpSeq, op: Op) -> StoredOp {
    StoredOp {
        seq,
        ts_ms: now_ms(),
        op,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
