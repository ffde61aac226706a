use hashbrown::HashMap;

use crate::{
    core::store::CommitRequest,
    key::{ConferenceKey, EntityKey, ProfileKey, SessionKey},
    model::{Conference, Entity, Profile, Session},
    types::{OpSeq, Version},
};

use super::handle::{RuntimeError, StoreHandle};

/// Optimistic read-modify-write over several records.
///
/// Reads remember the version they saw; [`Transaction::commit`] is rejected
/// by the store with a contention error if any of them has moved since.
pub struct Transaction {
    handle: StoreHandle,
    reads: HashMap<EntityKey, Version>,
    writes: Vec<Entity>,
}

impl Transaction {
    pub(crate) fn new(handle: StoreHandle) -> Self {
        Self {
            handle,
            reads: HashMap::new(),
            writes: Vec::new(),
        }
    }

    /// Reads `key` and records the version seen, for validation at commit.
    pub async fn get(&mut self, key: EntityKey) -> Result<Option<Entity>, RuntimeError> {
        let got = self.handle.get(key.clone()).await?;
        let version = got.as_ref().map_or(0, |v| v.version);
        self.reads.entry(key).or_insert(version);
        Ok(got.map(|v| v.value))
    }

    /// Typed [`Self::get`].
    pub async fn get_profile(&mut self, key: &ProfileKey) -> Result<Option<Profile>, RuntimeError> {
        Ok(self
            .get(key.clone().into())
            .await?
            .and_then(Entity::into_profile))
    }

    /// Typed [`Self::get`].
    pub async fn get_conference(
        &mut self,
        key: &ConferenceKey,
    ) -> Result<Option<Conference>, RuntimeError> {
        Ok(self
            .get(key.clone().into())
            .await?
            .and_then(Entity::into_conference))
    }

    /// Typed [`Self::get`].
    pub async fn get_session(&mut self, key: &SessionKey) -> Result<Option<Session>, RuntimeError> {
        Ok(self
            .get(key.clone().into())
            .await?
            .and_then(Entity::into_session))
    }

    /// Buffers a write; a later write to the same key replaces it.
    pub fn put(&mut self, entity: impl Into<Entity>) {
        let entity = entity.into();
        let key = entity.key();
        self.writes.retain(|w| w.key() != key);
        self.writes.push(entity);
    }

    /// Applies the buffered writes if nothing read has changed since.
    /// A stale read fails with [`StoreError::Contention`](crate::core::store::StoreError::Contention).
    pub async fn commit(self) -> Result<OpSeq, RuntimeError> {
        let mut reads: Vec<_> = self.reads.into_iter().collect();
        reads.sort();
        self.handle
            .commit(CommitRequest {
                reads,
                writes: self.writes,
            })
            .await
    }
}
