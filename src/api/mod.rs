//! Conference API endpoints.
//!
//! Handlers are stateless: every call goes through the [`StoreHandle`], and
//! read-modify-write sequences run as optimistic transactions retried a
//! bounded number of times on contention.

use std::{future::Future, sync::Arc};

use tokio::task::JoinHandle;
use tracing::warn;

use crate::{
    config::{AppConfig, ConferenceDefaults},
    core::store::StoreError,
    error::ApiError,
    featured::{spawn_featured_speaker_worker, InMemoryCache, SharedCache, TaskQueue},
    key::{ConferenceKey, EntityKey, ProfileKey, SessionKey},
    model::Profile,
    runtime::{
        handle::{RuntimeError, StoreHandle},
        transaction::Transaction,
    },
    types::Identity,
};

mod conference;
mod profile;
mod session;
mod wishlist;

/// Endpoint implementations over one store.
#[derive(Clone)]
pub struct ConferenceApi {
    store: StoreHandle,
    defaults: Arc<ConferenceDefaults>,
    transaction_attempts: u32,
    tasks: TaskQueue,
    cache: Arc<dyn SharedCache>,
}

/// Result of one transaction attempt.
enum Attempt<T> {
    Committed(T),
    Contended(EntityKey),
}

impl ConferenceApi {
    /// Builds the API over `store`, queuing speaker checks on `tasks`.
    pub fn new(
        store: StoreHandle,
        config: &AppConfig,
        tasks: TaskQueue,
        cache: Arc<dyn SharedCache>,
    ) -> Self {
        Self {
            store,
            defaults: Arc::new(config.conference_defaults.clone()),
            transaction_attempts: config.transaction_attempts.max(1),
            tasks,
            cache,
        }
    }

    /// Wires an in-memory cache and a featured-speaker worker to `store`.
    pub fn start(store: StoreHandle, config: &AppConfig) -> (Self, JoinHandle<()>) {
        let cache: Arc<dyn SharedCache> = Arc::new(InMemoryCache::default());
        let (tasks, rx) = TaskQueue::new(config.task_queue_bound);
        let worker = spawn_featured_speaker_worker(store.clone(), Arc::clone(&cache), rx);
        (Self::new(store, config, tasks, cache), worker)
    }

    /// Underlying store handle.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Cache holding the featured-speaker announcement.
    pub fn cache(&self) -> &Arc<dyn SharedCache> {
        &self.cache
    }

    /// Runs `attempt` until it commits, fails, or the attempt budget is spent.
    async fn retrying<T, F, Fut>(&self, what: &'static str, mut attempt: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt<T>, ApiError>>,
    {
        for n in 1..=self.transaction_attempts {
            match attempt().await? {
                Attempt::Committed(value) => return Ok(value),
                Attempt::Contended(key) => {
                    warn!(what, attempt = n, key = %key, "transaction contended");
                }
            }
        }
        Err(ApiError::Transient(format!(
            "{what}: too much contention, try again"
        )))
    }

    /// Caller's profile, creating and storing a fresh one on first access.
    async fn load_or_create_profile(&self, identity: &Identity) -> Result<Profile, ApiError> {
        let key = ProfileKey::new(identity.user_id.clone());
        if let Some(profile) = self.store.get_profile(&key).await? {
            return Ok(profile);
        }
        self.retrying("create profile", move || async move {
            let mut tx = self.store.begin();
            let profile = profile_in(&mut tx, identity).await?;
            tx.put(profile.clone());
            commit(tx, profile).await
        })
        .await
    }
}

fn require_identity(identity: Option<&Identity>) -> Result<&Identity, ApiError> {
    identity.ok_or(ApiError::Unauthenticated)
}

fn conference_key(websafe: &str) -> Result<ConferenceKey, ApiError> {
    ConferenceKey::from_websafe(websafe)
        .map_err(|_| ApiError::NotFound(format!("no conference found with key: {websafe}")))
}

fn session_key(websafe: &str) -> Result<SessionKey, ApiError> {
    SessionKey::from_websafe(websafe)
        .map_err(|_| ApiError::NotFound(format!("there is no session with key: {websafe}")))
}

/// Reads the caller's profile inside `tx`, or a fresh one if absent.
async fn profile_in(tx: &mut Transaction, identity: &Identity) -> Result<Profile, ApiError> {
    let key = ProfileKey::new(identity.user_id.clone());
    Ok(tx
        .get_profile(&key)
        .await?
        .unwrap_or_else(|| Profile::for_identity(identity)))
}

async fn commit<T>(tx: Transaction, value: T) -> Result<Attempt<T>, ApiError> {
    match tx.commit().await {
        Ok(_) => Ok(Attempt::Committed(value)),
        Err(RuntimeError::Store(StoreError::Contention(key))) => Ok(Attempt::Contended(key)),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{
        core::store::EntityStore,
        model::Conference,
        runtime::handle::{spawn_store, RuntimeConfig},
    };

    fn conference(key: ConferenceKey, seats: i64) -> Conference {
        Conference {
            organizer_user_id: key.organizer.clone(),
            key,
            name: "RustConf".to_string(),
            description: None,
            topics: vec![],
            city: None,
            start_date: None,
            month: 0,
            end_date: None,
            max_attendees: seats,
            seats_available: seats,
        }
    }

    #[tokio::test]
    async fn contention_on_every_attempt_ends_transient_without_writes() {
        let store = spawn_store(EntityStore::new(), None, RuntimeConfig::default());
        let config = AppConfig {
            transaction_attempts: 3,
            ..AppConfig::default()
        };
        let (api, _worker) = ConferenceApi::start(store.clone(), &config);
        let key = ConferenceKey {
            organizer: "org".to_string(),
            id: 1,
        };
        store.put(conference(key.clone(), 5)).await.expect("seed");

        let attempts = AtomicU32::new(0);
        let (api_ref, key_ref, attempts_ref) = (&api, &key, &attempts);
        let outcome: Result<(), ApiError> = api
            .retrying("take seat", move || async move {
                let n = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
                let mut tx = api_ref.store.begin();
                let mut conf = tx
                    .get_conference(key_ref)
                    .await?
                    .expect("seeded conference");

                // Another writer lands between this read and the commit.
                let mut rival = conf.clone();
                rival.description = Some(format!("edit {n}"));
                api_ref.store.put(rival).await?;

                conf.seats_available -= 1;
                tx.put(conf);
                commit(tx, ()).await
            })
            .await;

        assert!(matches!(outcome, Err(ApiError::Transient(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let stored = store
            .get_conference(&key)
            .await
            .expect("get")
            .expect("record");
        assert_eq!(stored.seats_available, 5);
        assert_eq!(stored.description.as_deref(), Some("edit 3"));
        store.shutdown().await.expect("shutdown");
    }
}
