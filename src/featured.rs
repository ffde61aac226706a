//! Featured-speaker announcements.
//!
//! Session creation hands a [`SpeakerCheck`] to a bounded queue; a worker
//! counts each speaker's sessions in the conference and, for anyone with two
//! or more, writes an announcement into the shared cache. Everything here is
//! best effort: a full queue or a failed query is logged and dropped.

use std::sync::{Arc, Mutex};

use hashbrown::HashMap;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    core::query::{Operator, Value},
    key::ConferenceKey,
    model::{SessionProperty, SessionQuery},
    runtime::handle::{RuntimeError, StoreHandle},
};

/// Cache key holding the current announcement.
pub const FEATURED_SPEAKER_KEY: &str = "FeaturedSpeakerAnnouncement";
/// Returned when nothing has been announced.
pub const NO_FEATURED_SPEAKER: &str = "There are no featured speakers right now.";

/// Job: re-check these speakers within one conference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerCheck {
    /// Conference the new session belongs to.
    pub conference: ConferenceKey,
    /// Speakers named on the new session.
    pub speakers: Vec<String>,
}

/// Process-wide string cache; loss of entries is tolerated.
pub trait SharedCache: Send + Sync {
    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: String);
    /// Current value under `key`.
    fn get(&self, key: &str) -> Option<String>;
}

/// [`SharedCache`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl SharedCache for InMemoryCache {
    fn set(&self, key: &str, value: String) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.get(key).cloned()
    }
}

/// Fire-and-forget sender side of the job queue.
#[derive(Debug, Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<SpeakerCheck>,
}

impl TaskQueue {
    /// Queue holding at most `bound` jobs, plus the worker's receiving end.
    pub fn new(bound: usize) -> (Self, mpsc::Receiver<SpeakerCheck>) {
        let (tx, rx) = mpsc::channel(bound.max(1));
        (Self { tx }, rx)
    }

    /// Enqueues without waiting. Returns whether the job was accepted.
    pub fn enqueue(&self, job: SpeakerCheck) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "speaker check dropped");
                false
            }
        }
    }
}

/// Text stored under [`FEATURED_SPEAKER_KEY`].
pub fn announcement(speaker: &str, count: usize) -> String {
    format!("The current Featured Speaker is {speaker}! They will be speaking at {count} sessions.")
}

/// Counts `speaker`'s sessions in `conference` and announces them when they
/// have two or more. Returns the count.
pub async fn check_speaker(
    store: &StoreHandle,
    cache: &dyn SharedCache,
    conference: &ConferenceKey,
    speaker: &str,
) -> Result<usize, RuntimeError> {
    let query = SessionQuery::new()
        .ancestor(conference.clone())
        .filter(SessionProperty::Speaker, Operator::Eq, Value::Str(speaker.to_string()))
        .order(SessionProperty::Name);
    let count = store.query_sessions(query).await?.len();
    debug!(speaker, count, "speaker session count");
    if count >= 2 {
        cache.set(FEATURED_SPEAKER_KEY, announcement(speaker, count));
    }
    Ok(count)
}

/// Runs [`check_speaker`] for every speaker of every queued job until the
/// queue closes.
pub fn spawn_featured_speaker_worker(
    store: StoreHandle,
    cache: Arc<dyn SharedCache>,
    mut rx: mpsc::Receiver<SpeakerCheck>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            for speaker in &job.speakers {
                if let Err(err) = check_speaker(&store, cache.as_ref(), &job.conference, speaker).await
                {
                    warn!(error = %err, speaker = %speaker, "speaker check failed");
                }
            }
        }
        info!("featured speaker worker stopped");
    })
}
