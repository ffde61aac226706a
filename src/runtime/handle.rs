use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};
use tokio::sync::{
    broadcast,
    mpsc::{self, error::TrySendError, OwnedPermit},
    oneshot,
};
use tracing::{debug, info, warn};

use crate::{
    core::store::{CommitRequest, EntityStore, StoreError, Versioned},
    key::{ConferenceKey, EntityKey, ProfileKey, SessionKey},
    model::{Conference, ConferenceQuery, Entity, Profile, Session, SessionQuery},
    op::StoredOp,
    persist::{OpSink, PersistError, PersistResult},
    types::{EntityId, OpSeq},
};

use super::{
    events::StoreEvent,
    journal::{spawn_journal, JournalMsg},
    transaction::Transaction,
};

/// Failure of a call through [`StoreHandle`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The store refused the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The journal could not take the write.
    #[error("persistence: {0}")]
    Persist(#[from] PersistError),
    /// The store loop has stopped.
    #[error("store runtime channel closed")]
    ChannelClosed,
}

/// Journal batching and checkpoint policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Write the pending batch as soon as a transaction commit arrives.
    pub flush_on_commit: bool,
    /// Largest batch handed to the sink at once.
    pub batch_max_ops: usize,
    /// Longest an op waits in a partial batch.
    pub batch_max_latency_ms: u64,
    /// Ops that may wait for the journal, queued or buffered by the worker.
    /// Past this, new writes are rejected before they are applied.
    pub persist_queue_bound: usize,
    /// Automatic checkpoint interval in applied writes; 0 disables.
    pub snapshot_every_ops: usize,
    /// Delete journal rows covered by each checkpoint.
    pub compact_after_snapshot: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            flush_on_commit: true,
            batch_max_ops: 32,
            batch_max_latency_ms: 75,
            persist_queue_bound: 64,
            snapshot_every_ops: 2000,
            compact_after_snapshot: false,
        }
    }
}

/// Cloneable front end to the store loop. Every call is a message to the
/// loop, so reads observe every write acknowledged before them.
#[derive(Clone)]
pub struct StoreHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<StoreEvent>,
}

enum Command {
    Allocate {
        resp: oneshot::Sender<Result<EntityId, RuntimeError>>,
    },
    Get {
        key: EntityKey,
        resp: oneshot::Sender<Option<Versioned<Entity>>>,
    },
    GetMulti {
        keys: Vec<EntityKey>,
        resp: oneshot::Sender<Vec<Option<Versioned<Entity>>>>,
    },
    Put {
        entity: Entity,
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    Commit {
        request: CommitRequest,
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    QueryConferences {
        query: ConferenceQuery,
        resp: oneshot::Sender<Result<Vec<Conference>, RuntimeError>>,
    },
    QuerySessions {
        query: SessionQuery,
        resp: oneshot::Sender<Result<Vec<Session>, RuntimeError>>,
    },
    Flush {
        resp: oneshot::Sender<Result<OpSeq, RuntimeError>>,
    },
    Checkpoint {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

/// Starts the store loop, plus a journal worker when `sink` is given.
pub fn spawn_store(
    store: EntityStore,
    sink: Option<Box<dyn OpSink>>,
    config: RuntimeConfig,
) -> StoreHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<StoreEvent>(1024);

    let (journal, durable_rx) = match sink {
        Some(sink) => {
            let link = spawn_journal(sink, &config);
            (Some(link.tx), Some(link.durable_rx))
        }
        None => (None, None),
    };

    let actor = StoreActor {
        store,
        events_tx: events_tx.clone(),
        journal,
        config,
        since_checkpoint: 0,
    };
    tokio::spawn(actor.run(cmd_rx, durable_rx));

    StoreHandle { cmd_tx, events_tx }
}

impl StoreHandle {
    /// Commit and durability events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    /// Starts an optimistic transaction against this store.
    pub fn begin(&self) -> Transaction {
        Transaction::new(self.clone())
    }

    /// Reserves a fresh entity id.
    pub async fn allocate_id(&self) -> Result<EntityId, RuntimeError> {
        self.request(|resp| Command::Allocate { resp }).await?
    }

    /// Current record and version under `key`.
    pub async fn get(&self, key: EntityKey) -> Result<Option<Versioned<Entity>>, RuntimeError> {
        self.request(|resp| Command::Get { key, resp }).await
    }

    /// Batch read; the result lines up with `keys`.
    pub async fn get_multi(
        &self,
        keys: Vec<EntityKey>,
    ) -> Result<Vec<Option<Versioned<Entity>>>, RuntimeError> {
        self.request(|resp| Command::GetMulti { keys, resp }).await
    }

    /// Typed [`Self::get`].
    pub async fn get_profile(&self, key: &ProfileKey) -> Result<Option<Profile>, RuntimeError> {
        let got = self.get(key.clone().into()).await?;
        Ok(got.and_then(|v| v.value.into_profile()))
    }

    /// Typed [`Self::get`].
    pub async fn get_conference(
        &self,
        key: &ConferenceKey,
    ) -> Result<Option<Conference>, RuntimeError> {
        let got = self.get(key.clone().into()).await?;
        Ok(got.and_then(|v| v.value.into_conference()))
    }

    /// Typed [`Self::get`].
    pub async fn get_session(&self, key: &SessionKey) -> Result<Option<Session>, RuntimeError> {
        let got = self.get(key.clone().into()).await?;
        Ok(got.and_then(|v| v.value.into_session()))
    }

    /// Unconditional write, for records nobody else can be writing.
    pub async fn put(&self, entity: impl Into<Entity>) -> Result<OpSeq, RuntimeError> {
        let entity = entity.into();
        self.request(|resp| Command::Put { entity, resp }).await?
    }

    /// Applies `request` atomically, or fails with contention.
    pub async fn commit(&self, request: CommitRequest) -> Result<OpSeq, RuntimeError> {
        self.request(|resp| Command::Commit { request, resp }).await?
    }

    /// Runs a conference query against current state.
    pub async fn query_conferences(
        &self,
        query: ConferenceQuery,
    ) -> Result<Vec<Conference>, RuntimeError> {
        self.request(|resp| Command::QueryConferences { query, resp })
            .await?
    }

    /// Runs a session query against current state.
    pub async fn query_sessions(&self, query: SessionQuery) -> Result<Vec<Session>, RuntimeError> {
        self.request(|resp| Command::QuerySessions { query, resp })
            .await?
    }

    /// Waits until every op applied so far is durable; returns the durable seq.
    pub async fn flush(&self) -> Result<OpSeq, RuntimeError> {
        self.request(|resp| Command::Flush { resp }).await?
    }

    /// Writes a checkpoint of the whole store; a no-op in memory.
    pub async fn checkpoint(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Checkpoint { resp }).await?
    }

    /// Flushes the journal and stops the loop. Later calls fail with
    /// [`RuntimeError::ChannelClosed`].
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

/// Sole owner of the [`EntityStore`].
struct StoreActor {
    store: EntityStore,
    events_tx: broadcast::Sender<StoreEvent>,
    journal: Option<mpsc::Sender<JournalMsg>>,
    config: RuntimeConfig,
    since_checkpoint: usize,
}

impl StoreActor {
    async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut durable_rx: Option<mpsc::UnboundedReceiver<PersistResult<OpSeq>>>,
    ) {
        loop {
            let cmd = tokio::select! {
                cmd = cmd_rx.recv() => cmd,
                Some(durable) = next_durable(&mut durable_rx) => {
                    self.report_durable(durable);
                    continue;
                }
            };
            let Some(cmd) = cmd else {
                break;
            };
            if self.handle(cmd).await.is_break() {
                break;
            }
        }
        debug!(latest = self.store.latest_op_seq(), "store loop exited");
    }

    async fn handle(&mut self, cmd: Command) -> ControlFlow<()> {
        match cmd {
            Command::Allocate { resp } => {
                let out = self.reserve_journal().map(|permit| {
                    let (id, stored) = self.store.allocate_id();
                    self.publish(stored, permit);
                    id
                });
                let _ = resp.send(out);
            }
            Command::Get { key, resp } => {
                let _ = resp.send(self.store.get(&key));
            }
            Command::GetMulti { keys, resp } => {
                let _ = resp.send(self.store.get_multi(&keys));
            }
            Command::Put { entity, resp } => {
                let out = self.reserve_journal().map(|permit| {
                    let stored = self.store.put(entity);
                    self.publish(stored, permit)
                });
                self.count_write(&out).await;
                let _ = resp.send(out);
            }
            Command::Commit { request, resp } => {
                let out = self.reserve_journal().and_then(|permit| {
                    let stored = self.store.commit(request)?;
                    Ok(self.publish(stored, permit))
                });
                self.count_write(&out).await;
                let _ = resp.send(out);
            }
            Command::QueryConferences { query, resp } => {
                let _ = resp.send(self.store.query_conferences(&query).map_err(Into::into));
            }
            Command::QuerySessions { query, resp } => {
                let _ = resp.send(self.store.query_sessions(&query).map_err(Into::into));
            }
            Command::Flush { resp } => {
                let out = match self.ask_journal(|resp| JournalMsg::Flush { resp }).await {
                    Ok(Some(flushed)) => flushed.map_err(Into::into),
                    Ok(None) => Ok(self.store.latest_op_seq()),
                    Err(err) => Err(err),
                };
                let _ = resp.send(out);
            }
            Command::Checkpoint { resp } => {
                let _ = resp.send(self.checkpoint().await);
            }
            Command::Shutdown { resp } => {
                let out = self
                    .ask_journal(|resp| JournalMsg::Shutdown { resp })
                    .await
                    .map(|_| ());
                let _ = resp.send(out);
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Claims a journal slot ahead of a write. A full queue rejects the
    /// write before the store is touched; `None` when running in memory.
    fn reserve_journal(&self) -> Result<Option<OwnedPermit<JournalMsg>>, RuntimeError> {
        let Some(tx) = &self.journal else {
            return Ok(None);
        };
        match tx.clone().try_reserve_owned() {
            Ok(permit) => Ok(Some(permit)),
            Err(TrySendError::Full(_)) => Err(PersistError::QueueFull.into()),
            Err(TrySendError::Closed(_)) => Err(PersistError::WorkerStopped.into()),
        }
    }

    /// Hands an applied op to its reserved journal slot (or reports it
    /// durable at once when running in memory) and announces the written keys.
    fn publish(&self, stored: StoredOp, permit: Option<OwnedPermit<JournalMsg>>) -> OpSeq {
        let seq = stored.seq;
        let keys = stored.op.written_keys();
        match permit {
            Some(permit) => {
                permit.send(JournalMsg::Op(stored));
            }
            None => {
                let _ = self.events_tx.send(StoreEvent::DurableUpTo { op_seq: seq });
            }
        }
        if !keys.is_empty() {
            let _ = self.events_tx.send(StoreEvent::Committed { seq, keys });
        }
        seq
    }

    /// Counts a successful write and checkpoints once enough have piled up.
    async fn count_write(&mut self, out: &Result<OpSeq, RuntimeError>) {
        if out.is_err() {
            return;
        }
        self.since_checkpoint += 1;
        let every = self.config.snapshot_every_ops;
        if self.journal.is_none() || every == 0 || self.since_checkpoint < every {
            return;
        }
        self.since_checkpoint = 0;
        if let Err(err) = self.checkpoint().await {
            warn!(error = %err, "automatic checkpoint failed");
        }
    }

    async fn checkpoint(&self) -> Result<(), RuntimeError> {
        if self.journal.is_none() {
            return Ok(());
        }
        let snapshot = self.store.export_snapshot();
        let through_seq = self.store.latest_op_seq();
        let compact = self.config.compact_after_snapshot;
        let written = self
            .ask_journal(|resp| JournalMsg::Checkpoint {
                snapshot,
                through_seq,
                compact,
                resp,
            })
            .await?;
        if let Some(result) = written {
            result?;
            info!(through_seq, compact, "checkpoint taken");
        }
        Ok(())
    }

    /// Round trip to the journal worker; `None` when running in memory.
    async fn ask_journal<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> JournalMsg,
    ) -> Result<Option<T>, RuntimeError> {
        let Some(tx) = &self.journal else {
            return Ok(None);
        };
        let (resp_tx, resp_rx) = oneshot::channel();
        tx.send(make(resp_tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        resp_rx
            .await
            .map(Some)
            .map_err(|_| RuntimeError::ChannelClosed)
    }

    fn report_durable(&self, durable: PersistResult<OpSeq>) {
        match durable {
            Ok(op_seq) => {
                let _ = self.events_tx.send(StoreEvent::DurableUpTo { op_seq });
            }
            Err(err) => warn!(error = %err, "journal append failed"),
        }
    }
}

async fn next_durable(
    rx: &mut Option<mpsc::UnboundedReceiver<PersistResult<OpSeq>>>,
) -> Option<PersistResult<OpSeq>> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
