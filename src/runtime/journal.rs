//! Background writer that batches applied ops into an [`OpSink`].
//!
//! The store loop never waits on disk: it reserves a queue slot before each
//! write and learns about durability through `durable_rx`. The worker buffers
//! at most `persist_queue_bound` ops and stops receiving while it writes, so a
//! slow sink fills the queue and new writes are refused.

use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot, Mutex},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

use crate::{
    core::store::StoreSnapshotV1,
    op::{Op, StoredOp},
    persist::{OpSink, PersistError, PersistResult},
    types::OpSeq,
};

use super::handle::RuntimeConfig;

pub(crate) enum JournalMsg {
    Op(StoredOp),
    Flush {
        resp: oneshot::Sender<PersistResult<OpSeq>>,
    },
    Checkpoint {
        snapshot: StoreSnapshotV1,
        through_seq: OpSeq,
        compact: bool,
        resp: oneshot::Sender<PersistResult<()>>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Store-side ends of a running journal worker.
pub(crate) struct JournalLink {
    pub tx: mpsc::Sender<JournalMsg>,
    pub durable_rx: mpsc::UnboundedReceiver<PersistResult<OpSeq>>,
}

type SharedSink = Arc<Mutex<Box<dyn OpSink>>>;

struct JournalWorker {
    sink: SharedSink,
    pending: Vec<StoredOp>,
    durable: OpSeq,
    durable_tx: mpsc::UnboundedSender<PersistResult<OpSeq>>,
    batch_limit: usize,
    flush_on_commit: bool,
    max_latency: Duration,
}

pub(crate) fn spawn_journal(sink: Box<dyn OpSink>, config: &RuntimeConfig) -> JournalLink {
    let (tx, rx) = mpsc::channel(config.persist_queue_bound.max(1));
    let (durable_tx, durable_rx) = mpsc::unbounded_channel();
    let worker = JournalWorker {
        sink: Arc::new(Mutex::new(sink)),
        pending: Vec::new(),
        durable: 0,
        durable_tx,
        batch_limit: config.batch_max_ops.min(config.persist_queue_bound).max(1),
        flush_on_commit: config.flush_on_commit,
        max_latency: Duration::from_millis(config.batch_max_latency_ms),
    };
    tokio::spawn(worker.run(rx));
    JournalLink { tx, durable_rx }
}

impl JournalWorker {
    async fn run(mut self, mut rx: mpsc::Receiver<JournalMsg>) {
        let mut deadline = self.next_deadline();
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(JournalMsg::Op(stored)) => {
                        let commit = matches!(stored.op, Op::Commit { .. });
                        self.pending.push(stored);
                        if self.pending.len() >= self.batch_limit || (commit && self.flush_on_commit) {
                            let _ = self.drain(true).await;
                            deadline = self.next_deadline();
                        }
                    }
                    Some(JournalMsg::Flush { resp }) => {
                        let flushed = self.drain(true).await.map(|()| self.durable);
                        let _ = resp.send(flushed);
                        deadline = self.next_deadline();
                    }
                    Some(JournalMsg::Checkpoint { snapshot, through_seq, compact, resp }) => {
                        let _ = resp.send(self.checkpoint(snapshot, through_seq, compact).await);
                        deadline = self.next_deadline();
                    }
                    Some(JournalMsg::Shutdown { resp }) => {
                        if let Err(err) = self.drain(true).await {
                            warn!(error = %err, "final journal flush failed");
                        }
                        let _ = resp.send(());
                        break;
                    }
                    None => {
                        let _ = self.drain(true).await;
                        break;
                    }
                },
                _ = tokio::time::sleep_until(deadline), if !self.pending.is_empty() => {
                    let _ = self.drain(false).await;
                    deadline = self.next_deadline();
                }
            }
        }
        debug!(durable = self.durable, "journal worker stopped");
    }

    /// Appends every pending op; `sync` also flushes the sink. A batch the
    /// sink refuses stays pending, ahead of later ops, for the next drain.
    async fn drain(&mut self, sync: bool) -> PersistResult<()> {
        let appending = !self.pending.is_empty();
        if appending {
            let batch = std::mem::take(&mut self.pending);
            let (batch, appended) = on_sink(&self.sink, move |sink| {
                let appended = sink.append_ops(&batch);
                Ok((batch, appended))
            })
            .await?;
            match appended {
                Ok(seq) => self.durable = self.durable.max(seq),
                Err(err) => {
                    warn!(ops = batch.len(), error = %err, "journal append failed, keeping batch");
                    self.pending = batch;
                    return Err(self.report_failure(err));
                }
            }
        }
        if sync {
            if let Err(err) = on_sink(&self.sink, |sink| sink.flush()).await {
                return Err(self.report_failure(err));
            }
        }
        if appending {
            let _ = self.durable_tx.send(Ok(self.durable));
        }
        Ok(())
    }

    fn report_failure(&self, err: PersistError) -> PersistError {
        let _ = self.durable_tx.send(Err(PersistError::Append(err.to_string())));
        err
    }

    async fn checkpoint(
        &mut self,
        snapshot: StoreSnapshotV1,
        through_seq: OpSeq,
        compact: bool,
    ) -> PersistResult<()> {
        self.drain(true).await?;
        on_sink(&self.sink, move |sink| {
            sink.write_snapshot(&snapshot, through_seq)?;
            if compact {
                sink.compact_through(through_seq)?;
            }
            Ok(())
        })
        .await
    }

    fn next_deadline(&self) -> Instant {
        Instant::now() + self.max_latency
    }
}

/// Runs `work` against the sink on the blocking pool.
async fn on_sink<T, F>(sink: &SharedSink, work: F) -> PersistResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn OpSink) -> PersistResult<T> + Send + 'static,
{
    let sink = Arc::clone(sink);
    tokio::task::spawn_blocking(move || {
        let mut guard = sink.blocking_lock();
        work(&mut **guard)
    })
    .await
    .map_err(|err| PersistError::Join(err.to_string()))?
}
