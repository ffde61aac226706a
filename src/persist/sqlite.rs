//! Journal and checkpoints in a single SQLite file.
//!
//! Every applied op becomes one `journal` row keyed by its seq. A checkpoint
//! stores the whole store as of `through_seq`; startup restores the newest
//! checkpoint and replays the journal rows after it.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    core::store::{EntityStore, StoreSnapshotV1},
    op::{StoredOp, StoredOpEnvelope, OP_FORMAT_VERSION},
    types::OpSeq,
};

use super::{OpSink, PersistError, PersistResult};

const CHECKPOINT_FORMAT_VERSION: u16 = 1;

#[derive(Serialize, Deserialize)]
struct Checkpoint {
    format_version: u16,
    state: StoreSnapshotV1,
}

/// [`OpSink`] backed by one SQLite connection.
pub struct SqliteOpSink {
    conn: Connection,
}

impl SqliteOpSink {
    /// Opens (creating if needed) the journal database at `path`, in WAL mode.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        Self::prepare(Connection::open(path)?)
    }

    /// Private in-memory database, gone when the sink drops.
    pub fn open_in_memory() -> PersistResult<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self { conn })
    }

    /// Rebuilds the store: newest checkpoint, then every later journal row.
    pub fn load_store(&self) -> PersistResult<EntityStore> {
        let mut store = match self.newest_checkpoint()? {
            Some(state) => EntityStore::from_snapshot(state),
            None => EntityStore::new(),
        };

        let from = store.latest_op_seq();
        let tail = self.journal_after(from)?;
        let replayed = tail.len();
        for stored in tail {
            store.apply_replayed_op(stored)?;
        }
        info!(
            from,
            replayed,
            conferences = store.conference_count(),
            sessions = store.session_count(),
            "journal loaded"
        );
        Ok(store)
    }

    /// Journal rows with seq strictly greater than `seq`, oldest first.
    pub fn journal_after(&self, seq: OpSeq) -> PersistResult<Vec<StoredOp>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, recorded_ms, body FROM journal WHERE seq > ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![seq as i64], journal_row)?;
        rows.collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .collect()
    }

    /// Highest journaled seq, 0 for an empty journal.
    pub fn latest_seq(&self) -> PersistResult<OpSeq> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM journal", [], |row| row.get(0))?;
        Ok(max.map_or(0, |seq| seq as OpSeq))
    }

    fn newest_checkpoint(&self) -> PersistResult<Option<StoreSnapshotV1>> {
        let body: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT body FROM checkpoints ORDER BY through_seq DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let Some(body) = body else {
            return Ok(None);
        };

        let checkpoint: Checkpoint = serde_json::from_slice(&body)?;
        if checkpoint.format_version != CHECKPOINT_FORMAT_VERSION {
            return Err(PersistError::Format {
                what: "checkpoint",
                found: checkpoint.format_version,
            });
        }
        Ok(Some(checkpoint.state))
    }
}

impl OpSink for SqliteOpSink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        let Some(last) = ops.last() else {
            return self.latest_seq();
        };

        let tx = self.conn.transaction()?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO journal(seq, recorded_ms, kind, written_keys, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for stored in ops {
                let keys = stored.op.written_keys();
                let written_keys = (!keys.is_empty()).then(|| {
                    keys.iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(",")
                });
                let body = serde_json::to_vec(&StoredOpEnvelope::new(stored.clone()))?;
                insert.execute(params![
                    stored.seq as i64,
                    stored.ts_ms as i64,
                    stored.op.label(),
                    written_keys,
                    body,
                ])?;
            }
        }
        tx.commit()?;
        Ok(last.seq)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }

    fn write_snapshot(&mut self, snapshot: &StoreSnapshotV1, through_seq: OpSeq) -> PersistResult<()> {
        let conferences = snapshot.conferences.len() as i64;
        let sessions = snapshot.sessions.len() as i64;
        let body = serde_json::to_vec(&Checkpoint {
            format_version: CHECKPOINT_FORMAT_VERSION,
            state: snapshot.clone(),
        })?;
        self.conn.execute(
            "INSERT OR REPLACE INTO checkpoints(through_seq, taken_ms, conferences, sessions, body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![through_seq as i64, now_ms() as i64, conferences, sessions, body],
        )?;
        debug!(through_seq, conferences, sessions, "checkpoint written");
        Ok(())
    }

    fn compact_through(&mut self, seq: OpSeq) -> PersistResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM journal WHERE seq <= ?1", params![seq as i64])?;
        debug!(seq, removed, "journal compacted");
        Ok(removed)
    }
}

/// Decodes one journal row. The row's `seq` and `recorded_ms` columns are
/// authoritative over the copies inside the body.
fn journal_row(row: &Row<'_>) -> rusqlite::Result<PersistResult<StoredOp>> {
    let seq: i64 = row.get(0)?;
    let recorded_ms: i64 = row.get(1)?;
    let body: Vec<u8> = row.get(2)?;

    let decoded = serde_json::from_slice::<StoredOpEnvelope>(&body)
        .map_err(PersistError::from)
        .and_then(|envelope| {
            if envelope.format_version == OP_FORMAT_VERSION {
                Ok(envelope.stored)
            } else {
                Err(PersistError::Format {
                    what: "journal op",
                    found: envelope.format_version,
                })
            }
        })
        .map(|mut stored| {
            stored.seq = seq as OpSeq;
            stored.ts_ms = recorded_ms as u64;
            stored
        });
    Ok(decoded)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
