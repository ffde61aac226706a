use std::{sync::{Arc, Mutex}, time::Duration};

use confdesk::{
    api::ConferenceApi,
    config::AppConfig,
    core::store::{EntityStore, StoreError},
    error::ApiError,
    forms::ConferenceForm,
    key::{ConferenceKey, EntityKey},
    model::Conference,
    op::StoredOp,
    persist::{OpSink, PersistError, PersistResult},
    runtime::{
        events::StoreEvent,
        handle::{spawn_store, RuntimeConfig, RuntimeError},
    },
    types::{Identity, OpSeq},
};

fn conference(organizer: &str, id: u64, seats: i64) -> Conference {
    Conference {
        key: ConferenceKey {
            organizer: organizer.to_string(),
            id,
        },
        name: format!("conf-{id}"),
        description: None,
        organizer_user_id: organizer.to_string(),
        topics: vec!["Default".to_string(), "Topic".to_string()],
        city: Some("Default City".to_string()),
        start_date: None,
        month: 0,
        end_date: None,
        max_attendees: seats,
        seats_available: seats,
    }
}

struct SlowSink {
    seen: Arc<Mutex<Vec<OpSeq>>>,
    delay: Duration,
}

impl OpSink for SlowSink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        std::thread::sleep(self.delay);
        let mut seen = self.seen.lock().expect("lock");
        for op in ops {
            seen.push(op.seq);
        }
        Ok(ops.last().map(|o| o.seq).unwrap_or(0))
    }
}

/// Refuses the first `failures_left` appends, then records like [`SlowSink`].
struct FlakySink {
    seen: Arc<Mutex<Vec<OpSeq>>>,
    failures_left: usize,
}

impl OpSink for FlakySink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(PersistError::Append("disk unavailable".to_string()));
        }
        let mut seen = self.seen.lock().expect("lock");
        seen.extend(ops.iter().map(|o| o.seq));
        Ok(ops.last().map(|o| o.seq).unwrap_or(0))
    }
}

#[tokio::test]
async fn runtime_put_commit_and_events_ordered() {
    let handle = spawn_store(EntityStore::new(), None, RuntimeConfig::default());
    let mut sub = handle.subscribe();

    let id = handle.allocate_id().await.expect("allocate");
    let conf = conference("alice", id, 5);
    let key = conf.key.clone();
    let put_seq = handle.put(conf).await.expect("put");

    let mut tx = handle.begin();
    let mut loaded = tx.get_conference(&key).await.expect("get").expect("present");
    loaded.seats_available -= 1;
    tx.put(loaded);
    let commit_seq = tx.commit().await.expect("commit");
    assert!(commit_seq > put_seq);

    let stored = handle.get_conference(&key).await.expect("get").expect("record");
    assert_eq!(stored.seats_available, 4);

    let mut seen = Vec::new();
    for _ in 0..8 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        if !matches!(evt, StoreEvent::DurableUpTo { .. }) {
            seen.push(evt);
        }
        if seen.len() == 2 {
            break;
        }
    }

    let expected_keys = vec![EntityKey::Conference(key)];
    assert_eq!(
        seen[0],
        StoreEvent::Committed {
            seq: put_seq,
            keys: expected_keys.clone()
        }
    );
    assert_eq!(
        seen[1],
        StoreEvent::Committed {
            seq: commit_seq,
            keys: expected_keys
        }
    );

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn stale_read_is_rejected_as_contention() {
    let handle = spawn_store(EntityStore::new(), None, RuntimeConfig::default());
    let conf = conference("bob", 1, 1);
    let key = conf.key.clone();
    handle.put(conf).await.expect("put");

    let mut first = handle.begin();
    let mut second = handle.begin();
    let mut a = first.get_conference(&key).await.expect("get").expect("present");
    let mut b = second.get_conference(&key).await.expect("get").expect("present");
    a.seats_available -= 1;
    b.seats_available -= 1;
    first.put(a);
    second.put(b);

    first.commit().await.expect("first commit");
    let err = second.commit().await.expect_err("stale");
    assert!(matches!(
        err,
        RuntimeError::Store(StoreError::Contention(EntityKey::Conference(ref k))) if *k == key
    ));

    let stored = handle.get_conference(&key).await.expect("get").expect("record");
    assert_eq!(stored.seats_available, 0);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn durable_event_advances_and_full_queue_rejects_writes_unapplied() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = SlowSink {
        seen: Arc::clone(&seen),
        delay: Duration::from_millis(250),
    };

    let cfg = RuntimeConfig {
        flush_on_commit: true,
        batch_max_ops: 16,
        batch_max_latency_ms: 500,
        persist_queue_bound: 1,
        snapshot_every_ops: 0,
        compact_after_snapshot: false,
    };

    let handle = spawn_store(EntityStore::new(), Some(Box::new(sink)), cfg);
    let mut sub = handle.subscribe();

    let key = conference("carol", 1, 3).key;
    let mut tx = handle.begin();
    assert!(tx.get_conference(&key).await.expect("get").is_none());
    tx.put(conference("carol", 1, 3));
    tx.commit().await.expect("commit");

    let mut durable_seen = false;
    for _ in 0..5 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("recv timeout")
            .expect("recv");
        if matches!(evt, StoreEvent::DurableUpTo { .. }) {
            durable_seen = true;
            break;
        }
    }
    assert!(durable_seen, "expected DurableUpTo event");

    let mut rejected = None;
    for i in 0..12u64 {
        let conf = conference("carol", i + 2, 3);
        let key = conf.key.clone();
        match handle.put(conf).await {
            Ok(_) => {}
            Err(err) => {
                rejected = Some((key, err));
                break;
            }
        }
    }
    let (rejected_key, err) = rejected.expect("a full journal queue must refuse writes");
    assert!(matches!(
        err,
        RuntimeError::Persist(PersistError::QueueFull)
    ));
    assert_eq!(
        handle.get_conference(&rejected_key).await.expect("get"),
        None,
        "a refused write must not be applied"
    );

    let latest = handle.flush().await.expect("flush");
    handle.shutdown().await.expect("shutdown");
    let seen = seen.lock().expect("lock").clone();
    assert_eq!(seen, (1..=latest).collect::<Vec<_>>(), "journal has no gaps");
}

#[tokio::test]
async fn refused_append_is_retried_without_gaps() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = FlakySink {
        seen: Arc::clone(&seen),
        failures_left: 1,
    };
    let cfg = RuntimeConfig {
        flush_on_commit: false,
        batch_max_ops: 1,
        batch_max_latency_ms: 20,
        persist_queue_bound: 8,
        snapshot_every_ops: 0,
        compact_after_snapshot: false,
    };
    let handle = spawn_store(EntityStore::new(), Some(Box::new(sink)), cfg);

    let first = handle.put(conference("dave", 1, 2)).await.expect("first put");
    let second = handle.put(conference("dave", 2, 2)).await.expect("second put");
    assert_eq!((first, second), (1, 2));

    let durable = handle.flush().await.expect("flush");
    assert_eq!(durable, 2);
    handle.shutdown().await.expect("shutdown");
    assert_eq!(*seen.lock().expect("lock"), vec![1, 2]);
}

#[tokio::test]
async fn api_never_reports_failure_for_an_applied_write() {
    let sink = SlowSink {
        seen: Arc::new(Mutex::new(Vec::new())),
        delay: Duration::from_millis(400),
    };
    let config = AppConfig {
        runtime: RuntimeConfig {
            flush_on_commit: true,
            batch_max_ops: 1,
            batch_max_latency_ms: 50,
            persist_queue_bound: 1,
            snapshot_every_ops: 0,
            compact_after_snapshot: false,
        },
        ..AppConfig::default()
    };
    let store = spawn_store(EntityStore::new(), Some(Box::new(sink)), config.runtime.clone());
    let (api, _worker) = ConferenceApi::start(store.clone(), &config);
    let org = Identity {
        user_id: "org".to_string(),
        email: "org@example.com".to_string(),
        nickname: "Org".to_string(),
    };
    let form = ConferenceForm {
        name: Some("c".to_string()),
        max_attendees: Some(5),
        ..ConferenceForm::default()
    };

    let outcome = api.create_conference(Some(&org), form.clone()).await;
    let created = api.get_conferences_created(Some(&org)).await.expect("created").items;
    match outcome {
        Ok(_) => assert_eq!(created.len(), 1),
        Err(ApiError::Transient(_)) => assert!(created.is_empty(), "refused create was stored"),
        Err(other) => panic!("unexpected error: {other:?}"),
    }

    // Refused attempts leave nothing behind, so retrying until one lands
    // adds exactly one conference.
    let before = created.len();
    let mut landed = false;
    for _ in 0..10 {
        store.flush().await.expect("flush");
        match api.create_conference(Some(&org), form.clone()).await {
            Ok(_) => {
                landed = true;
                break;
            }
            Err(ApiError::Transient(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert!(landed, "create never got through");
    let after = api.get_conferences_created(Some(&org)).await.expect("created").items;
    assert_eq!(after.len(), before + 1);

    store.shutdown().await.expect("shutdown");
}
