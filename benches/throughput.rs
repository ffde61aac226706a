use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use confdesk::{
    core::{
        query::{Operator, Value},
        store::{CommitRequest, EntityStore},
    },
    key::{ConferenceKey, EntityKey, SessionKey},
    model::{Conference, Entity, Session, SessionProperty, SessionQuery},
};

fn conference(id: u64) -> Conference {
    let key = ConferenceKey {
        organizer: format!("org{}", id % 50),
        id,
    };
    Conference {
        organizer_user_id: key.organizer.clone(),
        key,
        name: format!("conf-{id}"),
        description: None,
        topics: vec!["rust".to_string()],
        city: Some("Berlin".to_string()),
        start_date: None,
        month: (id % 12 + 1) as i64,
        end_date: None,
        max_attendees: 1_000,
        seats_available: 1_000,
    }
}

fn session(conf: &ConferenceKey, id: u64) -> Session {
    Session {
        key: SessionKey {
            conference: conf.clone(),
            id,
        },
        name: format!("session-{id}"),
        type_of_session: vec!["talk".to_string()],
        highlights: vec![],
        speaker: vec![format!("speaker{}", id % 40)],
        duration: Some((id % 120) as i64),
        date: None,
        start_time: None,
    }
}

fn bench_puts(c: &mut Criterion) {
    c.bench_function("store_put_50k_sessions", |b| {
        b.iter(|| {
            let mut store = EntityStore::new();
            let parent = conference(1);
            store.put(Entity::Conference(parent.clone()));
            for i in 0..50_000u64 {
                store.put(Entity::Session(session(&parent.key, i + 2)));
            }
        });
    });
}

fn bench_seat_commits(c: &mut Criterion) {
    c.bench_function("store_commit_10k_seat_changes", |b| {
        b.iter(|| {
            let mut store = EntityStore::new();
            let conf = conference(1);
            let key = EntityKey::Conference(conf.key.clone());
            store.put(Entity::Conference(conf));
            for _ in 0..10_000u32 {
                let version = store.version(&key);
                let Some(mut current) = store.get(&key).and_then(|v| v.value.into_conference())
                else {
                    break;
                };
                current.seats_available -= 1;
                store
                    .commit(CommitRequest {
                        reads: vec![(key.clone(), version)],
                        writes: vec![Entity::Conference(current)],
                    })
                    .expect("commit");
            }
        });
    });
}

fn bench_session_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_duration_query");
    let mut store = EntityStore::new();
    let parents: Vec<Conference> = (1..=20u64).map(conference).collect();
    for parent in &parents {
        store.put(Entity::Conference(parent.clone()));
    }
    for i in 0..50_000u64 {
        let parent = &parents[(i % 20) as usize];
        store.put(Entity::Session(session(&parent.key, 100 + i)));
    }

    for threshold in [10i64, 60, 110] {
        let query = SessionQuery::new()
            .ancestor(parents[0].key.clone())
            .filter(SessionProperty::Duration, Operator::Gt, Value::Int(threshold))
            .order(SessionProperty::Duration)
            .order(SessionProperty::Name);
        group.bench_with_input(BenchmarkId::from_parameter(threshold), &query, |b, query| {
            b.iter(|| {
                let _ = store.query_sessions(query);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_puts, bench_seat_commits, bench_session_query);
criterion_main!(benches);
