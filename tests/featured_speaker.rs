use std::time::Duration;

use confdesk::{
    api::ConferenceApi,
    config::AppConfig,
    core::store::EntityStore,
    featured::{announcement, SharedCache, FEATURED_SPEAKER_KEY, NO_FEATURED_SPEAKER},
    forms::{
        ConferenceForm, QuerySessionByDuration, QuerySessionByKey, QuerySessionBySpeaker,
        QuerySessionByStartTime, QuerySessionByType, SessionForm,
    },
    runtime::handle::{spawn_store, StoreHandle},
    types::Identity,
};

fn organizer() -> Identity {
    Identity {
        user_id: "org".to_string(),
        email: "org@example.com".to_string(),
        nickname: "Org".to_string(),
    }
}

async fn setup() -> (ConferenceApi, StoreHandle, String) {
    let config = AppConfig::default();
    let store = spawn_store(EntityStore::new(), None, config.runtime.clone());
    let (api, _worker) = ConferenceApi::start(store.clone(), &config);
    let created = api
        .create_conference(
            Some(&organizer()),
            ConferenceForm {
                name: Some("EuroRust".to_string()),
                ..ConferenceForm::default()
            },
        )
        .await
        .expect("create");
    (api, store, created.websafe_key.expect("key"))
}

fn session(conf: &str, name: &str, speaker: &str, kind: &str, duration: i64, start: &str) -> SessionForm {
    SessionForm {
        name: Some(name.to_string()),
        type_of_session: vec![kind.to_string()],
        speaker: vec![speaker.to_string()],
        duration: Some(duration),
        start_time: Some(start.to_string()),
        websafe_conference_key: Some(conf.to_string()),
        ..SessionForm::default()
    }
}

async fn wait_for_announcement(api: &ConferenceApi) -> Option<String> {
    for _ in 0..50 {
        if let Some(value) = api.cache().get(FEATURED_SPEAKER_KEY) {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    None
}

fn names(forms: &confdesk::forms::SessionForms) -> Vec<&str> {
    forms
        .items
        .iter()
        .filter_map(|s| s.name.as_deref())
        .collect()
}

#[tokio::test]
async fn second_session_by_a_speaker_makes_them_featured() {
    let (api, store, conf) = setup().await;
    let org = organizer();

    assert_eq!(
        api.get_featured_speaker().await.expect("featured").data,
        NO_FEATURED_SPEAKER
    );

    api.create_session(Some(&org), &session(&conf, "Ownership", "Ada", "talk", 30, "09:00"))
        .await
        .expect("first");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(api.cache().get(FEATURED_SPEAKER_KEY), None);

    api.create_session(Some(&org), &session(&conf, "Lifetimes", "Ada", "workshop", 90, "13:00"))
        .await
        .expect("second");

    let expected = announcement("Ada", 2);
    assert_eq!(wait_for_announcement(&api).await.as_deref(), Some(expected.as_str()));
    assert_eq!(api.get_featured_speaker().await.expect("featured").data, expected);

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn session_queries_filter_and_order() {
    let (api, store, conf) = setup().await;
    let org = organizer();
    for form in [
        session(&conf, "Traits", "Ada", "talk", 30, "09:00"),
        session(&conf, "Async", "Grace", "workshop", 120, "13:30"),
        session(&conf, "Macros", "Grace", "talk", 45, "11:00"),
        session(&conf, "Unsafe", "Linus", "talk", 60, "16:00"),
    ] {
        api.create_session(Some(&org), &form).await.expect("create");
    }

    let all = api
        .get_conference_sessions(&QuerySessionByKey {
            websafe_conference_key: conf.clone(),
        })
        .await
        .expect("all");
    assert_eq!(names(&all), vec!["Async", "Macros", "Traits", "Unsafe"]);

    let talks = api
        .get_conference_sessions_by_type(&QuerySessionByType {
            websafe_conference_key: conf.clone(),
            type_of_session: "talk".to_string(),
        })
        .await
        .expect("by type");
    assert_eq!(names(&talks), vec!["Macros", "Traits", "Unsafe"]);

    let grace = api
        .get_sessions_by_speaker(&QuerySessionBySpeaker {
            speaker: "Grace".to_string(),
        })
        .await
        .expect("by speaker");
    assert_eq!(names(&grace), vec!["Async", "Macros"]);

    let long = api
        .get_sessions_by_duration(&QuerySessionByDuration {
            websafe_conference_key: conf.clone(),
            duration: 45,
            direction: true,
        })
        .await
        .expect("longer");
    assert_eq!(names(&long), vec!["Unsafe", "Async"]);

    let short = api
        .get_sessions_by_duration(&QuerySessionByDuration {
            websafe_conference_key: conf.clone(),
            duration: 60,
            direction: false,
        })
        .await
        .expect("shorter");
    assert_eq!(names(&short), vec!["Traits", "Macros"]);

    let afternoon = api
        .get_sessions_by_start_time(&QuerySessionByStartTime {
            websafe_conference_key: conf.clone(),
            start_time: "12:00".to_string(),
            direction: true,
        })
        .await
        .expect("after noon");
    assert_eq!(names(&afternoon), vec!["Async", "Unsafe"]);

    let bad = api
        .get_sessions_by_start_time(&QuerySessionByStartTime {
            websafe_conference_key: conf,
            start_time: "noon".to_string(),
            direction: true,
        })
        .await;
    assert!(matches!(bad, Err(confdesk::error::ApiError::DateParse(_))));

    store.shutdown().await.expect("shutdown");
}
