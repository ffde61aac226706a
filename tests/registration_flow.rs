use confdesk::{
    api::ConferenceApi,
    config::AppConfig,
    core::store::EntityStore,
    error::ApiError,
    forms::{ConferenceForm, ConferenceGetRequest, ProfileMiniForm, SessionForm, SessionWebsafe},
    runtime::handle::{spawn_store, StoreHandle},
    types::{Identity, TeeShirtSize},
};

fn identity(user: &str) -> Identity {
    Identity {
        user_id: user.to_string(),
        email: format!("{user}@example.com"),
        nickname: user.to_string(),
    }
}

fn start() -> (ConferenceApi, StoreHandle) {
    let config = AppConfig::default();
    let store = spawn_store(EntityStore::new(), None, config.runtime.clone());
    let (api, _worker) = ConferenceApi::start(store.clone(), &config);
    (api, store)
}

async fn create(api: &ConferenceApi, organizer: &Identity, max: i64) -> ConferenceGetRequest {
    let created = api
        .create_conference(
            Some(organizer),
            ConferenceForm {
                name: Some("RustConf".to_string()),
                city: Some("Portland".to_string()),
                start_date: Some("2026-06-10T00:00:00".to_string()),
                max_attendees: Some(max),
                ..ConferenceForm::default()
            },
        )
        .await
        .expect("create conference");
    ConferenceGetRequest {
        websafe_conference_key: created.websafe_key.expect("websafe key"),
    }
}

async fn seats(api: &ConferenceApi, request: &ConferenceGetRequest) -> i64 {
    api.get_conference(request)
        .await
        .expect("get")
        .seats_available
        .expect("seats")
}

#[tokio::test]
async fn register_unregister_round_trip_tracks_seats() {
    let (api, store) = start();
    let org = identity("org");
    let bob = identity("bob");
    let request = create(&api, &org, 10).await;
    assert_eq!(seats(&api, &request).await, 10);

    let reg = api.register_for_conference(Some(&bob), &request).await.expect("register");
    assert!(reg.data);
    assert_eq!(seats(&api, &request).await, 9);

    let again = api.register_for_conference(Some(&bob), &request).await;
    assert!(matches!(again, Err(ApiError::Conflict(_))));
    assert_eq!(seats(&api, &request).await, 9);

    let attending = api.get_conferences_to_attend(Some(&bob)).await.expect("attend");
    assert_eq!(attending.items.len(), 1);
    assert_eq!(attending.items[0].organizer_display_name.as_deref(), Some("org"));
    assert_eq!(attending.items[0].month, Some(6));

    let unreg = api
        .unregister_from_conference(Some(&bob), &request)
        .await
        .expect("unregister");
    assert!(unreg.data);
    assert_eq!(seats(&api, &request).await, 10);

    let absent = api
        .unregister_from_conference(Some(&bob), &request)
        .await
        .expect("unregister twice");
    assert!(!absent.data);
    assert_eq!(seats(&api, &request).await, 10);
    assert!(api
        .get_conferences_to_attend(Some(&bob))
        .await
        .expect("attend")
        .items
        .is_empty());

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn full_conference_rejects_registration() {
    let (api, store) = start();
    let org = identity("org");
    let request = create(&api, &org, 1).await;

    api.register_for_conference(Some(&identity("u1")), &request)
        .await
        .expect("first seat");
    let full = api.register_for_conference(Some(&identity("u2")), &request).await;
    assert_eq!(full, Err(ApiError::NoSeatsAvailable));
    assert_eq!(seats(&api, &request).await, 0);

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn caller_supplied_seats_cannot_open_an_uncapped_conference() {
    let (api, store) = start();
    let created = api
        .create_conference(
            Some(&identity("org")),
            ConferenceForm {
                name: Some("NoCap".to_string()),
                max_attendees: Some(0),
                seats_available: Some(50),
                ..ConferenceForm::default()
            },
        )
        .await
        .expect("create");
    assert_eq!(created.seats_available, Some(0));
    let request = ConferenceGetRequest {
        websafe_conference_key: created.websafe_key.expect("websafe key"),
    };

    let attempt = api.register_for_conference(Some(&identity("u1")), &request).await;
    assert_eq!(attempt, Err(ApiError::NoSeatsAvailable));
    let stored = api.get_conference(&request).await.expect("get");
    assert_eq!((stored.max_attendees, stored.seats_available), (Some(0), Some(0)));

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn unknown_or_malformed_conference_is_not_found() {
    let (api, store) = start();
    let bob = identity("bob");
    let request = create(&api, &identity("org"), 5).await;

    let malformed = ConferenceGetRequest {
        websafe_conference_key: "not a key".to_string(),
    };
    assert!(matches!(
        api.register_for_conference(Some(&bob), &malformed).await,
        Err(ApiError::NotFound(_))
    ));

    let mut missing = request.clone();
    missing.websafe_conference_key = confdesk::key::ConferenceKey {
        organizer: "org".to_string(),
        id: 9_999,
    }
    .to_websafe();
    assert!(matches!(api.get_conference(&missing).await, Err(ApiError::NotFound(_))));

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn authenticated_calls_require_identity() {
    let (api, store) = start();
    let request = create(&api, &identity("org"), 5).await;

    assert_eq!(api.get_profile(None).await, Err(ApiError::Unauthenticated));
    assert_eq!(
        api.create_conference(None, ConferenceForm::default()).await,
        Err(ApiError::Unauthenticated)
    );
    assert_eq!(
        api.register_for_conference(None, &request).await,
        Err(ApiError::Unauthenticated)
    );
    assert_eq!(
        api.get_sessions_in_wishlist(None).await,
        Err(ApiError::Unauthenticated)
    );

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn conference_defaults_and_missing_name() {
    let (api, store) = start();
    let org = identity("org");

    let missing = api.create_conference(Some(&org), ConferenceForm::default()).await;
    assert!(matches!(missing, Err(ApiError::MissingRequiredField(_))));

    let created = api
        .create_conference(
            Some(&org),
            ConferenceForm {
                name: Some("Bare".to_string()),
                ..ConferenceForm::default()
            },
        )
        .await
        .expect("create");
    assert_eq!(created.city.as_deref(), Some("Default City"));
    assert_eq!(created.topics, vec!["Default".to_string(), "Topic".to_string()]);
    assert_eq!(created.max_attendees, Some(0));
    assert_eq!(created.month, Some(0));

    let mine = api.get_conferences_created(Some(&org)).await.expect("created");
    assert_eq!(mine.items.len(), 1);
    assert!(api
        .get_conferences_created(Some(&identity("other")))
        .await
        .expect("created")
        .items
        .is_empty());

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn profile_is_created_lazily_and_saved() {
    let (api, store) = start();
    let bob = identity("bob");

    let first = api.get_profile(Some(&bob)).await.expect("profile");
    assert_eq!(first.display_name, "bob");
    assert_eq!(first.main_email, "bob@example.com");
    assert_eq!(first.tee_shirt_size, TeeShirtSize::NotSpecified);

    let saved = api
        .save_profile(
            Some(&bob),
            &ProfileMiniForm {
                display_name: Some("Bobby".to_string()),
                tee_shirt_size: Some(TeeShirtSize::LM),
            },
        )
        .await
        .expect("save");
    assert_eq!(saved.display_name, "Bobby");
    assert_eq!(saved.tee_shirt_size, TeeShirtSize::LM);

    let unchanged = api
        .save_profile(Some(&bob), &ProfileMiniForm::default())
        .await
        .expect("save empty");
    assert_eq!(unchanged, saved);

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn sessions_are_owner_only_and_wishlist_guards_transitions() {
    let (api, store) = start();
    let org = identity("org");
    let bob = identity("bob");
    let request = create(&api, &org, 5).await;

    let form = SessionForm {
        name: Some("Ownership".to_string()),
        speaker: vec!["Ada".to_string()],
        duration: Some(45),
        start_time: Some("14:30".to_string()),
        websafe_conference_key: Some(request.websafe_conference_key.clone()),
        ..SessionForm::default()
    };

    let forbidden = api.create_session(Some(&bob), &form).await;
    assert!(matches!(forbidden, Err(ApiError::Forbidden(_))));

    let ghost = SessionForm {
        websafe_conference_key: Some(
            confdesk::key::ConferenceKey {
                organizer: "org".to_string(),
                id: 4_242,
            }
            .to_websafe(),
        ),
        ..form.clone()
    };
    assert!(matches!(
        api.create_session(Some(&org), &ghost).await,
        Err(ApiError::NotFound(_))
    ));

    let created = api.create_session(Some(&org), &form).await.expect("create session");
    assert_eq!(created.start_time.as_deref(), Some("14:30"));
    let session = SessionWebsafe {
        websafe_key: created.websafe_key.clone().expect("session key"),
    };

    assert!(api
        .add_session_to_wishlist(Some(&bob), &session)
        .await
        .expect("add")
        .data);
    assert!(matches!(
        api.add_session_to_wishlist(Some(&bob), &session).await,
        Err(ApiError::Conflict(_))
    ));

    let wishlist = api.get_sessions_in_wishlist(Some(&bob)).await.expect("wishlist");
    assert_eq!(wishlist.items, vec![created.clone()]);

    assert!(api
        .remove_session_from_wishlist(Some(&bob), &session)
        .await
        .expect("remove")
        .data);
    assert!(matches!(
        api.remove_session_from_wishlist(Some(&bob), &session).await,
        Err(ApiError::Conflict(_))
    ));

    let unknown = SessionWebsafe {
        websafe_key: "garbage".to_string(),
    };
    assert!(matches!(
        api.add_session_to_wishlist(Some(&bob), &unknown).await,
        Err(ApiError::NotFound(_))
    ));

    store.shutdown().await.expect("shutdown");
}
