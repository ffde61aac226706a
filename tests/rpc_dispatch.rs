use serde_json::{json, Value};

use confdesk::{
    api::ConferenceApi,
    config::AppConfig,
    core::store::EntityStore,
    rpc::{handle_line, RpcResponse},
    runtime::handle::{spawn_store, StoreHandle},
};

fn start() -> (ConferenceApi, StoreHandle) {
    let config = AppConfig::default();
    let store = spawn_store(EntityStore::new(), None, config.runtime.clone());
    let (api, _worker) = ConferenceApi::start(store.clone(), &config);
    (api, store)
}

fn alice() -> Value {
    json!({"userId": "alice", "email": "alice@example.com", "nickname": "Alice"})
}

async fn call(api: &ConferenceApi, request: Value) -> RpcResponse {
    handle_line(api, &request.to_string()).await
}

fn error_code(response: &RpcResponse) -> Option<&str> {
    response.error.as_ref().map(|e| e.code.as_str())
}

#[tokio::test]
async fn conference_lifecycle_over_json_lines() {
    let (api, store) = start();

    let created = call(
        &api,
        json!({
            "id": 1,
            "method": "createConference",
            "identity": alice(),
            "params": {"name": "RustConf", "city": "Portland", "startDate": "2026-09-01", "maxAttendees": 2}
        }),
    )
    .await;
    assert_eq!(created.id, json!(1));
    let result = created.result.expect("result");
    assert_eq!(result["month"], json!(9));
    assert_eq!(result["organizerUserId"], json!("alice"));
    let key = result["websafeKey"].as_str().expect("websafe key").to_string();

    let registered = call(
        &api,
        json!({
            "id": "r",
            "method": "registerForConference",
            "identity": alice(),
            "params": {"websafeConferenceKey": key}
        }),
    )
    .await;
    assert_eq!(registered.result, Some(json!({"data": true})));

    let queried = call(
        &api,
        json!({
            "id": 2,
            "method": "queryConferences",
            "params": {"filters": [
                {"field": "CITY", "operator": "EQ", "value": "Portland"},
                {"field": "MAX_ATTENDEES", "operator": "GT", "value": "1"}
            ]}
        }),
    )
    .await;
    let items = queried.result.expect("result")["items"].clone();
    assert_eq!(items.as_array().map(Vec::len), Some(1));
    assert_eq!(items[0]["seatsAvailable"], json!(1));
    assert!(items[0].get("organizerDisplayName").is_none());

    let featured = call(&api, json!({"id": 3, "method": "getFeaturedSpeaker"})).await;
    assert!(featured.result.expect("result")["data"].is_string());

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn errors_carry_stable_codes() {
    let (api, store) = start();

    let anonymous = call(&api, json!({"id": 1, "method": "getProfile"})).await;
    assert_eq!(error_code(&anonymous), Some("UNAUTHENTICATED"));
    assert!(anonymous.result.is_none());

    let two_inequalities = call(
        &api,
        json!({
            "id": 2,
            "method": "queryConferences",
            "params": {"filters": [
                {"field": "CITY", "operator": "NE", "value": "Austin"},
                {"field": "MONTH", "operator": "GT", "value": "3"}
            ]}
        }),
    )
    .await;
    assert_eq!(error_code(&two_inequalities), Some("MULTIPLE_INEQUALITY_FIELDS"));

    let bad_field = call(
        &api,
        json!({
            "id": 3,
            "method": "queryConferences",
            "params": {"filters": [{"field": "FOO", "operator": "EQ", "value": "x"}]}
        }),
    )
    .await;
    assert_eq!(error_code(&bad_field), Some("INVALID_FILTER"));

    let bad_value = call(
        &api,
        json!({
            "id": 4,
            "method": "queryConferences",
            "params": {"filters": [{"field": "MONTH", "operator": "EQ", "value": "June"}]}
        }),
    )
    .await;
    assert_eq!(error_code(&bad_value), Some("INVALID_FILTER_VALUE"));

    let unknown = call(&api, json!({"id": 5, "method": "dropTables"})).await;
    assert_eq!(error_code(&unknown), Some("NOT_FOUND"));
    assert_eq!(unknown.id, json!(5));

    let missing_params = call(
        &api,
        json!({"id": 6, "method": "getConference", "identity": alice()}),
    )
    .await;
    assert_eq!(error_code(&missing_params), Some("MISSING_REQUIRED_FIELD"));

    let garbage = handle_line(&api, "{not json").await;
    assert_eq!(garbage.id, Value::Null);
    assert_eq!(error_code(&garbage), Some("INVALID_REQUEST"));

    store.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn responses_serialize_one_of_result_or_error() {
    let (api, store) = start();

    let ok = call(
        &api,
        json!({"id": 1, "method": "getProfile", "identity": alice()}),
    )
    .await;
    let line = serde_json::to_value(&ok).expect("serialize");
    assert!(line.get("error").is_none());
    assert_eq!(line["result"]["displayName"], json!("Alice"));
    assert_eq!(line["result"]["teeShirtSize"], json!("NOT_SPECIFIED"));

    let err = call(&api, json!({"id": 2, "method": "getProfile"})).await;
    let line = serde_json::to_value(&err).expect("serialize");
    assert!(line.get("result").is_none());
    assert_eq!(line["error"]["code"], json!("UNAUTHENTICATED"));

    store.shutdown().await.expect("shutdown");
}
