//! Exercises the registry client against a local stand-in registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use trialscout_core::error::RegistryError;
use trialscout_core::{DomainEvent, EventBus};
use trialscout_registry::{ParamValue, RegistryClient, SearchParams};

type Seen = Arc<Mutex<Vec<HashMap<String, String>>>>;

fn study(id: &str) -> Value {
    json!({"protocolSection": {"identificationModule": {"nctId": id}}})
}

async fn paged(State(seen): State<Seen>, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let token = query.get("pageToken").cloned();
    seen.lock().unwrap().push(query);
    match token.as_deref() {
        None => Json(json!({"studies": [study("NCT001"), study("NCT002")], "nextPageToken": "page-2"})),
        Some("page-2") => Json(json!({"studies": [study("NCT003")], "nextPageToken": "page-3"})),
        _ => Json(json!({"studies": [study("NCT004")]})),
    }
}

async fn looping() -> Json<Value> {
    Json(json!({"studies": [study("NCT001")], "nextPageToken": "again"}))
}

async fn rejecting() -> (StatusCode, &'static str) {
    (StatusCode::BAD_REQUEST, "unknown field filter.bogus")
}

async fn garbled() -> &'static str {
    "<html>maintenance</html>"
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Json(json!({"studies": []}))
}

async fn spawn_registry() -> (String, Seen, tokio::task::JoinHandle<()>) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/paged", get(paged))
        .route("/looping", get(looping))
        .route("/rejecting", get(rejecting))
        .route("/garbled", get(garbled))
        .route("/slow", get(slow))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server run");
    });
    (format!("http://{addr}"), seen, handle)
}

fn client(base: &str, path: &str) -> RegistryClient {
    RegistryClient::new(format!("{base}{path}"), Duration::from_secs(5))
        .unwrap()
        .with_default_statuses(vec!["RECRUITING".into(), "AVAILABLE".into()])
}

#[tokio::test]
async fn follows_page_tokens_to_the_end() {
    let (base, seen, handle) = spawn_registry().await;
    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();

    let mut params = SearchParams::for_condition("friedreich's ataxia");
    params
        .set("fields", ParamValue::List(vec!["NCTId".into(), "BriefTitle".into()]))
        .unwrap();
    let studies = client(&base, "/paged")
        .with_event_bus(bus)
        .fetch_studies(&params)
        .await
        .unwrap();

    let ids: Vec<_> = studies.iter().map(|s| s.nct_id().unwrap().to_string()).collect();
    assert_eq!(ids, ["NCT001", "NCT002", "NCT003", "NCT004"]);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0]["query.cond"], "friedreich's ataxia");
    assert_eq!(seen[0]["filter.overallStatus"], "RECRUITING|AVAILABLE");
    assert_eq!(seen[0]["fields"], "NCTId,BriefTitle");
    assert!(!seen[0].contains_key("pageToken"));
    assert_eq!(seen[1]["pageToken"], "page-2");
    assert_eq!(seen[2]["pageToken"], "page-3");
    // Every page repeats the original filters.
    assert_eq!(seen[2]["query.cond"], "friedreich's ataxia");

    match rx.recv().await.unwrap().as_ref() {
        DomainEvent::StudiesFetched { count, pages, .. } => {
            assert_eq!(*count, 4);
            assert_eq!(*pages, 3);
        }
        other => panic!("expected StudiesFetched, got {other:?}"),
    }
    handle.abort();
}

#[tokio::test]
async fn repeated_token_is_a_pagination_loop() {
    let (base, _, handle) = spawn_registry().await;
    let err = client(&base, "/looping")
        .fetch_studies(&SearchParams::for_condition("asthma"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::PaginationLoop(token) if token == "again"));
    handle.abort();
}

#[tokio::test]
async fn error_status_carries_status_and_body() {
    let (base, _, handle) = spawn_registry().await;
    let err = client(&base, "/rejecting")
        .fetch_studies(&SearchParams::for_condition("asthma"))
        .await
        .unwrap_err();
    match &err {
        RegistryError::Http { status, body } => {
            assert_eq!(*status, 400);
            assert_eq!(body, "unknown field filter.bogus");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
    assert_eq!(
        err.to_string(),
        "Registry request failed with status code 400: unknown field filter.bogus"
    );
    handle.abort();
}

#[tokio::test]
async fn unreadable_body_is_invalid_response() {
    let (base, _, handle) = spawn_registry().await;
    let err = client(&base, "/garbled")
        .fetch_studies(&SearchParams::for_condition("asthma"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidResponse(_)));
    handle.abort();
}

#[tokio::test]
async fn slow_registry_times_out() {
    let (base, _, handle) = spawn_registry().await;
    let client = RegistryClient::new(format!("{base}/slow"), Duration::from_millis(100)).unwrap();
    let err = client
        .fetch_studies(&SearchParams::for_condition("asthma"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Timeout(_)));
    handle.abort();
}

#[tokio::test]
async fn unreachable_registry_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = RegistryClient::new(format!("http://{addr}/studies"), Duration::from_secs(2))
        .unwrap()
        .fetch_studies(&SearchParams::for_condition("asthma"))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Network(_)));
}
