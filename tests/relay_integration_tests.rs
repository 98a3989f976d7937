//! End-to-end tests for the collect flow: dedup, counting, payload shape,
//! and tolerance of upstream failures.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{self, Request, StatusCode},
    Router,
};
use capi_relay::config::{Config, DedupConfig, DedupWindow, ProviderConfig, StoreSettings};
use capi_relay::create_app_router;
use capi_relay::state::AppState;
use capi_relay::store::{KvStore, StoreError};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PIXEL_ID: &str = "1234567890";
const ACCESS_TOKEN: &str = "test-token";

fn test_config(base_url: &str) -> Config {
    Config {
        provider: Some(ProviderConfig {
            pixel_id: PIXEL_ID.to_string(),
            access_token: ACCESS_TOKEN.to_string(),
        }),
        capi_base_url: base_url.to_string(),
        store: StoreSettings::Memory,
        dedup: DedupConfig {
            window: DedupWindow::CalendarDay,
            ttl_seconds: 86_400,
        },
        signature_secret: None,
    }
}

fn test_app(config: Config) -> Router {
    let state = AppState::with_config(config).expect("failed to build AppState");
    create_app_router(Arc::new(state))
}

async fn mount_events_mock(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{PIXEL_ID}/events")))
        .and(query_param("access_token", ACCESS_TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"events_received": 1})))
        .mount(server)
        .await;
}

fn collect_request(body: Value) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .uri("/collect")
        .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
        .header("x-forwarded-for", "1.2.3.4")
        .header(http::header::USER_AGENT, "UA/1")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn first_event_forwards_and_repeat_is_deduped() {
    let provider = MockServer::start().await;
    mount_events_mock(&provider).await;
    let app = test_app(test_config(&provider.uri()));

    let first = app
        .clone()
        .oneshot(collect_request(json!({"event_id": "abc123"})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = response_json(first).await;
    assert_eq!(first["ok"], true);
    assert_eq!(first["count"], 1);
    assert_eq!(first["status"], 200);
    assert!(first.get("duplicate").is_none());

    let second = app
        .clone()
        .oneshot(collect_request(json!({"event_id": "abc123"})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let second = response_json(second).await;
    assert_eq!(second["ok"], true);
    assert_eq!(second["duplicate"], true);
    assert_eq!(second["count"], 1);

    // Exactly one provider call for the pair.
    assert_eq!(provider.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn counter_reaches_n_for_n_distinct_events() {
    let provider = MockServer::start().await;
    mount_events_mock(&provider).await;
    let app = test_app(test_config(&provider.uri()));

    for i in 1..=5 {
        let response = app
            .clone()
            .oneshot(collect_request(json!({"event_id": format!("evt-{i}")})))
            .await
            .unwrap();
        let ack = response_json(response).await;
        assert_eq!(ack["count"], i);
    }

    let stats = app
        .clone()
        .oneshot(
            Request::builder()
                .method(http::Method::GET)
                .uri("/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(stats.status(), StatusCode::OK);
    let stats = response_json(stats).await;
    assert_eq!(stats["count"], 5);
    assert_eq!(stats["dedup_enabled"], true);

    assert_eq!(provider.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn outbound_record_carries_event_and_request_signals() {
    let provider = MockServer::start().await;
    mount_events_mock(&provider).await;
    let app = test_app(test_config(&provider.uri()));

    let received_at = chrono::Utc::now().timestamp();
    let response = app
        .oneshot(collect_request(json!({
            "event_id": "abc123",
            "event_name": "Test",
            "fbp": "fb.1.111"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let requests = provider.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let wire: Value = serde_json::from_slice(&requests[0].body).unwrap();

    let record = &wire["data"][0];
    assert_eq!(record["event_name"], "Test");
    assert_eq!(record["event_id"], "abc123");
    assert_eq!(record["action_source"], "website");
    assert_eq!(record["event_source_url"], "");
    assert_eq!(record["user_data"]["fbp"], "fb.1.111");
    assert_eq!(record["user_data"]["client_ip_address"], "1.2.3.4");
    assert_eq!(record["user_data"]["client_user_agent"], "UA/1");

    let event_time = record["event_time"].as_i64().unwrap();
    assert!((event_time - received_at).abs() <= 5);
}

#[tokio::test]
async fn provider_rejection_still_acks_and_keeps_the_count() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&provider)
        .await;
    let app = test_app(test_config(&provider.uri()));

    let response = app
        .clone()
        .oneshot(collect_request(json!({"event_id": "abc123"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ack = response_json(response).await;
    assert_eq!(ack["ok"], true);
    assert_eq!(ack["status"], 500);
    assert_eq!(ack["count"], 1);

    // The event stays marked: a retry after the failure is a duplicate, and
    // the counter is not rolled back.
    let retry = app
        .clone()
        .oneshot(collect_request(json!({"event_id": "abc123"})))
        .await
        .unwrap();
    let retry = response_json(retry).await;
    assert_eq!(retry["duplicate"], true);
    assert_eq!(retry["count"], 1);
}

#[tokio::test]
async fn provider_network_error_still_acks() {
    // Nothing listens on this port; the send fails at the transport level.
    let app = test_app(test_config("http://127.0.0.1:9"));

    let response = app
        .oneshot(collect_request(json!({"event_id": "abc123"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ack = response_json(response).await;
    assert_eq!(ack["ok"], true);
    assert_eq!(ack["count"], 1);
    assert!(ack.get("status").is_none());
}

struct FailingStore;

#[async_trait]
impl KvStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::UnexpectedReply("injected failure".to_string()))
    }

    async fn set(
        &self,
        _key: &str,
        _value: &str,
        _ttl_seconds: Option<u64>,
    ) -> Result<(), StoreError> {
        Err(StoreError::UnexpectedReply("injected failure".to_string()))
    }

    async fn set_if_absent(
        &self,
        _key: &str,
        _value: &str,
        _ttl_seconds: u64,
    ) -> Result<bool, StoreError> {
        Err(StoreError::UnexpectedReply("injected failure".to_string()))
    }

    async fn increment(&self, _key: &str) -> Result<i64, StoreError> {
        Err(StoreError::UnexpectedReply("injected failure".to_string()))
    }

    async fn expire(&self, _key: &str, _ttl_seconds: u64) -> Result<bool, StoreError> {
        Err(StoreError::UnexpectedReply("injected failure".to_string()))
    }
}

#[tokio::test]
async fn store_failure_does_not_block_forwarding() {
    let provider = MockServer::start().await;
    mount_events_mock(&provider).await;

    let state = AppState::with_store(test_config(&provider.uri()), Some(Arc::new(FailingStore)))
        .expect("failed to build AppState");
    let app = create_app_router(Arc::new(state));

    let response = app
        .oneshot(collect_request(json!({"event_id": "abc123"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ack = response_json(response).await;
    assert_eq!(ack["ok"], true);
    assert_eq!(ack["status"], 200);
    // No count when the store is down, but the event went out.
    assert!(ack.get("count").is_none());
    assert_eq!(provider.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn dedup_disabled_forwards_every_event() {
    let provider = MockServer::start().await;
    mount_events_mock(&provider).await;

    let mut config = test_config(&provider.uri());
    config.store = StoreSettings::Disabled;
    let app = test_app(config);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(collect_request(json!({"event_id": "abc123"})))
            .await
            .unwrap();
        let ack = response_json(response).await;
        assert_eq!(ack["ok"], true);
        assert!(ack.get("duplicate").is_none());
        assert!(ack.get("count").is_none());
    }

    assert_eq!(provider.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn health_reports_store_state() {
    let provider = MockServer::start().await;
    let app = test_app(test_config(&provider.uri()));

    let response = app
        .oneshot(
            Request::builder()
                .method(http::Method::GET)
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let health = response_json(response).await;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["store"], "reachable");
}
