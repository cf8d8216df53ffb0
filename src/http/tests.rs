//! Router-level integration tests, in the style of the teacher's
//! `tests/auth_middleware_test.rs`: build the real router over a throwaway
//! `AceCore` and drive it with `tower::ServiceExt::oneshot` instead of a
//! live listener.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

use crate::model::SCHEMA_VERSION;
use crate::test_support::test_core;

const API_KEY: &str = "test-api-key";

fn app() -> Router {
    super::build(Arc::new(test_core()), API_KEY.to_string())
}

fn auth_req(method: &str, uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {API_KEY}"))
        .body(body)
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_and_ready_need_no_auth() {
    let app = app();
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response =
        app.oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn a_protected_route_without_a_bearer_token_is_rejected() {
    let response = app()
        .oneshot(Request::builder().uri("/module/type/amt_whois").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn a_protected_route_with_the_wrong_bearer_token_is_rejected() {
    let request = Request::builder()
        .uri("/module/type/amt_whois")
        .header(header::AUTHORIZATION, "Bearer not-the-right-key")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn submitting_a_root_with_an_unsupported_schema_version_is_rejected() {
    let body = json!({"schema_version": 999, "root": {"uuid": uuid::Uuid::new_v4(), "analysis_mode": "analysis"}});
    let request = auth_req("POST", "/analysis/root", Body::from(body.to_string()));
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn submit_root_then_fetch_it_round_trips_through_the_router() {
    let app = app();
    let root_uuid = uuid::Uuid::new_v4();
    let submit_body = json!({
        "schema_version": SCHEMA_VERSION,
        "root": {"uuid": root_uuid, "analysis_mode": "analysis", "observables": []},
    });
    let response =
        app.clone().oneshot(auth_req("POST", "/analysis/root", Body::from(submit_body.to_string()))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let submitted = body_json(response).await;
    assert_eq!(submitted["root"]["uuid"], root_uuid.to_string());

    let response = app
        .oneshot(auth_req("GET", &format!("/analysis/root/{root_uuid}"), Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let fetched = body_json(response).await;
    assert_eq!(fetched["root"]["uuid"], root_uuid.to_string());
}

#[tokio::test]
async fn registering_a_module_then_leasing_work_for_a_matching_root() {
    let app = app();

    let register_body = json!({
        "schema_version": SCHEMA_VERSION,
        "module_type": {
            "name": "amt_whois",
            "version": 1,
            "accepted_observable_types": ["ipv4"],
            "timeout_secs": 60,
        },
    });
    let response = app
        .clone()
        .oneshot(auth_req("POST", "/module/type", Body::from(register_body.to_string())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let registered = body_json(response).await;
    assert_eq!(registered["outcome"], "new");

    let root_uuid = uuid::Uuid::new_v4();
    let submit_body = json!({
        "schema_version": SCHEMA_VERSION,
        "root": {
            "uuid": root_uuid,
            "analysis_mode": "analysis",
            "observables": [{"type": "ipv4", "value": "8.8.8.8"}],
        },
    });
    let response = app
        .clone()
        .oneshot(auth_req("POST", "/analysis/root", Body::from(submit_body.to_string())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(auth_req("GET", "/work/amt_whois?owner=worker-1", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let leased = body_json(response).await;
    assert!(!leased["request"].is_null(), "expected a leased request for the matching observable");
}

#[tokio::test]
async fn polling_events_on_a_quiet_topic_times_out_to_an_empty_array_not_an_error() {
    let response = app()
        .oneshot(auth_req("GET", "/events?topic=%2Fcore%2Falert&timeout_secs=1", Body::empty()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let events = body_json(response).await;
    assert_eq!(events, json!([]));
}

#[tokio::test]
async fn uploading_then_downloading_a_blob_round_trips_the_bytes() {
    let app = app();
    let response = app
        .clone()
        .oneshot(auth_req("POST", "/blob", Body::from("hello ace")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let uploaded = body_json(response).await;
    let sha256 = uploaded["sha256"].as_str().unwrap().to_string();

    let response = app.oneshot(auth_req("GET", &format!("/blob/{sha256}"), Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"hello ace");
}

#[tokio::test]
async fn fetching_an_unregistered_module_type_is_a_404() {
    let response =
        app().oneshot(auth_req("GET", "/module/type/does_not_exist", Body::empty())).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
