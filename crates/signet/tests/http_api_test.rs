//! tests for the http surface: envelope shapes, error envelopes and routing.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use tower::ServiceExt;

use signet_types::Config;

use common::setup;

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_init_over_http_returns_ok_envelope() {
    let (state, app) = setup(Config::default()).await;
    let router = signet::create_app(state);

    let response = router
        .oneshot(post(
            "/v3/activation/init",
            serde_json::json!({
                "requestObject": {
                    "userId": "alice",
                    "applicationId": app.application_id,
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
    let object = &json["responseObject"];
    assert_eq!(object["userId"], "alice");
    assert!(object["activationId"].is_string());
    // code comes grouped and dashed
    let code = object["activationCode"].as_str().unwrap();
    assert_eq!(code.split('-').count(), 4);
    assert!(object["activationSignature"].is_string());
}

#[tokio::test]
async fn test_unknown_application_yields_error_envelope() {
    let (state, _) = setup(Config::default()).await;
    let router = signet::create_app(state);

    let response = router
        .oneshot(post(
            "/v3/activation/init",
            serde_json::json!({
                "requestObject": {
                    "userId": "alice",
                    "applicationId": 9999,
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ERROR");
    assert_eq!(
        json["responseObject"]["code"],
        "ERR_APPLICATION_NOT_FOUND"
    );
    assert!(json["responseObject"]["message"].is_string());
}

#[tokio::test]
async fn test_status_endpoint_for_unknown_activation() {
    let (state, _) = setup(Config::default()).await;
    let router = signet::create_app(state);

    let response = router
        .oneshot(post(
            "/v3/activation/status",
            serde_json::json!({
                "requestObject": {
                    "activationId": "44444444-4444-4444-8444-444444444444",
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "OK");
    assert_eq!(json["responseObject"]["activationStatus"], "REMOVED");
    assert_eq!(json["responseObject"]["userId"], "UNKNOWN");
}

#[tokio::test]
async fn test_signature_verify_rejects_malformed_envelope() {
    let (state, _) = setup(Config::default()).await;
    let router = signet::create_app(state);

    // missing requestObject wrapper
    let response = router
        .oneshot(post(
            "/v3/signature/verify",
            serde_json::json!({ "activationId": "x" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_commit_invalid_state_over_http() {
    let (state, app) = setup(Config::default()).await;
    let router = signet::create_app(state.clone());

    // init but do not exchange keys
    let init = common::init_for_user(&state, &app, "alice").await;

    let response = router
        .oneshot(post(
            "/v3/activation/commit",
            serde_json::json!({
                "requestObject": { "activationId": init.activation_id }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ERROR");
    assert_eq!(
        json["responseObject"]["code"],
        "ERR_ACTIVATION_INVALID_STATE"
    );
}
