use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use travelguide_api::{build_app_with, ApiConfig};
use travelguide_core::DialogSettings;
use travelguide_providers::ProviderConfig;

fn offline_app() -> Router {
    build_app_with(ApiConfig {
        bind: "127.0.0.1:0".to_string(),
        allowed_origins: vec!["http://localhost:5000".to_string()],
        dialog: DialogSettings::default(),
        providers: ProviderConfig::default(),
    })
    .expect("app should build")
}

fn chat_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, parsed)
}

#[tokio::test]
async fn health_reports_status_and_metrics() {
    let app = offline_app();

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/api/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
    assert!(body["timestamp"].is_string());
    assert_eq!(body["metrics"]["turns_total"], 0);
    assert_eq!(body["providers"]["weather"], "simulated");
    assert_eq!(body["providers"]["advisor"], "local");
}

#[tokio::test]
async fn empty_message_is_rejected() {
    let app = offline_app();

    let (status, body) = send(&app, chat_request(json!({ "message": "   " }).to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Empty message" }));

    let (status, body) = send(&app, chat_request(json!({ "user_id": "u1" }).to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Empty message");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = offline_app();
    let (status, body) = send(&app, chat_request("not json".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn overlong_message_is_rejected() {
    let app = offline_app();
    let message = "a".repeat(2_001);

    let (status, body) = send(
        &app,
        chat_request(json!({ "message": message, "user_id": "u1" }).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["success"], false);

    let (status, _) = send(
        &app,
        chat_request(json!({ "message": "a".repeat(2_000), "user_id": "u1" }).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn chat_without_user_id_starts_a_new_session() {
    let app = offline_app();

    let (status, body) = send(
        &app,
        chat_request(json!({ "message": "Ich möchte nach Paris reisen" }).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["user_id"]
        .as_str()
        .map(|id| id.starts_with("guest-"))
        .unwrap_or(false));
    assert_eq!(body["response"]["intent"], "provide_destination");
    assert_eq!(body["response"]["state"], "NEED_DATES");
    assert_eq!(body["response"]["kind"], "success");
}

#[tokio::test]
async fn conversation_continues_for_the_same_user() {
    let app = offline_app();

    for message in [
        "Ich möchte nach Rom reisen",
        "10.09.2030 bis 17.09.2030",
    ] {
        let (status, _) = send(
            &app,
            chat_request(json!({ "message": message, "user_id": "anna" }).to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = send(
        &app,
        chat_request(json!({ "message": "800€", "user_id": "anna" }).to_string()),
    )
    .await;
    assert_eq!(body["user_id"], "anna");
    assert_eq!(body["response"]["state"], "READY");
    assert_eq!(body["response"]["payload"]["destination"], "Rom");
    assert_eq!(body["response"]["payload"]["budget"], 800);
}

#[tokio::test]
async fn offline_weather_is_simulated() {
    let app = offline_app();

    let (_, body) = send(
        &app,
        chat_request(json!({ "message": "Wie ist das Wetter in Berlin?", "user_id": "u1" }).to_string()),
    )
    .await;

    assert_eq!(body["response"]["kind"], "weather_info");
    assert_eq!(body["response"]["payload"]["weather"]["simulated"], true);
    assert_eq!(body["response"]["state"], "NEED_DESTINATION");
}

#[tokio::test]
async fn unconfigured_flight_search_apologizes() {
    let app = offline_app();

    let (status, body) = send(
        &app,
        chat_request(json!({ "message": "Flüge nach Mars suchen", "user_id": "u1" }).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"]["kind"], "error");
    assert_eq!(
        body["response"]["message"],
        "Entschuldigung, bei der Flugsuche ist ein Fehler aufgetreten."
    );
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let app = offline_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
