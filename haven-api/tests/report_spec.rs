//! Generated report text through the external text service

mod common;

use axum::http::StatusCode;
use common::*;
use haven_api::create_app;
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn app_with_service(server: &MockServer) -> (axum::Router, haven_api::AppState) {
    let endpoint = format!("{}/generate", server.uri());
    let config = test_config(&[
        "--report-endpoint",
        &endpoint,
        "--report-api-key",
        "test-key",
        "--report-timeout",
        "2s",
    ]);
    let state = seeded_state(&config).await;
    (create_app(state.clone()), state)
}

#[tokio::test]
async fn given_text_service_answers_when_shift_report_requested_then_text_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "gemini-2.5-flash" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "All quiet at Elberta." })))
        .expect(1)
        .mount(&server)
        .await;
    let (app, state) = app_with_service(&server).await;

    let (status, body) = send(&app, "POST", "/reports/shift", Some(&manager_token(&state)), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "All quiet at Elberta.");
}

#[tokio::test]
async fn given_text_service_fails_when_shift_report_requested_then_failure_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let (app, state) = app_with_service(&server).await;

    let (status, body) = send(&app, "POST", "/reports/shift", Some(&manager_token(&state)), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Failed to generate report due to an API error.");
}

#[tokio::test]
async fn given_empty_answer_when_risk_summary_requested_then_analysis_failed_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": "" })))
        .mount(&server)
        .await;
    let (app, state) = app_with_service(&server).await;

    let (status, body) = send(
        &app,
        "POST",
        "/residents/c-pending/risk-summary",
        Some(&manager_token(&state)),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Could not analyze intake form.");
}

#[tokio::test]
async fn given_no_text_service_configured_then_missing_key_text() {
    let (app, state) = seeded_app().await;

    let (status, body) = send(&app, "POST", "/reports/shift", Some(&manager_token(&state)), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Error: API Key missing.");
}

#[tokio::test]
async fn given_resident_token_when_shift_report_requested_then_forbidden() {
    let (app, state) = seeded_app().await;

    let (status, _) = send(
        &app,
        "POST",
        "/reports/shift",
        Some(&resident_token(&state, "c-active")),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}
