#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use haven_api::auth::{hash_password, Role};
use haven_api::config::Config;
use haven_api::{create_app, AppState};
use haven_core::intake::IntakeForm;
use haven_core::{House, MemoryStore, Resident, ResidentStatus};
use serde_json::Value;
use tower::ServiceExt;

pub const RESIDENT_PASSWORD: &str = "recovery1";

pub fn test_config(extra: &[&str]) -> Config {
    let mut argv = vec![
        "haven-api",
        "--store",
        "memory",
        "--jwt-secret",
        "test-secret",
        "--admin-password",
        "admin",
    ];
    argv.extend_from_slice(extra);
    Config::try_parse_from(argv).unwrap()
}

/// Houses from the bundled layout plus three residents:
/// `c-active` (active, has a password), `c-new` (active, no password) and
/// `c-pending` (pending applicant).
pub async fn seeded_state(config: &Config) -> AppState {
    let state = AppState::with_store(Arc::new(MemoryStore::new()), config).unwrap();
    let houses = haven_api::seed::parse_layout(include_str!("../../config/houses.yaml")).unwrap();
    haven_core::facility::seed_houses(&state.repo, &houses)
        .await
        .unwrap();

    let mut active = resident("c-active", ResidentStatus::Pending, "active@example.com");
    active.password_hash = Some(hash_password(RESIDENT_PASSWORD).unwrap());
    state.repo.insert(&active).await.unwrap();
    state
        .assignments
        .admit("c-active", "h_elberta", "r-elberta-1", "b-elberta-1-1")
        .await
        .unwrap();

    let fresh = resident("c-new", ResidentStatus::Active, "new@example.com");
    state.repo.insert(&fresh).await.unwrap();
    let pending = resident("c-pending", ResidentStatus::Pending, "pending@example.com");
    state.repo.insert(&pending).await.unwrap();
    state
}

pub async fn seeded_app() -> (Router, AppState) {
    let state = seeded_state(&test_config(&[])).await;
    (create_app(state.clone()), state)
}

pub fn resident(id: &str, status: ResidentStatus, email: &str) -> Resident {
    let now = Utc::now();
    let mut intake = IntakeForm {
        target_house_id: "h_elberta".to_string(),
        ..Default::default()
    };
    intake.personal.first_name = "Test".to_string();
    intake.personal.last_name = id.to_string();
    intake.personal.email = email.to_string();
    intake.personal.dob = NaiveDate::from_ymd_opt(1990, 5, 15);
    Resident {
        id: id.to_string(),
        status,
        intake,
        assigned_house_id: None,
        assigned_bed_id: None,
        check_in_logs: vec![],
        drug_test_logs: vec![],
        discharge_record: None,
        notes: None,
        password_hash: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn manager_token(state: &AppState) -> String {
    state.jwt_config.issue("manager", Role::Manager).unwrap()
}

pub fn resident_token(state: &AppState, resident_id: &str) -> String {
    state.jwt_config.issue(resident_id, Role::Resident).unwrap()
}

/// Send one request through the router and return status and body text
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

pub async fn house_of(state: &AppState, id: &str) -> House {
    state.repo.get::<House>(id).await.unwrap().unwrap().value
}

pub async fn resident_of(state: &AppState, id: &str) -> Resident {
    state.repo.get::<Resident>(id).await.unwrap().unwrap().value
}
