//! Geolocated check-ins
//!
//! The device runs the location attempts and reports each outcome; the
//! server replays them through the acquisition protocol so the fallback and
//! accuracy rules are enforced here rather than trusted from the client.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use haven_core::geo::{ReplaySource, ReportedAttempt};
use haven_core::model::CheckInType;
use haven_core::{CheckInLog, CheckInRequest, DeviceClass, Resident};
use serde::Deserialize;
use tracing::debug;

use crate::auth::{require_self_or_manager, AuthClaims, Role};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInBody {
    #[serde(rename = "type")]
    pub kind: CheckInType,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub device: DeviceClass,
    #[serde(default)]
    pub attempts: Vec<ReportedAttempt>,
}

/// POST /residents/:resident_id/check-ins
pub async fn record_check_in(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
    Json(body): Json<CheckInBody>,
) -> AppResult<(StatusCode, Json<CheckInLog>)> {
    // The location must come from the resident's own device
    if claims.role != Role::Resident || claims.sub != resident_id {
        return Err(AppError::forbidden(
            "Check-ins can only be recorded by the resident themselves",
        ));
    }
    debug!(
        resident_id = %resident_id,
        attempts = body.attempts.len(),
        "Handling check-in"
    );

    let source = ReplaySource::new(body.attempts);
    let request = CheckInRequest {
        resident_id,
        kind: body.kind,
        location_name: body.location_name,
        comment: body.comment,
        device: body.device,
    };
    let log = state.checkins.record(&source, request).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// GET /residents/:resident_id/check-ins - Newest first
pub async fn list_check_ins(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
) -> AppResult<Json<Vec<CheckInLog>>> {
    require_self_or_manager(&claims, &resident_id)?;
    let resident = state.repo.require::<Resident>(&resident_id).await?;
    Ok(Json(
        resident
            .value
            .check_ins_newest_first()
            .into_iter()
            .cloned()
            .collect(),
    ))
}
