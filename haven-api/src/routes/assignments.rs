//! Bed assignment endpoints: admit, transfer, remove, discharge, reconcile

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use haven_core::model::DischargeRecord;
use haven_core::{reconcile as run_reconcile, ReconcileReport, Resident, TransferOutcome};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::auth::{require_manager, AuthClaims};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitBody {
    pub house_id: String,
    pub room_id: String,
    pub bed_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferBody {
    pub house_id: String,
    pub bed_id: String,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub moved: bool,
    pub resident: Resident,
}

/// Log assignment failures that leave the store needing repair
fn logged(resident_id: &str, operation: &str, err: haven_core::HavenError) -> AppError {
    if matches!(err, haven_core::HavenError::AssignmentInconsistency { .. }) {
        error!(resident_id, operation, "{}; run POST /reconcile", err);
    }
    err.into()
}

/// POST /residents/:resident_id/admit
pub async fn admit(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
    Json(body): Json<AdmitBody>,
) -> AppResult<Json<Resident>> {
    require_manager(&claims)?;
    let resident = state
        .assignments
        .admit(&resident_id, &body.house_id, &body.room_id, &body.bed_id)
        .await
        .map_err(|e| logged(&resident_id, "admit", e))?;
    Ok(Json(resident.redacted()))
}

/// POST /residents/:resident_id/transfer
pub async fn transfer(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
    Json(body): Json<TransferBody>,
) -> AppResult<Json<TransferResponse>> {
    require_manager(&claims)?;
    let outcome = state
        .assignments
        .transfer(&resident_id, &body.house_id, &body.bed_id)
        .await
        .map_err(|e| logged(&resident_id, "transfer", e))?;
    let moved = matches!(outcome, TransferOutcome::Moved(_));
    Ok(Json(TransferResponse {
        moved,
        resident: outcome.resident().redacted(),
    }))
}

/// POST /residents/:resident_id/remove-from-bed
pub async fn remove_from_bed(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
) -> AppResult<Json<Resident>> {
    require_manager(&claims)?;
    let resident = state
        .assignments
        .remove_from_bed(&resident_id)
        .await
        .map_err(|e| logged(&resident_id, "remove from bed", e))?;
    Ok(Json(resident.redacted()))
}

/// POST /residents/:resident_id/discharge
pub async fn discharge(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
    Json(record): Json<DischargeRecord>,
) -> AppResult<Json<Resident>> {
    require_manager(&claims)?;
    let resident = state
        .assignments
        .discharge(&resident_id, record)
        .await
        .map_err(|e| logged(&resident_id, "discharge", e))?;
    Ok(Json(resident.redacted()))
}

/// POST /reconcile - Repair bed/resident links
pub async fn reconcile(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
) -> AppResult<Json<ReconcileReport>> {
    require_manager(&claims)?;
    let report = run_reconcile(&state.repo).await?;
    info!(clean = report.is_clean(), "Manual reconciliation finished");
    Ok(Json(report))
}
