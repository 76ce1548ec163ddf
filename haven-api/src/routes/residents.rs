//! Intake, resident records and drug tests

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::Utc;
use haven_core::dashboard::belongs_to_house;
use haven_core::intake::{self, IntakeForm};
use haven_core::model::DrugTestLog;
use haven_core::records::{self, NewDrugTest};
use haven_core::Resident;
use serde::Deserialize;
use tracing::{debug, info};

use super::HouseFilter;
use crate::auth::{require_manager, require_self_or_manager, AuthClaims};
use crate::{AppResult, AppState};

const DEFAULT_PERFORMED_BY: &str = "House Manager";

#[derive(Debug, Deserialize)]
pub struct NotesUpdate {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrugTestBody {
    #[serde(flatten)]
    pub test: NewDrugTest,
    #[serde(default)]
    pub performed_by: Option<String>,
}

/// POST /intake - Submit an application; creates a pending resident
pub async fn submit_intake(
    State(state): State<AppState>,
    Json(form): Json<IntakeForm>,
) -> AppResult<(StatusCode, Json<Resident>)> {
    let resident = intake::submit(&state.repo, form, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(resident.redacted())))
}

/// GET /residents - Residents newest submission first, optionally for one house
pub async fn list_residents(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Query(filter): Query<HouseFilter>,
) -> AppResult<Json<Vec<Resident>>> {
    require_manager(&claims)?;
    debug!("Handling GET /residents (house filter: {:?})", filter.house_id);

    let mut residents: Vec<Resident> = state
        .repo
        .list::<Resident>()
        .await?
        .into_iter()
        .map(|r| r.value)
        .filter(|r| {
            filter
                .house_id
                .as_deref()
                .map_or(true, |house_id| belongs_to_house(r, house_id))
        })
        .map(|r| r.redacted())
        .collect();
    residents.sort_by(|a, b| {
        (b.intake.submission_date, b.created_at).cmp(&(a.intake.submission_date, a.created_at))
    });

    info!("Listed {} residents", residents.len());
    Ok(Json(residents))
}

/// GET /residents/:resident_id
pub async fn get_resident(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
) -> AppResult<Json<Resident>> {
    require_self_or_manager(&claims, &resident_id)?;
    let resident = state.repo.require::<Resident>(&resident_id).await?;
    Ok(Json(resident.value.redacted()))
}

/// DELETE /residents/:resident_id
pub async fn delete_resident(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
) -> AppResult<StatusCode> {
    require_manager(&claims)?;
    records::delete_resident(&state.repo, &resident_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /residents/:resident_id/notes
pub async fn update_notes(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
    Json(body): Json<NotesUpdate>,
) -> AppResult<Json<Resident>> {
    require_manager(&claims)?;
    let resident = records::set_notes(&state.repo, &resident_id, body.notes).await?;
    Ok(Json(resident.redacted()))
}

/// POST /residents/:resident_id/drug-tests
pub async fn log_drug_test(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
    Json(body): Json<DrugTestBody>,
) -> AppResult<(StatusCode, Json<DrugTestLog>)> {
    require_manager(&claims)?;
    let performed_by = body
        .performed_by
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PERFORMED_BY.to_string());
    let log = records::log_drug_test(&state.repo, &resident_id, body.test, &performed_by).await?;
    Ok((StatusCode::CREATED, Json(log)))
}
