//! Manager dashboard and generated reports

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use haven_core::dashboard::{self, Dashboard};
use haven_core::{House, Resident};

use super::HouseFilter;
use crate::auth::{require_manager, AuthClaims};
use crate::report;
use crate::{AppResult, AppState};

async fn load_dashboard(state: &AppState, house_id: Option<&str>) -> AppResult<Dashboard> {
    let houses: Vec<House> = state
        .repo
        .list::<House>()
        .await?
        .into_iter()
        .map(|h| h.value)
        .collect();
    let residents: Vec<Resident> = state
        .repo
        .list::<Resident>()
        .await?
        .into_iter()
        .map(|r| r.value)
        .collect();
    Ok(dashboard::build(&houses, &residents, house_id))
}

/// GET /dashboard - Occupancy, status counts and recent check-ins
pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Query(filter): Query<HouseFilter>,
) -> AppResult<Json<Dashboard>> {
    require_manager(&claims)?;
    Ok(Json(load_dashboard(&state, filter.house_id.as_deref()).await?))
}

/// POST /reports/shift - Plain-text shift report
pub async fn shift_report(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Query(filter): Query<HouseFilter>,
) -> AppResult<String> {
    require_manager(&claims)?;
    let dashboard = load_dashboard(&state, filter.house_id.as_deref()).await?;
    let prompt = dashboard::shift_report_prompt(&dashboard);
    Ok(report::shift_report(state.report_client.as_ref(), &prompt).await)
}

/// POST /residents/:resident_id/risk-summary - Plain-text intake analysis
pub async fn intake_risk_summary(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
) -> AppResult<String> {
    require_manager(&claims)?;
    let resident = state.repo.require::<Resident>(&resident_id).await?;
    let prompt = dashboard::intake_risk_prompt(&resident.value);
    Ok(report::intake_risk_summary(state.report_client.as_ref(), &prompt).await)
}
