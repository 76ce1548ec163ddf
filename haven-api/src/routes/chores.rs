//! Chore endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use haven_core::chores::{self, ChoreUpdate, NewChore};
use haven_core::model::Chore;
use serde::Deserialize;

use super::HouseFilter;
use crate::auth::{require_manager, AuthClaims};
use crate::{AppError, AppResult, AppState};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionBody {
    /// Defaults to the signed-in resident
    pub resident_id: Option<String>,
    #[serde(default)]
    pub notes: String,
}

/// GET /chores - Newest first, optionally for one house
pub async fn list_chores(
    State(state): State<AppState>,
    Query(filter): Query<HouseFilter>,
) -> AppResult<Json<Vec<Chore>>> {
    Ok(Json(
        chores::list_chores(&state.repo, filter.house_id.as_deref()).await?,
    ))
}

/// GET /chores/:chore_id
pub async fn get_chore(
    State(state): State<AppState>,
    Path(chore_id): Path<String>,
) -> AppResult<Json<Chore>> {
    Ok(Json(state.repo.require::<Chore>(&chore_id).await?.value))
}

/// POST /chores
pub async fn create_chore(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Json(body): Json<NewChore>,
) -> AppResult<(StatusCode, Json<Chore>)> {
    require_manager(&claims)?;
    let chore = chores::create_chore(&state.repo, body).await?;
    Ok((StatusCode::CREATED, Json(chore)))
}

/// PUT /chores/:chore_id
pub async fn update_chore(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(chore_id): Path<String>,
    Json(body): Json<ChoreUpdate>,
) -> AppResult<Json<Chore>> {
    require_manager(&claims)?;
    Ok(Json(chores::update_chore(&state.repo, &chore_id, body).await?))
}

/// DELETE /chores/:chore_id
pub async fn delete_chore(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(chore_id): Path<String>,
) -> AppResult<StatusCode> {
    require_manager(&claims)?;
    chores::delete_chore(&state.repo, &chore_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /chores/:chore_id/completions
pub async fn complete_chore(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(chore_id): Path<String>,
    Json(body): Json<CompletionBody>,
) -> AppResult<Json<Chore>> {
    let resident_id = match (claims.is_manager(), body.resident_id) {
        (true, Some(resident_id)) => resident_id,
        (true, None) => {
            return Err(AppError::bad_request(
                "residentId is required when a manager records a completion",
            ))
        }
        (false, Some(resident_id)) if resident_id != claims.sub => {
            return Err(AppError::forbidden(
                "Residents may only record their own completions",
            ))
        }
        (false, _) => claims.sub.clone(),
    };
    let chore = chores::complete_chore(&state.repo, &chore_id, &resident_id, body.notes).await?;
    Ok(Json(chore))
}
