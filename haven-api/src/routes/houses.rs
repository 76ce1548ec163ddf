//! House layout and vacancy endpoints

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use haven_core::facility;
use haven_core::model::RoomVacancy;
use haven_core::House;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::{require_manager, AuthClaims};
use crate::{AppResult, AppState};

/// House summary offered to intake applicants
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeHouse {
    pub id: String,
    pub name: String,
    pub address: String,
    pub vacant_beds: usize,
}

#[derive(Debug, Deserialize)]
pub struct RenameRoom {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct RelabelBed {
    #[serde(alias = "number")]
    pub label: String,
}

async fn all_houses(state: &AppState) -> AppResult<Vec<House>> {
    Ok(state
        .repo
        .list::<House>()
        .await?
        .into_iter()
        .map(|h| h.value)
        .collect())
}

/// GET /intake/houses - Houses an applicant can choose from
pub async fn list_intake_houses(State(state): State<AppState>) -> AppResult<Json<Vec<IntakeHouse>>> {
    let houses = all_houses(&state).await?;
    Ok(Json(
        houses
            .into_iter()
            .map(|h| {
                let occupancy = h.occupancy();
                IntakeHouse {
                    vacant_beds: occupancy.total - occupancy.occupied,
                    id: h.id,
                    name: h.name,
                    address: h.address,
                }
            })
            .collect(),
    ))
}

/// GET /houses - All houses with their rooms and beds
pub async fn list_houses(State(state): State<AppState>) -> AppResult<Json<Vec<House>>> {
    debug!("Handling GET /houses");
    let houses = all_houses(&state).await?;
    info!("Listed {} houses", houses.len());
    Ok(Json(houses))
}

/// GET /houses/:house_id
pub async fn get_house(
    State(state): State<AppState>,
    Path(house_id): Path<String>,
) -> AppResult<Json<House>> {
    let house = state.repo.require::<House>(&house_id).await?;
    Ok(Json(house.value))
}

/// GET /houses/:house_id/vacancies - Vacant beds grouped by room
pub async fn list_vacancies(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(house_id): Path<String>,
) -> AppResult<Json<Vec<RoomVacancy>>> {
    require_manager(&claims)?;
    Ok(Json(facility::vacancies(&state.repo, &house_id).await?))
}

/// PUT /houses/:house_id/rooms/:room_id
pub async fn rename_room(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path((house_id, room_id)): Path<(String, String)>,
    Json(body): Json<RenameRoom>,
) -> AppResult<Json<House>> {
    require_manager(&claims)?;
    let house = facility::rename_room(&state.repo, &house_id, &room_id, &body.name).await?;
    Ok(Json(house))
}

/// PUT /houses/:house_id/rooms/:room_id/beds/:bed_id
pub async fn relabel_bed(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path((house_id, room_id, bed_id)): Path<(String, String, String)>,
    Json(body): Json<RelabelBed>,
) -> AppResult<Json<House>> {
    require_manager(&claims)?;
    let house =
        facility::relabel_bed(&state.repo, &house_id, &room_id, &bed_id, &body.label).await?;
    Ok(Json(house))
}
