//! Login and password management for managers and residents

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use haven_core::model::AppSettings;
use haven_core::records;
use haven_core::repository::Versioned;
use haven_core::{Resident, ResidentStatus};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{
    hash_password, require_manager, require_self_or_manager, validate_new_password,
    verify_password, AuthClaims, Role,
};
use crate::{AppError, AppResult, AppState};

const MANAGER_SUBJECT: &str = "manager";

#[derive(Debug, Deserialize)]
pub struct ManagerLogin {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct Identify {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResidentLogin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePassword {
    pub email: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePassword {
    /// Required when residents change their own password
    #[serde(default)]
    pub current_password: Option<String>,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub resident_id: String,
    pub has_password: bool,
}

fn incorrect_password() -> AppError {
    AppError::unauthorized("Incorrect password.")
}

/// Resident by email who is allowed to sign in
async fn portal_resident(state: &AppState, email: &str) -> AppResult<Versioned<Resident>> {
    let Some(resident) = records::find_by_email(&state.repo, email).await? else {
        return Err(AppError::new(
            StatusCode::NOT_FOUND,
            "Email not found. Please use the email provided during intake.",
        ));
    };
    match resident.value.status {
        ResidentStatus::Active | ResidentStatus::Alumni => Ok(resident),
        status => {
            warn!(resident_id = %resident.value.id, %status, "Portal access refused");
            Err(AppError::forbidden(
                "Account is not active. Please contact the House Manager.",
            ))
        }
    }
}

fn resident_session(state: &AppState, resident_id: &str) -> AppResult<Json<Session>> {
    Ok(Json(Session {
        token: state.jwt_config.issue(resident_id, Role::Resident)?,
        role: Role::Resident,
        resident_id: Some(resident_id.to_string()),
    }))
}

/// POST /session/manager
pub async fn manager_login(
    State(state): State<AppState>,
    Json(body): Json<ManagerLogin>,
) -> AppResult<Json<Session>> {
    let settings = state.repo.get::<AppSettings>(AppSettings::ID).await?;
    let accepted = match settings.and_then(|s| s.value.admin_password_hash) {
        Some(hash) => verify_password(&hash, &body.password),
        None => body.password == state.default_admin_password,
    };
    if !accepted {
        warn!("Manager login failed");
        return Err(incorrect_password());
    }

    info!("Manager signed in");
    Ok(Json(Session {
        token: state.jwt_config.issue(MANAGER_SUBJECT, Role::Manager)?,
        role: Role::Manager,
        resident_id: None,
    }))
}

/// POST /session/resident/identify - Whether to ask for a password or create one
pub async fn identify_resident(
    State(state): State<AppState>,
    Json(body): Json<Identify>,
) -> AppResult<Json<Identified>> {
    let resident = portal_resident(&state, &body.email).await?;
    Ok(Json(Identified {
        has_password: resident.value.password_hash.is_some(),
        resident_id: resident.value.id,
    }))
}

/// POST /session/resident
pub async fn resident_login(
    State(state): State<AppState>,
    Json(body): Json<ResidentLogin>,
) -> AppResult<Json<Session>> {
    let resident = portal_resident(&state, &body.email).await?;
    let Some(hash) = resident.value.password_hash.as_deref() else {
        return Err(AppError::bad_request(
            "No password set yet. Please create one.",
        ));
    };
    if !verify_password(hash, &body.password) {
        warn!(resident_id = %resident.value.id, "Resident login failed");
        return Err(incorrect_password());
    }

    info!(resident_id = %resident.value.id, "Resident signed in");
    resident_session(&state, &resident.value.id)
}

/// POST /session/resident/password - First sign-in: create a password
pub async fn create_resident_password(
    State(state): State<AppState>,
    Json(body): Json<CreatePassword>,
) -> AppResult<Json<Session>> {
    let resident = portal_resident(&state, &body.email).await?;
    if resident.value.password_hash.is_some() {
        return Err(AppError::new(
            StatusCode::CONFLICT,
            "A password is already set. Please log in.",
        ));
    }
    validate_new_password(&body.new_password, &body.confirm_password)?;

    records::set_password_hash(&state.repo, &resident.value.id, hash_password(&body.new_password)?)
        .await?;
    resident_session(&state, &resident.value.id)
}

/// PUT /residents/:resident_id/password - Manager reset or resident change
pub async fn change_resident_password(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Path(resident_id): Path<String>,
    Json(body): Json<ChangePassword>,
) -> AppResult<StatusCode> {
    require_self_or_manager(&claims, &resident_id)?;
    validate_new_password(&body.new_password, &body.confirm_password)?;

    if !claims.is_manager() {
        let resident = state.repo.require::<Resident>(&resident_id).await?;
        let current_ok = match (&resident.value.password_hash, &body.current_password) {
            (Some(hash), Some(current)) => verify_password(hash, current),
            _ => false,
        };
        if !current_ok {
            return Err(incorrect_password());
        }
    }

    records::set_password_hash(&state.repo, &resident_id, hash_password(&body.new_password)?)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /settings/admin-password
pub async fn change_admin_password(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
    Json(body): Json<ChangePassword>,
) -> AppResult<StatusCode> {
    require_manager(&claims)?;
    validate_new_password(&body.new_password, &body.confirm_password)?;

    let settings = AppSettings {
        admin_password_hash: Some(hash_password(&body.new_password)?),
    };
    match state.repo.get::<AppSettings>(AppSettings::ID).await? {
        Some(current) => {
            state.repo.replace(&settings, current.revision).await?;
        }
        None => {
            state.repo.insert(&settings).await?;
        }
    }

    info!("Manager password changed");
    Ok(StatusCode::NO_CONTENT)
}
