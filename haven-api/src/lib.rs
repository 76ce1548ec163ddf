//! Haven API Service
//!
//! REST surface over the haven-core occupancy model, backed by a JetStream KV
//! bucket (or an in-memory store for single-node and test use).

pub mod auth;
pub mod config;
pub mod kv;
pub mod report;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use anyhow::Result;
use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use haven_core::{
    AssignmentService, CheckInRecorder, DocumentStore, HavenError, MemoryStore, Repository,
    StoreError,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::{Config, StoreBackend};
use crate::report::{HttpReportClient, ReportClient, UnconfiguredReportClient};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub assignments: AssignmentService,
    pub checkins: CheckInRecorder,
    pub jwt_config: auth::JwtConfig,
    pub report_client: Arc<dyn ReportClient>,
    /// Manager password accepted while no password has been set in settings
    pub default_admin_password: String,
    pub cors_origin: Option<HeaderValue>,
}

impl AppState {
    /// Create application state on the configured store backend
    pub async fn new(config: &Config) -> Result<Self> {
        let store: Arc<dyn DocumentStore> = match config.store {
            StoreBackend::Kv => Arc::new(
                kv::KvStore::connect(
                    &config.nats_url,
                    config.nats_creds_path.as_deref(),
                    &config.kv_bucket,
                )
                .await?,
            ),
            StoreBackend::Memory => {
                warn!("Using in-memory store; data is lost on restart");
                Arc::new(MemoryStore::new())
            }
        };
        let state = Self::with_store(store, config)?;
        info!("Successfully initialized Haven API application state");
        Ok(state)
    }

    /// Create application state over an already opened store
    pub fn with_store(store: Arc<dyn DocumentStore>, config: &Config) -> Result<Self> {
        let repo = Repository::new(store).with_timeout(config.store_timeout);

        let report_client: Arc<dyn ReportClient> =
            match (&config.report_endpoint, &config.report_api_key) {
                (Some(endpoint), Some(api_key)) => {
                    info!("Using HTTP report client with endpoint: {}", endpoint);
                    Arc::new(HttpReportClient::new(
                        endpoint.clone(),
                        api_key.clone(),
                        config.report_model.clone(),
                        config.report_timeout,
                    )?)
                }
                (Some(_), None) => {
                    warn!("Report endpoint configured without an API key; reports are disabled");
                    Arc::new(UnconfiguredReportClient)
                }
                (None, _) => Arc::new(UnconfiguredReportClient),
            };

        let cors_origin = config
            .cors_origin
            .as_deref()
            .map(|origin| {
                if origin == "*" {
                    anyhow::bail!("CORS origin must name a single origin, not '*'");
                }
                HeaderValue::from_str(origin)
                    .with_context(|| format!("Invalid CORS origin: {}", origin))
            })
            .transpose()?;

        Ok(Self {
            assignments: AssignmentService::new(repo.clone()),
            checkins: CheckInRecorder::new(repo.clone(), config.geo_policy()),
            jwt_config: auth::JwtConfig::from_config(config),
            report_client,
            default_admin_password: config.admin_password.clone(),
            cors_origin,
            repo,
        })
    }
}

/// Custom error type for API responses
#[derive(Debug)]
pub struct AppError {
    pub status_code: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError {
            status_code: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Internal server error: {}", err),
        }
    }
}

impl From<HavenError> for AppError {
    fn from(err: HavenError) -> Self {
        let status_code = match &err {
            HavenError::Validation(_) | HavenError::Intake(_) => StatusCode::BAD_REQUEST,
            HavenError::NotFound { .. } => StatusCode::NOT_FOUND,
            HavenError::BedOccupied { .. }
            | HavenError::InvalidTransition { .. }
            | HavenError::Conflict { .. } => StatusCode::CONFLICT,
            HavenError::AssignmentInconsistency { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            HavenError::Location(_) => StatusCode::UNPROCESSABLE_ENTITY,
            HavenError::Store(StoreError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            HavenError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            HavenError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            HavenError::Location(location) => location.user_message(),
            other => other.to_string(),
        };
        AppError {
            status_code,
            message,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        HavenError::from(err).into()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code, self.message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Health check endpoint
async fn healthz() -> impl IntoResponse {
    "OK"
}

/// Create the Axum application router
pub fn create_app(state: AppState) -> Router {
    let public = Router::new()
        .route("/healthz", get(healthz))
        .route("/intake", post(routes::residents::submit_intake))
        .route("/intake/houses", get(routes::houses::list_intake_houses))
        .route("/session/manager", post(routes::session::manager_login))
        .route(
            "/session/resident/identify",
            post(routes::session::identify_resident),
        )
        .route("/session/resident", post(routes::session::resident_login))
        .route(
            "/session/resident/password",
            post(routes::session::create_resident_password),
        );

    let protected = Router::new()
        .route("/houses", get(routes::houses::list_houses))
        .route("/houses/:house_id", get(routes::houses::get_house))
        .route(
            "/houses/:house_id/vacancies",
            get(routes::houses::list_vacancies),
        )
        .route(
            "/houses/:house_id/rooms/:room_id",
            put(routes::houses::rename_room),
        )
        .route(
            "/houses/:house_id/rooms/:room_id/beds/:bed_id",
            put(routes::houses::relabel_bed),
        )
        .route("/residents", get(routes::residents::list_residents))
        .route(
            "/residents/:resident_id",
            get(routes::residents::get_resident).delete(routes::residents::delete_resident),
        )
        .route(
            "/residents/:resident_id/notes",
            put(routes::residents::update_notes),
        )
        .route(
            "/residents/:resident_id/password",
            put(routes::session::change_resident_password),
        )
        .route(
            "/residents/:resident_id/drug-tests",
            post(routes::residents::log_drug_test),
        )
        .route(
            "/residents/:resident_id/risk-summary",
            post(routes::dashboard::intake_risk_summary),
        )
        .route(
            "/residents/:resident_id/admit",
            post(routes::assignments::admit),
        )
        .route(
            "/residents/:resident_id/transfer",
            post(routes::assignments::transfer),
        )
        .route(
            "/residents/:resident_id/remove-from-bed",
            post(routes::assignments::remove_from_bed),
        )
        .route(
            "/residents/:resident_id/discharge",
            post(routes::assignments::discharge),
        )
        .route(
            "/residents/:resident_id/check-ins",
            get(routes::checkins::list_check_ins).post(routes::checkins::record_check_in),
        )
        .route(
            "/chores",
            get(routes::chores::list_chores).post(routes::chores::create_chore),
        )
        .route(
            "/chores/:chore_id",
            get(routes::chores::get_chore)
                .put(routes::chores::update_chore)
                .delete(routes::chores::delete_chore),
        )
        .route(
            "/chores/:chore_id/completions",
            post(routes::chores::complete_chore),
        )
        .route("/dashboard", get(routes::dashboard::get_dashboard))
        .route("/reports/shift", post(routes::dashboard::shift_report))
        .route("/reconcile", post(routes::assignments::reconcile))
        .route(
            "/settings/admin-password",
            put(routes::session::change_admin_password),
        )
        .route("/events", get(routes::events::stream_events))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::jwt_middleware,
        ));

    // No configured origin means no cross-origin access
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(state.cors_origin.clone()))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    public
        .merge(protected)
        // Avoid logging request headers so Authorization tokens never reach logs.
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
