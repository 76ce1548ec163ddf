use thiserror::Error;

use crate::geo::LocationError;
use crate::intake::IntakeError;
use crate::model::ResidentStatus;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum HavenError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Bed {bed_id} is occupied by resident {occupant_id}")]
    BedOccupied { bed_id: String, occupant_id: String },

    #[error("Cannot {operation} resident {resident_id} with status {status}")]
    InvalidTransition {
        resident_id: String,
        status: ResidentStatus,
        operation: &'static str,
    },

    #[error("Concurrent modification of {key}; reload and retry")]
    Conflict { key: String },

    #[error("Assignment inconsistency for resident {resident_id}: {detail}")]
    AssignmentInconsistency { resident_id: String, detail: String },

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for HavenError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { key } => HavenError::Conflict { key },
            other => HavenError::Store(other),
        }
    }
}

impl HavenError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        HavenError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type HavenResult<T> = Result<T, HavenError>;
