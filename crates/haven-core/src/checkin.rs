//! Check-in recording

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::assignment::ensure_status;
use crate::error::HavenResult;
use crate::geo::{self, DeviceClass, GeoPolicy, LocationSource};
use crate::model::{CheckInLog, CheckInType, Resident, ResidentStatus};
use crate::repository::Repository;

const DEFAULT_LOCATION_NAME: &str = "Unknown Location";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    pub resident_id: String,
    #[serde(rename = "type")]
    pub kind: CheckInType,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub device: DeviceClass,
}

/// Logs are persisted with millisecond timestamps
fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(at)
}

#[derive(Clone)]
pub struct CheckInRecorder {
    repo: Repository,
    policy: GeoPolicy,
}

impl CheckInRecorder {
    pub fn new(repo: Repository, policy: GeoPolicy) -> Self {
        Self { repo, policy }
    }

    pub fn policy(&self) -> &GeoPolicy {
        &self.policy
    }

    /// Acquire a location and append a check-in to the resident's log.
    ///
    /// The resident must be active both before the location is acquired and
    /// when the log is written. On any failure no log is stored.
    #[instrument(skip(self, source, request), fields(resident_id = %request.resident_id, kind = %request.kind))]
    pub async fn record<S: LocationSource + ?Sized>(
        &self,
        source: &S,
        request: CheckInRequest,
    ) -> HavenResult<CheckInLog> {
        let resident = self.repo.require::<Resident>(&request.resident_id).await?;
        ensure_status(&resident.value, ResidentStatus::Active, "check in")?;

        let fix = geo::acquire_fix(source, &self.policy, request.device)
            .await
            .map_err(|e| {
                warn!(reason = %e, "Check-in aborted: no usable location");
                e
            })?;

        let location_name = request
            .location_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_LOCATION_NAME)
            .to_string();

        let log = CheckInLog {
            id: format!("l-{}", uuid::Uuid::new_v4()),
            resident_id: request.resident_id.clone(),
            kind: request.kind,
            timestamp: stored_precision(Utc::now()),
            location: fix.coordinate,
            location_name,
            comment: request.comment,
            notes: None,
        };

        let appended = log.clone();
        self.repo
            .modify::<Resident, _>(&request.resident_id, move |resident| {
                ensure_status(resident, ResidentStatus::Active, "check in")?;
                resident.check_in_logs.push(appended);
                resident.updated_at = Utc::now();
                Ok(())
            })
            .await?;

        info!(log_id = %log.id, accuracy_m = fix.accuracy, "Check-in recorded");
        Ok(log)
    }
}
