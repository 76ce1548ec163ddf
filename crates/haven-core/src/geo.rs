//! Geolocation acquisition protocol
//!
//! One high-accuracy attempt, then at most one low-accuracy fallback when the
//! first attempt timed out or no position was available. Permission denial
//! ends the sequence immediately. The final fix must report an accuracy
//! radius within the ceiling for the device class.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// A position fix with its reported accuracy radius in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub accuracy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyMode {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    #[default]
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRequest {
    pub mode: AccuracyMode,
    pub timeout: Duration,
    /// Cached fixes older than this are not acceptable; zero disables the cache.
    pub maximum_age: Duration,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Position unavailable")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Location accuracy {accuracy_m:.0}m exceeds the {ceiling_m:.0}m limit")]
    LowAccuracy { accuracy_m: f64, ceiling_m: f64 },

    #[error("Location unavailable: {0}")]
    Unsupported(String),
}

impl LocationError {
    /// Map a W3C GeolocationPositionError code
    pub fn from_code(code: u16, message: Option<String>) -> Self {
        match code {
            1 => LocationError::PermissionDenied,
            2 => LocationError::PositionUnavailable,
            3 => LocationError::Timeout,
            other => LocationError::Unsupported(
                message.unwrap_or_else(|| format!("unknown geolocation error code {}", other)),
            ),
        }
    }

    /// Whether the low-accuracy tier may be tried after this failure
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            LocationError::PositionUnavailable | LocationError::Timeout
        )
    }

    /// Text shown to the resident
    pub fn user_message(&self) -> String {
        match self {
            LocationError::PermissionDenied => "Permission denied. You must allow location access to check in. Please check your browser settings.".to_string(),
            LocationError::PositionUnavailable => "Location unavailable. Please check your GPS signal or move to an area with better reception.".to_string(),
            LocationError::Timeout => "Location timeout. The signal is weak. Please try again.".to_string(),
            LocationError::LowAccuracy { accuracy_m, ceiling_m } => format!(
                "Location accuracy too low ({:.0}m, limit {:.0}m). Move near a window or outdoors and try again.",
                accuracy_m, ceiling_m
            ),
            LocationError::Unsupported(message) => message.clone(),
        }
    }
}

#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn current_position(&self, request: &PositionRequest) -> Result<Fix, LocationError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPolicy {
    pub high_accuracy_timeout: Duration,
    pub low_accuracy_timeout: Duration,
    pub mobile_ceiling_m: f64,
    pub desktop_ceiling_m: f64,
}

impl Default for GeoPolicy {
    fn default() -> Self {
        Self {
            high_accuracy_timeout: Duration::from_secs(10),
            low_accuracy_timeout: Duration::from_secs(10),
            mobile_ceiling_m: 200.0,
            desktop_ceiling_m: 10_000.0,
        }
    }
}

impl GeoPolicy {
    pub fn ceiling_for(&self, device: DeviceClass) -> f64 {
        match device {
            DeviceClass::Mobile => self.mobile_ceiling_m,
            DeviceClass::Desktop => self.desktop_ceiling_m,
        }
    }

    fn request(&self, mode: AccuracyMode) -> PositionRequest {
        let timeout = match mode {
            AccuracyMode::High => self.high_accuracy_timeout,
            AccuracyMode::Low => self.low_accuracy_timeout,
        };
        PositionRequest {
            mode,
            timeout,
            maximum_age: Duration::ZERO,
        }
    }
}

async fn attempt<S: LocationSource + ?Sized>(
    source: &S,
    request: &PositionRequest,
) -> Result<Fix, LocationError> {
    match tokio::time::timeout(request.timeout, source.current_position(request)).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    }
}

/// Acquire a fix for a check-in
pub async fn acquire_fix<S: LocationSource + ?Sized>(
    source: &S,
    policy: &GeoPolicy,
    device: DeviceClass,
) -> Result<Fix, LocationError> {
    let fix = match attempt(source, &policy.request(AccuracyMode::High)).await {
        Ok(fix) => fix,
        Err(err) if err.allows_fallback() => {
            warn!(reason = %err, "High accuracy fix failed, attempting low accuracy fallback");
            attempt(source, &policy.request(AccuracyMode::Low)).await?
        }
        Err(err) => {
            info!(reason = %err, "High accuracy fix failed without fallback");
            return Err(err);
        }
    };

    let ceiling_m = policy.ceiling_for(device);
    // Written negated so a NaN accuracy is rejected too
    if !(fix.accuracy <= ceiling_m) {
        warn!(
            accuracy_m = fix.accuracy,
            ceiling_m,
            ?device,
            "Rejecting fix with insufficient accuracy"
        );
        return Err(LocationError::LowAccuracy {
            accuracy_m: fix.accuracy,
            ceiling_m,
        });
    }

    debug!(accuracy_m = fix.accuracy, "Acquired fix");
    Ok(fix)
}

/// Outcome of one attempt as reported by the device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportedOutcome {
    Fix(Fix),
    Error {
        code: u16,
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedAttempt {
    pub mode: AccuracyMode,
    pub outcome: ReportedOutcome,
}

/// Replays the attempts a device made so the protocol can be applied server-side.
///
/// Each request consumes the first reported attempt with the requested mode.
/// A request with no matching attempt left fails as position unavailable.
pub struct ReplaySource {
    attempts: Mutex<VecDeque<ReportedAttempt>>,
}

impl ReplaySource {
    pub fn new(attempts: Vec<ReportedAttempt>) -> Self {
        Self {
            attempts: Mutex::new(attempts.into()),
        }
    }

    fn take(&self, mode: AccuracyMode) -> Option<ReportedAttempt> {
        let mut attempts = match self.attempts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let index = attempts.iter().position(|a| a.mode == mode)?;
        attempts.remove(index)
    }
}

#[async_trait]
impl LocationSource for ReplaySource {
    async fn current_position(&self, request: &PositionRequest) -> Result<Fix, LocationError> {
        match self.take(request.mode) {
            Some(ReportedAttempt {
                outcome: ReportedOutcome::Fix(fix),
                ..
            }) => Ok(fix),
            Some(ReportedAttempt {
                outcome: ReportedOutcome::Error { code, message },
                ..
            }) => Err(LocationError::from_code(code, message)),
            None => {
                debug!(mode = ?request.mode, "No reported attempt for requested mode");
                Err(LocationError::PositionUnavailable)
            }
        }
    }
}
