use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use haven_core::geo::{
    acquire_fix, AccuracyMode, Coordinate, PositionRequest, ReplaySource, ReportedAttempt,
    ReportedOutcome,
};
use haven_core::{DeviceClass, Fix, GeoPolicy, LocationError, LocationSource};

/// Returns scripted results and records every request it receives
struct ScriptedSource {
    results: Mutex<VecDeque<Result<Fix, LocationError>>>,
    requests: Mutex<Vec<PositionRequest>>,
}

impl ScriptedSource {
    fn new(results: Vec<Result<Fix, LocationError>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn modes(&self) -> Vec<AccuracyMode> {
        self.requests.lock().unwrap().iter().map(|r| r.mode).collect()
    }
}

#[async_trait]
impl LocationSource for ScriptedSource {
    async fn current_position(&self, request: &PositionRequest) -> Result<Fix, LocationError> {
        self.requests.lock().unwrap().push(*request);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LocationError::PositionUnavailable))
    }
}

/// Never answers; only the protocol's own deadline ends the request
struct SilentSource;

#[async_trait]
impl LocationSource for SilentSource {
    async fn current_position(&self, _request: &PositionRequest) -> Result<Fix, LocationError> {
        std::future::pending().await
    }
}

fn fix(accuracy: f64) -> Fix {
    Fix {
        coordinate: Coordinate {
            lat: 36.1627,
            lng: -86.7816,
        },
        accuracy,
    }
}

#[tokio::test]
async fn given_high_accuracy_timeout_when_low_accuracy_succeeds_then_fix_is_used() {
    let source = ScriptedSource::new(vec![Err(LocationError::Timeout), Ok(fix(50.0))]);

    let result = acquire_fix(&source, &GeoPolicy::default(), DeviceClass::Mobile).await;

    assert_eq!(result, Ok(fix(50.0)));
    assert_eq!(source.modes(), vec![AccuracyMode::High, AccuracyMode::Low]);
}

#[tokio::test]
async fn given_permission_denied_then_no_fallback_is_attempted() {
    let source = ScriptedSource::new(vec![Err(LocationError::PermissionDenied), Ok(fix(5.0))]);

    let result = acquire_fix(&source, &GeoPolicy::default(), DeviceClass::Mobile).await;

    assert_eq!(result, Err(LocationError::PermissionDenied));
    assert_eq!(source.modes(), vec![AccuracyMode::High]);
}

#[tokio::test]
async fn given_unknown_failure_then_no_fallback_is_attempted() {
    let source = ScriptedSource::new(vec![
        Err(LocationError::Unsupported("Geolocation is not supported".to_string())),
        Ok(fix(5.0)),
    ]);

    let result = acquire_fix(&source, &GeoPolicy::default(), DeviceClass::Desktop).await;

    assert!(matches!(result, Err(LocationError::Unsupported(_))));
    assert_eq!(source.modes().len(), 1);
}

#[tokio::test]
async fn given_both_tiers_fail_then_second_failure_is_reported_once() {
    let source = ScriptedSource::new(vec![
        Err(LocationError::PositionUnavailable),
        Err(LocationError::Timeout),
        Ok(fix(5.0)),
    ]);

    let result = acquire_fix(&source, &GeoPolicy::default(), DeviceClass::Mobile).await;

    assert_eq!(result, Err(LocationError::Timeout));
    assert_eq!(source.modes(), vec![AccuracyMode::High, AccuracyMode::Low]);
}

#[tokio::test]
async fn given_mobile_fix_beyond_ceiling_then_low_accuracy_error() {
    let source = ScriptedSource::new(vec![Ok(fix(850.0))]);

    let result = acquire_fix(&source, &GeoPolicy::default(), DeviceClass::Mobile).await;

    assert_eq!(
        result,
        Err(LocationError::LowAccuracy {
            accuracy_m: 850.0,
            ceiling_m: 200.0
        })
    );
}

#[tokio::test]
async fn given_desktop_fix_with_coarse_accuracy_then_accepted() {
    let source = ScriptedSource::new(vec![Ok(fix(850.0))]);

    let result = acquire_fix(&source, &GeoPolicy::default(), DeviceClass::Desktop).await;

    assert_eq!(result, Ok(fix(850.0)));
}

#[tokio::test]
async fn given_fix_without_finite_accuracy_then_rejected() {
    let source = ScriptedSource::new(vec![Ok(fix(f64::NAN))]);

    let result = acquire_fix(&source, &GeoPolicy::default(), DeviceClass::Desktop).await;

    assert!(matches!(result, Err(LocationError::LowAccuracy { .. })));
}

#[tokio::test]
async fn given_requests_then_cache_is_disabled_and_timeouts_follow_policy() {
    let policy = GeoPolicy {
        high_accuracy_timeout: Duration::from_secs(5),
        low_accuracy_timeout: Duration::from_secs(10),
        ..GeoPolicy::default()
    };
    let source = ScriptedSource::new(vec![Err(LocationError::Timeout), Ok(fix(10.0))]);

    acquire_fix(&source, &policy, DeviceClass::Mobile).await.unwrap();

    let requests = source.requests.lock().unwrap().clone();
    assert_eq!(requests[0].timeout, Duration::from_secs(5));
    assert_eq!(requests[1].timeout, Duration::from_secs(10));
    assert!(requests.iter().all(|r| r.maximum_age == Duration::ZERO));
}

#[tokio::test(start_paused = true)]
async fn given_source_never_answers_then_protocol_times_out_after_both_tiers() {
    let started = tokio::time::Instant::now();

    let result = acquire_fix(&SilentSource, &GeoPolicy::default(), DeviceClass::Mobile).await;

    assert_eq!(result, Err(LocationError::Timeout));
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(20) && waited < Duration::from_secs(21));
}

#[tokio::test]
async fn given_reported_attempts_then_replay_follows_protocol() {
    let source = ReplaySource::new(vec![
        ReportedAttempt {
            mode: AccuracyMode::High,
            outcome: ReportedOutcome::Error {
                code: 3,
                message: None,
            },
        },
        ReportedAttempt {
            mode: AccuracyMode::Low,
            outcome: ReportedOutcome::Fix(fix(50.0)),
        },
    ]);

    let result = acquire_fix(&source, &GeoPolicy::default(), DeviceClass::Mobile).await;

    assert_eq!(result, Ok(fix(50.0)));
}

#[tokio::test]
async fn given_reported_denial_with_extra_attempts_then_extra_attempts_are_ignored() {
    let source = ReplaySource::new(vec![
        ReportedAttempt {
            mode: AccuracyMode::High,
            outcome: ReportedOutcome::Error {
                code: 1,
                message: None,
            },
        },
        ReportedAttempt {
            mode: AccuracyMode::Low,
            outcome: ReportedOutcome::Fix(fix(50.0)),
        },
    ]);

    let result = acquire_fix(&source, &GeoPolicy::default(), DeviceClass::Mobile).await;

    assert_eq!(result, Err(LocationError::PermissionDenied));
}

#[tokio::test]
async fn given_no_reported_attempts_then_position_unavailable() {
    let source = ReplaySource::new(vec![]);

    let result = acquire_fix(&source, &GeoPolicy::default(), DeviceClass::Mobile).await;

    assert_eq!(result, Err(LocationError::PositionUnavailable));
}
