//! Server-sent store change events

use std::time::Duration;

use axum::{
    extract::State,
    Extension,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
};
use haven_core::StoreEvent;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::auth::{require_manager, AuthClaims};
use crate::{AppResult, AppState};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const RELOAD_ADVICE: &str = "Live updates were interrupted; reload to see current data.";

fn sse_event(name: &str, payload: serde_json::Value) -> Event {
    Event::default().event(name).data(payload.to_string())
}

fn store_event(event: &StoreEvent) -> Event {
    match event {
        StoreEvent::Put { key, revision } => {
            sse_event("put", json!({ "key": key, "revision": revision }))
        }
        StoreEvent::Deleted { key } => sse_event("deleted", json!({ "key": key })),
        StoreEvent::Disconnected { reason } => sse_event(
            "disconnected",
            json!({ "reason": reason, "advice": RELOAD_ADVICE }),
        ),
    }
}

/// GET /events - Relay document changes to the manager console
pub async fn stream_events(
    State(state): State<AppState>,
    Extension(AuthClaims(claims)): Extension<AuthClaims>,
) -> AppResult<Response> {
    // Keys name every resident, so the stream is manager-only
    require_manager(&claims)?;
    let mut changes = state.repo.subscribe();

    let body_stream = async_stream::stream! {
        yield Ok::<_, std::convert::Infallible>(
            sse_event("init", json!({ "message": "Connected to change stream" }))
        );

        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                received = changes.recv() => {
                    match received {
                        Ok(event) => yield Ok(store_event(&event)),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Change stream subscriber lagged by {} events", skipped);
                            yield Ok(sse_event(
                                "disconnected",
                                json!({ "reason": format!("missed {} changes", skipped), "advice": RELOAD_ADVICE }),
                            ));
                        }
                        Err(RecvError::Closed) => {
                            debug!("Change stream closed");
                            yield Ok(sse_event(
                                "disconnected",
                                json!({ "reason": "change stream closed", "advice": RELOAD_ADVICE }),
                            ));
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok(Event::default().comment("keep-alive"));
                }
            }
        }
    };

    Ok(Sse::new(body_stream).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_event_carries_reload_advice() {
        let rendered = format!(
            "{:?}",
            store_event(&StoreEvent::Disconnected {
                reason: "watch failed".to_string()
            })
        );
        assert!(rendered.contains("disconnected"));
        assert!(rendered.contains("reload"));
    }
}
