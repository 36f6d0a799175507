//! Delivery event webhook.
//!
//! Response contract: 200 once an authentic event has been accepted (even
//! when it correlates to nothing), 400 for malformed payloads, 401 for bad
//! signatures, 500 only for storage failures. Providers retry on 5xx, so
//! anything terminal must not return one.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use remessa_core::pipeline::Pipeline;
use remessa_core::{DeliveryEvent, EventType};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::AppState;

pub async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = state.verifier.verify(&headers, &body) {
        warn!(error = %e, "rejecting webhook delivery");
        return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
    }

    let event: DeliveryEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "malformed webhook payload");
            return (StatusCode::BAD_REQUEST, "malformed event payload").into_response();
        }
    };

    match Pipeline::apply_delivery_event(state.storage.as_ref(), &state.metrics, &event) {
        Ok(applied) => {
            debug!(event_type = %event.event_type, ?applied, "webhook event processed");
            StatusCode::OK.into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to process webhook event");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage error").into_response()
        }
    }
}

/// Capability probe used by provider dashboards when registering the
/// endpoint.
pub async fn describe_endpoint() -> Response {
    let events: Vec<&str> = EventType::ALL.iter().map(|t| t.as_str()).collect();
    Json(json!({ "status": "ready", "events": events })).into_response()
}
