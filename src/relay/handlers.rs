//! The collect handler: validate, dedup, forward, acknowledge.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::{CapiEventRecord, CapiPayload, CollectAck, InboundEvent};
use crate::services::DedupOutcome;
use crate::state::AppState;
use crate::utils;

const SIGNATURE_HEADER: &str = "x-relay-signature";

/// The one-line audit trail. Brazil-local stamp, fixed tag, and whatever of
/// status/count applies to this outcome.
fn log_outcome(event_id: &str, status: Option<u16>, count: Option<i64>, duplicate: bool) {
    let (date, time) = utils::sao_paulo_stamp(Utc::now());
    info!(
        "[CAPI] {} {} event_id={} status={} count={} duplicate={}",
        date,
        time,
        event_id,
        status.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
        count.map(|c| c.to_string()).unwrap_or_else(|| "-".into()),
        duplicate,
    );
}

/// POST /collect
///
/// Relays one conversion event to the provider, at most once per `event_id`
/// within the configured dedup window. Store and provider failures never
/// fail the request; only validation does.
pub async fn post_collect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.config.signature_secret {
        let presented = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if presented != Some(secret.as_str()) {
            warn!("collect request rejected: signature header missing or mismatched");
            return (StatusCode::FORBIDDEN, Json(CollectAck::error("forbidden"))).into_response();
        }
    }

    let event: InboundEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("collect request rejected: unparseable body: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(CollectAck::error("invalid_body")),
            )
                .into_response();
        }
    };

    if event.event_id.trim().is_empty() {
        warn!("collect request rejected: missing event_id");
        return (
            StatusCode::BAD_REQUEST,
            Json(CollectAck::error("missing_event_id")),
        )
            .into_response();
    }

    let Some(provider) = &state.config.provider else {
        error!("provider credentials not configured; cannot relay event");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(CollectAck::error("missing_provider_config")),
        )
            .into_response();
    };

    let today = utils::sao_paulo_now().date_naive();

    let mut count = None;
    if let Some(dedup) = &state.dedup {
        match dedup.check_and_mark(&event.event_id, today).await {
            Ok(DedupOutcome::Duplicate { count }) => {
                log_outcome(&event.event_id, None, count, true);
                return (StatusCode::OK, Json(CollectAck::duplicate(count))).into_response();
            }
            Ok(DedupOutcome::Fresh) => match dedup.record_accepted(today).await {
                Ok(n) => count = Some(n),
                Err(e) => warn!("daily counter update failed: {}", e),
            },
            // Store trouble must not block the client; forward without the
            // dedup guarantee and let the provider's own event_id dedup
            // catch any repeat.
            Err(e) => warn!("dedup store unavailable, forwarding anyway: {}", e),
        }
    }

    let record = CapiEventRecord::from_inbound(
        &event,
        utils::client_ip(&headers),
        utils::user_agent(&headers),
        Utc::now().timestamp(),
    );
    let payload = CapiPayload::single(record);

    let status = match state.capi.send_events(provider, &payload).await {
        Ok(status) => Some(status),
        Err(e) => {
            // Swallowed: the counter stays committed and the caller still
            // gets an ack, so a provider outage never breaks the funnel.
            error!("provider call failed: {}", e);
            None
        }
    };

    log_outcome(&event.event_id, status, count, false);
    (StatusCode::OK, Json(CollectAck::accepted(count, status))).into_response()
}
