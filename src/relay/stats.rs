//! Telemetry endpoints: liveness and today's accepted-event count.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::state::AppState;
use crate::utils;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let store = match &state.dedup {
        Some(dedup) => {
            if dedup.ping().await {
                "reachable"
            } else {
                "unreachable"
            }
        }
        None => "disabled",
    };
    Json(HealthResponse {
        status: "ok",
        store,
    })
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    /// Brazil-local calendar date the count belongs to.
    pub date: String,
    pub count: i64,
    pub dedup_enabled: bool,
}

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>> {
    let today = utils::sao_paulo_now().date_naive();
    let count = match &state.dedup {
        Some(dedup) => dedup.current_count(today).await?,
        None => 0,
    };
    Ok(Json(StatsResponse {
        date: today.format("%Y-%m-%d").to_string(),
        count,
        dedup_enabled: state.dedup.is_some(),
    }))
}
