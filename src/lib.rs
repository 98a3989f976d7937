use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod error;
pub mod models;
pub mod relay;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

use relay::{get_health, get_stats, post_collect};
use state::AppState;

pub fn create_app_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/collect", post(post_collect))
        .route("/health", get(get_health))
        .route("/stats", get(get_stats))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
