//! Route table

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pipeline::Coordinator;

use super::{handlers, ws};

/// Build the application router over a running coordinator.
pub fn create_router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/stats", get(handlers::stats))
        .route("/api/burns", post(handlers::submit_burn))
        .route("/api/burns/:id", get(handlers::burn_status))
        .route("/api/burns/:id/events", get(handlers::burn_events))
        .route("/api/burns/:id/approval", post(handlers::resolve_approval))
        .route("/api/burns/:id/cancel", post(handlers::cancel_burn))
        .route("/ws/events", get(ws::events_feed))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(coordinator)
}
