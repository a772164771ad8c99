//! HTTP transport shim
//!
//! Thin axum front-end over the coordinator: submit, status, event
//! stream, approval decisions, cancellation, and a live WebSocket feed
//! off the broadcast bus. Routing and middleware only — every decision
//! lives in the core.

mod handlers;
mod routes;
mod ws;

pub use routes::create_router;

use serde::Serialize;

/// JSON error body, mirrored across every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable machine-readable kind from the pipeline taxonomy.
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(kind: &str, error: impl Into<String>) -> Self {
        Self { error: error.into(), kind: kind.to_string() }
    }
}
