//! Emberline: Agricultural Burn Coordination
//!
//! Multi-agent coordination pipeline for controlled agricultural burns:
//! validates requests, assesses weather, predicts smoke dispersion,
//! optimizes the day's schedule, and alerts stakeholders.
//!
//! ## Architecture
//!
//! - **Agent Stages**: validate → weather-assess → predict → optimize → alert
//! - **Dispersion Model**: Gaussian plume producing ground-level PM2.5
//! - **Conflict Detector**: pairwise plume-overlap records with severity
//! - **Schedule Optimizer**: simulated annealing over start-time slots
//! - **Coordinator**: bounded queue, worker pool, ordered event log

pub mod agents;
pub mod api;
pub mod bootstrap;
pub mod bus;
pub mod config;
pub mod conflict;
pub mod dispersion;
pub mod error;
pub mod infra;
pub mod notify;
pub mod optimizer;
pub mod pipeline;
pub mod store;
pub mod types;
pub mod weather;

// Re-export the coordination surface
pub use bootstrap::{build_context, build_with};
pub use error::PipelineError;
pub use pipeline::{Coordinator, CoordinatorStats, StatusView};

// Re-export commonly used types
pub use types::{
    AgentEvent, BurnRequest, BurnWindow, ConflictRecord, ConflictSeverity, DispersionResult,
    EventKind, FuelType, RequestState, Schedule, SlotTime, StageName, WeatherSnapshot,
};
