//! Coordination pipeline
//!
//! The coordinator drives each burn request through the five stages,
//! tracks lifecycle state, emits ordered events, and persists
//! intermediate results. A bounded worker pool processes requests in
//! parallel; within one request, stages are strictly sequential.

mod coordinator;
mod event_log;
pub mod records;
mod worker;

pub use coordinator::{Coordinator, CoordinatorStats, StatusView};
pub use event_log::EventLog;
