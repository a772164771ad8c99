//! Typed pipeline events
//!
//! Every observable action the coordinator or a stage takes is recorded
//! as an `AgentEvent` with a per-request dense sequence number. Events
//! are append-only: the request does not track them, sinks do.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The five pipeline stages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Validate,
    WeatherAssess,
    Predict,
    Optimize,
    Alert,
}

impl StageName {
    /// Stage timeout budget in milliseconds.
    pub fn budget_ms(&self) -> u64 {
        match self {
            Self::Validate => 200,
            Self::WeatherAssess => 25_000,
            Self::Predict => 5_000,
            Self::Optimize => 30_000,
            Self::Alert => 10_000,
        }
    }

    pub fn short_code(&self) -> &'static str {
        match self {
            Self::Validate => "VAL",
            Self::WeatherAssess => "WX",
            Self::Predict => "PRD",
            Self::Optimize => "OPT",
            Self::Alert => "ALR",
        }
    }
}

impl std::fmt::Display for StageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validate => "validate",
            Self::WeatherAssess => "weather_assess",
            Self::Predict => "predict",
            Self::Optimize => "optimize",
            Self::Alert => "alert",
        };
        write!(f, "{s}")
    }
}

/// Discriminated event payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    StageStarted {
        stage: StageName,
    },
    StageThinking {
        stage: StageName,
        confidence: f64,
        note: String,
    },
    Handoff {
        from: StageName,
        to: StageName,
        reason: String,
    },
    StageCompleted {
        stage: StageName,
        duration_ms: u64,
        tools: Vec<String>,
    },
    ApprovalRequired {
        context: String,
    },
    Error {
        /// Stable taxonomy kind (`validation`, `unavailable`, ...).
        error_kind: String,
        message: String,
    },
    Metric {
        name: String,
        value: f64,
    },
}

impl EventKind {
    /// Stable discriminant name for subscriber filters.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StageStarted { .. } => "stage_started",
            Self::StageThinking { .. } => "stage_thinking",
            Self::Handoff { .. } => "handoff",
            Self::StageCompleted { .. } => "stage_completed",
            Self::ApprovalRequired { .. } => "approval_required",
            Self::Error { .. } => "error",
            Self::Metric { .. } => "metric",
        }
    }
}

/// A typed observation emitted by the coordinator or a stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentEvent {
    pub request_id: Uuid,
    /// Monotonically increasing, dense per request, starting at 1.
    pub seq: u64,
    /// Unix milliseconds.
    pub ts: i64,
    #[serde(flatten)]
    pub kind: EventKind,
}
