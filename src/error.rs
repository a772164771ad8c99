//! Pipeline error taxonomy
//!
//! Every failure that crosses a stage boundary is one of these kinds.
//! Stages recover transient kinds locally (backoff within the stage
//! budget); everything else bubbles to the coordinator, which persists
//! the terminal state and emits an `error` event. User-visible failures
//! carry a stable `kind` string and a message — never a backtrace.

use thiserror::Error;

/// Errors produced by the coordination pipeline and its facades.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Operator input rejected. Terminal for the request, never retried.
    #[error("validation failed: {}", fields.join(", "))]
    Validation { fields: Vec<String> },

    /// Provider credentials rejected. Latches the breaker open until
    /// reconfiguration.
    #[error("provider authentication failed")]
    Auth,

    /// Provider asked us to slow down. Retried after the honored delay.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Transient provider or breaker failure. Retried with backoff.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Work queue or breaker saturated. Caller may retry later.
    #[error("queue at capacity, try again later")]
    Backpressure,

    /// Per-date burn set exceeds the optimizer cap.
    #[error("candidate set exceeds capacity limit of {limit}")]
    Capacity { limit: usize },

    /// Model produced a non-finite output. Fatal for the request.
    #[error("numeric failure: {0}")]
    Numeric(String),

    /// Explicit cooperative cancellation.
    #[error("cancelled")]
    Cancelled,

    /// Vector dimension mismatch against the registered schema.
    #[error("vector shape mismatch: expected {expected}, got {got}")]
    Shape { expected: usize, got: usize },

    /// Persistence layer failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl PipelineError {
    /// Stable machine-readable kind, used in events and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::Auth => "auth",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable(_) => "unavailable",
            Self::Backpressure => "backpressure",
            Self::Capacity { .. } => "capacity",
            Self::Numeric(_) => "numeric",
            Self::Cancelled => "cancelled",
            Self::Shape { .. } => "shape",
            Self::Storage(_) => "storage",
        }
    }

    /// Whether a stage may retry this error within its budget.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::RateLimited { .. })
    }

    /// Whether this error moves the request to `Rejected` rather than `Failed`.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Auth | Self::Numeric(_))
    }
}

impl From<sled::Error> for PipelineError {
    fn from(err: sled::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(PipelineError::Unavailable("timeout".into()).is_transient());
        assert!(PipelineError::RateLimited { retry_after_secs: 5 }.is_transient());
        assert!(!PipelineError::Auth.is_transient());
        assert!(!PipelineError::Numeric("NaN".into()).is_transient());
    }

    #[test]
    fn rejection_kinds_terminate_as_rejected() {
        assert!(PipelineError::Validation { fields: vec!["acres".into()] }.is_rejection());
        assert!(PipelineError::Numeric("inf".into()).is_rejection());
        assert!(!PipelineError::Backpressure.is_rejection());
        assert!(!PipelineError::Cancelled.is_rejection());
    }

    #[test]
    fn kind_strings_are_stable() {
        assert_eq!(PipelineError::Backpressure.kind(), "backpressure");
        assert_eq!(PipelineError::Cancelled.kind(), "cancelled");
        assert_eq!(
            PipelineError::Shape { expected: 128, got: 64 }.kind(),
            "shape"
        );
    }
}
