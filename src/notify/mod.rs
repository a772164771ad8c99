//! Notifier facade
//!
//! Delivers SMS and broadcast alerts through a narrow interface with
//! delivery receipts. Send failures are retried with capped backoff by
//! the alert stage; a permanently failed send surfaces as an error event
//! but never fails the pipeline.

mod mock;
mod sms;

pub use mock::MockNotifier;
pub use sms::SmsNotifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Delivery channel for an alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Broadcast,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sms => write!(f, "sms"),
            Self::Broadcast => write!(f, "broadcast"),
        }
    }
}

/// Provider-side delivery state machine:
/// `Queued → Sent → Delivered | Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryState {
    Queued,
    Sent,
    Delivered,
    Failed,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

/// Receipt returned by a provider for one send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Provider-assigned message id.
    pub provider_id: String,
    pub state: DeliveryState,
}

/// Deliver alerts with delivery receipts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `payload` to `recipient` over `channel`.
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        payload: &str,
    ) -> Result<DeliveryReceipt, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_terminal_states() {
        assert!(!DeliveryState::Queued.is_terminal());
        assert!(!DeliveryState::Sent.is_terminal());
        assert!(DeliveryState::Delivered.is_terminal());
        assert!(DeliveryState::Failed.is_terminal());
    }
}
