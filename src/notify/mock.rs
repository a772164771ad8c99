//! Mock notifier with synthetic receipts

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::PipelineError;

use super::{Channel, DeliveryReceipt, DeliveryState, Notifier};

/// A send the mock recorded, for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedSend {
    pub channel: Channel,
    pub recipient: String,
    pub payload: String,
}

/// In-memory notifier returning synthetic receipts. Records every send
/// so tests can assert on alert content and recipients.
#[derive(Default)]
pub struct MockNotifier {
    sends: Mutex<Vec<RecordedSend>>,
    counter: AtomicU64,
    failures_remaining: AtomicU32,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` sends with `Unavailable`, then behave normally.
    pub fn failing(n: u32) -> Self {
        Self {
            failures_remaining: AtomicU32::new(n),
            ..Self::default()
        }
    }

    /// All sends recorded so far.
    pub fn recorded(&self) -> Vec<RecordedSend> {
        self.sends.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_count(&self) -> usize {
        self.sends.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        payload: &str,
    ) -> Result<DeliveryReceipt, PipelineError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(PipelineError::Unavailable("mock gateway outage".into()));
        }

        if let Ok(mut sends) = self.sends.lock() {
            sends.push(RecordedSend {
                channel,
                recipient: recipient.to_string(),
                payload: payload.to_string(),
            });
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(DeliveryReceipt {
            provider_id: format!("mock-{n:06}"),
            state: DeliveryState::Delivered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_are_recorded_with_receipts() {
        let notifier = MockNotifier::new();
        let receipt = notifier
            .send(Channel::Sms, "+15550100", "burn scheduled 08:30")
            .await
            .expect("send");
        assert_eq!(receipt.state, DeliveryState::Delivered);
        assert_eq!(receipt.provider_id, "mock-000000");

        let recorded = notifier.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].recipient, "+15550100");
    }

    #[tokio::test]
    async fn failing_mock_recovers() {
        let notifier = MockNotifier::failing(1);
        assert!(notifier.send(Channel::Sms, "x", "y").await.is_err());
        assert!(notifier.send(Channel::Sms, "x", "y").await.is_ok());
        assert_eq!(notifier.sent_count(), 1);
    }
}
