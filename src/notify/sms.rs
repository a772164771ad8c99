//! HTTP SMS notifier

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::PipelineError;

use super::{Channel, DeliveryReceipt, DeliveryState, Notifier};

/// Notifier backed by an HTTP SMS gateway. `Broadcast` sends go to the
/// gateway's topic endpoint under the same credentials.
#[derive(Clone)]
pub struct SmsNotifier {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: String,
    status: String,
}

impl SmsNotifier {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| PipelineError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn decode_state(status: &str) -> DeliveryState {
        match status {
            "queued" | "accepted" => DeliveryState::Queued,
            "sent" => DeliveryState::Sent,
            "delivered" => DeliveryState::Delivered,
            _ => DeliveryState::Failed,
        }
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        payload: &str,
    ) -> Result<DeliveryReceipt, PipelineError> {
        let path = match channel {
            Channel::Sms => "send",
            Channel::Broadcast => "broadcast",
        };
        let body = serde_json::json!({
            "to": recipient,
            "body": payload,
        });

        let resp = self
            .http
            .post(format!("{}/{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| PipelineError::Unavailable(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => {}
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                return Err(PipelineError::Auth);
            }
            reqwest::StatusCode::TOO_MANY_REQUESTS => {
                return Err(PipelineError::RateLimited { retry_after_secs: 10 });
            }
            status => {
                return Err(PipelineError::Unavailable(format!("sms gateway returned {status}")));
            }
        }

        let body: SendResponse = resp
            .json()
            .await
            .map_err(|e| PipelineError::Unavailable(format!("malformed receipt: {e}")))?;

        Ok(DeliveryReceipt {
            provider_id: body.message_id,
            state: Self::decode_state(&body.status),
        })
    }
}
