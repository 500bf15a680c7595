use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::domain::PaymentStatus;
use super::gateway::{
    scalar_metadata, CheckoutGateway, CheckoutRequest, CheckoutSession, GatewayError, WebhookEvent,
};
use crate::types::Timestamp;

pub const FAKE_PROVIDER: &str = "fake";

/// Local gateway that succeeds immediately with ids derived from the idempotency key.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeCheckoutGateway;

impl FakeCheckoutGateway {
    fn token(idempotency_key: &str) -> String {
        let digest = Sha256::digest(idempotency_key.as_bytes());
        let mut token = hex::encode(digest);
        token.truncate(24);
        token
    }
}

#[async_trait]
impl CheckoutGateway for FakeCheckoutGateway {
    fn provider(&self) -> &'static str {
        FAKE_PROVIDER
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let token = Self::token(&request.idempotency_key);
        let mut payload = Map::new();
        payload.insert("event".to_string(), json!("payment.completed"));
        payload.insert("checkoutUrl".to_string(), Value::Null);

        Ok(CheckoutSession {
            provider: FAKE_PROVIDER.to_string(),
            status: PaymentStatus::Succeeded,
            session_id: Some(format!("fake_cs_{token}")),
            payment_id: Some(format!("fake_pi_{token}")),
            checkout_url: None,
            payload,
        })
    }

    /// Unsigned JSON: `{status, event, session_id, payment_id, metadata}`.
    fn parse_webhook_event(
        &self,
        payload: &str,
        _signature: Option<&str>,
        _received_at: Timestamp,
    ) -> Result<Option<WebhookEvent>, GatewayError> {
        let Ok(Value::Object(decoded)) = serde_json::from_str::<Value>(payload) else {
            return Ok(None);
        };

        let Some(status) = decoded
            .get("status")
            .and_then(Value::as_str)
            .and_then(PaymentStatus::parse_final)
        else {
            return Ok(None);
        };

        let text = |field: &str| -> Option<String> {
            match decoded.get(field) {
                Some(Value::String(value)) => Some(value.clone()),
                Some(Value::Number(value)) => Some(value.to_string()),
                _ => None,
            }
        };

        Ok(Some(WebhookEvent {
            provider: FAKE_PROVIDER.to_string(),
            event_type: text("event").unwrap_or_else(|| "manual.event".to_string()),
            status,
            session_id: text("session_id"),
            payment_id: text("payment_id"),
            metadata: scalar_metadata(decoded.get("metadata")),
        }))
    }
}
