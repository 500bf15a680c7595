use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use super::domain::PaymentStatus;
use crate::types::{CompanyId, Timestamp};

/// Everything a provider needs to open a hosted checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub company_id: CompanyId,
    pub customer_email: String,
    pub plan_code: String,
    pub amount_cents: i64,
    pub currency: String,
    pub idempotency_key: String,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: BTreeMap<String, String>,
}

/// Provider answer to a checkout request.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSession {
    pub provider: String,
    pub status: PaymentStatus,
    pub session_id: Option<String>,
    pub payment_id: Option<String>,
    pub checkout_url: Option<String>,
    pub payload: Map<String, Value>,
}

/// Authenticated provider event mapped onto a final payment status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookEvent {
    pub provider: String,
    pub event_type: String,
    pub status: PaymentStatus,
    pub session_id: Option<String>,
    pub payment_id: Option<String>,
    pub metadata: Map<String, Value>,
}

/// One implementation per payment provider.
#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    /// Lowercase provider name used as the registry key.
    fn provider(&self) -> &'static str;

    fn supports_provider(&self, provider: &str) -> bool {
        provider.trim().eq_ignore_ascii_case(self.provider())
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// `Ok(None)` for event types that do not concern payments.
    fn parse_webhook_event(
        &self,
        payload: &str,
        signature: Option<&str>,
        received_at: Timestamp,
    ) -> Result<Option<WebhookEvent>, GatewayError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no checkout gateway registered for provider '{0}'")]
    UnknownProvider(String),
    #[error("gateway is not configured: {0}")]
    NotConfigured(&'static str),
    #[error("webhook signature header is missing")]
    MissingSignature,
    #[error("webhook signature header is malformed")]
    MalformedSignature,
    #[error("webhook signature does not match payload")]
    InvalidSignature,
    #[error("webhook timestamp is {skew_secs}s away from now, outside tolerance")]
    StaleSignature { skew_secs: i64 },
    #[error("webhook payload is not valid JSON: {0}")]
    MalformedPayload(String),
    #[error("payment provider transport failed: {0}")]
    Transport(String),
    #[error("payment provider rejected the request with HTTP {status}")]
    Provider { status: u16 },
}

impl GatewayError {
    /// Inbound webhook could not be authenticated or read.
    pub fn is_webhook_rejection(&self) -> bool {
        matches!(
            self,
            GatewayError::MissingSignature
                | GatewayError::MalformedSignature
                | GatewayError::InvalidSignature
                | GatewayError::StaleSignature { .. }
                | GatewayError::MalformedPayload(_)
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(value.to_string())
    }
}

/// Gateways keyed by provider name and resolved per call.
#[derive(Default, Clone)]
pub struct GatewayRegistry {
    gateways: BTreeMap<String, Arc<dyn CheckoutGateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, gateway: Arc<dyn CheckoutGateway>) -> Self {
        self.gateways
            .insert(gateway.provider().to_ascii_lowercase(), gateway);
        self
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.gateways.keys().map(String::as_str)
    }

    pub fn resolve(&self, provider: &str) -> Result<Arc<dyn CheckoutGateway>, GatewayError> {
        let key = provider.trim().to_ascii_lowercase();
        if let Some(gateway) = self.gateways.get(&key) {
            return Ok(Arc::clone(gateway));
        }
        self.gateways
            .values()
            .find(|gateway| gateway.supports_provider(&key))
            .cloned()
            .ok_or(GatewayError::UnknownProvider(key))
    }
}

/// Keeps scalar metadata values, turning null into an empty string.
pub(crate) fn scalar_metadata(value: Option<&Value>) -> Map<String, Value> {
    let Some(Value::Object(map)) = value else {
        return Map::new();
    };
    map.iter()
        .filter_map(|(key, value)| match value {
            Value::Null => Some((key.clone(), Value::String(String::new()))),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                Some((key.clone(), value.clone()))
            }
            Value::Array(_) | Value::Object(_) => None,
        })
        .collect()
}
