use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};
use sha2::Sha256;
use tracing::{debug, warn};

use super::domain::PaymentStatus;
use super::gateway::{
    scalar_metadata, CheckoutGateway, CheckoutRequest, CheckoutSession, GatewayError, WebhookEvent,
};
use crate::config::BillingConfig;
use crate::types::Timestamp;

pub const STRIPE_PROVIDER: &str = "stripe";
pub const STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const SIGNATURE_HEADER: &str = "stripe-signature";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type HmacSha256 = Hmac<Sha256>;

/// Hosted subscription checkout and signed webhooks.
pub struct StripeCheckoutGateway {
    client: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
    webhook_secret: Option<String>,
    tolerance: Duration,
}

impl StripeCheckoutGateway {
    pub fn new(config: &BillingConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("workplus-billing/1.0")
            .build()?;

        Ok(Self {
            client,
            api_base: STRIPE_API_BASE.to_string(),
            secret_key: config.stripe_secret_key.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            tolerance: config.webhook_tolerance,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
        let mut fields = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            ("client_reference_id".to_string(), request.company_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                request.currency.to_ascii_lowercase(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                request.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][recurring][interval]".to_string(),
                "month".to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                format!("Work+ {}", request.plan_code),
            ),
            ("customer_email".to_string(), request.customer_email.clone()),
        ];
        fields.extend(
            request
                .metadata
                .iter()
                .map(|(key, value)| (format!("metadata[{key}]"), value.clone())),
        );
        fields
    }

    fn verify_signature(
        &self,
        payload: &str,
        header: Option<&str>,
        received_at: Timestamp,
    ) -> Result<(), GatewayError> {
        let secret = self
            .webhook_secret
            .as_deref()
            .ok_or(GatewayError::NotConfigured("STRIPE_WEBHOOK_SECRET"))?;

        let header = header
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(GatewayError::MissingSignature)?;

        let (timestamp, signatures) = parse_signature_header(header)?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| GatewayError::NotConfigured("STRIPE_WEBHOOK_SECRET"))?;
        mac.update(format!("{timestamp}.{payload}").as_bytes());

        // Stripe sends one v1 value per active secret while a secret is rolled.
        let matched = signatures.iter().any(|signature| {
            hex::decode(signature)
                .map(|expected| mac.clone().verify_slice(&expected).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(GatewayError::InvalidSignature);
        }

        let skew_secs = (received_at.timestamp() - timestamp).abs();
        let tolerance = i64::try_from(self.tolerance.as_secs()).unwrap_or(i64::MAX);
        if skew_secs > tolerance {
            return Err(GatewayError::StaleSignature { skew_secs });
        }
        Ok(())
    }
}

#[async_trait]
impl CheckoutGateway for StripeCheckoutGateway {
    fn provider(&self) -> &'static str {
        STRIPE_PROVIDER
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or(GatewayError::NotConfigured("STRIPE_SECRET_KEY"))?;

        let url = format!("{}/v1/checkout/sessions", self.api_base);
        debug!(company_id = %request.company_id, plan = %request.plan_code, "creating stripe checkout session");

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {secret_key}"))
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&Self::checkout_form(request))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|err| GatewayError::Transport(format!("response is not valid JSON: {err}")))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "stripe rejected checkout session");
            return Err(GatewayError::Provider {
                status: status.as_u16(),
            });
        }

        let payload = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let text = |field: &str| payload.get(field).and_then(Value::as_str).map(str::to_string);

        Ok(CheckoutSession {
            provider: STRIPE_PROVIDER.to_string(),
            status: PaymentStatus::Pending,
            session_id: text("id"),
            payment_id: None,
            checkout_url: text("url"),
            payload,
        })
    }

    fn parse_webhook_event(
        &self,
        payload: &str,
        signature: Option<&str>,
        received_at: Timestamp,
    ) -> Result<Option<WebhookEvent>, GatewayError> {
        self.verify_signature(payload, signature, received_at)?;

        let event: Value = serde_json::from_str(payload)
            .map_err(|err| GatewayError::MalformedPayload(err.to_string()))?;
        if !event.is_object() {
            return Err(GatewayError::MalformedPayload(
                "event is not a JSON object".to_string(),
            ));
        }

        let event_type = event
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let Some(object) = event.pointer("/data/object").filter(|value| value.is_object()) else {
            return Ok(None);
        };

        let Some(status) = map_event_type(&event_type) else {
            debug!(%event_type, "ignoring stripe event");
            return Ok(None);
        };

        Ok(Some(WebhookEvent {
            provider: STRIPE_PROVIDER.to_string(),
            event_type,
            status,
            session_id: object.get("id").and_then(Value::as_str).map(str::to_string),
            payment_id: provider_payment_id(object),
            metadata: scalar_metadata(object.get("metadata")),
        }))
    }
}

fn map_event_type(event_type: &str) -> Option<PaymentStatus> {
    match event_type {
        "checkout.session.completed" => Some(PaymentStatus::Succeeded),
        "checkout.session.expired" => Some(PaymentStatus::Canceled),
        "checkout.session.async_payment_failed" | "payment_intent.payment_failed" => {
            Some(PaymentStatus::Failed)
        }
        _ => None,
    }
}

fn provider_payment_id(object: &Value) -> Option<String> {
    ["payment_intent", "subscription", "id"]
        .iter()
        .find_map(|field| object.get(*field).and_then(Value::as_str))
        .map(str::to_string)
}

/// Splits `t=<unix>,v1=<hex>[,v1=<hex>...]`; other schemes are ignored.
fn parse_signature_header(header: &str) -> Result<(i64, Vec<&str>), GatewayError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',').map(str::trim) {
        if let Some(value) = part.strip_prefix("t=") {
            timestamp = value.parse::<i64>().ok();
        } else if let Some(value) = part.strip_prefix("v1=").filter(|value| !value.is_empty()) {
            signatures.push(value);
        }
    }

    match timestamp {
        Some(timestamp) if timestamp > 0 && !signatures.is_empty() => Ok((timestamp, signatures)),
        _ => Err(GatewayError::MalformedSignature),
    }
}

/// Builds a `Stripe-Signature` header value for `payload` signed at `timestamp`.
pub fn signature_header(secret: &str, timestamp: i64, payload: &str) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| GatewayError::NotConfigured("STRIPE_WEBHOOK_SECRET"))?;
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    Ok(format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    ))
}
