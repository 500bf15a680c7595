use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::billing::domain::PaymentStatus;
use crate::billing::fake::FakeCheckoutGateway;
use crate::billing::gateway::{
    CheckoutGateway, CheckoutRequest, CheckoutSession, GatewayError, GatewayRegistry, WebhookEvent,
};
use crate::billing::service::{CheckoutActor, SubscriptionService};
use crate::billing::stripe::StripeCheckoutGateway;
use crate::billing::FAKE_PROVIDER;
use crate::config::BillingConfig;
use crate::store::MemoryStore;
use crate::types::{Timestamp, UserId};

pub(super) const HOSTED_PROVIDER: &str = "hosted";
pub(super) const WEBHOOK_SECRET: &str = "whsec_billing_tests";

pub(super) fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 2, 10, 9, 30, 0).unwrap()
}

pub(super) fn actor() -> CheckoutActor {
    CheckoutActor {
        user_id: UserId(42),
        email: "recruiter@acme.example".to_string(),
    }
}

pub(super) fn billing_config(provider: &str) -> BillingConfig {
    BillingConfig {
        provider: provider.to_string(),
        stripe_secret_key: None,
        stripe_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        webhook_tolerance: Duration::from_secs(300),
        return_url: "https://app.workplus.example/recruiter/billing".to_string(),
    }
}

/// Hosted checkout that leaves the payment pending until a webhook arrives.
/// Webhooks use the same unsigned JSON shape as the fake gateway.
pub(super) struct HostedCheckoutGateway;

#[async_trait]
impl CheckoutGateway for HostedCheckoutGateway {
    fn provider(&self) -> &'static str {
        HOSTED_PROVIDER
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let session_id = format!("cs_{}", request.idempotency_key);
        let mut payload = Map::new();
        payload.insert("id".to_string(), json!(session_id));
        Ok(CheckoutSession {
            provider: HOSTED_PROVIDER.to_string(),
            status: PaymentStatus::Pending,
            checkout_url: Some(format!("https://pay.example/{session_id}")),
            session_id: Some(session_id),
            payment_id: None,
            payload,
        })
    }

    fn parse_webhook_event(
        &self,
        payload: &str,
        signature: Option<&str>,
        received_at: Timestamp,
    ) -> Result<Option<WebhookEvent>, GatewayError> {
        let event = FakeCheckoutGateway.parse_webhook_event(payload, signature, received_at)?;
        Ok(event.map(|event| WebhookEvent {
            provider: HOSTED_PROVIDER.to_string(),
            ..event
        }))
    }
}

/// Fails every checkout as if the provider were down.
pub(super) struct UnreachableGateway;

#[async_trait]
impl CheckoutGateway for UnreachableGateway {
    fn provider(&self) -> &'static str {
        "unreachable"
    }

    async fn create_checkout_session(
        &self,
        _request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        Err(GatewayError::Provider { status: 500 })
    }

    fn parse_webhook_event(
        &self,
        _payload: &str,
        _signature: Option<&str>,
        _received_at: Timestamp,
    ) -> Result<Option<WebhookEvent>, GatewayError> {
        Ok(None)
    }
}

pub(super) struct BillingHarness {
    pub(super) store: Arc<MemoryStore>,
    pub(super) service: Arc<SubscriptionService>,
}

/// Fake, hosted and stripe gateways registered; `provider` picks the checkout one.
pub(super) fn billing_harness(provider: &str) -> BillingHarness {
    let config = billing_config(provider);
    let store = Arc::new(MemoryStore::new());
    let stripe = StripeCheckoutGateway::new(&config).expect("stripe client builds");
    let registry = GatewayRegistry::new()
        .register(Arc::new(FakeCheckoutGateway))
        .register(Arc::new(HostedCheckoutGateway))
        .register(Arc::new(UnreachableGateway))
        .register(Arc::new(stripe));
    let service = Arc::new(SubscriptionService::new(
        store.clone(),
        store.clone(),
        registry,
        &config,
    ));
    BillingHarness { store, service }
}

pub(super) fn fake_harness() -> BillingHarness {
    billing_harness(FAKE_PROVIDER)
}

pub(super) fn hosted_webhook(status: &str, session_id: &str) -> String {
    json!({
        "event": format!("checkout.{}", status.to_ascii_lowercase()),
        "status": status,
        "session_id": session_id,
        "payment_id": "pi_hosted_1",
        "metadata": {"source": "tests"}
    })
    .to_string()
}

pub(super) fn stripe_event(event_type: &str, session_id: &str) -> String {
    json!({
        "type": event_type,
        "data": {"object": {
            "id": session_id,
            "payment_intent": "pi_stripe_1",
            "metadata": {"company_id": "7", "plan_code": "GROWTH"}
        }}
    })
    .to_string()
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
