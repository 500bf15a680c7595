use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Months};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::catalog::PlanCatalog;
use super::domain::{CompanyPlan, PaymentStatus, SubscriptionPayment};
use super::gateway::{CheckoutRequest, CheckoutSession, GatewayError, GatewayRegistry, WebhookEvent};
use super::repository::{CompanyPlanRepository, PaymentRepository};
use crate::config::BillingConfig;
use crate::store::RepositoryError;
use crate::types::{CompanyId, PaymentId, Timestamp, UserId};

/// Most recent webhook entries kept in a payment's payload.
const WEBHOOK_HISTORY_LIMIT: usize = 20;

/// Authenticated user starting a checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutActor {
    pub user_id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStart {
    pub payment: SubscriptionPayment,
    pub redirect_url: Option<String>,
    pub immediate_success: bool,
    /// A payment already existed for this company, plan and period.
    pub already_processed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    /// The provider event does not concern payments.
    Ignored,
    /// No payment matches the event's identifiers.
    Dropped,
    Reconciled {
        payment: SubscriptionPayment,
        plan_applied: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl BillingPeriod {
    /// Calendar month containing `now`, starting on the first at midnight UTC.
    pub fn containing(now: Timestamp) -> Option<Self> {
        let start = now
            .date_naive()
            .with_day(1)?
            .and_hms_opt(0, 0, 0)?
            .and_utc();
        let end = start.checked_add_months(Months::new(1))?;
        Some(Self { start, end })
    }

    pub fn idempotency_key(&self, company_id: CompanyId, plan_code: &str) -> String {
        format!(
            "recruiter_plan_{}_{}_{}",
            company_id,
            plan_code.to_ascii_lowercase(),
            self.start.format("%Y%m")
        )
    }
}

/// Checkout initiation and webhook reconciliation for recruiter plans.
pub struct SubscriptionService {
    payments: Arc<dyn PaymentRepository>,
    plans: Arc<dyn CompanyPlanRepository>,
    gateways: GatewayRegistry,
    catalog: PlanCatalog,
    provider: String,
    return_url: String,
}

impl SubscriptionService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        plans: Arc<dyn CompanyPlanRepository>,
        gateways: GatewayRegistry,
        config: &BillingConfig,
    ) -> Self {
        Self {
            payments,
            plans,
            gateways,
            catalog: PlanCatalog::standard(),
            provider: config.provider.trim().to_ascii_lowercase(),
            return_url: config.return_url.clone(),
        }
    }

    pub fn with_catalog(mut self, catalog: PlanCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn current_plan(&self, company_id: CompanyId) -> Result<Option<CompanyPlan>, SubscriptionError> {
        Ok(self.plans.current_plan(company_id)?)
    }

    pub async fn start_checkout(
        &self,
        company_id: CompanyId,
        actor: &CheckoutActor,
        plan_code: &str,
        now: Timestamp,
    ) -> Result<CheckoutStart, SubscriptionError> {
        let plan = self.catalog.paid_plan(plan_code)?;
        let period = BillingPeriod::containing(now)
            .ok_or_else(|| SubscriptionError::Invalid(format!("no billing period for {now}")))?;
        let idempotency_key = period.idempotency_key(company_id, plan.code);

        if let Some(existing) = self.payments.find_payment_by_key(&idempotency_key)? {
            return self.resume(existing);
        }

        let gateway = self.gateways.resolve(&self.provider)?;
        let request = CheckoutRequest {
            company_id,
            customer_email: actor.email.clone(),
            plan_code: plan.code.to_string(),
            amount_cents: plan.price_cents,
            currency: plan.currency.to_string(),
            idempotency_key: idempotency_key.clone(),
            success_url: self.return_url.clone(),
            cancel_url: self.return_url.clone(),
            metadata: BTreeMap::from([
                ("company_id".to_string(), company_id.to_string()),
                ("plan_code".to_string(), plan.code.to_string()),
                ("period_start".to_string(), period.start.to_rfc3339()),
                ("period_end".to_string(), period.end.to_rfc3339()),
            ]),
        };
        let session = gateway.create_checkout_session(&request).await?;
        let redirect_url = session.checkout_url.clone();

        let payment = SubscriptionPayment {
            id: PaymentId::UNASSIGNED,
            company_id,
            initiated_by: actor.user_id,
            plan_code: plan.code.to_string(),
            amount_cents: plan.price_cents,
            currency: plan.currency.to_string(),
            provider: session.provider.clone(),
            provider_session_id: session.session_id.clone(),
            provider_payment_id: session.payment_id.clone(),
            status: session.status,
            idempotency_key: idempotency_key.clone(),
            provider_payload: session_payload(session),
            paid_at: None,
            period_start: Some(period.start),
            period_end: Some(period.end),
            created_at: now,
            updated_at: now,
        };
        let payment = SubscriptionPayment {
            paid_at: payment.is_succeeded().then_some(now),
            ..payment
        };

        let payment = match self.payments.insert_payment(payment) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict(_)) => {
                let existing = self
                    .payments
                    .find_payment_by_key(&idempotency_key)?
                    .ok_or(RepositoryError::NotFound)?;
                return self.resume(existing);
            }
            Err(other) => return Err(other.into()),
        };

        if payment.is_succeeded() {
            self.apply_plan(&payment)?;
        }

        info!(
            company_id = %company_id,
            plan = %payment.plan_code,
            provider = %payment.provider,
            status = payment.status.label(),
            "subscription checkout started"
        );

        Ok(CheckoutStart {
            immediate_success: payment.is_succeeded(),
            payment,
            redirect_url,
            already_processed: false,
        })
    }

    /// Authenticates a raw provider webhook and reconciles it.
    pub fn handle_webhook(
        &self,
        provider: &str,
        payload: &str,
        signature: Option<&str>,
        now: Timestamp,
    ) -> Result<WebhookOutcome, SubscriptionError> {
        let gateway = self.gateways.resolve(provider)?;
        match gateway.parse_webhook_event(payload, signature, now)? {
            Some(event) => self.reconcile(event, now),
            None => {
                debug!(provider, "webhook event ignored");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    pub fn reconcile(
        &self,
        event: WebhookEvent,
        now: Timestamp,
    ) -> Result<WebhookOutcome, SubscriptionError> {
        let Some(mut payment) = self.locate(&event)? else {
            warn!(
                provider = %event.provider,
                event_type = %event.event_type,
                "webhook matches no payment, dropping"
            );
            return Ok(WebhookOutcome::Dropped);
        };

        fold_webhook(&mut payment.provider_payload, &event, now);
        payment.updated_at = now;

        if payment.is_succeeded() && event.status != PaymentStatus::Succeeded {
            self.payments.update_payment(&payment)?;
            info!(
                payment_id = %payment.id,
                event_type = %event.event_type,
                "late non-success webhook on a succeeded payment, status kept"
            );
            return Ok(WebhookOutcome::Reconciled {
                payment,
                plan_applied: false,
            });
        }

        payment.status = event.status;
        if event.payment_id.is_some() {
            payment.provider_payment_id = event.payment_id.clone();
        }
        if event.session_id.is_some() {
            payment.provider_session_id = event.session_id.clone();
        }
        if payment.is_succeeded() && payment.paid_at.is_none() {
            payment.paid_at = Some(now);
        }

        self.payments.update_payment(&payment)?;
        let plan_applied = payment.is_succeeded() && self.apply_plan(&payment)?;

        info!(
            payment_id = %payment.id,
            company_id = %payment.company_id,
            status = payment.status.label(),
            plan_applied,
            "webhook reconciled"
        );

        Ok(WebhookOutcome::Reconciled {
            payment,
            plan_applied,
        })
    }

    fn resume(&self, existing: SubscriptionPayment) -> Result<CheckoutStart, SubscriptionError> {
        if existing.is_succeeded() {
            self.apply_plan(&existing)?;
        }
        Ok(CheckoutStart {
            redirect_url: existing.checkout_url(),
            immediate_success: existing.is_succeeded(),
            payment: existing,
            already_processed: true,
        })
    }

    fn locate(&self, event: &WebhookEvent) -> Result<Option<SubscriptionPayment>, RepositoryError> {
        if let Some(session_id) = event.session_id.as_deref().filter(|id| !id.is_empty()) {
            if let Some(payment) = self.payments.find_by_session(&event.provider, session_id)? {
                return Ok(Some(payment));
            }
        }
        match event.payment_id.as_deref().filter(|id| !id.is_empty()) {
            Some(payment_id) => self
                .payments
                .find_by_provider_payment(&event.provider, payment_id),
            None => Ok(None),
        }
    }

    /// Projects the payment's period onto the company. Returns false when the
    /// payment carries no period.
    fn apply_plan(&self, payment: &SubscriptionPayment) -> Result<bool, RepositoryError> {
        let (Some(started_at), Some(expires_at)) = (payment.period_start, payment.period_end) else {
            return Ok(false);
        };
        self.plans.apply_plan(CompanyPlan {
            company_id: payment.company_id,
            plan_code: payment.plan_code.clone(),
            started_at,
            expires_at,
        })?;
        Ok(true)
    }
}

fn session_payload(session: CheckoutSession) -> Map<String, Value> {
    let mut payload = session.payload;
    payload.insert(
        "checkoutUrl".to_string(),
        session.checkout_url.map_or(Value::Null, Value::String),
    );
    payload
}

fn fold_webhook(payload: &mut Map<String, Value>, event: &WebhookEvent, now: Timestamp) {
    payload.insert("lastWebhookType".to_string(), json!(event.event_type));
    payload.insert(
        "lastWebhookMetadata".to_string(),
        Value::Object(event.metadata.clone()),
    );

    let entry = json!({
        "type": event.event_type,
        "status": event.status.label(),
        "metadata": event.metadata,
        "receivedAt": now.to_rfc3339(),
    });
    let history = payload
        .entry("webhookHistory".to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !history.is_array() {
        *history = Value::Array(Vec::new());
    }
    if let Value::Array(entries) = history {
        entries.push(entry);
        if entries.len() > WEBHOOK_HISTORY_LIMIT {
            let overflow = entries.len() - WEBHOOK_HISTORY_LIMIT;
            entries.drain(..overflow);
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    #[error("invalid checkout: {0}")]
    Invalid(String),
    #[error("unknown plan '{0}'")]
    UnknownPlan(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
