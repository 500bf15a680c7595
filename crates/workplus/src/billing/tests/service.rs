use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value};

use super::common::*;
use crate::billing::domain::{PaymentStatus, SubscriptionPayment};
use crate::billing::gateway::{GatewayError, GatewayRegistry};
use crate::billing::repository::PaymentRepository;
use crate::billing::service::{BillingPeriod, SubscriptionError, SubscriptionService, WebhookOutcome};
use crate::billing::stripe::{signature_header, STRIPE_PROVIDER};
use crate::store::{MemoryStore, RepositoryError};
use crate::types::{CompanyId, PaymentId, UserId};

/// Payment storage whose first key lookups miss, as when another checkout for
/// the same period commits between our lookup and our insert.
struct RacingPayments {
    store: Arc<MemoryStore>,
    blind_lookups: AtomicUsize,
}

impl PaymentRepository for RacingPayments {
    fn find_payment_by_key(&self, idempotency_key: &str) -> Result<Option<SubscriptionPayment>, RepositoryError> {
        let blind = self
            .blind_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if blind {
            return Ok(None);
        }
        self.store.find_payment_by_key(idempotency_key)
    }

    fn insert_payment(&self, payment: SubscriptionPayment) -> Result<SubscriptionPayment, RepositoryError> {
        self.store.insert_payment(payment)
    }

    fn update_payment(&self, payment: &SubscriptionPayment) -> Result<(), RepositoryError> {
        self.store.update_payment(payment)
    }

    fn find_by_session(&self, provider: &str, session_id: &str) -> Result<Option<SubscriptionPayment>, RepositoryError> {
        self.store.find_by_session(provider, session_id)
    }

    fn find_by_provider_payment(&self, provider: &str, payment_id: &str) -> Result<Option<SubscriptionPayment>, RepositoryError> {
        self.store.find_by_provider_payment(provider, payment_id)
    }
}

fn reconciled(outcome: WebhookOutcome) -> (SubscriptionPayment, bool) {
    match outcome {
        WebhookOutcome::Reconciled {
            payment,
            plan_applied,
        } => (payment, plan_applied),
        other => panic!("expected a reconciled payment, got {other:?}"),
    }
}

#[test]
fn billing_period_is_the_calendar_month() {
    let period = BillingPeriod::containing(now()).unwrap();

    assert_eq!(period.start, Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
    assert_eq!(period.end, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
    assert_eq!(
        period.idempotency_key(CompanyId(7), "GROWTH"),
        "recruiter_plan_7_growth_202602"
    );

    let december = BillingPeriod::containing(Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 0).unwrap())
        .unwrap();
    assert_eq!(december.end, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
}

#[tokio::test]
async fn fake_checkout_succeeds_and_applies_the_plan() {
    let harness = fake_harness();

    let start = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "growth", now())
        .await
        .unwrap();

    assert!(start.immediate_success);
    assert!(!start.already_processed);
    assert_eq!(start.redirect_url, None);
    assert_eq!(start.payment.status, PaymentStatus::Succeeded);
    assert_eq!(start.payment.plan_code, "GROWTH");
    assert_eq!(start.payment.amount_cents, 3900);
    assert_eq!(start.payment.initiated_by, UserId(42));
    assert_eq!(start.payment.idempotency_key, "recruiter_plan_7_growth_202602");
    assert_eq!(start.payment.paid_at, Some(now()));
    assert!(start
        .payment
        .provider_session_id
        .as_deref()
        .is_some_and(|id| id.starts_with("fake_cs_")));

    let plan = harness.service.current_plan(CompanyId(7)).unwrap().expect("plan");
    assert_eq!(plan.plan_code, "GROWTH");
    assert_eq!(plan.started_at, Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap());
    assert_eq!(plan.expires_at, Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap());
}

#[tokio::test]
async fn repeated_checkout_in_the_same_month_is_already_processed() {
    let harness = fake_harness();
    let first = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap();

    let later_that_month = Utc.with_ymd_and_hms(2026, 2, 27, 18, 0, 0).unwrap();
    let second = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", later_that_month)
        .await
        .unwrap();

    assert!(second.already_processed);
    assert!(second.immediate_success);
    assert_eq!(second.payment.id, first.payment.id);
    assert_eq!(harness.store.payment_count().unwrap(), 1);
    assert_eq!(
        harness
            .service
            .current_plan(CompanyId(7))
            .unwrap()
            .map(|plan| plan.plan_code),
        Some("GROWTH".to_string())
    );
}

#[tokio::test]
async fn next_month_opens_a_new_payment() {
    let harness = fake_harness();
    harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap();

    let march = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
    let start = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", march)
        .await
        .unwrap();

    assert!(!start.already_processed);
    assert_eq!(start.payment.idempotency_key, "recruiter_plan_7_growth_202603");
    assert_eq!(harness.store.payment_count().unwrap(), 2);
}

#[tokio::test]
async fn unknown_and_free_plans_are_refused() {
    let harness = fake_harness();

    let unknown = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "PLATINUM", now())
        .await
        .unwrap_err();
    let free = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "starter", now())
        .await
        .unwrap_err();

    assert!(matches!(unknown, SubscriptionError::UnknownPlan(code) if code == "PLATINUM"));
    assert!(matches!(free, SubscriptionError::Invalid(_)));
    assert_eq!(harness.store.payment_count().unwrap(), 0);
}

#[tokio::test]
async fn provider_failure_persists_nothing() {
    let harness = billing_harness("unreachable");

    let err = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "SCALE", now())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubscriptionError::Gateway(GatewayError::Provider { status: 500 })
    ));
    assert_eq!(harness.store.payment_count().unwrap(), 0);
}

#[tokio::test]
async fn unregistered_checkout_provider_is_reported() {
    let harness = billing_harness("paypal");

    let err = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SubscriptionError::Gateway(GatewayError::UnknownProvider(provider)) if provider == "paypal"
    ));
}

#[tokio::test]
async fn hosted_checkout_waits_for_the_webhook() {
    let harness = billing_harness(HOSTED_PROVIDER);

    let start = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap();

    assert!(!start.immediate_success);
    assert_eq!(start.payment.status, PaymentStatus::Pending);
    assert_eq!(start.payment.paid_at, None);
    assert_eq!(
        start.redirect_url.as_deref(),
        Some("https://pay.example/cs_recruiter_plan_7_growth_202602")
    );
    assert_eq!(harness.service.current_plan(CompanyId(7)).unwrap(), None);

    let again = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap();
    assert!(again.already_processed);
    assert_eq!(again.redirect_url, start.redirect_url);
    assert_eq!(harness.service.current_plan(CompanyId(7)).unwrap(), None);
}

#[tokio::test]
async fn late_failure_does_not_downgrade_a_succeeded_payment() {
    let harness = billing_harness(HOSTED_PROVIDER);
    let start = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap();
    let session_id = start.payment.provider_session_id.clone().unwrap();

    let (paid, plan_applied) = reconciled(
        harness
            .service
            .handle_webhook(HOSTED_PROVIDER, &hosted_webhook("SUCCEEDED", &session_id), None, now())
            .unwrap(),
    );
    assert!(plan_applied);
    assert_eq!(paid.status, PaymentStatus::Succeeded);
    assert_eq!(paid.provider_payment_id.as_deref(), Some("pi_hosted_1"));
    assert_eq!(paid.paid_at, Some(now()));

    let (after_failure, plan_applied) = reconciled(
        harness
            .service
            .handle_webhook(HOSTED_PROVIDER, &hosted_webhook("FAILED", &session_id), None, now())
            .unwrap(),
    );
    assert!(!plan_applied);
    assert_eq!(after_failure.status, PaymentStatus::Succeeded);
    assert_eq!(after_failure.paid_at, Some(now()));

    let stored = harness
        .store
        .find_payment_by_key(&start.payment.idempotency_key)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Succeeded);
    assert_eq!(stored.provider_payload["lastWebhookType"], json!("checkout.failed"));
    assert_eq!(
        stored.provider_payload["webhookHistory"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );
    assert_eq!(
        stored.provider_payload["lastWebhookMetadata"],
        json!({"source": "tests"})
    );
    assert!(harness.service.current_plan(CompanyId(7)).unwrap().is_some());
}

#[tokio::test]
async fn webhook_history_keeps_the_latest_entries() {
    let harness = billing_harness(HOSTED_PROVIDER);
    let start = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap();
    let session_id = start.payment.provider_session_id.unwrap();

    for _ in 0..25 {
        harness
            .service
            .handle_webhook(HOSTED_PROVIDER, &hosted_webhook("CANCELED", &session_id), None, now())
            .unwrap();
    }

    let stored = harness
        .store
        .find_payment_by_key(&start.payment.idempotency_key)
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Canceled);
    assert_eq!(
        stored.provider_payload["webhookHistory"]
            .as_array()
            .map(Vec::len),
        Some(20)
    );
}

#[tokio::test]
async fn webhook_falls_back_to_the_provider_payment_id() {
    let harness = billing_harness(HOSTED_PROVIDER);
    let start = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap();
    let session_id = start.payment.provider_session_id.unwrap();
    harness
        .service
        .handle_webhook(HOSTED_PROVIDER, &hosted_webhook("FAILED", &session_id), None, now())
        .unwrap();

    let by_payment = json!({"status": "succeeded", "payment_id": "pi_hosted_1"}).to_string();
    let (payment, plan_applied) = reconciled(
        harness
            .service
            .handle_webhook(HOSTED_PROVIDER, &by_payment, None, now())
            .unwrap(),
    );

    assert!(plan_applied);
    assert_eq!(payment.id, start.payment.id);
    assert_eq!(payment.status, PaymentStatus::Succeeded);
}

#[tokio::test]
async fn webhooks_without_a_match_or_final_status_change_nothing() {
    let harness = billing_harness(HOSTED_PROVIDER);
    harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap();

    let unknown_session = harness
        .service
        .handle_webhook(HOSTED_PROVIDER, &hosted_webhook("SUCCEEDED", "cs_unknown"), None, now())
        .unwrap();
    let in_flight = harness
        .service
        .handle_webhook(
            HOSTED_PROVIDER,
            &json!({"status": "processing", "session_id": "cs_unknown"}).to_string(),
            None,
            now(),
        )
        .unwrap();
    let garbage = harness
        .service
        .handle_webhook(HOSTED_PROVIDER, "not json", None, now())
        .unwrap();

    // The unknown session still carries pi_hosted_1, which no payment has yet.
    assert!(matches!(unknown_session, WebhookOutcome::Dropped));
    assert!(matches!(in_flight, WebhookOutcome::Ignored));
    assert!(matches!(garbage, WebhookOutcome::Ignored));
    assert_eq!(harness.service.current_plan(CompanyId(7)).unwrap(), None);
}

fn pending_stripe_payment() -> SubscriptionPayment {
    let period = BillingPeriod::containing(now()).unwrap();
    let mut payload = Map::new();
    payload.insert("checkoutUrl".to_string(), Value::String("https://checkout.stripe.com/c/cs_live_1".into()));
    SubscriptionPayment {
        id: PaymentId::UNASSIGNED,
        company_id: CompanyId(9),
        initiated_by: UserId(42),
        plan_code: "SCALE".to_string(),
        amount_cents: 9900,
        currency: "EUR".to_string(),
        provider: STRIPE_PROVIDER.to_string(),
        provider_session_id: Some("cs_live_1".to_string()),
        provider_payment_id: None,
        status: PaymentStatus::Pending,
        idempotency_key: period.idempotency_key(CompanyId(9), "SCALE"),
        provider_payload: payload,
        paid_at: None,
        period_start: Some(period.start),
        period_end: Some(period.end),
        created_at: now(),
        updated_at: now(),
    }
}

#[test]
fn signed_stripe_webhook_reconciles_the_session() {
    let harness = fake_harness();
    harness.store.insert_payment(pending_stripe_payment()).unwrap();
    let payload = stripe_event("checkout.session.completed", "cs_live_1");
    let header = signature_header(WEBHOOK_SECRET, now().timestamp(), &payload).unwrap();

    let (payment, plan_applied) = reconciled(
        harness
            .service
            .handle_webhook("Stripe", &payload, Some(&header), now())
            .unwrap(),
    );

    assert!(plan_applied);
    assert_eq!(payment.status, PaymentStatus::Succeeded);
    assert_eq!(payment.provider_payment_id.as_deref(), Some("pi_stripe_1"));
    assert_eq!(
        payment.checkout_url().as_deref(),
        Some("https://checkout.stripe.com/c/cs_live_1")
    );
    assert_eq!(
        harness
            .service
            .current_plan(CompanyId(9))
            .unwrap()
            .map(|plan| plan.plan_code),
        Some("SCALE".to_string())
    );
}

#[test]
fn forged_stripe_webhook_is_rejected_before_reconciliation() {
    let harness = fake_harness();
    harness.store.insert_payment(pending_stripe_payment()).unwrap();
    let payload = stripe_event("checkout.session.completed", "cs_live_1");
    let header = signature_header("whsec_someone_else", now().timestamp(), &payload).unwrap();

    let err = harness
        .service
        .handle_webhook(STRIPE_PROVIDER, &payload, Some(&header), now())
        .unwrap_err();

    assert!(matches!(
        err,
        SubscriptionError::Gateway(GatewayError::InvalidSignature)
    ));
    let stored = harness
        .store
        .find_by_session(STRIPE_PROVIDER, "cs_live_1")
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
}

#[tokio::test]
async fn insert_conflict_resumes_the_committed_payment() {
    let harness = billing_harness(HOSTED_PROVIDER);
    let committed = harness
        .service
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap();

    let racing = Arc::new(RacingPayments {
        store: harness.store.clone(),
        blind_lookups: AtomicUsize::new(1),
    });
    let second_writer = SubscriptionService::new(
        racing.clone(),
        harness.store.clone(),
        GatewayRegistry::new().register(Arc::new(HostedCheckoutGateway)),
        &billing_config(HOSTED_PROVIDER),
    );

    let resumed = second_writer
        .start_checkout(CompanyId(7), &actor(), "GROWTH", now())
        .await
        .unwrap();

    assert_eq!(racing.blind_lookups.load(Ordering::SeqCst), 0);
    assert!(resumed.already_processed);
    assert!(!resumed.immediate_success);
    assert_eq!(resumed.payment.id, committed.payment.id);
    assert_eq!(resumed.payment.status, PaymentStatus::Pending);
    assert_eq!(resumed.redirect_url, committed.redirect_url);
    assert_eq!(harness.store.payment_count().unwrap(), 1);
    assert!(harness.service.current_plan(CompanyId(7)).unwrap().is_none());
}
