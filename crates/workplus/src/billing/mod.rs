//! Recruiter subscription billing: plan catalog, pluggable checkout gateways
//! and webhook reconciliation.

pub mod catalog;
pub mod domain;
pub mod fake;
pub mod gateway;
pub mod repository;
pub mod router;
pub mod service;
pub mod stripe;


pub use catalog::{Plan, PlanCatalog};
pub use domain::{CompanyPlan, PaymentStatus, SubscriptionPayment};
pub use fake::{FakeCheckoutGateway, FAKE_PROVIDER};
pub use gateway::{
    CheckoutGateway, CheckoutRequest, CheckoutSession, GatewayError, GatewayRegistry, WebhookEvent,
};
pub use repository::{CompanyPlanRepository, PaymentRepository};
pub use router::billing_router;
pub use service::{
    BillingPeriod, CheckoutActor, CheckoutStart, SubscriptionError, SubscriptionService,
    WebhookOutcome,
};
pub use stripe::{signature_header, StripeCheckoutGateway, STRIPE_PROVIDER};
