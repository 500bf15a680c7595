use super::domain::{CompanyPlan, SubscriptionPayment};
use crate::store::RepositoryError;
use crate::types::CompanyId;

/// Payment storage. `insert_payment` rejects a reused idempotency key with
/// `RepositoryError::Conflict`.
pub trait PaymentRepository: Send + Sync {
    fn find_payment_by_key(&self, idempotency_key: &str) -> Result<Option<SubscriptionPayment>, RepositoryError>;
    fn insert_payment(&self, payment: SubscriptionPayment) -> Result<SubscriptionPayment, RepositoryError>;
    fn update_payment(&self, payment: &SubscriptionPayment) -> Result<(), RepositoryError>;
    fn find_by_session(&self, provider: &str, session_id: &str) -> Result<Option<SubscriptionPayment>, RepositoryError>;
    fn find_by_provider_payment(&self, provider: &str, payment_id: &str) -> Result<Option<SubscriptionPayment>, RepositoryError>;
}

/// Active plan projection per company.
pub trait CompanyPlanRepository: Send + Sync {
    fn apply_plan(&self, plan: CompanyPlan) -> Result<(), RepositoryError>;
    fn current_plan(&self, company_id: CompanyId) -> Result<Option<CompanyPlan>, RepositoryError>;
}
