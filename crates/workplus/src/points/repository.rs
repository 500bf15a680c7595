use super::claims::domain::{ClaimReviewEvent, PointsClaim};
use super::ledger::{LedgerEntry, LedgerOwner};
use crate::store::RepositoryError;
use crate::types::{ClaimId, CompanyId};

/// Ledger storage. `insert_entry` must reject a reused idempotency key with
/// `RepositoryError::Conflict` atomically with the write.
pub trait LedgerRepository: Send + Sync {
    fn find_entry_by_key(&self, idempotency_key: &str) -> Result<Option<LedgerEntry>, RepositoryError>;
    fn insert_entry(&self, entry: LedgerEntry) -> Result<LedgerEntry, RepositoryError>;
    fn balance_for(&self, owner: LedgerOwner) -> Result<i64, RepositoryError>;
    fn entries_for(&self, owner: LedgerOwner, limit: usize) -> Result<Vec<LedgerEntry>, RepositoryError>;
}

/// Claim storage with a unique idempotency key per claim.
pub trait ClaimRepository: Send + Sync {
    fn find_claim_by_key(&self, idempotency_key: &str) -> Result<Option<PointsClaim>, RepositoryError>;
    fn insert_claim(&self, claim: PointsClaim) -> Result<PointsClaim, RepositoryError>;
    fn update_claim(&self, claim: &PointsClaim) -> Result<(), RepositoryError>;
    fn fetch_claim(&self, id: ClaimId) -> Result<Option<PointsClaim>, RepositoryError>;
    /// Whether any stored claim of the company carries a file with this content hash.
    fn company_has_evidence_hash(&self, company_id: CompanyId, content_hash: &str) -> Result<bool, RepositoryError>;
}

/// Insert-only claim audit trail.
pub trait ClaimEventRepository: Send + Sync {
    fn record_event(&self, event: ClaimReviewEvent) -> Result<(), RepositoryError>;
    fn events_for_claim(&self, claim_id: ClaimId) -> Result<Vec<ClaimReviewEvent>, RepositoryError>;
}
