use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::RepositoryError;
use crate::billing::domain::{CompanyPlan, SubscriptionPayment};
use crate::billing::repository::{CompanyPlanRepository, PaymentRepository};
use crate::impact::domain::{ImpactScore, ModerationReview, Offer};
use crate::impact::repository::{ImpactScoreRepository, ModerationReviewRepository, OfferRepository};
use crate::points::claims::domain::{ClaimReviewEvent, PointsClaim};
use crate::points::ledger::{LedgerEntry, LedgerOwner};
use crate::points::repository::{ClaimEventRepository, ClaimRepository, LedgerRepository};
use crate::types::{ClaimId, CompanyId, LedgerEntryId, OfferId, PaymentId};

#[derive(Default)]
struct State {
    next_id: i64,
    offers: BTreeMap<OfferId, Offer>,
    reviews: Vec<ModerationReview>,
    scores: Vec<ImpactScore>,
    ledger: Vec<LedgerEntry>,
    ledger_keys: HashMap<String, usize>,
    claims: BTreeMap<ClaimId, PointsClaim>,
    claim_keys: HashMap<String, ClaimId>,
    claim_events: Vec<ClaimReviewEvent>,
    payments: BTreeMap<PaymentId, SubscriptionPayment>,
    payment_keys: HashMap<String, PaymentId>,
    plans: HashMap<CompanyId, CompanyPlan>,
}

impl State {
    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local backend for every repository seam. Uniqueness checks and
/// writes happen under one lock, so a reused idempotency key always
/// surfaces as `RepositoryError::Conflict`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store mutex poisoned".to_string()))
    }

    /// Every ledger entry in insertion order.
    pub fn ledger_entries(&self) -> Result<Vec<LedgerEntry>, RepositoryError> {
        Ok(self.lock()?.ledger.clone())
    }

    pub fn payment_count(&self) -> Result<usize, RepositoryError> {
        Ok(self.lock()?.payments.len())
    }
}

impl OfferRepository for MemoryStore {
    fn insert_offer(&self, mut offer: Offer) -> Result<Offer, RepositoryError> {
        let mut state = self.lock()?;
        offer.id = OfferId(state.assign_id());
        state.offers.insert(offer.id, offer.clone());
        Ok(offer)
    }

    fn fetch_offer(&self, id: OfferId) -> Result<Option<Offer>, RepositoryError> {
        Ok(self.lock()?.offers.get(&id).cloned())
    }

    fn update_offer(&self, offer: &Offer) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.offers.get_mut(&offer.id) {
            Some(stored) => {
                *stored = offer.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

impl ModerationReviewRepository for MemoryStore {
    fn record_review(&self, review: ModerationReview) -> Result<(), RepositoryError> {
        self.lock()?.reviews.push(review);
        Ok(())
    }

    fn reviews_for_offer(&self, offer_id: OfferId) -> Result<Vec<ModerationReview>, RepositoryError> {
        Ok(self
            .lock()?
            .reviews
            .iter()
            .filter(|review| review.offer_id == offer_id)
            .cloned()
            .collect())
    }
}

impl ImpactScoreRepository for MemoryStore {
    fn save_snapshot(&self, score: ImpactScore) -> Result<ImpactScore, RepositoryError> {
        self.lock()?.scores.push(score.clone());
        Ok(score)
    }

    fn latest_for_offer(&self, offer_id: OfferId) -> Result<Option<ImpactScore>, RepositoryError> {
        Ok(self
            .lock()?
            .scores
            .iter()
            .rev()
            .find(|score| score.offer_id == offer_id)
            .cloned())
    }
}

impl LedgerRepository for MemoryStore {
    fn find_entry_by_key(&self, idempotency_key: &str) -> Result<Option<LedgerEntry>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .ledger_keys
            .get(idempotency_key)
            .and_then(|index| state.ledger.get(*index))
            .cloned())
    }

    fn insert_entry(&self, mut entry: LedgerEntry) -> Result<LedgerEntry, RepositoryError> {
        let mut state = self.lock()?;
        if state.ledger_keys.contains_key(&entry.idempotency_key) {
            return Err(RepositoryError::Conflict(format!(
                "ledger idempotency key {}",
                entry.idempotency_key
            )));
        }
        entry.id = LedgerEntryId(state.assign_id());
        let index = state.ledger.len();
        state.ledger_keys.insert(entry.idempotency_key.clone(), index);
        state.ledger.push(entry.clone());
        Ok(entry)
    }

    fn balance_for(&self, owner: LedgerOwner) -> Result<i64, RepositoryError> {
        Ok(self
            .lock()?
            .ledger
            .iter()
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.points)
            .sum())
    }

    /// Newest first.
    fn entries_for(&self, owner: LedgerOwner, limit: usize) -> Result<Vec<LedgerEntry>, RepositoryError> {
        Ok(self
            .lock()?
            .ledger
            .iter()
            .rev()
            .filter(|entry| entry.owner == owner)
            .take(limit)
            .cloned()
            .collect())
    }
}

impl ClaimRepository for MemoryStore {
    fn find_claim_by_key(&self, idempotency_key: &str) -> Result<Option<PointsClaim>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .claim_keys
            .get(idempotency_key)
            .and_then(|id| state.claims.get(id))
            .cloned())
    }

    fn insert_claim(&self, mut claim: PointsClaim) -> Result<PointsClaim, RepositoryError> {
        let mut state = self.lock()?;
        if state.claim_keys.contains_key(&claim.idempotency_key) {
            return Err(RepositoryError::Conflict(format!(
                "claim idempotency key {}",
                claim.idempotency_key
            )));
        }
        claim.id = ClaimId(state.assign_id());
        state.claim_keys.insert(claim.idempotency_key.clone(), claim.id);
        state.claims.insert(claim.id, claim.clone());
        Ok(claim)
    }

    fn update_claim(&self, claim: &PointsClaim) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.claims.get_mut(&claim.id) {
            Some(stored) => {
                *stored = claim.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_claim(&self, id: ClaimId) -> Result<Option<PointsClaim>, RepositoryError> {
        Ok(self.lock()?.claims.get(&id).cloned())
    }

    fn company_has_evidence_hash(&self, company_id: CompanyId, content_hash: &str) -> Result<bool, RepositoryError> {
        Ok(self.lock()?.claims.values().any(|claim| {
            claim.company_id == company_id
                && claim
                    .evidence_files
                    .iter()
                    .any(|file| file.content_hash == content_hash)
        }))
    }
}

impl ClaimEventRepository for MemoryStore {
    fn record_event(&self, event: ClaimReviewEvent) -> Result<(), RepositoryError> {
        self.lock()?.claim_events.push(event);
        Ok(())
    }

    fn events_for_claim(&self, claim_id: ClaimId) -> Result<Vec<ClaimReviewEvent>, RepositoryError> {
        Ok(self
            .lock()?
            .claim_events
            .iter()
            .filter(|event| event.claim_id == claim_id)
            .cloned()
            .collect())
    }
}

impl PaymentRepository for MemoryStore {
    fn find_payment_by_key(&self, idempotency_key: &str) -> Result<Option<SubscriptionPayment>, RepositoryError> {
        let state = self.lock()?;
        Ok(state
            .payment_keys
            .get(idempotency_key)
            .and_then(|id| state.payments.get(id))
            .cloned())
    }

    fn insert_payment(&self, mut payment: SubscriptionPayment) -> Result<SubscriptionPayment, RepositoryError> {
        let mut state = self.lock()?;
        if state.payment_keys.contains_key(&payment.idempotency_key) {
            return Err(RepositoryError::Conflict(format!(
                "payment idempotency key {}",
                payment.idempotency_key
            )));
        }
        payment.id = PaymentId(state.assign_id());
        state
            .payment_keys
            .insert(payment.idempotency_key.clone(), payment.id);
        state.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    fn update_payment(&self, payment: &SubscriptionPayment) -> Result<(), RepositoryError> {
        let mut state = self.lock()?;
        match state.payments.get_mut(&payment.id) {
            Some(stored) => {
                *stored = payment.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn find_by_session(&self, provider: &str, session_id: &str) -> Result<Option<SubscriptionPayment>, RepositoryError> {
        Ok(self
            .lock()?
            .payments
            .values()
            .find(|payment| {
                payment.provider.eq_ignore_ascii_case(provider)
                    && payment.provider_session_id.as_deref() == Some(session_id)
            })
            .cloned())
    }

    fn find_by_provider_payment(&self, provider: &str, payment_id: &str) -> Result<Option<SubscriptionPayment>, RepositoryError> {
        Ok(self
            .lock()?
            .payments
            .values()
            .find(|payment| {
                payment.provider.eq_ignore_ascii_case(provider)
                    && payment.provider_payment_id.as_deref() == Some(payment_id)
            })
            .cloned())
    }
}

impl CompanyPlanRepository for MemoryStore {
    fn apply_plan(&self, plan: CompanyPlan) -> Result<(), RepositoryError> {
        self.lock()?.plans.insert(plan.company_id, plan);
        Ok(())
    }

    fn current_plan(&self, company_id: CompanyId) -> Result<Option<CompanyPlan>, RepositoryError> {
        Ok(self.lock()?.plans.get(&company_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::ledger::LedgerEntry;
    use chrono::Utc;

    #[test]
    fn reused_ledger_key_conflicts() {
        let store = MemoryStore::new();
        let owner = LedgerOwner::Company(CompanyId(1));
        let now = Utc::now();

        let first = store
            .insert_entry(LedgerEntry::credit(owner, 10, "k-1", now))
            .unwrap();
        assert_ne!(first.id, LedgerEntryId::UNASSIGNED);

        let err = store
            .insert_entry(LedgerEntry::credit(owner, 10, "k-1", now))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(store.balance_for(owner).unwrap(), 10);
    }

    #[test]
    fn history_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        let owner = LedgerOwner::Company(CompanyId(1));
        let other = LedgerOwner::Company(CompanyId(2));
        let now = Utc::now();

        for (index, points) in [5, 7, 9].into_iter().enumerate() {
            store
                .insert_entry(LedgerEntry::credit(owner, points, format!("k-{index}"), now))
                .unwrap();
        }
        store
            .insert_entry(LedgerEntry::credit(other, 100, "other", now))
            .unwrap();

        let history = store.entries_for(owner, 2).unwrap();
        let points: Vec<i64> = history.iter().map(|entry| entry.points).collect();
        assert_eq!(points, vec![9, 7]);
        assert_eq!(store.balance_for(owner).unwrap(), 21);
    }
}
