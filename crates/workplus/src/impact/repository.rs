use super::domain::{ImpactScore, ModerationReview, Offer};
use crate::store::RepositoryError;
use crate::types::OfferId;

/// Offer storage. Ids are assigned on insert.
pub trait OfferRepository: Send + Sync {
    fn insert_offer(&self, offer: Offer) -> Result<Offer, RepositoryError>;
    fn fetch_offer(&self, id: OfferId) -> Result<Option<Offer>, RepositoryError>;
    fn update_offer(&self, offer: &Offer) -> Result<(), RepositoryError>;
}

/// Insert-only moderation audit log, read back in insertion order.
pub trait ModerationReviewRepository: Send + Sync {
    fn record_review(&self, review: ModerationReview) -> Result<(), RepositoryError>;
    fn reviews_for_offer(&self, offer_id: OfferId) -> Result<Vec<ModerationReview>, RepositoryError>;
}

pub trait ImpactScoreRepository: Send + Sync {
    fn save_snapshot(&self, score: ImpactScore) -> Result<ImpactScore, RepositoryError>;
    fn latest_for_offer(&self, offer_id: OfferId) -> Result<Option<ImpactScore>, RepositoryError>;
}
