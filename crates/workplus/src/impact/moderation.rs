use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::domain::{
    ImpactScore, ModerationAction, ModerationReview, ModerationStatus, Offer, PublicationStatus,
};
use super::eligibility::{EligibilityEngine, EligibilityResult};
use super::evidence::EvidenceError;
use super::repository::{ImpactScoreRepository, ModerationReviewRepository, OfferRepository};
use crate::points::awards::PointAwards;
use crate::points::ledger::LedgerEntry;
use crate::store::RepositoryError;
use crate::types::{Metadata, OfferId, Timestamp, UserId};

/// Result of one moderation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ModerationOutcome {
    pub offer: Offer,
    pub result: EligibilityResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_score: Option<ImpactScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_credit: Option<LedgerEntry>,
}

/// Drives the offer through SUBMITTED to an automated decision.
pub struct ModerationService {
    engine: EligibilityEngine,
    offers: Arc<dyn OfferRepository>,
    reviews: Arc<dyn ModerationReviewRepository>,
    scores: Arc<dyn ImpactScoreRepository>,
    awards: Option<Arc<PointAwards>>,
}

impl ModerationService {
    pub fn new(
        engine: EligibilityEngine,
        offers: Arc<dyn OfferRepository>,
        reviews: Arc<dyn ModerationReviewRepository>,
        scores: Arc<dyn ImpactScoreRepository>,
    ) -> Self {
        Self {
            engine,
            offers,
            reviews,
            scores,
            awards: None,
        }
    }

    /// Credit the company once an offer gets published.
    pub fn with_publication_awards(mut self, awards: Arc<PointAwards>) -> Self {
        self.awards = Some(awards);
        self
    }

    pub async fn moderate_for_publication(
        &self,
        offer_id: OfferId,
        actor: Option<UserId>,
        now: Timestamp,
    ) -> Result<ModerationOutcome, ModerationError> {
        let mut offer = self
            .offers
            .fetch_offer(offer_id)?
            .ok_or(ModerationError::OfferNotFound(offer_id))?;
        let rule_version = self.engine.rules().rule_version.clone();

        offer.moderation_status = ModerationStatus::Submitted;
        offer.moderation_reason_code = None;
        offer.moderation_reason = None;
        offer.moderation_score = 0;
        offer.moderation_rule_version = Some(rule_version.clone());
        self.offers.update_offer(&offer)?;

        self.reviews.record_review(ModerationReview {
            offer_id,
            actor,
            action: ModerationAction::Submitted,
            reason_code: None,
            reason_text: None,
            score: 0,
            rule_version: rule_version.clone(),
            metadata: Metadata::from([(
                "impactCategories".to_string(),
                json!(offer.impact_categories),
            )]),
            created_at: now,
        })?;

        let result = self.engine.evaluate(&offer).await;

        offer.moderation_score = result.score;
        offer.moderation_reason_code = Some(result.reason.code().to_string());
        offer.moderation_reason = Some(result.reason_text.clone());
        offer.moderation_rule_version = Some(result.rule_version.clone());
        offer.moderated_at = Some(now);

        let action = if result.eligible {
            offer.moderation_status = ModerationStatus::Approved;
            offer.status = PublicationStatus::Published;
            offer.is_visible = true;
            offer.published_at = Some(now);
            ModerationAction::AutoApproved
        } else {
            offer.moderation_status = ModerationStatus::Rejected;
            offer.status = PublicationStatus::Draft;
            offer.is_visible = false;
            offer.published_at = None;
            ModerationAction::AutoRejected
        };

        self.offers.update_offer(&offer)?;
        self.reviews.record_review(ModerationReview {
            offer_id,
            actor,
            action,
            reason_code: Some(result.reason.code().to_string()),
            reason_text: Some(result.reason_text.clone()),
            score: result.score,
            rule_version: result.rule_version.clone(),
            metadata: result.metadata.clone(),
            created_at: now,
        })?;

        info!(
            offer_id = offer_id.0,
            reason_code = result.reason.code(),
            score = result.score,
            status = offer.moderation_status.label(),
            "offer moderated"
        );

        let impact_score = match (result.eligible, &result.impact) {
            (true, Some(breakdown)) => Some(self.scores.save_snapshot(ImpactScore {
                offer_id,
                breakdown: breakdown.clone(),
                created_at: now,
            })?),
            _ => None,
        };

        // The decision is already stored; the keyed credit can be filled in by a later pass.
        let publication_credit = match (&self.awards, &impact_score) {
            (Some(awards), Some(snapshot)) => awards
                .award_offer_publication(&offer, snapshot, now)
                .unwrap_or_else(|err| {
                    warn!(
                        offer_id = offer_id.0,
                        error = %err,
                        "publication credit failed, offer stays published"
                    );
                    None
                }),
            _ => None,
        };

        Ok(ModerationOutcome {
            offer,
            result,
            impact_score,
            publication_credit,
        })
    }

    pub fn reviews(&self, offer_id: OfferId) -> Result<Vec<ModerationReview>, ModerationError> {
        Ok(self.reviews.reviews_for_offer(offer_id)?)
    }
}

/// Error raised by moderation and impact lookups.
#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("offer {0} not found")]
    OfferNotFound(OfferId),
    #[error(transparent)]
    Evidence(#[from] EvidenceError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
