use std::sync::Arc;

use serde::Serialize;

use super::domain::ImpactBreakdown;
use super::moderation::ModerationError;
use super::repository::{ImpactScoreRepository, OfferRepository};
use super::scoring::ImpactScoringEngine;
use crate::types::{OfferId, Timestamp};

/// Impact view of an offer: the stored snapshot, or a live preview when none exists yet.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedImpactScore {
    pub offer_id: OfferId,
    #[serde(flatten)]
    pub breakdown: ImpactBreakdown,
    pub is_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub computed_at: Option<Timestamp>,
}

pub struct ImpactScoreResolver {
    offers: Arc<dyn OfferRepository>,
    scores: Arc<dyn ImpactScoreRepository>,
    scoring: Arc<ImpactScoringEngine>,
}

impl ImpactScoreResolver {
    pub fn new(
        offers: Arc<dyn OfferRepository>,
        scores: Arc<dyn ImpactScoreRepository>,
        scoring: Arc<ImpactScoringEngine>,
    ) -> Self {
        Self {
            offers,
            scores,
            scoring,
        }
    }

    /// Previews are never persisted; evidence failures surface as errors.
    pub async fn resolve(&self, offer_id: OfferId) -> Result<ResolvedImpactScore, ModerationError> {
        let offer = self
            .offers
            .fetch_offer(offer_id)?
            .ok_or(ModerationError::OfferNotFound(offer_id))?;

        if let Some(snapshot) = self.scores.latest_for_offer(offer_id)? {
            return Ok(ResolvedImpactScore {
                offer_id,
                breakdown: snapshot.breakdown,
                is_preview: false,
                computed_at: Some(snapshot.created_at),
            });
        }

        let breakdown = self.scoring.score(&offer).await?;
        Ok(ResolvedImpactScore {
            offer_id,
            breakdown,
            is_preview: true,
            computed_at: None,
        })
    }
}
