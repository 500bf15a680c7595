use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use super::moderation::{ModerationOutcome, ModerationService};
use super::resolver::{ImpactScoreResolver, ResolvedImpactScore};
use crate::error::AppError;
use crate::types::{OfferId, UserId};

#[derive(Clone)]
pub(crate) struct ImpactState {
    moderation: Arc<ModerationService>,
    resolver: Arc<ImpactScoreResolver>,
}

/// Offer moderation and impact score endpoints.
pub fn impact_router(
    moderation: Arc<ModerationService>,
    resolver: Arc<ImpactScoreResolver>,
) -> Router {
    Router::new()
        .route("/api/v1/offers/:offer_id/moderation", post(moderate_handler))
        .route("/api/v1/offers/:offer_id/impact-score", get(impact_score_handler))
        .with_state(ImpactState {
            moderation,
            resolver,
        })
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ModerationRequest {
    #[serde(default)]
    pub(crate) actor: Option<UserId>,
}

pub(crate) async fn moderate_handler(
    State(state): State<ImpactState>,
    Path(offer_id): Path<i64>,
    payload: Option<Json<ModerationRequest>>,
) -> Result<Json<ModerationOutcome>, AppError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let outcome = state
        .moderation
        .moderate_for_publication(OfferId(offer_id), request.actor, Utc::now())
        .await?;
    Ok(Json(outcome))
}

pub(crate) async fn impact_score_handler(
    State(state): State<ImpactState>,
    Path(offer_id): Path<i64>,
) -> Result<Json<ResolvedImpactScore>, AppError> {
    Ok(Json(state.resolver.resolve(OfferId(offer_id)).await?))
}
