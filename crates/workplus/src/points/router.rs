use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use super::awards::{CandidateSummary, CompanyPointsSummary, PointAwards};
use super::claims::{
    ClaimSubmission, ClaimType, EvidenceFile, ExternalChecks, PointsClaim,
    PointsClaimService, ReviewDecision,
};
use crate::error::AppError;
use crate::types::{ClaimId, CompanyId, OfferId, UserId};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Claim intake and manual review endpoints.
pub fn claims_router(service: Arc<PointsClaimService>) -> Router {
    Router::new()
        .route("/api/v1/companies/:company_id/claims", post(submit_claim_handler))
        .route("/api/v1/claims/:claim_id/approve", post(approve_claim_handler))
        .route("/api/v1/claims/:claim_id/reject", post(reject_claim_handler))
        .route("/api/v1/claims/:claim_id/in-review", post(review_claim_handler))
        .with_state(service)
}

/// Balance and history endpoints.
pub fn points_router(awards: Arc<PointAwards>) -> Router {
    Router::new()
        .route("/api/v1/companies/:company_id/points", get(company_points_handler))
        .route("/api/v1/candidates/:candidate_id/points", get(candidate_points_handler))
        .with_state(awards)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClaimRequest {
    pub(crate) claim_type: ClaimType,
    pub(crate) evidence_files: Vec<EvidenceFile>,
    #[serde(default)]
    pub(crate) offer_id: Option<OfferId>,
    #[serde(default)]
    pub(crate) evidence_issued_on: Option<NaiveDate>,
    #[serde(default)]
    pub(crate) external_checks: Option<ExternalChecks>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InReviewRequest {
    #[serde(default)]
    pub(crate) actor: Option<UserId>,
    #[serde(default)]
    pub(crate) external_checks: Option<ExternalChecks>,
}

pub(crate) async fn submit_claim_handler(
    State(service): State<Arc<PointsClaimService>>,
    Path(company_id): Path<i64>,
    headers: HeaderMap,
    Json(request): Json<ClaimRequest>,
) -> Result<impl IntoResponse, AppError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let submission = ClaimSubmission {
        company_id: CompanyId(company_id),
        claim_type: request.claim_type,
        evidence_files: request.evidence_files,
        idempotency_key,
        offer_id: request.offer_id,
        evidence_issued_on: request.evidence_issued_on,
        external_checks: request.external_checks,
    };

    let decision = service.submit(submission, Utc::now())?;
    let status = if decision.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(decision)))
}

pub(crate) async fn approve_claim_handler(
    State(service): State<Arc<PointsClaimService>>,
    Path(claim_id): Path<i64>,
    Json(decision): Json<ReviewDecision>,
) -> Result<impl IntoResponse, AppError> {
    let decision = service.approve(ClaimId(claim_id), decision, Utc::now())?;
    Ok(Json(decision))
}

pub(crate) async fn reject_claim_handler(
    State(service): State<Arc<PointsClaimService>>,
    Path(claim_id): Path<i64>,
    Json(decision): Json<ReviewDecision>,
) -> Result<Json<PointsClaim>, AppError> {
    let claim = service.reject(ClaimId(claim_id), decision, Utc::now())?;
    Ok(Json(claim))
}

pub(crate) async fn review_claim_handler(
    State(service): State<Arc<PointsClaimService>>,
    Path(claim_id): Path<i64>,
    payload: Option<Json<InReviewRequest>>,
) -> Result<Json<PointsClaim>, AppError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let claim = service
        .mark_in_review(
            ClaimId(claim_id),
            request.actor,
            request.external_checks,
            Utc::now(),
        )?;
    Ok(Json(claim))
}

pub(crate) async fn company_points_handler(
    State(awards): State<Arc<PointAwards>>,
    Path(company_id): Path<i64>,
) -> Result<Json<CompanyPointsSummary>, AppError> {
    Ok(Json(awards.company_summary(CompanyId(company_id))?))
}

pub(crate) async fn candidate_points_handler(
    State(awards): State<Arc<PointAwards>>,
    Path(candidate_id): Path<i64>,
) -> Result<Json<CandidateSummary>, AppError> {
    Ok(Json(awards.candidate_summary(UserId(candidate_id))?))
}
