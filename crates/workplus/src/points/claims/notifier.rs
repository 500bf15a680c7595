use serde::Serialize;
use tracing::info;

use super::domain::{ClaimStatus, PointsClaim};
use crate::types::{ClaimId, CompanyId};

/// What a company is told after a claim decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimDecisionNotice {
    pub claim_id: ClaimId,
    pub company_id: CompanyId,
    pub status: ClaimStatus,
    pub reason_code: Option<String>,
    pub reason: Option<String>,
    pub requested_points: i64,
    pub approved_points: Option<i64>,
}

impl ClaimDecisionNotice {
    pub fn for_claim(claim: &PointsClaim) -> Self {
        Self {
            claim_id: claim.id,
            company_id: claim.company_id,
            status: claim.status,
            reason_code: claim.decision_reason_code.clone(),
            reason: claim.decision_reason.clone(),
            requested_points: claim.requested_points,
            approved_points: claim.approved_points,
        }
    }
}

/// Outbound decision hook (mail, webhook, ...). Fire-and-forget for the core.
pub trait DecisionNotifier: Send + Sync {
    fn notify(&self, notice: ClaimDecisionNotice) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Logs notices instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl DecisionNotifier for LogNotifier {
    fn notify(&self, notice: ClaimDecisionNotice) -> Result<(), NotifyError> {
        info!(
            claim_id = notice.claim_id.0,
            company_id = notice.company_id.0,
            status = notice.status.label(),
            reason_code = notice.reason_code.as_deref().unwrap_or("-"),
            approved_points = notice.approved_points,
            "claim decision notice"
        );
        Ok(())
    }
}
