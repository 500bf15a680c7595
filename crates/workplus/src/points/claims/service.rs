use std::sync::Arc;

use chrono::Months;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::domain::{
    ClaimAction, ClaimReason, ClaimReviewEvent, ClaimStatus, ClaimSubmission, ExternalChecks,
    PointsClaim,
};
use super::notifier::{ClaimDecisionNotice, DecisionNotifier};
use super::scoring::{evidence_score, suggested_points, ClaimRules};
use crate::points::ledger::{LedgerEntry, LedgerError, LedgerOwner, PointsLedger, ReferenceType};
use crate::points::repository::{ClaimEventRepository, ClaimRepository};
use crate::store::RepositoryError;
use crate::types::{ClaimId, Metadata, Timestamp, UserId};

/// Claim after an operation, with the credit it produced if any.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimDecision {
    pub claim: PointsClaim,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_entry: Option<LedgerEntry>,
    /// The idempotency key was already used; `claim` is the stored original.
    pub replayed: bool,
}

/// A reviewer's manual decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewDecision {
    pub reviewer: UserId,
    pub reason_code: String,
    #[serde(default)]
    pub approved_points: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
}

struct AutomatedDecision {
    status: ClaimStatus,
    reason: ClaimReason,
    action: ClaimAction,
    metadata: Metadata,
}

/// Scores evidence-backed claims, records every transition and credits approvals.
pub struct PointsClaimService {
    claims: Arc<dyn ClaimRepository>,
    events: Arc<dyn ClaimEventRepository>,
    ledger: Arc<PointsLedger>,
    notifier: Arc<dyn DecisionNotifier>,
    rules: ClaimRules,
}

impl PointsClaimService {
    pub fn new(
        claims: Arc<dyn ClaimRepository>,
        events: Arc<dyn ClaimEventRepository>,
        ledger: Arc<PointsLedger>,
        notifier: Arc<dyn DecisionNotifier>,
        rules: ClaimRules,
    ) -> Self {
        Self {
            claims,
            events,
            ledger,
            notifier,
            rules,
        }
    }

    pub fn rules(&self) -> &ClaimRules {
        &self.rules
    }

    pub fn submit(
        &self,
        submission: ClaimSubmission,
        now: Timestamp,
    ) -> Result<ClaimDecision, ClaimError> {
        let key = submission.idempotency_key.trim().to_string();
        if key.is_empty() {
            return Err(ClaimError::Invalid("idempotency key is required".into()));
        }

        if let Some(existing) = self.claims.find_claim_by_key(&key)? {
            return self.replay(existing, now);
        }

        if submission.evidence_files.is_empty() {
            return Err(ClaimError::Invalid(
                "at least one supporting document is required".into(),
            ));
        }

        let score = evidence_score(
            &self.rules,
            &submission.evidence_files,
            submission.external_checks.as_ref(),
        );
        let requested_points = suggested_points(&self.rules, score.total);
        let decision = self.decide(&submission, score.total, now)?;

        let claim = PointsClaim {
            id: ClaimId::UNASSIGNED,
            company_id: submission.company_id,
            offer_id: submission.offer_id,
            claim_type: submission.claim_type,
            status: decision.status,
            requested_points,
            approved_points: (decision.status == ClaimStatus::Approved).then_some(requested_points),
            evidence_files: submission.evidence_files,
            external_checks: submission.external_checks,
            evidence_score: score.total,
            decision_reason_code: Some(decision.reason.code().to_string()),
            decision_reason: Some(decision.reason.text().to_string()),
            rule_version: self.rules.rule_version.clone(),
            idempotency_key: key.clone(),
            evidence_issued_on: submission.evidence_issued_on,
            reviewed_by: None,
            reviewed_at: decision.status.is_terminal().then_some(now),
            created_at: now,
            updated_at: now,
        };

        let claim = match self.claims.insert_claim(claim) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict(_)) => {
                let existing = self
                    .claims
                    .find_claim_by_key(&key)?
                    .ok_or(RepositoryError::NotFound)?;
                return self.replay(existing, now);
            }
            Err(other) => return Err(other.into()),
        };

        self.record(
            &claim,
            ClaimAction::Submitted,
            None,
            (None, None),
            Metadata::from([
                ("evidenceScore".to_string(), json!(score.total)),
                ("suggestedPoints".to_string(), json!(requested_points)),
                ("scoreBreakdown".to_string(), json!(score)),
            ]),
            now,
        )?;
        self.record(
            &claim,
            decision.action,
            None,
            (
                Some(decision.reason.code().to_string()),
                Some(decision.reason.text().to_string()),
            ),
            decision.metadata,
            now,
        )?;

        info!(
            claim_id = claim.id.0,
            company_id = claim.company_id.0,
            evidence_score = claim.evidence_score,
            status = claim.status.label(),
            reason_code = decision.reason.code(),
            "points claim decided"
        );

        let ledger_entry = match claim.approved_points {
            Some(points) if claim.status == ClaimStatus::Approved => {
                self.credit(&claim, points, now)?
            }
            _ => None,
        };

        self.notify(&claim);
        Ok(ClaimDecision {
            claim,
            ledger_entry,
            replayed: false,
        })
    }

    /// Moves a claim awaiting a human into review, optionally with fresh checks.
    pub fn mark_in_review(
        &self,
        claim_id: ClaimId,
        actor: Option<UserId>,
        external_checks: Option<ExternalChecks>,
        now: Timestamp,
    ) -> Result<PointsClaim, ClaimError> {
        self.ensure_manual_review()?;
        let mut claim = self.fetch(claim_id)?;
        if !matches!(claim.status, ClaimStatus::Submitted | ClaimStatus::InReview) {
            return Err(ClaimError::IllegalTransition {
                from: claim.status,
                action: ClaimAction::MarkedInReview,
            });
        }

        if let Some(checks) = external_checks {
            claim.external_checks = Some(checks);
            let score = evidence_score(
                &self.rules,
                &claim.evidence_files,
                claim.external_checks.as_ref(),
            );
            claim.evidence_score = score.total;
            claim.requested_points = suggested_points(&self.rules, score.total);
        }
        claim.status = ClaimStatus::InReview;
        claim.decision_reason_code = Some(ClaimReason::NeedsHumanReview.code().to_string());
        claim.decision_reason = Some(ClaimReason::NeedsHumanReview.text().to_string());
        claim.updated_at = now;
        self.claims.update_claim(&claim)?;

        self.record(
            &claim,
            ClaimAction::MarkedInReview,
            actor,
            (
                Some(ClaimReason::NeedsHumanReview.code().to_string()),
                Some(ClaimReason::NeedsHumanReview.text().to_string()),
            ),
            Metadata::from([
                ("evidenceScore".to_string(), json!(claim.evidence_score)),
                ("suggestedPoints".to_string(), json!(claim.requested_points)),
            ]),
            now,
        )?;
        info!(claim_id = claim.id.0, "points claim marked in review");
        Ok(claim)
    }

    pub fn approve(
        &self,
        claim_id: ClaimId,
        decision: ReviewDecision,
        now: Timestamp,
    ) -> Result<ClaimDecision, ClaimError> {
        self.ensure_manual_review()?;
        let reason_code = required_reason(&decision.reason_code)?;
        let mut claim = self.fetch(claim_id)?;

        let points = decision.approved_points.unwrap_or(claim.requested_points);
        if points <= 0 {
            return Err(ClaimError::Invalid(
                "approved points must be positive".into(),
            ));
        }
        if claim.status.is_terminal() {
            return Err(ClaimError::IllegalTransition {
                from: claim.status,
                action: ClaimAction::Approved,
            });
        }

        claim.status = ClaimStatus::Approved;
        claim.approved_points = Some(points);
        claim.decision_reason_code = Some(reason_code.clone());
        claim.decision_reason = decision.note.clone();
        claim.reviewed_by = Some(decision.reviewer);
        claim.reviewed_at = Some(now);
        claim.updated_at = now;
        self.claims.update_claim(&claim)?;

        self.record(
            &claim,
            ClaimAction::Approved,
            Some(decision.reviewer),
            (Some(reason_code), decision.note),
            Metadata::from([("approvedPoints".to_string(), json!(points))]),
            now,
        )?;
        info!(claim_id = claim.id.0, points, "points claim approved by reviewer");

        let ledger_entry = self.credit(&claim, points, now)?;
        self.notify(&claim);
        Ok(ClaimDecision {
            claim,
            ledger_entry,
            replayed: false,
        })
    }

    pub fn reject(
        &self,
        claim_id: ClaimId,
        decision: ReviewDecision,
        now: Timestamp,
    ) -> Result<PointsClaim, ClaimError> {
        self.ensure_manual_review()?;
        let reason_code = required_reason(&decision.reason_code)?;
        let mut claim = self.fetch(claim_id)?;
        if claim.status.is_terminal() {
            return Err(ClaimError::IllegalTransition {
                from: claim.status,
                action: ClaimAction::Rejected,
            });
        }

        claim.status = ClaimStatus::Rejected;
        claim.approved_points = None;
        claim.decision_reason_code = Some(reason_code.clone());
        claim.decision_reason = decision.note.clone();
        claim.reviewed_by = Some(decision.reviewer);
        claim.reviewed_at = Some(now);
        claim.updated_at = now;
        self.claims.update_claim(&claim)?;

        self.record(
            &claim,
            ClaimAction::Rejected,
            Some(decision.reviewer),
            (Some(reason_code), decision.note),
            Metadata::new(),
            now,
        )?;
        info!(claim_id = claim.id.0, "points claim rejected by reviewer");

        self.notify(&claim);
        Ok(claim)
    }

    pub fn claim(&self, claim_id: ClaimId) -> Result<PointsClaim, ClaimError> {
        self.fetch(claim_id)
    }

    pub fn events(&self, claim_id: ClaimId) -> Result<Vec<ClaimReviewEvent>, ClaimError> {
        Ok(self.events.events_for_claim(claim_id)?)
    }

    fn decide(
        &self,
        submission: &ClaimSubmission,
        score: u8,
        now: Timestamp,
    ) -> Result<AutomatedDecision, ClaimError> {
        for file in &submission.evidence_files {
            let hash = file.content_hash.trim();
            if hash.is_empty() {
                continue;
            }
            if self
                .claims
                .company_has_evidence_hash(submission.company_id, hash)?
            {
                return Ok(AutomatedDecision {
                    status: ClaimStatus::Rejected,
                    reason: ClaimReason::DuplicateEvidenceFile,
                    action: ClaimAction::AutoRejected,
                    metadata: Metadata::from([("duplicateHash".to_string(), json!(hash))]),
                });
            }
        }

        if let Some(issued_on) = submission.evidence_issued_on {
            let oldest_accepted = now
                .date_naive()
                .checked_sub_months(Months::new(self.rules.max_evidence_age_months));
            if oldest_accepted.is_some_and(|oldest| issued_on < oldest) {
                return Ok(AutomatedDecision {
                    status: ClaimStatus::Rejected,
                    reason: ClaimReason::EvidenceTooOld,
                    action: ClaimAction::AutoRejected,
                    metadata: Metadata::from([(
                        "evidenceIssuedAt".to_string(),
                        json!(issued_on.format("%Y-%m-%d").to_string()),
                    )]),
                });
            }
        }

        let decision = if score >= self.rules.auto_approve_threshold {
            AutomatedDecision {
                status: ClaimStatus::Approved,
                reason: ClaimReason::AutoApprovedScore,
                action: ClaimAction::AutoApproved,
                metadata: Metadata::new(),
            }
        } else if self.rules.manual_review && score >= self.rules.review_threshold {
            AutomatedDecision {
                status: ClaimStatus::InReview,
                reason: ClaimReason::NeedsHumanReview,
                action: ClaimAction::MarkedInReview,
                metadata: Metadata::new(),
            }
        } else {
            AutomatedDecision {
                status: ClaimStatus::Rejected,
                reason: ClaimReason::InsufficientEvidenceScore,
                action: ClaimAction::AutoRejected,
                metadata: Metadata::new(),
            }
        };
        Ok(decision)
    }

    /// Returns the stored claim unchanged; an approved one gets its credit re-ensured.
    fn replay(&self, claim: PointsClaim, now: Timestamp) -> Result<ClaimDecision, ClaimError> {
        debug!(claim_id = claim.id.0, idempotency_key = %claim.idempotency_key, "points claim replayed");
        let ledger_entry = match claim.approved_points {
            Some(points) if claim.status == ClaimStatus::Approved => {
                self.credit(&claim, points, now)?
            }
            _ => None,
        };
        Ok(ClaimDecision {
            claim,
            ledger_entry,
            replayed: true,
        })
    }

    fn credit(
        &self,
        claim: &PointsClaim,
        points: i64,
        now: Timestamp,
    ) -> Result<Option<LedgerEntry>, ClaimError> {
        let entry = LedgerEntry::credit(
            LedgerOwner::Company(claim.company_id),
            points,
            format!("points_claim_approval_{}", claim.idempotency_key),
            now,
        )
        .because("Points claim approved")
        .referencing(ReferenceType::PointsClaimApproval, claim.id.0)
        .under_rule(claim.rule_version.clone())
        .with_metadata(Metadata::from([
            ("claimType".to_string(), json!(claim.claim_type)),
            ("evidenceScore".to_string(), json!(claim.evidence_score)),
            ("companyId".to_string(), json!(claim.company_id)),
            ("offerId".to_string(), json!(claim.offer_id)),
        ]));

        Ok(self.ledger.append(entry)?.recorded())
    }

    fn record(
        &self,
        claim: &PointsClaim,
        action: ClaimAction,
        actor: Option<UserId>,
        (reason_code, reason_text): (Option<String>, Option<String>),
        metadata: Metadata,
        now: Timestamp,
    ) -> Result<(), ClaimError> {
        self.events.record_event(ClaimReviewEvent {
            claim_id: claim.id,
            actor,
            action,
            reason_code,
            reason_text,
            metadata,
            created_at: now,
        })?;
        Ok(())
    }

    fn notify(&self, claim: &PointsClaim) {
        if let Err(err) = self.notifier.notify(ClaimDecisionNotice::for_claim(claim)) {
            warn!(claim_id = claim.id.0, error = %err, "claim decision notification failed");
        }
    }

    fn fetch(&self, claim_id: ClaimId) -> Result<PointsClaim, ClaimError> {
        self.claims
            .fetch_claim(claim_id)?
            .ok_or(ClaimError::NotFound(claim_id))
    }

    fn ensure_manual_review(&self) -> Result<(), ClaimError> {
        if self.rules.manual_review {
            Ok(())
        } else {
            Err(ClaimError::ManualReviewDisabled {
                rule_version: self.rules.rule_version.clone(),
            })
        }
    }
}

fn required_reason(reason_code: &str) -> Result<String, ClaimError> {
    let trimmed = reason_code.trim();
    if trimmed.is_empty() {
        Err(ClaimError::Invalid("a reason code is required".into()))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Error raised by the claim engine.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("invalid claim request: {0}")]
    Invalid(String),
    #[error("claim {0} not found")]
    NotFound(ClaimId),
    #[error("cannot apply {action} to a claim that is {from}")]
    IllegalTransition {
        from: ClaimStatus,
        action: ClaimAction,
    },
    #[error("manual review is disabled under rule version {rule_version}")]
    ManualReviewDisabled { rule_version: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
