use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ClaimId, CompanyId, Metadata, OfferId, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    Submitted,
    InReview,
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ClaimStatus::Submitted => "SUBMITTED",
            ClaimStatus::InReview => "IN_REVIEW",
            ClaimStatus::Approved => "APPROVED",
            ClaimStatus::Rejected => "REJECTED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ClaimStatus::Approved | ClaimStatus::Rejected)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimType {
    Training,
    Volunteering,
    Certification,
    Other,
}

/// Reason codes produced by the automated decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimReason {
    DuplicateEvidenceFile,
    EvidenceTooOld,
    AutoApprovedScore,
    NeedsHumanReview,
    InsufficientEvidenceScore,
}

impl ClaimReason {
    pub const fn code(self) -> &'static str {
        match self {
            ClaimReason::DuplicateEvidenceFile => "DUPLICATE_EVIDENCE_FILE",
            ClaimReason::EvidenceTooOld => "EVIDENCE_TOO_OLD",
            ClaimReason::AutoApprovedScore => "AUTO_APPROVED_SCORE",
            ClaimReason::NeedsHumanReview => "NEEDS_HUMAN_REVIEW",
            ClaimReason::InsufficientEvidenceScore => "INSUFFICIENT_EVIDENCE_SCORE",
        }
    }

    pub const fn text(self) -> &'static str {
        match self {
            ClaimReason::DuplicateEvidenceFile => "An identical evidence file was already submitted.",
            ClaimReason::EvidenceTooOld => "The evidence date is too old.",
            ClaimReason::AutoApprovedScore => "Approved automatically on evidence score.",
            ClaimReason::NeedsHumanReview => "Evidence score requires a human review.",
            ClaimReason::InsufficientEvidenceScore => {
                "Evidence score is too low for automatic approval."
            }
        }
    }
}

/// Descriptor of an uploaded document. Hash and validity come from the upload pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceFile {
    pub name: String,
    #[serde(default)]
    pub storage_ref: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub content_hash: String,
    #[serde(default)]
    pub valid: bool,
}

/// Coherence and API corroboration computed outside the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalChecks {
    pub coherence_ok: Option<bool>,
    pub checks: BTreeMap<String, Value>,
}

impl ExternalChecks {
    /// Only literal `true` values count as corroborated.
    pub fn passed_checks(&self) -> usize {
        self.checks
            .values()
            .filter(|value| matches!(value, Value::Bool(true)))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsClaim {
    pub id: ClaimId,
    pub company_id: CompanyId,
    pub offer_id: Option<OfferId>,
    pub claim_type: ClaimType,
    pub status: ClaimStatus,
    pub requested_points: i64,
    pub approved_points: Option<i64>,
    pub evidence_files: Vec<EvidenceFile>,
    pub external_checks: Option<ExternalChecks>,
    pub evidence_score: u8,
    pub decision_reason_code: Option<String>,
    pub decision_reason: Option<String>,
    pub rule_version: String,
    pub idempotency_key: String,
    pub evidence_issued_on: Option<NaiveDate>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input of a claim submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSubmission {
    pub company_id: CompanyId,
    pub claim_type: ClaimType,
    pub evidence_files: Vec<EvidenceFile>,
    pub idempotency_key: String,
    #[serde(default)]
    pub offer_id: Option<OfferId>,
    #[serde(default)]
    pub evidence_issued_on: Option<NaiveDate>,
    #[serde(default)]
    pub external_checks: Option<ExternalChecks>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimAction {
    Submitted,
    AutoApproved,
    AutoRejected,
    MarkedInReview,
    Approved,
    Rejected,
}

impl ClaimAction {
    pub const fn label(self) -> &'static str {
        match self {
            ClaimAction::Submitted => "SUBMITTED",
            ClaimAction::AutoApproved => "AUTO_APPROVED",
            ClaimAction::AutoRejected => "AUTO_REJECTED",
            ClaimAction::MarkedInReview => "MARKED_IN_REVIEW",
            ClaimAction::Approved => "APPROVED",
            ClaimAction::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for ClaimAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Append-only audit row, one per claim transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimReviewEvent {
    pub claim_id: ClaimId,
    pub actor: Option<UserId>,
    pub action: ClaimAction,
    pub reason_code: Option<String>,
    pub reason_text: Option<String>,
    pub metadata: Metadata,
    pub created_at: Timestamp,
}
