//! Evidence-backed point claims: scoring, decision policy and review trail.

pub mod domain;
pub mod notifier;
pub mod scoring;
pub mod service;

pub use domain::{
    ClaimAction, ClaimReason, ClaimReviewEvent, ClaimStatus, ClaimSubmission, ClaimType,
    EvidenceFile, ExternalChecks, PointsClaim,
};
pub use notifier::{ClaimDecisionNotice, DecisionNotifier, LogNotifier, NotifyError};
pub use scoring::{
    evidence_score, suggested_points, ClaimRules, EvidenceScore, CLAIM_REVIEW_RULE_VERSION,
    CLAIM_RULE_VERSION,
};
pub use service::{ClaimDecision, ClaimError, PointsClaimService, ReviewDecision};
