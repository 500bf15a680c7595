use serde::{Deserialize, Serialize};

use super::domain::{EvidenceFile, ExternalChecks};

pub const CLAIM_RULE_VERSION: &str = "points_claim_v1_2026_02";
pub const CLAIM_REVIEW_RULE_VERSION: &str = "points_claim_v2_review_2026_03";

/// Evidence scoring and decision thresholds of one claim rule version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRules {
    pub rule_version: String,
    /// Routes mid-range scores to IN_REVIEW and enables the manual operations.
    pub manual_review: bool,
    pub points_per_document: u32,
    pub completeness_cap: u32,
    pub points_per_valid_document: u32,
    pub technical_cap: u32,
    pub coherence_points: u32,
    pub points_per_check: u32,
    pub corroboration_cap: u32,
    pub auto_approve_threshold: u8,
    pub review_threshold: u8,
    pub points_ratio: f64,
    pub min_points: i64,
    pub max_points: i64,
    pub max_evidence_age_months: u32,
}

impl ClaimRules {
    /// Fully automated decisions; every claim ends APPROVED or REJECTED.
    pub fn automated() -> Self {
        Self {
            rule_version: CLAIM_RULE_VERSION.to_string(),
            manual_review: false,
            points_per_document: 10,
            completeness_cap: 40,
            points_per_valid_document: 5,
            technical_cap: 20,
            coherence_points: 20,
            points_per_check: 5,
            corroboration_cap: 20,
            auto_approve_threshold: 70,
            review_threshold: 40,
            points_ratio: 0.25,
            min_points: 5,
            max_points: 30,
            max_evidence_age_months: 24,
        }
    }

    /// Same scoring, with a human decision for scores between the two thresholds.
    pub fn with_manual_review() -> Self {
        Self {
            rule_version: CLAIM_REVIEW_RULE_VERSION.to_string(),
            manual_review: true,
            ..Self::automated()
        }
    }

    pub fn for_mode(manual_review: bool) -> Self {
        if manual_review {
            Self::with_manual_review()
        } else {
            Self::automated()
        }
    }
}

impl Default for ClaimRules {
    fn default() -> Self {
        Self::automated()
    }
}

/// The four capped sub-scores and their clamped sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceScore {
    pub completeness: u32,
    pub technical: u32,
    pub coherence: u32,
    pub corroboration: u32,
    pub total: u8,
}

pub fn evidence_score(
    rules: &ClaimRules,
    files: &[EvidenceFile],
    checks: Option<&ExternalChecks>,
) -> EvidenceScore {
    let documents = files.len() as u32;
    let valid = files.iter().filter(|file| file.valid).count() as u32;

    let completeness = documents
        .saturating_mul(rules.points_per_document)
        .min(rules.completeness_cap);
    let technical = valid
        .saturating_mul(rules.points_per_valid_document)
        .min(rules.technical_cap);
    let coherence = match checks.and_then(|checks| checks.coherence_ok) {
        Some(true) => rules.coherence_points,
        _ => 0,
    };
    let passed = checks.map(ExternalChecks::passed_checks).unwrap_or(0) as u32;
    let corroboration = passed
        .saturating_mul(rules.points_per_check)
        .min(rules.corroboration_cap);

    let total = (completeness + technical + coherence + corroboration).min(100) as u8;

    EvidenceScore {
        completeness,
        technical,
        coherence,
        corroboration,
        total,
    }
}

pub fn suggested_points(rules: &ClaimRules, score: u8) -> i64 {
    let suggested = (f64::from(score) * rules.points_ratio).round() as i64;
    suggested.clamp(rules.min_points, rules.max_points)
}
