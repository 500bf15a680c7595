use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::domain::{ImpactBreakdown, Offer};
use super::scoring::{clamp_score, ImpactScoringEngine};
use crate::types::Metadata;

pub const MODERATION_RULE_VERSION: &str = "moderation_v1_2026_02";

/// Thresholds and blocklist of one moderation rule version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityRules {
    pub rule_version: String,
    pub min_description_chars: usize,
    pub min_approval_score: u8,
    pub forbidden_keywords: Vec<String>,
    pub impact_weight: f64,
    pub confidence_weight: f64,
    pub points_per_category: u32,
    pub category_bonus_cap: u32,
}

impl Default for EligibilityRules {
    fn default() -> Self {
        Self {
            rule_version: MODERATION_RULE_VERSION.to_string(),
            min_description_chars: 120,
            min_approval_score: 40,
            forbidden_keywords: [
                "violence",
                "arme",
                "armes",
                "haine",
                "crime",
                "criminel",
                "trafic",
                "exploitation",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            impact_weight: 0.7,
            confidence_weight: 20.0,
            points_per_category: 5,
            category_bonus_cap: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EligibilityReason {
    Eligible,
    MissingImpactCategory,
    DescriptionTooShort,
    ForbiddenActivity,
    EvidenceProviderUnavailable,
    LowImpactScore,
}

impl EligibilityReason {
    pub const fn code(self) -> &'static str {
        match self {
            EligibilityReason::Eligible => "ELIGIBLE",
            EligibilityReason::MissingImpactCategory => "MISSING_IMPACT_CATEGORY",
            EligibilityReason::DescriptionTooShort => "DESCRIPTION_TOO_SHORT",
            EligibilityReason::ForbiddenActivity => "FORBIDDEN_ACTIVITY",
            EligibilityReason::EvidenceProviderUnavailable => "EVIDENCE_PROVIDER_UNAVAILABLE",
            EligibilityReason::LowImpactScore => "LOW_IMPACT_SCORE",
        }
    }
}

/// Outcome of the rule chain. Rejections are values, never errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityResult {
    pub eligible: bool,
    pub reason: EligibilityReason,
    pub reason_text: String,
    pub score: u8,
    pub rule_version: String,
    pub metadata: Metadata,
    /// Impact computed along the way, present once scoring ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactBreakdown>,
}

/// Ordered, short-circuiting publication rules.
pub struct EligibilityEngine {
    scoring: Arc<ImpactScoringEngine>,
    rules: EligibilityRules,
}

impl EligibilityEngine {
    pub fn new(scoring: Arc<ImpactScoringEngine>, rules: EligibilityRules) -> Self {
        Self { scoring, rules }
    }

    pub fn rules(&self) -> &EligibilityRules {
        &self.rules
    }

    pub async fn evaluate(&self, offer: &Offer) -> EligibilityResult {
        let categories_count = offer.impact_categories.len();
        if categories_count == 0 {
            return self.reject(
                EligibilityReason::MissingImpactCategory,
                "No impact category selected.",
                Metadata::new(),
            );
        }

        let description_length = offer.description.trim().chars().count();
        if description_length < self.rules.min_description_chars {
            return self.reject(
                EligibilityReason::DescriptionTooShort,
                format!(
                    "Description must contain at least {} characters.",
                    self.rules.min_description_chars
                ),
                Metadata::from([("descriptionLength".to_string(), json!(description_length))]),
            );
        }

        if let Some(keyword) = self.forbidden_keyword(offer) {
            return self.reject(
                EligibilityReason::ForbiddenActivity,
                "Offer content references a forbidden activity.",
                Metadata::from([("matchedKeyword".to_string(), json!(keyword))]),
            );
        }

        let impact = match self.scoring.score(offer).await {
            Ok(impact) => impact,
            Err(err) => {
                warn!(offer_id = offer.id.0, error = %err, "evidence provider unavailable during moderation");
                return self.reject(
                    EligibilityReason::EvidenceProviderUnavailable,
                    "Impact evidence could not be verified, please retry later.",
                    Metadata::from([("error".to_string(), json!(err.to_string()))]),
                );
            }
        };

        let score = self.composite_score(&impact, categories_count);
        let metadata = Metadata::from([
            ("totalImpactScore".to_string(), json!(impact.total_score)),
            ("confidence".to_string(), json!(impact.confidence)),
            ("categoriesCount".to_string(), json!(categories_count)),
        ]);

        let (eligible, reason, reason_text) = if score < self.rules.min_approval_score {
            (
                false,
                EligibilityReason::LowImpactScore,
                "Impact score is below the publication threshold.",
            )
        } else {
            (
                true,
                EligibilityReason::Eligible,
                "Offer meets the automated publication criteria.",
            )
        };

        EligibilityResult {
            eligible,
            reason,
            reason_text: reason_text.to_string(),
            score,
            rule_version: self.rules.rule_version.clone(),
            metadata,
            impact: Some(impact),
        }
    }

    fn forbidden_keyword(&self, offer: &Offer) -> Option<&str> {
        let haystack = format!("{} {}", offer.title, offer.description).to_lowercase();
        self.rules
            .forbidden_keywords
            .iter()
            .map(String::as_str)
            .find(|keyword| haystack.contains(&keyword.to_lowercase()))
    }

    fn composite_score(&self, impact: &ImpactBreakdown, categories_count: usize) -> u8 {
        let per_category = u64::from(self.rules.points_per_category);
        let category_bonus = (per_category * categories_count as u64)
            .min(u64::from(self.rules.category_bonus_cap));
        let raw = self.rules.impact_weight * f64::from(impact.total_score)
            + self.rules.confidence_weight * impact.confidence
            + category_bonus as f64;
        clamp_score(raw.round() as i32)
    }

    fn reject(
        &self,
        reason: EligibilityReason,
        reason_text: impl Into<String>,
        metadata: Metadata,
    ) -> EligibilityResult {
        EligibilityResult {
            eligible: false,
            reason,
            reason_text: reason_text.into(),
            score: 0,
            rule_version: self.rules.rule_version.clone(),
            metadata,
            impact: None,
        }
    }
}
