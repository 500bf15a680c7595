use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{ImpactBreakdown, Offer};
use super::evidence::{EvidenceDocument, EvidenceError, EvidenceProvider, EvidenceQuery};

pub const IMPACT_RULE_VERSION: &str = "v1_auto_2026_02";

/// Per-flag point additions, weights and confidence steps of one scoring rule version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub rule_version: String,
    pub society_weight: f64,
    pub biodiversity_weight: f64,
    pub ghg_weight: f64,
    pub active_company_points: i32,
    pub ess_points: i32,
    pub mission_company_points: i32,
    pub validated_location_society_points: i32,
    pub validated_location_biodiversity_points: i32,
    pub ges_report_points: i32,
    pub ges_category_bonus: i32,
    pub societe_category_bonus: i32,
    pub biodiversite_category_bonus: i32,
    pub confidence: ConfidenceRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRules {
    pub baseline: f64,
    pub floor: f64,
    pub ceiling: f64,
    pub company_checked: f64,
    pub company_found: f64,
    pub company_active: f64,
    pub ess: f64,
    pub mission_company: f64,
    pub ges_report: f64,
    pub location_checked: f64,
    pub location_validated: f64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            rule_version: IMPACT_RULE_VERSION.to_string(),
            society_weight: 0.4,
            biodiversity_weight: 0.3,
            ghg_weight: 0.3,
            active_company_points: 15,
            ess_points: 40,
            mission_company_points: 25,
            validated_location_society_points: 10,
            validated_location_biodiversity_points: 10,
            ges_report_points: 40,
            ges_category_bonus: 20,
            societe_category_bonus: 10,
            biodiversite_category_bonus: 15,
            confidence: ConfidenceRules::default(),
        }
    }
}

impl Default for ConfidenceRules {
    fn default() -> Self {
        Self {
            baseline: 0.35,
            floor: 0.20,
            ceiling: 1.00,
            company_checked: 0.05,
            company_found: 0.10,
            company_active: 0.10,
            ess: 0.05,
            mission_company: 0.05,
            ges_report: 0.05,
            location_checked: 0.05,
            location_validated: 0.05,
        }
    }
}

/// Turns evidence into axis scores, an aggregate and a confidence.
pub struct ImpactScoringEngine {
    provider: Arc<dyn EvidenceProvider>,
    rules: ScoringRules,
}

impl ImpactScoringEngine {
    pub fn new(provider: Arc<dyn EvidenceProvider>, rules: ScoringRules) -> Self {
        Self { provider, rules }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    /// Collects evidence for the offer and scores it. Provider failures propagate.
    pub async fn score(&self, offer: &Offer) -> Result<ImpactBreakdown, EvidenceError> {
        let evidence = self.provider.collect(&EvidenceQuery::for_offer(offer)).await?;
        Ok(self.score_evidence(evidence, &offer.impact_categories))
    }

    pub fn score_evidence(&self, evidence: EvidenceDocument, categories: &[String]) -> ImpactBreakdown {
        let rules = &self.rules;
        let company = &evidence.company;
        let location = &evidence.location;

        let mut society = 0;
        let mut biodiversity = 0;
        let mut ghg = 0;

        if company.active {
            society += rules.active_company_points;
        }
        if company.is_ess {
            society += rules.ess_points;
        }
        if company.is_mission_company {
            society += rules.mission_company_points;
        }
        if location.validated {
            society += rules.validated_location_society_points;
            biodiversity += rules.validated_location_biodiversity_points;
        }
        if company.has_ges_report {
            ghg += rules.ges_report_points;
        }

        let categories: Vec<String> = categories
            .iter()
            .map(|category| category.trim().to_lowercase())
            .collect();
        let declares = |name: &str| categories.iter().any(|category| category == name);

        if declares("ges") && company.has_ges_report {
            ghg += rules.ges_category_bonus;
        }
        if declares("societe") && company.is_ess {
            society += rules.societe_category_bonus;
        }
        if declares("biodiversite") && location.validated {
            biodiversity += rules.biodiversite_category_bonus;
        }

        let society = clamp_score(society);
        let biodiversity = clamp_score(biodiversity);
        let ghg = clamp_score(ghg);
        let confidence = self.confidence(&evidence);

        let weighted = rules.society_weight * f64::from(society)
            + rules.biodiversity_weight * f64::from(biodiversity)
            + rules.ghg_weight * f64::from(ghg);
        let total_score = clamp_score((weighted * confidence).round() as i32);

        ImpactBreakdown {
            society,
            biodiversity,
            ghg,
            total_score,
            confidence,
            rule_version: rules.rule_version.clone(),
            evidence,
        }
    }

    fn confidence(&self, evidence: &EvidenceDocument) -> f64 {
        let steps = &self.rules.confidence;
        let company = &evidence.company;
        let location = &evidence.location;

        let mut confidence = steps.baseline;
        for (verified, step) in [
            (company.checked, steps.company_checked),
            (company.found, steps.company_found),
            (company.active, steps.company_active),
            (company.is_ess, steps.ess),
            (company.is_mission_company, steps.mission_company),
            (company.has_ges_report, steps.ges_report),
            (location.checked, steps.location_checked),
            (location.validated, steps.location_validated),
        ] {
            if verified {
                confidence += step;
            }
        }

        let rounded = (confidence * 100.0).round() / 100.0;
        rounded.clamp(steps.floor, steps.ceiling)
    }
}

pub(crate) fn clamp_score(value: i32) -> u8 {
    value.clamp(0, 100) as u8
}
