use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ledger::{LedgerEntry, LedgerError, LedgerOwner, PointsLedger, ReferenceType};
use crate::impact::domain::{ImpactScore, Offer};
use crate::impact::repository::ImpactScoreRepository;
use crate::impact::scoring::IMPACT_RULE_VERSION;
use crate::types::{ApplicationId, CompanyId, Metadata, OfferId, Timestamp, UserId};

/// Point amounts for publication and application credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwardRules {
    pub all_axes_threshold: u8,
    pub all_axes_bonus: i64,
    pub high_confidence_threshold: f64,
    pub high_confidence_bonus: i64,
    pub publication_cap: i64,
    pub application_base_points: i64,
    pub application_bonus_ratio: f64,
    pub application_bonus_cap: i64,
    pub history_limit: usize,
}

impl Default for AwardRules {
    fn default() -> Self {
        Self {
            all_axes_threshold: 40,
            all_axes_bonus: 10,
            high_confidence_threshold: 0.85,
            high_confidence_bonus: 5,
            publication_cap: 120,
            application_base_points: 5,
            application_bonus_ratio: 0.10,
            application_bonus_cap: 10,
            history_limit: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationMilestone {
    Submitted,
    Hired,
}

impl ApplicationMilestone {
    fn key_prefix(self) -> &'static str {
        match self {
            ApplicationMilestone::Submitted => "application_submission_candidate",
            ApplicationMilestone::Hired => "application_hired_candidate",
        }
    }

    fn reference_type(self) -> ReferenceType {
        match self {
            ApplicationMilestone::Submitted => ReferenceType::ApplicationSubmission,
            ApplicationMilestone::Hired => ReferenceType::ApplicationHired,
        }
    }

    fn reason(self) -> &'static str {
        match self {
            ApplicationMilestone::Submitted => "Candidate points for submitted application",
            ApplicationMilestone::Hired => "Candidate points for hired application",
        }
    }
}

/// Application identity as resolved by the caller. Missing links skip the award.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRef {
    pub id: ApplicationId,
    pub candidate: Option<UserId>,
    pub offer: Option<OfferId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateLevel {
    Bronze,
    Silver,
    Gold,
    #[serde(rename = "Impact Leader")]
    ImpactLeader,
}

impl CandidateLevel {
    pub const fn label(self) -> &'static str {
        match self {
            CandidateLevel::Bronze => "Bronze",
            CandidateLevel::Silver => "Silver",
            CandidateLevel::Gold => "Gold",
            CandidateLevel::ImpactLeader => "Impact Leader",
        }
    }
}

pub fn candidate_level(balance: i64) -> CandidateLevel {
    match balance {
        b if b >= 700 => CandidateLevel::ImpactLeader,
        b if b >= 300 => CandidateLevel::Gold,
        b if b >= 100 => CandidateLevel::Silver,
        _ => CandidateLevel::Bronze,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateSummary {
    pub candidate_id: UserId,
    pub balance: i64,
    pub level: CandidateLevel,
    pub history: Vec<LedgerEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyPointsSummary {
    pub company_id: CompanyId,
    pub balance: i64,
    pub history: Vec<LedgerEntry>,
}

/// Award policies layered over the ledger. `Ok(None)` means nothing new was credited.
pub struct PointAwards {
    ledger: Arc<PointsLedger>,
    scores: Arc<dyn ImpactScoreRepository>,
    rules: AwardRules,
}

impl PointAwards {
    pub fn new(
        ledger: Arc<PointsLedger>,
        scores: Arc<dyn ImpactScoreRepository>,
        rules: AwardRules,
    ) -> Self {
        Self {
            ledger,
            scores,
            rules,
        }
    }

    pub fn publication_points(&self, score: &ImpactScore) -> i64 {
        let breakdown = &score.breakdown;
        let mut points = i64::from(breakdown.total_score);
        if breakdown.every_axis_at_least(self.rules.all_axes_threshold) {
            points += self.rules.all_axes_bonus;
        }
        if breakdown.confidence >= self.rules.high_confidence_threshold {
            points += self.rules.high_confidence_bonus;
        }
        points.clamp(0, self.rules.publication_cap)
    }

    pub fn award_offer_publication(
        &self,
        offer: &Offer,
        score: &ImpactScore,
        now: Timestamp,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        let points = self.publication_points(score);
        if points <= 0 {
            return Ok(None);
        }

        let breakdown = &score.breakdown;
        let entry = LedgerEntry::credit(
            LedgerOwner::Company(offer.company_id),
            points,
            format!("offer_publication_company_{}", offer.id),
            now,
        )
        .because("Automatic impact points for offer publication")
        .referencing(ReferenceType::OfferPublication, offer.id.0)
        .under_rule(breakdown.rule_version.clone())
        .with_metadata(Metadata::from([
            ("offerId".to_string(), json!(offer.id)),
            ("impactScore".to_string(), json!(breakdown.total_score)),
            ("confidence".to_string(), json!(breakdown.confidence)),
            ("societyScore".to_string(), json!(breakdown.society)),
            ("biodiversityScore".to_string(), json!(breakdown.biodiversity)),
            ("ghgScore".to_string(), json!(breakdown.ghg)),
        ]));

        Ok(self.ledger.append(entry)?.recorded())
    }

    pub fn application_bonus(&self, score: Option<&ImpactScore>) -> i64 {
        let Some(score) = score else {
            return 0;
        };
        let bonus = (f64::from(score.breakdown.total_score) * self.rules.application_bonus_ratio)
            .floor() as i64;
        bonus.clamp(0, self.rules.application_bonus_cap)
    }

    pub fn award_application(
        &self,
        application: &ApplicationRef,
        milestone: ApplicationMilestone,
        now: Timestamp,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        let (Some(candidate), Some(offer_id)) = (application.candidate, application.offer) else {
            return Ok(None);
        };

        let latest = self.scores.latest_for_offer(offer_id)?;
        let bonus = self.application_bonus(latest.as_ref());
        let points = self.rules.application_base_points + bonus;
        let rule_version = latest
            .as_ref()
            .map(|score| score.breakdown.rule_version.clone())
            .unwrap_or_else(|| IMPACT_RULE_VERSION.to_string());

        let entry = LedgerEntry::credit(
            LedgerOwner::User(candidate),
            points,
            format!("{}_{}", milestone.key_prefix(), application.id),
            now,
        )
        .because(milestone.reason())
        .referencing(milestone.reference_type(), application.id.0)
        .under_rule(rule_version)
        .with_metadata(Metadata::from([
            ("applicationId".to_string(), json!(application.id)),
            ("offerId".to_string(), json!(offer_id)),
            ("basePoints".to_string(), json!(self.rules.application_base_points)),
            ("impactBonusPoints".to_string(), json!(bonus)),
            (
                "offerImpactScore".to_string(),
                json!(latest.as_ref().map(|score| score.breakdown.total_score)),
            ),
        ]));

        Ok(self.ledger.append(entry)?.recorded())
    }

    pub fn candidate_summary(&self, candidate: UserId) -> Result<CandidateSummary, LedgerError> {
        let owner = LedgerOwner::User(candidate);
        let balance = self.ledger.balance(owner)?;
        Ok(CandidateSummary {
            candidate_id: candidate,
            balance,
            level: candidate_level(balance),
            history: self.ledger.history(owner, self.rules.history_limit)?,
        })
    }

    pub fn company_summary(&self, company: CompanyId) -> Result<CompanyPointsSummary, LedgerError> {
        let owner = LedgerOwner::Company(company);
        Ok(CompanyPointsSummary {
            company_id: company,
            balance: self.ledger.balance(owner)?,
            history: self.ledger.history(owner, self.rules.history_limit)?,
        })
    }
}
