use serde::{Deserialize, Serialize};

use super::evidence::EvidenceDocument;
use crate::types::{CompanyId, Metadata, OfferId, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicationStatus {
    Draft,
    Published,
}

impl PublicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PublicationStatus::Draft => "DRAFT",
            PublicationStatus::Published => "PUBLISHED",
        }
    }
}

/// Lifecycle of an offer's content review, distinct from its publication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl ModerationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ModerationStatus::Draft => "DRAFT",
            ModerationStatus::Submitted => "SUBMITTED",
            ModerationStatus::Approved => "APPROVED",
            ModerationStatus::Rejected => "REJECTED",
        }
    }
}

/// Job offer as seen by moderation. Created by the authoring flow, mutated only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub company_id: CompanyId,
    pub company_name: String,
    pub title: String,
    pub description: String,
    pub impact_categories: Vec<String>,
    pub is_visible: bool,
    pub status: PublicationStatus,
    pub moderation_status: ModerationStatus,
    pub moderation_score: u8,
    pub moderation_reason_code: Option<String>,
    pub moderation_reason: Option<String>,
    pub moderation_rule_version: Option<String>,
    pub moderated_at: Option<Timestamp>,
    pub published_at: Option<Timestamp>,
}

impl Offer {
    /// Fresh draft awaiting submission; storage assigns the id on insert.
    pub fn draft(
        company_id: CompanyId,
        company_name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        impact_categories: Vec<String>,
    ) -> Self {
        Self {
            id: OfferId::UNASSIGNED,
            company_id,
            company_name: company_name.into(),
            title: title.into(),
            description: description.into(),
            impact_categories,
            is_visible: false,
            status: PublicationStatus::Draft,
            moderation_status: ModerationStatus::Draft,
            moderation_score: 0,
            moderation_reason_code: None,
            moderation_reason: None,
            moderation_rule_version: None,
            moderated_at: None,
            published_at: None,
        }
    }

    /// Whether candidates can currently see the offer.
    pub fn is_listed(&self) -> bool {
        self.is_visible && self.status == PublicationStatus::Published
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModerationAction {
    Submitted,
    AutoApproved,
    AutoRejected,
}

/// Append-only audit row, one per moderation transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModerationReview {
    pub offer_id: OfferId,
    pub actor: Option<UserId>,
    pub action: ModerationAction,
    pub reason_code: Option<String>,
    pub reason_text: Option<String>,
    pub score: u8,
    pub rule_version: String,
    pub metadata: Metadata,
    pub created_at: Timestamp,
}

/// Axis scores, aggregate and confidence computed from one evidence document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactBreakdown {
    pub society: u8,
    pub biodiversity: u8,
    pub ghg: u8,
    pub total_score: u8,
    pub confidence: f64,
    pub rule_version: String,
    pub evidence: EvidenceDocument,
}

impl ImpactBreakdown {
    pub fn every_axis_at_least(&self, threshold: u8) -> bool {
        self.society >= threshold && self.biodiversity >= threshold && self.ghg >= threshold
    }
}

/// Immutable per-offer snapshot. The latest one feeds points and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScore {
    pub offer_id: OfferId,
    #[serde(flatten)]
    pub breakdown: ImpactBreakdown,
    pub created_at: Timestamp,
}
