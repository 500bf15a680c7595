//! Impact moderation: evidence collection, impact scoring, publication
//! eligibility and the audited moderation workflow.

pub mod domain;
pub mod eligibility;
pub mod evidence;
pub mod moderation;
pub mod public_api;
pub mod repository;
pub mod resolver;
pub mod router;
pub mod scoring;


pub use domain::{
    ImpactBreakdown, ImpactScore, ModerationAction, ModerationReview, ModerationStatus, Offer,
    PublicationStatus,
};
pub use eligibility::{
    EligibilityEngine, EligibilityReason, EligibilityResult, EligibilityRules,
    MODERATION_RULE_VERSION,
};
pub use evidence::{
    CompanyEvidence, EvidenceDocument, EvidenceError, EvidenceProvider, EvidenceQuery,
    LocationEvidence, StaticEvidenceProvider, TimeoutEvidenceProvider,
};
pub use moderation::{ModerationError, ModerationOutcome, ModerationService};
pub use public_api::PublicApiEvidenceProvider;
pub use repository::{ImpactScoreRepository, ModerationReviewRepository, OfferRepository};
pub use resolver::{ImpactScoreResolver, ResolvedImpactScore};
pub use router::impact_router;
pub use scoring::{ConfidenceRules, ImpactScoringEngine, ScoringRules, IMPACT_RULE_VERSION};
