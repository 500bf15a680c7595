//! Points: the append-only ledger, award policies and evidence-backed claims.

pub mod awards;
pub mod claims;
pub mod ledger;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests {
    mod awards;
    mod claims;
    mod common;
    mod ledger;
    mod routing;
}

pub use awards::{
    candidate_level, ApplicationMilestone, ApplicationRef, AwardRules, CandidateLevel,
    CandidateSummary, CompanyPointsSummary, PointAwards,
};
pub use claims::{
    ClaimDecision, ClaimError, ClaimRules, ClaimStatus, ClaimSubmission, ClaimType,
    DecisionNotifier, EvidenceFile, ExternalChecks, PointsClaim, PointsClaimService,
};
pub use ledger::{
    AppendOutcome, EntryType, LedgerEntry, LedgerError, LedgerOwner, PointsLedger, ReferenceType,
};
pub use repository::{ClaimEventRepository, ClaimRepository, LedgerRepository};
pub use router::{claims_router, points_router};
