use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::impact::domain::Offer;
use crate::impact::eligibility::{EligibilityEngine, EligibilityRules};
use crate::impact::evidence::{
    EvidenceDocument, EvidenceError, EvidenceProvider, EvidenceQuery, StaticEvidenceProvider,
};
use crate::impact::moderation::ModerationService;
use crate::impact::repository::OfferRepository;
use crate::impact::resolver::ImpactScoreResolver;
use crate::impact::scoring::{ImpactScoringEngine, ScoringRules};
use crate::points::awards::{AwardRules, PointAwards};
use crate::points::ledger::PointsLedger;
use crate::store::MemoryStore;
use crate::types::{CompanyId, Timestamp};

pub(super) const DESCRIPTION: &str = "Nous recrutons une personne pour coordonner nos \
programmes de reemploi solidaire a Paris 75011, accompagner les equipes terrain et suivre \
nos indicateurs sociaux et environnementaux.";

pub(super) fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 2, 10, 9, 30, 0).unwrap()
}

pub(super) fn categories(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

pub(super) fn draft_offer(description: &str, impact_categories: &[&str]) -> Offer {
    Offer::draft(
        CompanyId(7),
        "Atelier Solidaire",
        "Coordinateur reemploi",
        description,
        categories(impact_categories),
    )
}

pub(super) fn scenario_a_offer() -> Offer {
    draft_offer(DESCRIPTION, &["societe", "ges", "biodiversite"])
}

pub(super) struct FailingEvidenceProvider;

#[async_trait]
impl EvidenceProvider for FailingEvidenceProvider {
    async fn collect(&self, _query: &EvidenceQuery) -> Result<EvidenceDocument, EvidenceError> {
        Err(EvidenceError::Transport("connection refused".to_string()))
    }
}

pub(super) struct SlowEvidenceProvider(pub(super) Duration);

#[async_trait]
impl EvidenceProvider for SlowEvidenceProvider {
    async fn collect(&self, _query: &EvidenceQuery) -> Result<EvidenceDocument, EvidenceError> {
        tokio::time::sleep(self.0).await;
        Ok(EvidenceDocument::default())
    }
}

pub(super) fn scoring_engine(provider: Arc<dyn EvidenceProvider>) -> Arc<ImpactScoringEngine> {
    Arc::new(ImpactScoringEngine::new(provider, ScoringRules::default()))
}

pub(super) fn eligibility_engine(provider: Arc<dyn EvidenceProvider>) -> EligibilityEngine {
    EligibilityEngine::new(scoring_engine(provider), EligibilityRules::default())
}

pub(super) struct Harness {
    pub(super) store: Arc<MemoryStore>,
    pub(super) moderation: Arc<ModerationService>,
    pub(super) resolver: Arc<ImpactScoreResolver>,
}

pub(super) fn harness(provider: Arc<dyn EvidenceProvider>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let scoring = scoring_engine(provider);
    let ledger = Arc::new(PointsLedger::new(store.clone()));
    let awards = Arc::new(PointAwards::new(ledger, store.clone(), AwardRules::default()));
    let moderation = ModerationService::new(
        EligibilityEngine::new(scoring.clone(), EligibilityRules::default()),
        store.clone(),
        store.clone(),
        store.clone(),
    )
    .with_publication_awards(awards);
    let resolver = ImpactScoreResolver::new(store.clone(), store.clone(), scoring);

    Harness {
        store,
        moderation: Arc::new(moderation),
        resolver: Arc::new(resolver),
    }
}

pub(super) fn verified_harness() -> Harness {
    harness(Arc::new(StaticEvidenceProvider::verified()))
}

pub(super) fn stored_offer(harness: &Harness, offer: Offer) -> Offer {
    harness.store.insert_offer(offer).expect("offer stored")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
