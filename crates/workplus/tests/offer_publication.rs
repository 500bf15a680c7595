use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;
use workplus::impact::{
    impact_router, EligibilityEngine, EligibilityRules, ImpactScoreResolver, ImpactScoringEngine,
    ModerationService, ModerationStatus, Offer, OfferRepository, PublicationStatus, ScoringRules,
    StaticEvidenceProvider,
};
use workplus::points::{
    ApplicationMilestone, ApplicationRef, AwardRules, LedgerOwner, PointAwards, PointsLedger,
};
use workplus::store::MemoryStore;
use workplus::types::{ApplicationId, CompanyId, Timestamp, UserId};

const DESCRIPTION: &str = "Nous recrutons une personne pour coordonner nos programmes de \
reemploi solidaire a Paris 75011, accompagner les equipes terrain et suivre nos indicateurs \
sociaux et environnementaux.";

fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 2, 10, 9, 30, 0).unwrap()
}

struct Platform {
    store: Arc<MemoryStore>,
    awards: Arc<PointAwards>,
    moderation: Arc<ModerationService>,
    resolver: Arc<ImpactScoreResolver>,
}

fn platform() -> Platform {
    let store = Arc::new(MemoryStore::new());
    let scoring = Arc::new(ImpactScoringEngine::new(
        Arc::new(StaticEvidenceProvider::verified()),
        ScoringRules::default(),
    ));
    let ledger = Arc::new(PointsLedger::new(store.clone()));
    let awards = Arc::new(PointAwards::new(ledger, store.clone(), AwardRules::default()));
    let moderation = ModerationService::new(
        EligibilityEngine::new(scoring.clone(), EligibilityRules::default()),
        store.clone(),
        store.clone(),
        store.clone(),
    )
    .with_publication_awards(awards.clone());
    let resolver = ImpactScoreResolver::new(store.clone(), store.clone(), scoring);

    Platform {
        store,
        awards,
        moderation: Arc::new(moderation),
        resolver: Arc::new(resolver),
    }
}

fn impact_offer() -> Offer {
    Offer::draft(
        CompanyId(7),
        "Atelier Solidaire",
        "Coordinateur reemploi",
        DESCRIPTION,
        vec!["societe".into(), "ges".into(), "biodiversite".into()],
    )
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json payload")
}

#[tokio::test]
async fn published_offer_credits_company_then_candidate() {
    let platform = platform();
    let offer = platform.store.insert_offer(impact_offer()).expect("offer stored");

    let outcome = platform
        .moderation
        .moderate_for_publication(offer.id, Some(UserId(3)), now())
        .await
        .expect("moderation runs");

    assert_eq!(outcome.offer.moderation_status, ModerationStatus::Approved);
    assert_eq!(outcome.offer.status, PublicationStatus::Published);
    assert_eq!(outcome.publication_credit.map(|entry| entry.points), Some(44));

    let application = ApplicationRef {
        id: ApplicationId(501),
        candidate: Some(UserId(12)),
        offer: Some(offer.id),
    };
    let credit = platform
        .awards
        .award_application(&application, ApplicationMilestone::Submitted, now())
        .expect("ledger available")
        .expect("credited");
    assert_eq!(credit.points, 9);
    assert_eq!(credit.owner, LedgerOwner::User(UserId(12)));
    assert_eq!(credit.idempotency_key, "application_submission_candidate_501");

    let replay = platform
        .awards
        .award_application(&application, ApplicationMilestone::Submitted, now())
        .expect("ledger available");
    assert!(replay.is_none());

    assert_eq!(platform.awards.company_summary(CompanyId(7)).unwrap().balance, 44);
    assert_eq!(platform.awards.candidate_summary(UserId(12)).unwrap().balance, 9);
}

#[tokio::test]
async fn impact_score_route_serves_preview_then_snapshot() {
    let platform = platform();
    let offer = platform.store.insert_offer(impact_offer()).expect("offer stored");
    let router = impact_router(platform.moderation.clone(), platform.resolver.clone());
    let score_uri = format!("/api/v1/offers/{}/impact-score", offer.id);

    let preview = router
        .clone()
        .oneshot(Request::get(score_uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(preview.status(), StatusCode::OK);
    let body = json_body(preview).await;
    assert_eq!(body["is_preview"], Value::Bool(true));
    assert_eq!(body["total_score"], 44);

    let moderated = router
        .clone()
        .oneshot(
            Request::post(format!("/api/v1/offers/{}/moderation", offer.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(moderated.status(), StatusCode::OK);

    let snapshot = router
        .oneshot(Request::get(score_uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let body = json_body(snapshot).await;
    assert_eq!(body["is_preview"], Value::Bool(false));
    assert_eq!(body["society"], 75);
}

#[tokio::test]
async fn missing_offer_is_not_found() {
    let platform = platform();
    let router = impact_router(platform.moderation.clone(), platform.resolver.clone());

    let response = router
        .oneshot(
            Request::get("/api/v1/offers/999/impact-score")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
