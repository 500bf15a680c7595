use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;
use workplus::billing::{
    FakeCheckoutGateway, GatewayRegistry, StripeCheckoutGateway, SubscriptionError,
    SubscriptionService,
};
use workplus::config::{AppConfig, BillingConfig};
use workplus::error::AppError;
use workplus::impact::{
    EligibilityEngine, EligibilityRules, EvidenceProvider, ImpactScoreResolver,
    ImpactScoringEngine, ModerationError, ModerationService, PublicApiEvidenceProvider,
    ScoringRules, TimeoutEvidenceProvider,
};
use workplus::points::claims::LogNotifier;
use workplus::points::{AwardRules, ClaimRules, PointAwards, PointsClaimService, PointsLedger};
use workplus::store::MemoryStore;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Every component wired over one shared store.
pub(crate) struct Services {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) moderation: Arc<ModerationService>,
    pub(crate) resolver: Arc<ImpactScoreResolver>,
    pub(crate) awards: Arc<PointAwards>,
    pub(crate) claims: Arc<PointsClaimService>,
    pub(crate) billing: Arc<SubscriptionService>,
}

pub(crate) fn in_memory_services(
    evidence: Arc<dyn EvidenceProvider>,
    gateways: GatewayRegistry,
    billing: &BillingConfig,
    claim_rules: ClaimRules,
) -> Services {
    let store = Arc::new(MemoryStore::new());
    let scoring = Arc::new(ImpactScoringEngine::new(evidence, ScoringRules::default()));
    let ledger = Arc::new(PointsLedger::new(store.clone()));
    let awards = Arc::new(PointAwards::new(
        ledger.clone(),
        store.clone(),
        AwardRules::default(),
    ));

    let moderation = ModerationService::new(
        EligibilityEngine::new(scoring.clone(), EligibilityRules::default()),
        store.clone(),
        store.clone(),
        store.clone(),
    )
    .with_publication_awards(awards.clone());
    let resolver = ImpactScoreResolver::new(store.clone(), store.clone(), scoring);
    let claims = PointsClaimService::new(
        store.clone(),
        store.clone(),
        ledger,
        Arc::new(LogNotifier),
        claim_rules,
    );
    let subscriptions = SubscriptionService::new(store.clone(), store.clone(), gateways, billing);

    Services {
        store,
        moderation: Arc::new(moderation),
        resolver: Arc::new(resolver),
        awards,
        claims: Arc::new(claims),
        billing: Arc::new(subscriptions),
    }
}

/// Public registry and geo APIs, bounded by the configured timeout.
pub(crate) fn public_evidence_provider(config: &AppConfig) -> Result<Arc<dyn EvidenceProvider>, AppError> {
    let provider = PublicApiEvidenceProvider::new(&config.evidence).map_err(ModerationError::from)?;
    Ok(Arc::new(TimeoutEvidenceProvider::new(
        provider,
        config.evidence.timeout,
    )))
}

/// The fake gateway is always available; Stripe joins once credentials are present.
pub(crate) fn gateway_registry(config: &BillingConfig) -> Result<GatewayRegistry, AppError> {
    let registry = GatewayRegistry::new().register(Arc::new(FakeCheckoutGateway));
    if config.stripe_secret_key.is_none() && config.stripe_webhook_secret.is_none() {
        return Ok(registry);
    }

    let stripe = StripeCheckoutGateway::new(config).map_err(SubscriptionError::from)?;
    Ok(registry.register(Arc::new(stripe)))
}

pub(crate) fn build_services(config: &AppConfig) -> Result<Services, AppError> {
    let evidence = public_evidence_provider(config)?;
    let gateways = gateway_registry(&config.billing)?;
    let claim_rules = ClaimRules::for_mode(config.claims.manual_review);
    info!(
        provider = %config.billing.provider,
        gateways = ?gateways.providers().collect::<Vec<_>>(),
        claim_rules = %claim_rules.rule_version,
        "services wired"
    );
    Ok(in_memory_services(
        evidence,
        gateways,
        &config.billing,
        claim_rules,
    ))
}
