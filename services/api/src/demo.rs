use crate::infra::{gateway_registry, in_memory_services, public_evidence_provider};
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use workplus::billing::{CheckoutActor, FAKE_PROVIDER};
use workplus::config::{AppConfig, BillingConfig};
use workplus::error::AppError;
use workplus::impact::{
    EligibilityEngine, EligibilityResult, EligibilityRules, ImpactBreakdown, ImpactScoringEngine,
    ModerationError, Offer, OfferRepository, ScoringRules, StaticEvidenceProvider,
};
use workplus::points::claims::ClaimDecision;
use workplus::points::{
    ApplicationMilestone, ApplicationRef, ClaimRules, ClaimSubmission, ClaimType, EvidenceFile,
    ExternalChecks,
};
use workplus::types::{ApplicationId, CompanyId, UserId};

const DEMO_DESCRIPTION: &str = "Nous recrutons une personne pour coordonner nos programmes \
de reemploi solidaire a Paris 75011, accompagner les equipes terrain et suivre nos \
indicateurs sociaux et environnementaux.";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Use the human-in-the-loop claim rules (mid scores go to review)
    #[arg(long)]
    pub(crate) manual_review: bool,
    /// Plan purchased in the billing part of the demo
    #[arg(long, default_value = "GROWTH")]
    pub(crate) plan: String,
    /// Print the full JSON outcome of each step
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Offer title
    #[arg(long)]
    pub(crate) title: String,
    /// Offer description, scanned for postal codes
    #[arg(long)]
    pub(crate) description: String,
    /// Impact category; repeat for several
    #[arg(long = "category")]
    pub(crate) categories: Vec<String>,
    /// Company name looked up in the registry
    #[arg(long)]
    pub(crate) company_name: String,
}

#[derive(Debug, Serialize)]
struct ScoreReport {
    impact: ImpactBreakdown,
    eligibility: EligibilityResult,
}

pub(crate) async fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let scoring = Arc::new(ImpactScoringEngine::new(
        public_evidence_provider(&config)?,
        ScoringRules::default(),
    ));
    let offer = Offer::draft(
        CompanyId(0),
        args.company_name,
        args.title,
        args.description,
        args.categories,
    );

    let impact = scoring.score(&offer).await.map_err(ModerationError::from)?;
    let eligibility = EligibilityEngine::new(scoring, EligibilityRules::default())
        .evaluate(&offer)
        .await;

    print_json(&ScoreReport {
        impact,
        eligibility,
    })
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let billing = BillingConfig {
        provider: FAKE_PROVIDER.to_string(),
        stripe_secret_key: None,
        stripe_webhook_secret: None,
        webhook_tolerance: std::time::Duration::from_secs(300),
        return_url: "http://127.0.0.1:3000/recruiter/billing".to_string(),
    };
    let claim_rules = ClaimRules::for_mode(args.manual_review);
    let services = in_memory_services(
        Arc::new(StaticEvidenceProvider::verified()),
        gateway_registry(&billing)?,
        &billing,
        claim_rules.clone(),
    );
    let company = CompanyId(7);
    let now = Utc::now();

    println!("== Work+ decision core demo ==");
    println!("claim rules: {}", claim_rules.rule_version);

    let offer = services
        .store
        .insert_offer(Offer::draft(
            company,
            "Atelier Solidaire",
            "Coordinateur reemploi",
            DEMO_DESCRIPTION,
            vec!["societe".into(), "ges".into(), "biodiversite".into()],
        ))
        .map_err(ModerationError::from)?;
    let moderation = services
        .moderation
        .moderate_for_publication(offer.id, Some(UserId(1)), now)
        .await?;
    println!(
        "\n[moderation] offer {} -> {} / {} (score {}, reason {})",
        moderation.offer.id,
        moderation.offer.moderation_status.label(),
        moderation.offer.status.label(),
        moderation.result.score,
        moderation.result.reason.code(),
    );
    if let Some(credit) = &moderation.publication_credit {
        println!("[points] company credited {} for publication", credit.points);
    }
    if args.json {
        print_json(&moderation)?;
    }

    let application = ApplicationRef {
        id: ApplicationId(1),
        candidate: Some(UserId(12)),
        offer: Some(moderation.offer.id),
    };
    let credit = services
        .awards
        .award_application(&application, ApplicationMilestone::Submitted, now)?;
    println!(
        "[points] candidate credited {} for applying",
        credit.map_or(0, |entry| entry.points)
    );

    let strong = services
        .claims
        .submit(demo_claim(company, "demo-claim-strong", 4, true), now)?;
    print_claim("strong evidence", &strong);
    let weak = services
        .claims
        .submit(demo_claim(company, "demo-claim-weak", 1, false), now)?;
    print_claim("thin evidence", &weak);
    if args.json {
        print_json(&strong)?;
        print_json(&weak)?;
    }

    let actor = CheckoutActor {
        user_id: UserId(1),
        email: "owner@atelier-solidaire.example".to_string(),
    };
    let checkout = services
        .billing
        .start_checkout(company, &actor, &args.plan, now)
        .await?;
    let repeat = services
        .billing
        .start_checkout(company, &actor, &args.plan, now)
        .await?;
    println!(
        "\n[billing] {} checkout -> {} (already processed on retry: {})",
        checkout.payment.plan_code,
        checkout.payment.status.label(),
        repeat.already_processed,
    );
    if let Some(plan) = services.billing.current_plan(company)? {
        println!(
            "[billing] plan {} active until {}",
            plan.plan_code,
            plan.expires_at.format("%Y-%m-%d")
        );
    }

    let summary = services.awards.company_summary(company)?;
    let candidate = services.awards.candidate_summary(UserId(12))?;
    println!(
        "\n[balances] company {} points, candidate {} points ({})",
        summary.balance,
        candidate.balance,
        candidate.level.label()
    );
    Ok(())
}

/// Four documents, `valid` of them technically valid, optionally fully corroborated.
fn demo_claim(company: CompanyId, key: &str, valid: usize, corroborated: bool) -> ClaimSubmission {
    let evidence_files = (0..4)
        .map(|index| EvidenceFile {
            name: format!("{key}-{index}.pdf"),
            storage_ref: format!("demo/{key}/{index}.pdf"),
            mime_type: "application/pdf".to_string(),
            size_bytes: 20_480,
            content_hash: format!("{key}-{index}"),
            valid: index < valid,
        })
        .collect();
    let external_checks = corroborated.then(|| ExternalChecks {
        coherence_ok: Some(true),
        checks: ["registry", "vat", "address", "website"]
            .into_iter()
            .map(|name| (name.to_string(), serde_json::Value::Bool(true)))
            .collect(),
    });

    ClaimSubmission {
        company_id: company,
        claim_type: ClaimType::Training,
        evidence_files,
        idempotency_key: key.to_string(),
        offer_id: None,
        evidence_issued_on: None,
        external_checks,
    }
}

fn print_claim(label: &str, decision: &ClaimDecision) {
    let claim = &decision.claim;
    println!(
        "\n[claim] {label}: score {} -> {} ({}), credited {}",
        claim.evidence_score,
        claim.status.label(),
        claim.decision_reason_code.as_deref().unwrap_or("-"),
        decision
            .ledger_entry
            .as_ref()
            .map_or(0, |entry| entry.points)
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}
