use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use crate::points::awards::{AwardRules, PointAwards};
use crate::points::claims::{
    ClaimDecisionNotice, ClaimRules, ClaimSubmission, ClaimType, DecisionNotifier, EvidenceFile,
    ExternalChecks, NotifyError, PointsClaimService,
};
use crate::points::ledger::PointsLedger;
use crate::store::MemoryStore;
use crate::types::{CompanyId, Timestamp};

pub(super) fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2026, 2, 10, 9, 30, 0).unwrap()
}

pub(super) fn file(name: &str, valid: bool) -> EvidenceFile {
    EvidenceFile {
        name: name.to_string(),
        storage_ref: format!("uploads/claims/{name}"),
        mime_type: "application/pdf".to_string(),
        size_bytes: 48_213,
        content_hash: format!("sha256-{name}"),
        valid,
    }
}

pub(super) fn all_checks_passed() -> ExternalChecks {
    ExternalChecks {
        coherence_ok: Some(true),
        checks: [
            ("registry", json!(true)),
            ("vat", json!(true)),
            ("address", json!(true)),
            ("website", json!(true)),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect(),
    }
}

/// Four valid documents and four corroborating checks: score 100.
pub(super) fn strong_submission(key: &str) -> ClaimSubmission {
    ClaimSubmission {
        company_id: CompanyId(7),
        claim_type: ClaimType::Training,
        evidence_files: (1..=4)
            .map(|index| file(&format!("{key}-doc{index}.pdf"), true))
            .collect(),
        idempotency_key: key.to_string(),
        offer_id: None,
        evidence_issued_on: None,
        external_checks: Some(all_checks_passed()),
    }
}

/// Four documents, one valid, no checks: score 45.
pub(super) fn mid_submission(key: &str) -> ClaimSubmission {
    ClaimSubmission {
        evidence_files: (1..=4)
            .map(|index| file(&format!("{key}-doc{index}.pdf"), index == 1))
            .collect(),
        external_checks: None,
        ..strong_submission(key)
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    notices: Mutex<Vec<ClaimDecisionNotice>>,
}

impl RecordingNotifier {
    pub(super) fn notices(&self) -> Vec<ClaimDecisionNotice> {
        self.notices.lock().expect("notifier mutex poisoned").clone()
    }
}

impl DecisionNotifier for RecordingNotifier {
    fn notify(&self, notice: ClaimDecisionNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notifier mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct BrokenNotifier;

impl DecisionNotifier for BrokenNotifier {
    fn notify(&self, _notice: ClaimDecisionNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp offline".to_string()))
    }
}

pub(super) struct ClaimHarness {
    pub(super) store: Arc<MemoryStore>,
    pub(super) ledger: Arc<PointsLedger>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) service: Arc<PointsClaimService>,
}

pub(super) fn claim_harness(rules: ClaimRules) -> ClaimHarness {
    let store = Arc::new(MemoryStore::new());
    let ledger = Arc::new(PointsLedger::new(store.clone()));
    let notifier = Arc::new(RecordingNotifier::default());
    let service = Arc::new(PointsClaimService::new(
        store.clone(),
        store.clone(),
        ledger.clone(),
        notifier.clone(),
        rules,
    ));
    ClaimHarness {
        store,
        ledger,
        notifier,
        service,
    }
}

pub(super) fn awards_over(store: &Arc<MemoryStore>) -> Arc<PointAwards> {
    let ledger = Arc::new(PointsLedger::new(store.clone()));
    Arc::new(PointAwards::new(ledger, store.clone(), AwardRules::default()))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
