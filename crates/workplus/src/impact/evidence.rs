use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::Offer;

/// Company registry findings. Field names follow the stored JSON payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompanyEvidence {
    pub checked: bool,
    pub found: bool,
    pub active: bool,
    pub is_ess: bool,
    pub is_mission_company: bool,
    pub has_ges_report: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationEvidence {
    pub checked: bool,
    pub validated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Structured result of the external verification step.
///
/// Known shapes are typed; anything else a provider returns lands in `extra`
/// so schema drift never fails deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceDocument {
    pub company: CompanyEvidence,
    pub location: LocationEvidence,
    pub sources: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// What the provider is asked about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceQuery {
    pub company_name: String,
    pub description: String,
}

impl EvidenceQuery {
    pub fn for_offer(offer: &Offer) -> Self {
        Self {
            company_name: offer.company_name.clone(),
            description: offer.description.clone(),
        }
    }
}

/// Source of evidence documents (registry + geocoding, or a fixture).
#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    async fn collect(&self, query: &EvidenceQuery) -> Result<EvidenceDocument, EvidenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EvidenceError {
    #[error("evidence provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("evidence transport failed: {0}")]
    Transport(String),
    #[error("evidence provider answered with HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("evidence payload malformed: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for EvidenceError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Malformed(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Bounds every call of the wrapped provider.
pub struct TimeoutEvidenceProvider<P> {
    inner: P,
    timeout: Duration,
}

impl<P> TimeoutEvidenceProvider<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<P> EvidenceProvider for TimeoutEvidenceProvider<P>
where
    P: EvidenceProvider,
{
    async fn collect(&self, query: &EvidenceQuery) -> Result<EvidenceDocument, EvidenceError> {
        match tokio::time::timeout(self.timeout, self.inner.collect(query)).await {
            Ok(result) => result,
            Err(_) => Err(EvidenceError::Timeout(self.timeout)),
        }
    }
}

/// Returns the same document for every query. Used by the demo and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEvidenceProvider {
    document: EvidenceDocument,
}

impl StaticEvidenceProvider {
    pub fn new(document: EvidenceDocument) -> Self {
        Self { document }
    }

    /// Fully verified, active social-economy company with a GHG report.
    pub fn verified() -> Self {
        Self::new(EvidenceDocument {
            company: CompanyEvidence {
                checked: true,
                found: true,
                active: true,
                is_ess: true,
                is_mission_company: false,
                has_ges_report: true,
                source: Some("static".to_string()),
            },
            location: LocationEvidence {
                checked: true,
                validated: true,
                postal_code: Some("75011".to_string()),
                source: Some("static".to_string()),
            },
            sources: vec!["static".to_string()],
            extra: BTreeMap::new(),
        })
    }
}

#[async_trait]
impl EvidenceProvider for StaticEvidenceProvider {
    async fn collect(&self, _query: &EvidenceQuery) -> Result<EvidenceDocument, EvidenceError> {
        Ok(self.document.clone())
    }
}
