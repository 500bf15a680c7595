use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::evidence::{
    CompanyEvidence, EvidenceDocument, EvidenceError, EvidenceProvider, EvidenceQuery,
    LocationEvidence,
};
use crate::config::EvidenceConfig;

const COMPANY_SOURCE: &str = "recherche-entreprises.api.gouv.fr";
const GEO_SOURCE: &str = "geo.api.gouv.fr";
const MAX_POSTAL_CODES: usize = 2;

/// Evidence from the French public company registry and geo APIs.
pub struct PublicApiEvidenceProvider {
    client: reqwest::Client,
    company_search_url: String,
    geo_url: String,
}

impl PublicApiEvidenceProvider {
    pub fn new(config: &EvidenceConfig) -> Result<Self, EvidenceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("workplus-impact-bot/1.0")
            .build()?;

        Ok(Self {
            client,
            company_search_url: trim_query_suffix(&config.company_search_url),
            geo_url: trim_query_suffix(&config.geo_url),
        })
    }

    async fn verify_company(&self, company_name: &str) -> Result<CompanyEvidence, EvidenceError> {
        let name = company_name.trim();
        if name.is_empty() {
            return Ok(CompanyEvidence::default());
        }

        let payload = self
            .get_json(
                &self.company_search_url,
                &[("q", name), ("page", "1"), ("per_page", "5")],
            )
            .await?;

        let Some(results) = payload.get("results").and_then(Value::as_array) else {
            return Ok(CompanyEvidence {
                source: Some(COMPANY_SOURCE.to_string()),
                ..CompanyEvidence::default()
            });
        };

        let Some(hit) = best_company_match(name, results) else {
            return Ok(CompanyEvidence {
                checked: true,
                source: Some(COMPANY_SOURCE.to_string()),
                ..CompanyEvidence::default()
            });
        };

        Ok(CompanyEvidence {
            checked: true,
            found: true,
            active: hit.etat_administratif.as_deref() == Some("A"),
            is_ess: truthy(&hit.complements.est_ess),
            is_mission_company: truthy(&hit.complements.est_societe_mission),
            has_ges_report: truthy(&hit.complements.bilan_ges_renseigne),
            source: Some(COMPANY_SOURCE.to_string()),
        })
    }

    async fn verify_location(&self, text: &str) -> Result<LocationEvidence, EvidenceError> {
        let codes = postal_codes(text);
        if codes.is_empty() {
            return Ok(LocationEvidence::default());
        }

        for code in &codes {
            let payload = self
                .get_json(
                    &self.geo_url,
                    &[
                        ("codePostal", code.as_str()),
                        ("fields", "nom,code,population"),
                        ("format", "json"),
                        ("geometry", "centre"),
                    ],
                )
                .await?;

            let known = payload.as_array().is_some_and(|communes| !communes.is_empty());
            debug!(postal_code = %code, known, "postal code lookup");
            if known {
                return Ok(LocationEvidence {
                    checked: true,
                    validated: true,
                    postal_code: Some(code.clone()),
                    source: Some(GEO_SOURCE.to_string()),
                });
            }
        }

        Ok(LocationEvidence {
            checked: true,
            validated: false,
            postal_code: None,
            source: Some(GEO_SOURCE.to_string()),
        })
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, EvidenceError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EvidenceError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl EvidenceProvider for PublicApiEvidenceProvider {
    async fn collect(&self, query: &EvidenceQuery) -> Result<EvidenceDocument, EvidenceError> {
        let company = self.verify_company(&query.company_name).await?;
        let location = self.verify_location(&query.description).await?;

        let sources = [company.source.clone(), location.source.clone()]
            .into_iter()
            .flatten()
            .collect();

        Ok(EvidenceDocument {
            company,
            location,
            sources,
            extra: Default::default(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompanyHit {
    nom_complet: Option<String>,
    nom_raison_sociale: Option<String>,
    etat_administratif: Option<String>,
    complements: CompanyComplements,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompanyComplements {
    est_ess: Value,
    est_societe_mission: Value,
    bilan_ges_renseigne: Value,
}

/// Exact normalized-name match first, otherwise the first usable result.
fn best_company_match(name: &str, results: &[Value]) -> Option<CompanyHit> {
    let hits: Vec<CompanyHit> = results
        .iter()
        .filter(|value| value.is_object())
        .filter_map(|value| serde_json::from_value(value.clone()).ok())
        .collect();

    let target = normalize_name(name);
    let exact = hits.iter().position(|hit| {
        [&hit.nom_complet, &hit.nom_raison_sociale]
            .into_iter()
            .flatten()
            .any(|candidate| normalize_name(candidate) == target)
    });

    let index = exact.unwrap_or(0);
    hits.into_iter().nth(index)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty() && text != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
    }
}

fn trim_query_suffix(url: &str) -> String {
    url.trim_end_matches(&['?', '&'][..]).to_string()
}

/// Lowercase, fold common accents, keep only ASCII letters and digits.
pub(crate) fn normalize_name(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(fold_accent)
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'ö' | 'õ' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Distinct standalone five-digit tokens, in order of appearance, at most two.
pub(crate) fn postal_codes(text: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for token in text.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if token.len() == 5 && token.bytes().all(|b| b.is_ascii_digit()) {
            if !codes.iter().any(|code| code == token) {
                codes.push(token.to_string());
            }
            if codes.len() == MAX_POSTAL_CODES {
                break;
            }
        }
    }
    codes
}
