use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{CompanyId, PaymentId, Timestamp, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Canceled,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Succeeded => "SUCCEEDED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Canceled => "CANCELED",
        }
    }

    /// Case-insensitive; anything unrecognized is treated as still pending.
    pub fn normalize(raw: &str) -> Self {
        Self::parse_final(raw).unwrap_or(PaymentStatus::Pending)
    }

    /// Only the three final statuses a provider can report.
    pub fn parse_final(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUCCEEDED" => Some(PaymentStatus::Succeeded),
            "FAILED" => Some(PaymentStatus::Failed),
            "CANCELED" => Some(PaymentStatus::Canceled),
            _ => None,
        }
    }
}

/// One checkout attempt for a company, plan and billing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPayment {
    pub id: PaymentId,
    pub company_id: CompanyId,
    pub initiated_by: UserId,
    pub plan_code: String,
    pub amount_cents: i64,
    pub currency: String,
    pub provider: String,
    pub provider_session_id: Option<String>,
    pub provider_payment_id: Option<String>,
    pub status: PaymentStatus,
    pub idempotency_key: String,
    /// Provider response snapshot plus the folded webhook history.
    pub provider_payload: Map<String, Value>,
    pub paid_at: Option<Timestamp>,
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl SubscriptionPayment {
    pub fn is_succeeded(&self) -> bool {
        self.status == PaymentStatus::Succeeded
    }

    /// Hosted checkout page stored at creation time, if the provider gave one.
    pub fn checkout_url(&self) -> Option<String> {
        self.provider_payload
            .get("checkoutUrl")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
    }
}

/// Company plan projection, derived from succeeded payments only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPlan {
    pub company_id: CompanyId,
    pub plan_code: String,
    pub started_at: Timestamp,
    pub expires_at: Timestamp,
}
