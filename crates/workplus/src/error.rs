use crate::billing::{GatewayError, SubscriptionError};
use crate::config::ConfigError;
use crate::impact::{EvidenceError, ModerationError};
use crate::points::{ClaimError, LedgerError};
use crate::store::RepositoryError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use tracing::error;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Moderation(ModerationError),
    Ledger(LedgerError),
    Claim(ClaimError),
    Subscription(SubscriptionError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Moderation(err) => match err {
                ModerationError::OfferNotFound(_) => StatusCode::NOT_FOUND,
                ModerationError::Evidence(err) => evidence_status(err),
                ModerationError::Repository(err) => repository_status(err),
            },
            AppError::Ledger(err) => ledger_status(err),
            AppError::Claim(err) => match err {
                ClaimError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ClaimError::NotFound(_) => StatusCode::NOT_FOUND,
                ClaimError::IllegalTransition { .. } | ClaimError::ManualReviewDisabled { .. } => {
                    StatusCode::CONFLICT
                }
                ClaimError::Repository(err) => repository_status(err),
                ClaimError::Ledger(err) => ledger_status(err),
            },
            AppError::Subscription(err) => match err {
                SubscriptionError::Invalid(_) | SubscriptionError::UnknownPlan(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                SubscriptionError::Gateway(err) => gateway_status(err),
                SubscriptionError::Repository(err) => repository_status(err),
            },
        }
    }
}

fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::Repository(err) => repository_status(err),
    }
}

fn evidence_status(err: &EvidenceError) -> StatusCode {
    match err {
        EvidenceError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        EvidenceError::Transport(_) | EvidenceError::Status { .. } | EvidenceError::Malformed(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

fn gateway_status(err: &GatewayError) -> StatusCode {
    match err {
        GatewayError::UnknownProvider(_) => StatusCode::NOT_FOUND,
        GatewayError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
        err if err.is_webhook_rejection() => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Moderation(err) => write!(f, "moderation error: {}", err),
            AppError::Ledger(err) => write!(f, "ledger error: {}", err),
            AppError::Claim(err) => write!(f, "claim error: {}", err),
            AppError::Subscription(err) => write!(f, "billing error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Moderation(err) => Some(err),
            AppError::Ledger(err) => Some(err),
            AppError::Claim(err) => Some(err),
            AppError::Subscription(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ModerationError> for AppError {
    fn from(value: ModerationError) -> Self {
        Self::Moderation(value)
    }
}

impl From<LedgerError> for AppError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<ClaimError> for AppError {
    fn from(value: ClaimError) -> Self {
        Self::Claim(value)
    }
}

impl From<SubscriptionError> for AppError {
    fn from(value: SubscriptionError) -> Self {
        Self::Subscription(value)
    }
}
