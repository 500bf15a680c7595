use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use super::service::{CheckoutActor, CheckoutStart, SubscriptionService, WebhookOutcome};
use super::stripe::SIGNATURE_HEADER;
use crate::error::AppError;
use crate::types::{CompanyId, UserId};

/// Checkout initiation and provider webhook intake.
pub fn billing_router(service: Arc<SubscriptionService>) -> Router {
    Router::new()
        .route("/api/v1/companies/:company_id/checkout", post(checkout_handler))
        .route("/api/v1/billing/webhooks/:provider", post(webhook_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckoutBody {
    pub(crate) plan_code: String,
    pub(crate) user_id: UserId,
    #[serde(default)]
    pub(crate) email: String,
}

pub(crate) async fn checkout_handler(
    State(service): State<Arc<SubscriptionService>>,
    Path(company_id): Path<i64>,
    Json(body): Json<CheckoutBody>,
) -> Result<(StatusCode, Json<CheckoutStart>), AppError> {
    let actor = CheckoutActor {
        user_id: body.user_id,
        email: body.email,
    };
    let start = service
        .start_checkout(CompanyId(company_id), &actor, &body.plan_code, Utc::now())
        .await?;
    let status = if start.already_processed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(start)))
}

pub(crate) async fn webhook_handler(
    State(service): State<Arc<SubscriptionService>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookOutcome>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let outcome = service.handle_webhook(&provider, &body, signature, Utc::now())?;
    Ok(Json(outcome))
}
