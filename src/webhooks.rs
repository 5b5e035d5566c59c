use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::Extension,
    http::{HeaderMap, StatusCode},
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;

use crate::accounts;
use crate::billing::BillingService;
use crate::error::{AppError, AppResult};
use crate::notifications::{Notice, Notifier};

type HmacSha256 = Hmac<Sha256>;

/// key: webhooks-billing -> gateway event entrypoint
#[derive(Debug, Deserialize)]
pub struct BillingEvent {
    pub event: String,
    pub customer: String,
}

/// Checks a `sha256=<hex>` signature over the raw body.
pub fn verify_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_digest) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

pub async fn billing_webhook(
    Extension(pool): Extension<PgPool>,
    Extension(notifier): Extension<Arc<dyn Notifier>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<StatusCode> {
    let secret = crate::config::BILLING_WEBHOOK_SECRET
        .as_deref()
        .ok_or_else(|| AppError::Message("billing webhook secret not configured".into()))?;
    let signature = headers
        .get("x-billing-signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !verify_signature(secret, &body, signature) {
        return Err(AppError::Unauthorized);
    }

    let event: BillingEvent = serde_json::from_slice(&body)
        .map_err(|err| AppError::BadRequest(format!("malformed event: {err}")))?;
    let account = accounts::find_by_customer_token(&pool, &event.customer).await?;
    let service = BillingService::new(pool);
    match event.event.as_str() {
        "invoice.paid" => {
            service.pay(account.id, notifier.as_ref()).await?;
        }
        "invoice.payment_failed" => {
            accounts::notify(&account, Notice::PaymentFailed, notifier.as_ref()).await;
        }
        "subscription.canceled" => {
            service.unpay(account.id, notifier.as_ref()).await?;
        }
        other => {
            tracing::debug!(event = other, "ignoring billing event");
        }
    }
    Ok(StatusCode::ACCEPTED)
}
