use std::sync::Arc;

use axum::{extract::Extension, Json};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use super::{BillingGateway, BillingService, Plan};
use crate::accounts;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthAccount;

/// key: billing-api -> rest endpoints
pub async fn list_plans(Extension(pool): Extension<PgPool>) -> AppResult<Json<Vec<Plan>>> {
    let plans = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE active = TRUE ORDER BY amount_cents ASC, created_at ASC",
    )
    .fetch_all(&pool)
    .await?;
    Ok(Json(plans))
}

#[derive(Debug, Serialize)]
pub struct BillingEnvelope {
    pub billing_state: String,
    pub plan: Plan,
}

pub async fn get_billing(
    Extension(pool): Extension<PgPool>,
    AuthAccount { account_id, .. }: AuthAccount,
) -> AppResult<Json<BillingEnvelope>> {
    let account = accounts::find(&pool, account_id).await?;
    let plan = accounts::plan_of(&pool, &account).await?;
    Ok(Json(BillingEnvelope {
        billing_state: account.billing_state,
        plan,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub plan: String,
}

pub async fn change_plan(
    Extension(pool): Extension<PgPool>,
    Extension(gateway): Extension<Arc<dyn BillingGateway>>,
    AuthAccount { account_id, .. }: AuthAccount,
    Json(payload): Json<ChangePlanRequest>,
) -> AppResult<Json<BillingEnvelope>> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE code = $1 AND active = TRUE")
        .bind(&payload.plan)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::BadRequest(format!("unknown plan `{}`", payload.plan)))?;

    let service = BillingService::new(pool);
    let account = service
        .update_plan(account_id, &plan, gateway.as_ref())
        .await?;
    Ok(Json(BillingEnvelope {
        billing_state: account.billing_state,
        plan,
    }))
}

pub async fn start_trial(
    Extension(pool): Extension<PgPool>,
    AuthAccount { account_id, .. }: AuthAccount,
) -> AppResult<Json<BillingEnvelope>> {
    let service = BillingService::new(pool.clone());
    let account = service.start_trial(account_id).await?;
    let plan = accounts::plan_of(&pool, &account).await?;
    Ok(Json(BillingEnvelope {
        billing_state: account.billing_state,
        plan,
    }))
}
