use sqlx::PgPool;

use super::gateway::BillingGateway;
use super::models::Plan;
use super::state::BillingState;
use crate::accounts::{self, Account};
use crate::error::{AppError, AppResult};
use crate::notifications::{Notice, Notifier};

/// key: billing-service -> account lifecycle
#[derive(Clone)]
pub struct BillingService {
    pool: PgPool,
}

impl BillingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Marks the account paid. Safe to call repeatedly; each invocation
    /// emits exactly one notice (subject to the fakemail gate).
    pub async fn pay(&self, account_id: i32, notifier: &dyn Notifier) -> AppResult<Account> {
        let account = accounts::find(&self.pool, account_id).await?;
        let transition = account.state()?.pay();
        let account = self.persist_state(account.id, transition.next).await?;
        if let Some(notice) = transition.notice {
            accounts::notify(&account, notice, notifier).await;
        }
        Ok(account)
    }

    pub async fn unpay(&self, account_id: i32, notifier: &dyn Notifier) -> AppResult<Account> {
        let account = accounts::find(&self.pool, account_id).await?;
        let transition = account.state()?.unpay();
        let account = self.persist_state(account.id, transition.next).await?;
        if let Some(notice) = transition.notice {
            accounts::notify(&account, notice, notifier).await;
        }
        Ok(account)
    }

    pub async fn start_trial(&self, account_id: i32) -> AppResult<Account> {
        let account = accounts::find(&self.pool, account_id).await?;
        let transition = account.state()?.start_trial();
        self.persist_state(account.id, transition.next).await
    }

    /// Notifies the account of a failed charge without touching its state.
    pub async fn payment_failed(&self, account_id: i32, notifier: &dyn Notifier) -> AppResult<()> {
        let account = accounts::find(&self.pool, account_id).await?;
        accounts::notify(&account, Notice::PaymentFailed, notifier).await;
        Ok(())
    }

    /// Reassigns the plan and pushes the change to the remote subscription.
    /// The gateway is called before anything is written; its errors
    /// propagate unchanged and leave the account untouched.
    pub async fn update_plan(
        &self,
        account_id: i32,
        plan: &Plan,
        gateway: &dyn BillingGateway,
    ) -> AppResult<Account> {
        let account = accounts::find(&self.pool, account_id).await?;
        let token = account
            .billing_customer_token
            .as_deref()
            .ok_or_else(|| AppError::BadRequest("account has no billing customer".into()))?;

        let customer = gateway
            .retrieve_customer(token)
            .await
            .map_err(AppError::Gateway)?;
        gateway
            .update_subscription(&customer, &plan.code)
            .await
            .map_err(AppError::Gateway)?;

        let transition = account.state()?.on_plan_change(plan);
        let account = sqlx::query_as::<_, Account>(
            "UPDATE accounts SET plan_id = $2, billing_state = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(account.id)
        .bind(plan.id)
        .bind(transition.next.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }

    async fn persist_state(&self, account_id: i32, next: BillingState) -> AppResult<Account> {
        let account = sqlx::query_as::<_, Account>(
            "UPDATE accounts SET billing_state = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING *",
        )
        .bind(account_id)
        .bind(next.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }
}
