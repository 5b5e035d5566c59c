use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::billing::models::Plan;
use crate::billing::state::BillingState;
use crate::config;
use crate::error::{AppError, AppResult};
use crate::notifications::{Notice, Notifier};

/// key: accounts-model -> billed user entity
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: i32,
    pub email: String,
    pub nickname: String,
    pub github_uid: Option<i64>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub billing_state: String,
    pub plan_id: Uuid,
    pub billing_customer_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// The column carries text; the CHECK constraint keeps it to the three
    /// known values, so a parse failure here means a broken row.
    pub fn state(&self) -> AppResult<BillingState> {
        self.billing_state
            .parse()
            .map_err(|err: crate::billing::state::UnknownBillingState| {
                AppError::Message(err.to_string())
            })
    }

    /// Delegates entirely to the plan flag.
    pub fn allows_privacy(&self, plan: &Plan) -> bool {
        plan.allow_privacy
    }
}

/// True when the address belongs to a configured disposable-mail domain.
/// Only gates outbound notices; account actions are never blocked on it.
pub fn is_fakemail(email: &str) -> bool {
    let domain = match email.rsplit_once('@') {
        Some((_, domain)) => domain.to_ascii_lowercase(),
        None => return false,
    };
    config::FAKEMAIL_DOMAINS
        .iter()
        .any(|fake| domain == *fake || domain.ends_with(&format!(".{fake}")))
}

/// Dispatches a notice through the injected port, suppressing delivery for
/// disposable addresses.
pub async fn notify(account: &Account, notice: Notice, notifier: &dyn Notifier) {
    if is_fakemail(&account.email) {
        tracing::debug!(
            account_id = account.id,
            ?notice,
            "suppressing notice for disposable address"
        );
        return;
    }
    notifier.deliver(account, notice).await;
}

pub async fn find(pool: &PgPool, account_id: i32) -> AppResult<Account> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn find_by_customer_token(pool: &PgPool, token: &str) -> AppResult<Account> {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE billing_customer_token = $1")
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn plan_of(pool: &PgPool, account: &Account) -> AppResult<Plan> {
    sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
        .bind(account.plan_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn plan(allow_privacy: bool) -> Plan {
        Plan {
            id: Uuid::new_v4(),
            code: "basic".to_string(),
            name: "Basic".to_string(),
            amount_cents: 500,
            trial_period_days: 7,
            allow_privacy,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn account(email: &str) -> Account {
        Account {
            id: 1,
            email: email.to_string(),
            nickname: "flyerhzm".to_string(),
            github_uid: Some(66836),
            password_hash: "hashed".to_string(),
            billing_state: "unpaid".to_string(),
            plan_id: Uuid::new_v4(),
            billing_customer_token: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn regular_address_is_not_fakemail() {
        assert!(!is_fakemail("flyerhzm@gmail.com"));
    }

    #[test]
    fn disposable_address_is_fakemail() {
        assert!(is_fakemail("flyerhzm-test@fakemail.com"));
        assert!(is_fakemail("anyone@mail.FAKEMAIL.com"));
    }

    #[test]
    fn address_without_domain_is_not_fakemail() {
        assert!(!is_fakemail("not-an-address"));
    }

    #[test]
    fn privacy_follows_the_plan_flag() {
        let account = account("flyerhzm@gmail.com");
        assert!(account.allows_privacy(&plan(true)));
        assert!(!account.allows_privacy(&plan(false)));
    }

    #[test]
    fn state_parses_the_stored_column() {
        let mut account = account("flyerhzm@gmail.com");
        assert_eq!(account.state().unwrap(), BillingState::Unpaid);
        account.billing_state = "paid".to_string();
        assert_eq!(account.state().unwrap(), BillingState::Paid);
    }
}
