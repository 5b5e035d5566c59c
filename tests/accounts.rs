use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use sqlx::PgPool;
use uuid::Uuid;

use repolint::accounts::{self, Account};
use repolint::auth::{self, RegisterRequest};
use repolint::billing::BillingService;
use repolint::notifications::{Notice, RecordingNotifier};

async fn free_plan_id(pool: &PgPool) -> Uuid {
    sqlx::query_scalar("SELECT id FROM plans WHERE code = 'free'")
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn seed_account(pool: &PgPool, nickname: &str, email: &str) -> i32 {
    let plan_id = free_plan_id(pool).await;
    sqlx::query_scalar(
        "INSERT INTO accounts (email, nickname, password_hash, plan_id) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(email)
    .bind(nickname)
    .bind("hashed")
    .bind(plan_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn fetch_account(pool: &PgPool, account_id: i32) -> Account {
    accounts::find(pool, account_id).await.unwrap()
}

// key: accounts-tests -> lifecycle,notices
#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn registration_defaults_to_the_free_plan(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let status = auth::register_account(
        Extension(pool.clone()),
        Json(RegisterRequest {
            email: "flyerhzm@gmail.com".to_string(),
            nickname: "flyerhzm".to_string(),
            password: "correct horse".to_string(),
            github_uid: Some(66836),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let account =
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = 'flyerhzm@gmail.com'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(account.billing_state, "unpaid");

    let plan = accounts::plan_of(&pool, &account).await.unwrap();
    assert!(plan.is_free());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn pay_twice_never_errors_and_stays_paid(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let account_id = seed_account(&pool, "flyerhzm", "flyerhzm@gmail.com").await;
    let service = BillingService::new(pool.clone());
    let notifier = RecordingNotifier::default();

    service.pay(account_id, &notifier).await.unwrap();
    service.pay(account_id, &notifier).await.unwrap();

    let account = fetch_account(&pool, account_id).await;
    assert_eq!(account.billing_state, "paid");
    assert_eq!(
        notifier.delivered(),
        vec![
            (account_id, Notice::PaymentSucceeded),
            (account_id, Notice::PaymentSucceeded)
        ],
        "one notice per invocation"
    );
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn unpay_always_lands_on_unpaid(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let account_id = seed_account(&pool, "flyerhzm", "flyerhzm@gmail.com").await;
    let service = BillingService::new(pool.clone());
    let notifier = RecordingNotifier::default();

    service.pay(account_id, &notifier).await.unwrap();
    service.unpay(account_id, &notifier).await.unwrap();

    let account = fetch_account(&pool, account_id).await;
    assert_eq!(account.billing_state, "unpaid");
    assert_eq!(
        notifier.delivered().last(),
        Some(&(account_id, Notice::PaymentLapsed))
    );
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn start_trial_lands_on_trial_without_notice(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let account_id = seed_account(&pool, "flyerhzm", "flyerhzm@gmail.com").await;
    let service = BillingService::new(pool.clone());

    service.start_trial(account_id).await.unwrap();

    let account = fetch_account(&pool, account_id).await;
    assert_eq!(account.billing_state, "trial");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn fakemail_accounts_get_no_notices(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let account_id = seed_account(&pool, "test", "test@fakemail.com").await;
    let service = BillingService::new(pool.clone());
    let notifier = RecordingNotifier::default();

    service.pay(account_id, &notifier).await.unwrap();
    service.unpay(account_id, &notifier).await.unwrap();
    service.payment_failed(account_id, &notifier).await.unwrap();

    let account = fetch_account(&pool, account_id).await;
    assert_eq!(account.billing_state, "unpaid", "actions are never blocked");
    assert!(notifier.delivered().is_empty(), "delivery is suppressed");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn privacy_follows_the_plan(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let account_id = seed_account(&pool, "flyerhzm", "flyerhzm@gmail.com").await;
    let account = fetch_account(&pool, account_id).await;
    let free = accounts::plan_of(&pool, &account).await.unwrap();
    assert!(!account.allows_privacy(&free));

    let private_plan_id: Uuid = sqlx::query_scalar(
        "INSERT INTO plans (id, code, name, amount_cents, trial_period_days, allow_privacy) \
         VALUES ($1, 'pro', 'Pro', 2500, 0, TRUE) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .fetch_one(&pool)
    .await
    .unwrap();
    sqlx::query("UPDATE accounts SET plan_id = $2 WHERE id = $1")
        .bind(account_id)
        .bind(private_plan_id)
        .execute(&pool)
        .await
        .unwrap();

    let account = fetch_account(&pool, account_id).await;
    let pro = accounts::plan_of(&pool, &account).await.unwrap();
    assert!(account.allows_privacy(&pro));
}
