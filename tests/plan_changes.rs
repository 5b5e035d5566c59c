use httpmock::prelude::*;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use repolint::accounts::Account;
use repolint::billing::{BillingService, Plan, StripeLikeGateway};
use repolint::error::AppError;

async fn seed_plan(pool: &PgPool, code: &str, amount_cents: i32, trial_period_days: i32) -> Plan {
    sqlx::query_as::<_, Plan>(
        "INSERT INTO plans (id, code, name, amount_cents, trial_period_days) \
         VALUES ($1, $2, INITCAP($2), $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(code)
    .bind(amount_cents)
    .bind(trial_period_days)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn seed_account(pool: &PgPool, plan: &Plan, state: &str, token: Option<&str>) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO accounts (email, nickname, password_hash, plan_id, billing_state, \
         billing_customer_token) VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind("flyerhzm@gmail.com")
    .bind("flyerhzm")
    .bind("hashed")
    .bind(plan.id)
    .bind(state)
    .bind(token)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn fetch_account(pool: &PgPool, account_id: i32) -> Account {
    sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

// key: plan-change-tests -> gateway sync,state policy
#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn free_to_basic_enters_trial(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let free = seed_plan(&pool, "freebie", 0, 0).await;
    let basic = seed_plan(&pool, "basic", 500, 7).await;
    let account_id = seed_account(&pool, &free, "unpaid", Some("123456")).await;

    let server = MockServer::start_async().await;
    let retrieve = server.mock(|when, then| {
        when.method(GET).path("/v1/customers/123456");
        then.status(200).json_body(json!({ "id": "cus_1" }));
    });
    let update = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/customers/cus_1/subscription")
            .json_body(json!({ "plan": "basic" }));
        then.status(200).json_body(json!({}));
    });

    let gateway = StripeLikeGateway::new(&server.base_url(), None).unwrap();
    let service = BillingService::new(pool.clone());
    service
        .update_plan(account_id, &basic, &gateway)
        .await
        .unwrap();

    retrieve.assert_async().await;
    update.assert_async().await;

    let account = fetch_account(&pool, account_id).await;
    assert_eq!(account.billing_state, "trial");
    assert_eq!(account.plan_id, basic.id);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn basic_to_free_drops_to_unpaid(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let free = seed_plan(&pool, "freebie", 0, 0).await;
    let basic = seed_plan(&pool, "basic", 500, 7).await;
    let account_id = seed_account(&pool, &basic, "trial", Some("123456")).await;

    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/123456");
        then.status(200).json_body(json!({ "id": "cus_1" }));
    });
    let update = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/customers/cus_1/subscription")
            .json_body(json!({ "plan": "freebie" }));
        then.status(200).json_body(json!({}));
    });

    let gateway = StripeLikeGateway::new(&server.base_url(), None).unwrap();
    let service = BillingService::new(pool.clone());
    service
        .update_plan(account_id, &free, &gateway)
        .await
        .unwrap();

    update.assert_async().await;

    let account = fetch_account(&pool, account_id).await;
    assert_eq!(account.billing_state, "unpaid");
    assert_eq!(account.plan_id, free.id);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn gateway_failure_propagates_and_leaves_the_account_alone(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let free = seed_plan(&pool, "freebie", 0, 0).await;
    let basic = seed_plan(&pool, "basic", 500, 7).await;
    let account_id = seed_account(&pool, &free, "unpaid", Some("123456")).await;

    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(GET).path("/v1/customers/123456");
        then.status(500);
    });

    let gateway = StripeLikeGateway::new(&server.base_url(), None).unwrap();
    let service = BillingService::new(pool.clone());
    let err = service
        .update_plan(account_id, &basic, &gateway)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Gateway(_)), "got {err:?}");

    let account = fetch_account(&pool, account_id).await;
    assert_eq!(account.billing_state, "unpaid");
    assert_eq!(account.plan_id, free.id, "no partial plan reassignment");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn update_plan_requires_a_customer_token(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let free = seed_plan(&pool, "freebie", 0, 0).await;
    let basic = seed_plan(&pool, "basic", 500, 7).await;
    let account_id = seed_account(&pool, &free, "unpaid", None).await;

    let server = MockServer::start_async().await;
    let gateway = StripeLikeGateway::new(&server.base_url(), None).unwrap();
    let service = BillingService::new(pool.clone());
    let err = service
        .update_plan(account_id, &basic, &gateway)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "got {err:?}");
}
