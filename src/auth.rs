use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::error;

use crate::accounts::{self, Account};
use crate::billing::Plan;
use crate::error::{AppError, AppResult};
use crate::extractor::AuthAccount;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub nickname: String,
    pub password: String,
    #[serde(default)]
    pub github_uid: Option<i64>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
struct Claims {
    sub: i32,
    nick: String,
    exp: usize,
}

#[derive(Serialize)]
pub struct AccountInfo {
    pub id: i32,
    pub email: String,
    pub nickname: String,
    pub billing_state: String,
    pub allow_privacy: bool,
    pub plan: Plan,
}

pub async fn register_account(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<StatusCode> {
    if payload.password.len() < 8 {
        return Err(AppError::BadRequest("Password too short".into()));
    }
    if payload.nickname.trim().is_empty() {
        return Err(AppError::BadRequest("Nickname required".into()));
    }
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| AppError::Message(format!("Hashing failed: {}", e)))?;

    // New signups land on the cheapest active free plan.
    let free_plan = sqlx::query_as::<_, Plan>(
        "SELECT * FROM plans WHERE amount_cents = 0 AND active = TRUE \
         ORDER BY created_at ASC LIMIT 1",
    )
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::Message("no default plan configured".into()))?;

    let result = sqlx::query(
        "INSERT INTO accounts (email, nickname, github_uid, password_hash, plan_id) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&payload.email)
    .bind(payload.nickname.trim())
    .bind(payload.github_uid)
    .bind(hash.to_string())
    .bind(free_plan.id)
    .execute(&pool)
    .await;
    match result {
        Ok(_) => Ok(StatusCode::CREATED),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("accounts_email_key") {
                    return Err(AppError::BadRequest("Email already registered".into()));
                }
                if db_err.constraint() == Some("accounts_nickname_key") {
                    return Err(AppError::BadRequest("Nickname already taken".into()));
                }
            }
            Err(AppError::Db(e))
        }
    }
}

pub async fn login_account(
    Extension(pool): Extension<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<(HeaderMap, &'static str)> {
    let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = $1")
        .bind(&payload.email)
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            error!(?e, "DB error while fetching account");
            AppError::Db(e)
        })?;
    let account = account.ok_or(AppError::Unauthorized)?;
    let parsed = PasswordHash::new(&account.password_hash).map_err(|e| {
        error!(?e, "Hash parse error");
        AppError::Message(format!("Hash error: {}", e))
    })?;
    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed)
        .is_err()
    {
        return Err(AppError::Unauthorized);
    }
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .expect("valid timestamp")
        .timestamp() as usize;
    let claims = Claims {
        sub: account.id,
        nick: account.nickname.clone(),
        exp,
    };
    let secret = crate::config::JWT_SECRET.as_str();
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| {
        error!(?e, "Token encoding error");
        AppError::Message("Token error".into())
    })?;
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        format!("auth_token={token}; HttpOnly; Secure; SameSite=Strict; Path=/")
            .parse()
            .expect("valid header value"),
    );
    Ok((headers, "Login successful"))
}

pub async fn logout_account() -> (HeaderMap, &'static str) {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::SET_COOKIE,
        "auth_token=deleted; HttpOnly; Path=/; Max-Age=0"
            .parse()
            .expect("valid header value"),
    );
    (headers, "Logged out")
}

pub async fn current_account(
    Extension(pool): Extension<PgPool>,
    AuthAccount { account_id, .. }: AuthAccount,
) -> AppResult<Json<AccountInfo>> {
    let account = accounts::find(&pool, account_id).await?;
    let plan = accounts::plan_of(&pool, &account).await?;
    Ok(Json(AccountInfo {
        id: account.id,
        email: account.email,
        nickname: account.nickname,
        billing_state: account.billing_state,
        allow_privacy: plan.allow_privacy,
        plan,
    }))
}
