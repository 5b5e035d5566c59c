use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use thiserror::Error;

use crate::accounts::{self, Account};
use crate::error::{AppError, AppResult};
use crate::extractor::AuthAccount;
use crate::github::{Collaborator, CollaboratorDirectory};

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Repository {
    pub id: i32,
    pub owner: String,
    pub name: String,
    pub private: bool,
    pub visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Build {
    pub id: i32,
    pub repository_id: i32,
    pub position: i32,
    pub duration_secs: i32,
    pub finished_at: DateTime<Utc>,
}

/// Raised when an account tries to attach a repository it neither owns nor
/// collaborates on. Nothing is written when this comes back.
#[derive(Debug, Error)]
#[error("{nickname} is neither the owner nor a collaborator of {full_name}")]
pub struct AuthorizationError {
    pub nickname: String,
    pub full_name: String,
}

static FULL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9-]*)/([A-Za-z0-9_.-]+)$").expect("valid pattern")
});

pub fn parse_full_name(raw: &str) -> AppResult<(String, String)> {
    let captures = FULL_NAME
        .captures(raw.trim())
        .ok_or_else(|| AppError::BadRequest(format!("malformed repository name `{raw}`")))?;
    Ok((captures[1].to_string(), captures[2].to_string()))
}

/// Ownership/collaborator decision, separated from the lookup that supplies
/// the collaborator list. Owning the namespace grants access outright;
/// otherwise the account must appear in the list, by linked GitHub uid or
/// by login.
pub fn is_authorized(account: &Account, owner: &str, collaborators: &[Collaborator]) -> bool {
    if account.nickname == owner {
        return true;
    }
    collaborators
        .iter()
        .any(|c| Some(c.id) == account.github_uid || c.login == account.nickname)
}

/// key: repos-attach -> membership flow
///
/// Returns the repository and whether a membership was newly created.
/// Re-attaching an already-linked repository is a no-op and skips the
/// collaborator lookup entirely.
pub async fn add_repository(
    pool: &PgPool,
    directory: &dyn CollaboratorDirectory,
    account: &Account,
    full_name: &str,
) -> AppResult<(Repository, bool)> {
    let (owner, name) = parse_full_name(full_name)?;

    if let Some(existing) = find_by_full_name(pool, &owner, &name).await? {
        if membership_exists(pool, account.id, existing.id).await? {
            return Ok((existing, false));
        }
    }

    let authorized = if account.nickname == owner {
        true
    } else {
        let collaborators = directory
            .list_collaborators(&owner, &name)
            .await
            .map_err(|err| AppError::BadGateway(format!("collaborator lookup failed: {err}")))?;
        is_authorized(account, &owner, &collaborators)
    };
    if !authorized {
        return Err(AuthorizationError {
            nickname: account.nickname.clone(),
            full_name: format!("{owner}/{name}"),
        }
        .into());
    }

    let repository = find_or_create(pool, &owner, &name).await?;
    sqlx::query(
        "INSERT INTO account_repositories (account_id, repository_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(account.id)
    .bind(repository.id)
    .execute(pool)
    .await?;
    Ok((repository, true))
}

async fn find_by_full_name(
    pool: &PgPool,
    owner: &str,
    name: &str,
) -> AppResult<Option<Repository>> {
    let repository =
        sqlx::query_as::<_, Repository>("SELECT * FROM repositories WHERE owner = $1 AND name = $2")
            .bind(owner)
            .bind(name)
            .fetch_optional(pool)
            .await?;
    Ok(repository)
}

async fn membership_exists(pool: &PgPool, account_id: i32, repository_id: i32) -> AppResult<bool> {
    let linked: Option<i32> = sqlx::query_scalar(
        "SELECT 1 FROM account_repositories WHERE account_id = $1 AND repository_id = $2",
    )
    .bind(account_id)
    .bind(repository_id)
    .fetch_optional(pool)
    .await?;
    Ok(linked.is_some())
}

async fn find_or_create(pool: &PgPool, owner: &str, name: &str) -> AppResult<Repository> {
    let repository = sqlx::query_as::<_, Repository>(
        "INSERT INTO repositories (owner, name) VALUES ($1, $2) \
         ON CONFLICT (owner, name) DO UPDATE SET updated_at = NOW() \
         RETURNING *",
    )
    .bind(owner)
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(repository)
}

/// Post-attach privacy/remote sync. Out-of-band: failures are logged, never
/// surfaced to the request that triggered them.
pub fn spawn_repository_sync(
    pool: PgPool,
    directory: Arc<dyn CollaboratorDirectory>,
    repository: Repository,
) {
    tokio::spawn(async move {
        match directory
            .fetch_repository(&repository.owner, &repository.name)
            .await
        {
            Ok(remote) => {
                if let Err(err) = sqlx::query(
                    "UPDATE repositories SET private = $2, visible = $3, updated_at = NOW() \
                     WHERE id = $1",
                )
                .bind(repository.id)
                .bind(remote.private)
                .bind(!remote.private)
                .execute(&pool)
                .await
                {
                    tracing::warn!(
                        ?err,
                        repository = %repository.full_name(),
                        "failed to store repository sync"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(
                    ?err,
                    repository = %repository.full_name(),
                    "repository sync failed"
                );
            }
        }
    });
}

pub async fn record_build(
    pool: &PgPool,
    repository_id: i32,
    duration_secs: i32,
) -> AppResult<Build> {
    let build = sqlx::query_as::<_, Build>(
        "INSERT INTO builds (repository_id, position, duration_secs) \
         SELECT $1, COALESCE(MAX(position), 0) + 1, $2 FROM builds WHERE repository_id = $1 \
         RETURNING *",
    )
    .bind(repository_id)
    .bind(duration_secs)
    .fetch_one(pool)
    .await?;
    Ok(build)
}

#[derive(Debug, Deserialize)]
pub struct AddRepositoryRequest {
    pub name: String,
}

pub async fn create_repository(
    Extension(pool): Extension<PgPool>,
    Extension(directory): Extension<Arc<dyn CollaboratorDirectory>>,
    AuthAccount { account_id, .. }: AuthAccount,
    Json(payload): Json<AddRepositoryRequest>,
) -> AppResult<Json<Repository>> {
    let account = accounts::find(&pool, account_id).await?;
    let (repository, created) =
        add_repository(&pool, directory.as_ref(), &account, &payload.name).await?;
    if created {
        spawn_repository_sync(pool, directory, repository.clone());
    }
    Ok(Json(repository))
}

pub async fn list_repositories(
    Extension(pool): Extension<PgPool>,
    AuthAccount { account_id, .. }: AuthAccount,
) -> AppResult<Json<Vec<Repository>>> {
    let repositories = sqlx::query_as::<_, Repository>(
        "SELECT r.* FROM repositories r \
         JOIN account_repositories m ON m.repository_id = r.id \
         WHERE m.account_id = $1 \
         ORDER BY r.owner, r.name",
    )
    .bind(account_id)
    .fetch_all(&pool)
    .await?;
    Ok(Json(repositories))
}

#[derive(Debug, FromRow, Serialize)]
pub struct PublicRepository {
    pub id: i32,
    pub owner: String,
    pub name: String,
    pub last_build_position: Option<i32>,
    pub last_build_duration_secs: Option<i32>,
    pub last_build_finished_at: Option<DateTime<Utc>>,
}

/// Listing backing the public index: visible repositories with their most
/// recent build.
pub async fn public_repositories(
    Extension(pool): Extension<PgPool>,
) -> AppResult<Json<Vec<PublicRepository>>> {
    let repositories = sqlx::query_as::<_, PublicRepository>(
        "SELECT r.id, r.owner, r.name, \
                b.position AS last_build_position, \
                b.duration_secs AS last_build_duration_secs, \
                b.finished_at AS last_build_finished_at \
         FROM repositories r \
         LEFT JOIN LATERAL ( \
             SELECT position, duration_secs, finished_at FROM builds \
             WHERE repository_id = r.id ORDER BY position DESC LIMIT 1 \
         ) b ON TRUE \
         WHERE r.visible = TRUE \
         ORDER BY r.owner, r.name",
    )
    .fetch_all(&pool)
    .await?;
    Ok(Json(repositories))
}

#[derive(Debug, Deserialize)]
pub struct RecordBuildRequest {
    pub duration_secs: i32,
}

pub async fn create_build(
    Extension(pool): Extension<PgPool>,
    AuthAccount { account_id, .. }: AuthAccount,
    Path(repository_id): Path<i32>,
    Json(payload): Json<RecordBuildRequest>,
) -> AppResult<Json<Build>> {
    if !membership_exists(&pool, account_id, repository_id).await? {
        return Err(AppError::Forbidden);
    }
    let build = record_build(&pool, repository_id, payload.duration_secs).await?;
    Ok(Json(build))
}
