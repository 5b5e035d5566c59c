use axum::{
    routing::{get, post},
    Router,
};

use crate::{auth, billing, repos, webhooks};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/register", post(auth::register_account))
        .route("/api/login", post(auth::login_account))
        .route("/api/logout", post(auth::logout_account))
        .route("/api/me", get(auth::current_account))
        .route("/api/plans", get(billing::api::list_plans))
        .route("/api/account/billing", get(billing::api::get_billing))
        .route("/api/account/plan", post(billing::api::change_plan))
        .route("/api/account/trial", post(billing::api::start_trial))
        .route(
            "/api/repositories",
            get(repos::list_repositories).post(repos::create_repository),
        )
        .route("/api/repositories/public", get(repos::public_repositories))
        .route("/api/repositories/:id/builds", post(repos::create_build))
        .route("/api/webhooks/billing", post(webhooks::billing_webhook))
}
