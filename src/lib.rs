pub mod accounts;
pub mod auth;
pub mod billing;
pub mod config;
pub mod error;
pub mod extractor;
pub mod github;
pub mod notifications;
pub mod repos;
pub mod routes;
pub mod webhooks;
