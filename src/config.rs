use once_cell::sync::Lazy;
use std::fs;

/// Secret used for JWT signing. Must be set via the `JWT_SECRET` env variable.
pub static JWT_SECRET: Lazy<String> =
    Lazy::new(|| std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"));

/// Address the HTTP server should bind to. Defaults to `0.0.0.0`.
pub static BIND_ADDRESS: Lazy<String> =
    Lazy::new(|| std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string()));

/// Port the HTTP server should listen on. Defaults to `3000`.
pub static BIND_PORT: Lazy<u16> = Lazy::new(|| {
    std::env::var("BIND_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(3000)
});

/// When set to a truthy value, allows the application to continue running even if database
/// migrations fail. Defaults to `false`.
pub static ALLOW_MIGRATION_FAILURE: Lazy<bool> = Lazy::new(|| {
    std::env::var("ALLOW_MIGRATION_FAILURE")
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes")
        })
        .unwrap_or(false)
});

/// key: notifications-config -> disposable mail domains
/// Comma-separated list of mail domains whose addresses never receive
/// outbound notices. Defaults to `fakemail.com`.
pub static FAKEMAIL_DOMAINS: Lazy<Vec<String>> = Lazy::new(|| {
    std::env::var("FAKEMAIL_DOMAINS")
        .ok()
        .map(|value| {
            value
                .split(',')
                .filter_map(|raw| {
                    let trimmed = raw.trim().to_ascii_lowercase();
                    if trimmed.is_empty() {
                        None
                    } else {
                        Some(trimmed)
                    }
                })
                .collect::<Vec<_>>()
        })
        .filter(|domains| !domains.is_empty())
        .unwrap_or_else(|| vec!["fakemail.com".to_string()])
});

/// key: billing-config -> gateway endpoint
pub static BILLING_API_BASE: Lazy<String> = Lazy::new(|| {
    read_optional_env("BILLING_API_BASE").unwrap_or_else(|| "https://api.stripe.com".to_string())
});

/// key: billing-config -> gateway API key (value or file)
pub static BILLING_API_KEY: Lazy<Option<String>> =
    Lazy::new(|| read_secret_env("BILLING_API_KEY", "BILLING_API_KEY_FILE"));

/// key: billing-config -> webhook signing secret
pub static BILLING_WEBHOOK_SECRET: Lazy<Option<String>> =
    Lazy::new(|| read_secret_env("BILLING_WEBHOOK_SECRET", "BILLING_WEBHOOK_SECRET_FILE"));

/// Base URL of the GitHub API used for collaborator and repository lookups.
pub static GITHUB_API_BASE: Lazy<String> = Lazy::new(|| {
    read_optional_env("GITHUB_API_BASE").unwrap_or_else(|| "https://api.github.com".to_string())
});

/// Optional token presented to the GitHub API.
pub static GITHUB_API_TOKEN: Lazy<Option<String>> =
    Lazy::new(|| read_secret_env("GITHUB_API_TOKEN", "GITHUB_API_TOKEN_FILE"));

/// Endpoint the mailer notifier posts to. Notifications are disabled when unset.
pub static MAILER_ENDPOINT: Lazy<Option<String>> =
    Lazy::new(|| read_optional_env("MAILER_ENDPOINT"));

fn read_optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_secret_env(value_key: &str, file_key: &str) -> Option<String> {
    if let Some(path) = read_optional_env(file_key) {
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let trimmed = contents.trim().to_string();
                if !trimmed.is_empty() {
                    return Some(trimmed);
                }
            }
            Err(err) => panic!("failed to read {file_key} from {path}: {err}"),
        }
    }

    read_optional_env(value_key)
}
