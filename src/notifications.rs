use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::accounts::Account;

/// Outbound notices emitted by billing state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    PaymentSucceeded,
    PaymentFailed,
    PaymentLapsed,
}

/// key: notifications-port -> deferred delivery
///
/// Fire-and-forget: implementations never surface delivery errors to the
/// caller, they log and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, account: &Account, notice: Notice);
}

/// Posts notices to the configured mailer endpoint from a spawned task so
/// the request that triggered them never waits on the mailer.
pub struct MailerNotifier {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl MailerNotifier {
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: crate::config::MAILER_ENDPOINT.clone(),
        }
    }
}

#[async_trait]
impl Notifier for MailerNotifier {
    async fn deliver(&self, account: &Account, notice: Notice) {
        let Some(endpoint) = self.endpoint.clone() else {
            tracing::debug!(?notice, "mailer endpoint not configured; dropping notice");
            return;
        };
        let client = self.client.clone();
        let payload = serde_json::json!({
            "email": account.email,
            "nickname": account.nickname,
            "notice": notice,
        });
        tokio::spawn(async move {
            if let Err(err) = client.post(&endpoint).json(&payload).send().await {
                tracing::warn!(?err, "failed to deliver notice");
            }
        });
    }
}

/// Discards every notice.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn deliver(&self, _account: &Account, _notice: Notice) {}
}

/// Records delivered notices so tests can assert on them.
#[derive(Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<(i32, Notice)>>,
}

impl RecordingNotifier {
    pub fn delivered(&self) -> Vec<(i32, Notice)> {
        self.delivered.lock().expect("notifier mutex poisoned").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, account: &Account, notice: Notice) {
        self.delivered
            .lock()
            .expect("notifier mutex poisoned")
            .push((account.id, notice));
    }
}
