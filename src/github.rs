use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

/// Entry in a repository's collaborator list. The API returns full user
/// objects; only the identity fields matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct Collaborator {
    pub id: i64,
    pub login: String,
}

/// Remote metadata fetched during the post-attach sync.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRepository {
    pub private: bool,
}

/// key: github-directory -> collaborator lookups
///
/// An empty collaborator list is a valid answer and means "nobody".
#[async_trait]
pub trait CollaboratorDirectory: Send + Sync {
    async fn list_collaborators(&self, owner: &str, name: &str) -> Result<Vec<Collaborator>>;
    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<RemoteRepository>;
}

pub struct GitHubDirectory {
    client: reqwest::Client,
    base_url: Url,
    token: Option<String>,
}

impl GitHubDirectory {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            token,
        })
    }

    fn request(&self, url: Url) -> reqwest::RequestBuilder {
        // GitHub rejects requests without a user agent.
        let request = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, "repolint");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl CollaboratorDirectory for GitHubDirectory {
    async fn list_collaborators(&self, owner: &str, name: &str) -> Result<Vec<Collaborator>> {
        let url = self
            .base_url
            .join(&format!("/repos/{owner}/{name}/collaborators"))?;
        let response = self.request(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "GitHub returned {} listing collaborators for {owner}/{name}",
                response.status()
            ));
        }
        Ok(response.json().await?)
    }

    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<RemoteRepository> {
        let url = self.base_url.join(&format!("/repos/{owner}/{name}"))?;
        let response = self.request(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "GitHub returned {} fetching {owner}/{name}",
                response.status()
            ));
        }
        Ok(response.json().await?)
    }
}
