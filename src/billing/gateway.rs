use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

/// Remote customer handle returned by the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayCustomer {
    pub id: String,
}

/// key: billing-gateway -> provider integration
///
/// Two-step subscription update: locate the remote customer by the token the
/// account stores, then submit the plan code as the subscription target.
/// Callers get no retry policy; errors surface unchanged.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    async fn retrieve_customer(&self, token: &str) -> Result<GatewayCustomer>;
    async fn update_subscription(&self, customer: &GatewayCustomer, plan_code: &str)
        -> Result<()>;
}

/// key: billing-gateway-stripe -> HTTP implementation
pub struct StripeLikeGateway {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl StripeLikeGateway {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            api_key,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl BillingGateway for StripeLikeGateway {
    async fn retrieve_customer(&self, token: &str) -> Result<GatewayCustomer> {
        let url = self.base_url.join(&format!("/v1/customers/{token}"))?;
        let response = self.authorize(self.client.get(url)).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "billing gateway returned {} retrieving customer",
                response.status()
            ));
        }
        Ok(response.json().await?)
    }

    async fn update_subscription(
        &self,
        customer: &GatewayCustomer,
        plan_code: &str,
    ) -> Result<()> {
        let url = self
            .base_url
            .join(&format!("/v1/customers/{}/subscription", customer.id))?;
        let response = self
            .authorize(self.client.post(url))
            .json(&serde_json::json!({ "plan": plan_code }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!(
                "billing gateway returned {} updating subscription",
                response.status()
            ));
        }
        Ok(())
    }
}
