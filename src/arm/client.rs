//! reqwest-backed Azure Resource Manager client.

use super::auth::{Credential, TokenProvider, DEFAULT_AUTHORITY_HOST};
use super::{ArmApi, ArmError, ArmRequest, ArmResponse, ArmResult, Target};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Default public-cloud resource-manager endpoint
pub const DEFAULT_RESOURCE_MANAGER_ENDPOINT: &str = "https://management.azure.com";

/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Builder for [`ArmClient`]
pub struct ArmClientBuilder {
    endpoint: String,
    authority_host: String,
    subscription_id: Option<String>,
    credential: Option<Credential>,
    timeout: Duration,
    retry: RetryPolicy,
    user_agent: String,
}

impl ArmClientBuilder {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            subscription_id: None,
            credential: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
            user_agent: format!("rustible-azure/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Resource-manager endpoint (sovereign clouds, or a test server)
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn authority_host(mut self, authority_host: impl Into<String>) -> Self {
        self.authority_host = authority_host.into();
        self
    }

    pub fn subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.subscription_id = Some(subscription_id.into());
        self
    }

    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> ArmResult<ArmClient> {
        let subscription_id = self
            .subscription_id
            .filter(|s| !s.is_empty())
            .ok_or(ArmError::MissingSubscription)?;

        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| ArmError::InvalidUrl(format!("{}: {}", self.endpoint, e)))?;

        let http = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.timeout / 2)
            .user_agent(self.user_agent)
            .build()?;

        let credential = self.credential.unwrap_or(Credential::AzureCli);
        let tokens = TokenProvider::new(
            credential,
            http.clone(),
            &self.authority_host,
            endpoint.as_str(),
        );

        Ok(ArmClient {
            http,
            endpoint,
            subscription_id,
            tokens,
            retry: self.retry,
        })
    }
}

impl Default for ArmClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client for Azure Resource Manager
pub struct ArmClient {
    http: Client,
    endpoint: Url,
    subscription_id: String,
    tokens: TokenProvider,
    retry: RetryPolicy,
}

impl ArmClient {
    pub fn builder() -> ArmClientBuilder {
        ArmClientBuilder::new()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Turn a request target into a full URL with `api-version` applied
    pub fn resolve_url(&self, request: &ArmRequest) -> ArmResult<Url> {
        let mut url = match &request.target {
            Target::Path(path) => self
                .endpoint
                .join(path)
                .map_err(|e| ArmError::InvalidUrl(format!("{}: {}", path, e)))?,
            Target::Url(raw) => {
                Url::parse(raw).map_err(|e| ArmError::InvalidUrl(format!("{}: {}", raw, e)))?
            }
        };

        if let Some(api_version) = &request.api_version {
            let already_set = url.query_pairs().any(|(k, _)| k == "api-version");
            if !already_set {
                url.query_pairs_mut().append_pair("api-version", api_version);
            }
        }

        Ok(url)
    }

    async fn read_response(response: reqwest::Response) -> ArmResult<ArmResponse> {
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
            }
        }

        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(v) => Some(v),
                Err(_) if status >= 400 => Some(json!({
                    "error": {"code": "Unknown", "message": text.trim()}
                })),
                Err(e) => {
                    return Err(ArmError::InvalidResponse(format!(
                        "expected JSON body from ARM (HTTP {}): {}",
                        status, e
                    )))
                }
            }
        };

        Ok(ArmResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl ArmApi for ArmClient {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    async fn send(&self, request: ArmRequest) -> ArmResult<ArmResponse> {
        let url = self.resolve_url(&request)?;
        let mut attempt = 0;

        loop {
            let token = self.tokens.token().await?;

            let mut builder = self
                .http
                .request(request.method.clone(), url.clone())
                .bearer_auth(&token)
                .header(header::ACCEPT, "application/json");

            if let Some(body) = &request.body {
                builder = builder.json(body);
            }

            debug!("{} {}", request.method, url);

            match builder.send().await {
                Ok(response) => {
                    let response = Self::read_response(response).await?;
                    if self.retry.should_retry(response.status, attempt) {
                        let delay = self.retry.delay_for(attempt, response.retry_after());
                        warn!(
                            "{} {} returned {}, retrying in {:?} (attempt {}/{})",
                            request.method,
                            request.target,
                            response.status,
                            delay,
                            attempt + 1,
                            self.retry.max_retries
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    debug!("{} {} -> {}", request.method, request.target, response.status);
                    return Ok(response);
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt, None);
                    warn!(
                        "{} {} failed ({}), retrying in {:?}",
                        request.method, request.target, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ArmClient {
        ArmClient::builder()
            .subscription_id("sub-1")
            .credential(Credential::AccessToken("t".into()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_requires_subscription() {
        let result = ArmClient::builder()
            .credential(Credential::AccessToken("t".into()))
            .build();
        assert!(matches!(result, Err(ArmError::MissingSubscription)));
    }

    #[test]
    fn test_resolve_relative_path() {
        let request = ArmRequest::get("/subscriptions/sub-1/resourcegroups/rg")
            .with_api_version("2021-04-01");
        let url = client().resolve_url(&request).unwrap();
        assert_eq!(
            url.as_str(),
            "https://management.azure.com/subscriptions/sub-1/resourcegroups/rg?api-version=2021-04-01"
        );
    }

    #[test]
    fn test_resolve_poll_url_keeps_existing_api_version() {
        let request = ArmRequest::poll(
            "https://management.azure.com/operations/op1?api-version=2020-01-01",
        )
        .with_api_version("2021-04-01");
        let url = client().resolve_url(&request).unwrap();
        assert_eq!(url.query(), Some("api-version=2020-01-01"));
    }

    #[test]
    fn test_resolve_invalid_url() {
        let request = ArmRequest::poll("not a url");
        assert!(matches!(
            client().resolve_url(&request),
            Err(ArmError::InvalidUrl(_))
        ));
    }
}
