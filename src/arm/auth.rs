//! Azure credential chain.
//!
//! Supported sources, tried in this order when `auth_source` is `auto`:
//!
//! 1. A pre-acquired bearer token (`AZURE_ACCESS_TOKEN`)
//! 2. Service principal client credentials (`AZURE_CLIENT_ID`, `AZURE_SECRET`, `AZURE_TENANT`)
//! 3. Azure CLI (`az account get-access-token`)
//!
//! Tokens are cached and refreshed shortly before they expire.

use super::{ArmError, ArmResult};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Default Azure AD authority host
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Refresh this long before the token actually expires
const EXPIRY_SKEW_SECS: i64 = 60;

/// Which credential source to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthSource {
    #[default]
    Auto,
    Token,
    Credentials,
    Cli,
}

impl FromStr for AuthSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(AuthSource::Auto),
            "token" => Ok(AuthSource::Token),
            "credentials" | "env" => Ok(AuthSource::Credentials),
            "cli" => Ok(AuthSource::Cli),
            other => Err(format!(
                "Invalid auth_source '{}'. Valid values: auto, token, credentials, cli",
                other
            )),
        }
    }
}

/// A resolved credential
#[derive(Clone)]
pub enum Credential {
    AccessToken(String),
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    AzureCli,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::AccessToken(_) => f.write_str("AccessToken(***)"),
            Credential::ServicePrincipal {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Credential::AzureCli => f.write_str("AzureCli"),
        }
    }
}

/// Raw inputs for credential resolution, typically from [`crate::config::AzureConfig`]
#[derive(Debug, Clone, Default)]
pub struct CredentialInputs {
    pub auth_source: AuthSource,
    pub access_token: Option<String>,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl Credential {
    /// Pick a credential from the available inputs
    pub fn resolve(inputs: &CredentialInputs) -> ArmResult<Self> {
        let token = || inputs.access_token.clone().map(Credential::AccessToken);
        let service_principal = || match (&inputs.tenant_id, &inputs.client_id, &inputs.client_secret) {
            (Some(tenant), Some(client), Some(secret)) => Some(Credential::ServicePrincipal {
                tenant_id: tenant.clone(),
                client_id: client.clone(),
                client_secret: secret.clone(),
            }),
            _ => None,
        };

        match inputs.auth_source {
            AuthSource::Token => token().ok_or_else(|| {
                ArmError::Auth("auth_source is 'token' but no access token was provided".into())
            }),
            AuthSource::Credentials => service_principal().ok_or_else(|| {
                ArmError::Auth(
                    "auth_source is 'credentials' but client_id, secret and tenant are not all set"
                        .into(),
                )
            }),
            AuthSource::Cli => Ok(Credential::AzureCli),
            AuthSource::Auto => Ok(token()
                .or_else(service_principal)
                .unwrap_or(Credential::AzureCli)),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_on: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + ChronoDuration::seconds(EXPIRY_SKEW_SECS) < self.expires_on
    }
}

#[derive(Debug, Deserialize)]
struct OAuth2TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliTokenResponse {
    access_token: String,
    /// Epoch seconds, present in newer CLI versions
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Acquires and caches bearer tokens for the resource-manager audience
pub struct TokenProvider {
    credential: Credential,
    http: Client,
    authority_host: String,
    resource: String,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(credential: Credential, http: Client, authority_host: &str, resource: &str) -> Self {
        Self {
            credential,
            http,
            authority_host: authority_host.trim_end_matches('/').to_string(),
            resource: resource.trim_end_matches('/').to_string(),
            cache: Mutex::new(None),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Return a valid bearer token, acquiring a new one if needed
    pub async fn token(&self) -> ArmResult<String> {
        let cached = self.cache.lock().clone();
        if let Some(cached) = cached {
            if cached.is_fresh(Utc::now()) {
                return Ok(cached.token);
            }
        }

        let fresh = match &self.credential {
            Credential::AccessToken(token) => return Ok(token.clone()),
            Credential::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            } => {
                self.client_credentials(tenant_id, client_id, client_secret)
                    .await?
            }
            Credential::AzureCli => self.azure_cli().await?,
        };

        let token = fresh.token.clone();
        *self.cache.lock() = Some(fresh);
        Ok(token)
    }

    async fn client_credentials(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> ArmResult<CachedToken> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.authority_host, tenant_id);
        let scope = format!("{}/.default", self.resource);

        let mut form = HashMap::new();
        form.insert("grant_type", "client_credentials");
        form.insert("client_id", client_id);
        form.insert("client_secret", client_secret);
        form.insert("scope", scope.as_str());

        debug!("Requesting service principal token from {}", url);

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| ArmError::Auth(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ArmError::Auth(format!(
                "token request failed with status {}: {}",
                status, body
            )));
        }

        let parsed: OAuth2TokenResponse = response
            .json()
            .await
            .map_err(|e| ArmError::Auth(format!("failed to parse token response: {}", e)))?;

        Ok(CachedToken {
            token: parsed.access_token,
            expires_on: Utc::now() + ChronoDuration::seconds(parsed.expires_in.unwrap_or(3600)),
        })
    }

    async fn azure_cli(&self) -> ArmResult<CachedToken> {
        debug!("Requesting token from Azure CLI");

        let output = tokio::process::Command::new("az")
            .args([
                "account",
                "get-access-token",
                "--resource",
                &self.resource,
                "--output",
                "json",
            ])
            .output()
            .await
            .map_err(|e| ArmError::Auth(format!("failed to run Azure CLI: {}", e)))?;

        if !output.status.success() {
            return Err(ArmError::Auth(format!(
                "Azure CLI token request failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_cli_token(&output.stdout)
    }
}

fn parse_cli_token(stdout: &[u8]) -> ArmResult<CachedToken> {
    let parsed: CliTokenResponse = serde_json::from_slice(stdout)
        .map_err(|e| ArmError::Auth(format!("failed to parse Azure CLI output: {}", e)))?;

    // Older CLI versions only report a local-time `expiresOn`; assume a short lifetime then.
    let expires_on = parsed
        .expires_on
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(|| Utc::now() + ChronoDuration::minutes(5));

    Ok(CachedToken {
        token: parsed.access_token,
        expires_on,
    })
}
