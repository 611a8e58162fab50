//! Configuration for rustible-azure
//!
//! Handles loading and merging configuration from multiple sources, lowest
//! precedence first:
//! - Default values
//! - System configuration (/etc/rustible/azure.toml)
//! - User configuration (~/.rustible/azure.toml)
//! - Project configuration (./rustible-azure.toml)
//! - `RUSTIBLE_AZURE_CONFIG`, then `--config`
//! - Environment variables (`AZURE_*`)
//! - Per-task credential parameters

use crate::arm::auth::{AuthSource, Credential, CredentialInputs, DEFAULT_AUTHORITY_HOST};
use crate::arm::client::DEFAULT_RESOURCE_MANAGER_ENDPOINT;
use crate::arm::{ArmClient, ArmResult, PollSettings};
use crate::error::{Error, Result};
use crate::modules::{ModuleError, ModuleParams, ModuleResult};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable naming an extra configuration file
pub const CONFIG_ENV_VAR: &str = "RUSTIBLE_AZURE_CONFIG";

/// Module parameters that configure the connection rather than the resource
pub const CREDENTIAL_PARAMS: &[&str] = &[
    "subscription_id",
    "client_id",
    "secret",
    "tenant",
    "auth_source",
];

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Subscription, credentials and endpoints
    pub azure: AzureConfig,

    /// Long-running operation polling
    pub polling: PollSettings,

    /// HTTP client settings
    pub http: HttpConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

/// Azure connection settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub subscription_id: Option<String>,
    pub tenant: Option<String>,
    pub client_id: Option<String>,
    pub secret: Option<String>,
    /// Pre-acquired bearer token
    pub access_token: Option<String>,
    pub auth_source: AuthSource,
    pub resource_manager_endpoint: String,
    pub authority_host: String,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            subscription_id: None,
            tenant: None,
            client_id: None,
            secret: None,
            access_token: None,
            auth_source: AuthSource::Auto,
            resource_manager_endpoint: DEFAULT_RESOURCE_MANAGER_ENDPOINT.to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
        }
    }
}

impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("AzureConfig")
            .field("subscription_id", &self.subscription_id)
            .field("tenant", &self.tenant)
            .field("client_id", &self.client_id)
            .field("secret", &redact(&self.secret))
            .field("access_token", &redact(&self.access_token))
            .field("auth_source", &self.auth_source)
            .field("resource_manager_endpoint", &self.resource_manager_endpoint)
            .field("authority_host", &self.authority_host)
            .finish()
    }
}

impl AzureConfig {
    pub fn credential_inputs(&self) -> CredentialInputs {
        CredentialInputs {
            auth_source: self.auth_source,
            access_token: self.access_token.clone(),
            tenant_id: self.tenant.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.secret.clone(),
        }
    }
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Retry policy for throttled and 5xx responses
    pub retry: RetryPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when neither `RUST_LOG` nor `-v` is given
    pub level: Option<String>,

    /// Log format
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut merged = Value::Object(Default::default());

        for (path, required) in Self::get_config_paths(config_path) {
            if !path.exists() {
                if required {
                    return Err(Error::config(&path, "file does not exist"));
                }
                continue;
            }

            debug!("Loading config from {}", path.display());
            merge_values(&mut merged, read_config_file(&path)?);
        }

        let mut config: Config = serde_json::from_value(merged)
            .map_err(|e| Error::config(config_path.unwrap_or(Path::new("<merged>")), e.to_string()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Configuration files in increasing precedence, with whether each must exist
    fn get_config_paths(explicit_path: Option<&Path>) -> Vec<(PathBuf, bool)> {
        let mut paths = vec![(PathBuf::from("/etc/rustible/azure.toml"), false)];

        if let Some(home) = dirs::home_dir() {
            paths.push((home.join(".rustible/azure.toml"), false));
        }

        paths.push((PathBuf::from("rustible-azure.toml"), false));

        if let Ok(env_config) = std::env::var(CONFIG_ENV_VAR) {
            paths.push((PathBuf::from(env_config), true));
        }

        if let Some(path) = explicit_path {
            paths.push((path.to_path_buf(), true));
        }

        paths
    }

    /// Load from a specific file, without environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        serde_json::from_value(read_config_file(path)?)
            .map_err(|e| Error::config(path, e.to_string()))
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, env: impl Fn(&str) -> Option<String>) {
        let first = |keys: &[&str]| keys.iter().find_map(|k| env(*k).filter(|v| !v.is_empty()));

        if let Some(sub) = first(&["AZURE_SUBSCRIPTION_ID"]) {
            self.azure.subscription_id = Some(sub);
        }
        if let Some(tenant) = first(&["AZURE_TENANT", "AZURE_TENANT_ID"]) {
            self.azure.tenant = Some(tenant);
        }
        if let Some(client_id) = first(&["AZURE_CLIENT_ID"]) {
            self.azure.client_id = Some(client_id);
        }
        if let Some(secret) = first(&["AZURE_SECRET", "AZURE_CLIENT_SECRET"]) {
            self.azure.secret = Some(secret);
        }
        if let Some(token) = first(&["AZURE_ACCESS_TOKEN"]) {
            self.azure.access_token = Some(token);
        }
        if let Some(source) = first(&["AZURE_AUTH_SOURCE"]) {
            match source.parse() {
                Ok(source) => self.azure.auth_source = source,
                Err(e) => tracing::warn!("Ignoring AZURE_AUTH_SOURCE: {}", e),
            }
        }
        if let Some(endpoint) = first(&["AZURE_RESOURCE_MANAGER_ENDPOINT"]) {
            self.azure.resource_manager_endpoint = endpoint;
        }
    }

    /// Move per-task credential parameters out of `params` into the config
    pub fn apply_module_params(&mut self, params: &mut ModuleParams) -> ModuleResult<()> {
        for key in CREDENTIAL_PARAMS {
            let Some(value) = params.remove(*key) else {
                continue;
            };
            let value = match value {
                Value::Null => continue,
                Value::String(s) => s,
                other => other.to_string(),
            };

            match *key {
                "subscription_id" => self.azure.subscription_id = Some(value),
                "client_id" => self.azure.client_id = Some(value),
                "secret" => self.azure.secret = Some(value),
                "tenant" => self.azure.tenant = Some(value),
                "auth_source" => {
                    self.azure.auth_source = value
                        .parse()
                        .map_err(ModuleError::InvalidParameter)?
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Build an ARM client from this configuration
    pub fn build_client(&self) -> ArmResult<ArmClient> {
        let credential = Credential::resolve(&self.azure.credential_inputs())?;
        debug!("Using credential {:?}", credential);

        let mut builder = ArmClient::builder()
            .endpoint(&self.azure.resource_manager_endpoint)
            .authority_host(&self.azure.authority_host)
            .credential(credential)
            .timeout(self.http.timeout)
            .retry(self.http.retry.clone());

        if let Some(sub) = &self.azure.subscription_id {
            builder = builder.subscription_id(sub);
        }

        builder.build()
    }
}

/// Parse a configuration file into a JSON tree, by extension
fn read_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(path, format!("failed to read: {}", e)))?;

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let parsed = match extension {
        "yml" | "yaml" => serde_yaml::from_str::<Value>(&content).map_err(|e| e.to_string()),
        "json" => serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()),
        "toml" => toml::from_str::<Value>(&content).map_err(|e| e.to_string()),
        _ => toml::from_str::<Value>(&content)
            .or_else(|_| serde_yaml::from_str::<Value>(&content))
            .map_err(|e| e.to_string()),
    };

    match parsed {
        Ok(Value::Null) => Ok(Value::Object(Default::default())),
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(Error::config(path, "top level must be a mapping")),
        Err(message) => Err(Error::config(path, message)),
    }
}

/// Deep-merge `overlay` into `base`; mappings merge, everything else replaces
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
