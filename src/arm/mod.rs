//! Azure Resource Manager transport layer.
//!
//! Modules never talk HTTP directly. Every call goes through the [`ArmApi`]
//! trait, which takes an [`ArmRequest`] and hands back the raw [`ArmResponse`]
//! regardless of status code. Callers decide what a 404 means for them;
//! [`ArmResponse::into_result`] turns everything else above 399 into an
//! [`ArmError::Cloud`].
//!
//! The production implementation is [`client::ArmClient`]. Tests substitute an
//! in-memory implementation.

pub mod auth;
pub mod client;
pub mod poller;
pub mod resource_id;

pub use client::{ArmClient, ArmClientBuilder};
pub use poller::{wait_for_completion, wait_until_absent, PollSettings};
pub use resource_id::{ResourceId, ResourceIdTemplate};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to Azure Resource Manager
#[derive(Error, Debug)]
pub enum ArmError {
    /// ARM answered with an error status
    #[error("({code}) {message} [HTTP {status}]")]
    Cloud {
        status: u16,
        code: String,
        message: String,
    },

    /// A long-running operation reached a failed terminal state
    #[error("Operation {status}: {message}")]
    OperationFailed { status: String, message: String },

    /// Polling did not reach a terminal state in time
    #[error("Timed out after {0:?} waiting for operation to complete")]
    Timeout(Duration),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No subscription id configured; set AZURE_SUBSCRIPTION_ID or pass subscription_id")]
    MissingSubscription,
}

impl ArmError {
    /// HTTP status of a cloud error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            ArmError::Cloud { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Result type for ARM operations
pub type ArmResult<T> = Result<T, ArmError>;

/// Where a request is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Resource path relative to the resource-manager endpoint, e.g.
    /// `/subscriptions/.../resourceGroups/rg`
    Path(String),
    /// Absolute URL, used for polling operation-status links
    Url(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Path(p) => write!(f, "{}", p),
            Target::Url(u) => write!(f, "{}", u),
        }
    }
}

/// A single ARM request
#[derive(Debug, Clone)]
pub struct ArmRequest {
    pub method: Method,
    pub target: Target,
    pub api_version: Option<String>,
    pub body: Option<Value>,
}

impl ArmRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            target: Target::Path(path.into()),
            api_version: None,
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// GET an absolute URL as returned in `Azure-AsyncOperation`, `Location`
    /// or `nextLink`. These already carry their query string.
    pub fn poll(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            target: Target::Url(url.into()),
            api_version: None,
            body: None,
        }
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Raw response from ARM
#[derive(Debug, Clone, Default)]
pub struct ArmResponse {
    pub status: u16,
    /// Header names are stored lower-cased
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl ArmResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `Retry-After` in seconds, when the server sent one
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Convert an error status into [`ArmError::Cloud`], parsing the ARM
    /// error envelope `{"error": {"code": ..., "message": ...}}`.
    pub fn into_result(self) -> ArmResult<ArmResponse> {
        if self.status < 400 {
            return Ok(self);
        }

        let error = self
            .body
            .as_ref()
            .and_then(|b| b.get("error").or(Some(b)))
            .cloned()
            .unwrap_or(Value::Null);

        let code = error
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("request failed with status {}", self.status));

        Err(ArmError::Cloud {
            status: self.status,
            code,
            message,
        })
    }
}

/// The seam between modules and Azure Resource Manager
#[async_trait]
pub trait ArmApi: Send + Sync {
    /// Subscription that relative resource paths are built against
    fn subscription_id(&self) -> &str;

    /// Send a request and return the response whatever its status
    async fn send(&self, request: ArmRequest) -> ArmResult<ArmResponse>;
}

/// Fetch a resource, mapping 404 to `None`
pub async fn get_resource(
    api: &dyn ArmApi,
    path: &str,
    api_version: &str,
) -> ArmResult<Option<Value>> {
    let response = api
        .send(ArmRequest::get(path).with_api_version(api_version))
        .await?;

    if response.status == 404 {
        return Ok(None);
    }

    let response = response.into_result()?;
    Ok(Some(response.body.unwrap_or(Value::Null)))
}
