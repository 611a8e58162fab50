//! Generic ARM REST modules.
//!
//! ## AzureRmResourceModule
//!
//! Sends an arbitrary request to Resource Manager. Useful for resource types
//! that have no dedicated module.
//!
//! ### Parameters
//!
//! | Parameter | Required | Description |
//! |-----------|----------|-------------|
//! | `url` | No* | Resource path or absolute URL (*or the parts below) |
//! | `provider` | No | Provider namespace; `Compute` means `Microsoft.Compute` |
//! | `resource_group` | No | Resource group |
//! | `resource_type` | No | Resource type, e.g. `virtualNetworks` |
//! | `resource_name` | No | Resource name |
//! | `subresource` | No | List of `{namespace, type, name}` appended to the path |
//! | `api_version` | No | Looked up from the provider when omitted |
//! | `method` | No | HTTP method (default: PUT) |
//! | `body` | No | Request body |
//! | `status_code` | No | Accepted status codes (default: 200, 201, 202) |
//! | `idempotency` | No | GET first and skip the call when `body` already matches |
//! | `polling_timeout` | No | Seconds to wait for a long-running operation |
//! | `polling_interval` | No | Seconds between polls |
//! | `state` | No | `absent` sends DELETE (default: present) |
//!
//! ## AzureRmResourceInfoModule
//!
//! GETs a resource or a collection, following `nextLink` until every page is
//! read. Items are returned as `response`.
//!
//! ### Example
//!
//! ```yaml
//! - name: Enable accelerated networking on a NIC
//!   azure_rm_resource:
//!     resource_group: my-rg
//!     provider: network
//!     resource_type: networkInterfaces
//!     resource_name: web-nic
//!     api_version: "2023-05-01"
//!     method: PATCH
//!     idempotency: true
//!     body:
//!       properties:
//!         enableAcceleratedNetworking: true
//!
//! - name: List storage accounts
//!   azure_rm_resource_info:
//!     provider: storage
//!     resource_type: storageAccounts
//!     api_version: "2023-01-01"
//! ```

use crate::arm::{get_resource, wait_for_completion, ArmApi, ArmRequest, PollSettings, Target};
use crate::modules::{
    Diff, Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleResult, ParamExt,
    ParamKind, ParamSpec,
};
use crate::reconcile::{default_compare, DesiredState};
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

/// api-version used to read provider metadata
const PROVIDERS_API_VERSION: &str = "2021-04-01";

const DEFAULT_STATUS_CODES: &[u16] = &[200, 201, 202];

fn location_params() -> Vec<ParamSpec> {
    vec![
        ParamSpec::new("url", ParamKind::Str)
            .describe("Resource path or absolute URL; overrides the parts below"),
        ParamSpec::new("provider", ParamKind::Str)
            .describe("Provider namespace, e.g. Microsoft.Network or network"),
        ParamSpec::new("resource_group", ParamKind::Str),
        ParamSpec::new("resource_type", ParamKind::Str),
        ParamSpec::new("resource_name", ParamKind::Str),
        ParamSpec::new("subresource", ParamKind::List)
            .describe("List of mappings with namespace, type and name"),
        ParamSpec::new("api_version", ParamKind::Str)
            .describe("Defaults to the newest version the provider offers for the type"),
    ]
}

/// `Compute` -> `Microsoft.Compute`
fn provider_namespace(provider: &str) -> String {
    if provider.contains('.') {
        provider.to_string()
    } else {
        let mut chars = provider.chars();
        match chars.next() {
            Some(first) => format!("Microsoft.{}{}", first.to_uppercase(), chars.as_str()),
            None => String::new(),
        }
    }
}

/// Where a generic request goes and with which api-version
#[derive(Debug, Clone, PartialEq)]
struct Endpoint {
    target: Target,
    api_version: Option<String>,
}

impl Endpoint {
    fn request(&self, method: Method) -> ArmRequest {
        let mut request = ArmRequest::new(method, String::new());
        request.target = self.target.clone();
        request.api_version = self.api_version.clone();
        request
    }

    fn path(&self) -> &str {
        match &self.target {
            Target::Path(p) | Target::Url(p) => p,
        }
    }
}

/// Build the request path from `url` or from its parts
fn resource_url(params: &ModuleParams, subscription_id: &str) -> ModuleResult<Target> {
    if let Some(url) = params.get_string("url")? {
        return Ok(if url.starts_with("http://") || url.starts_with("https://") {
            Target::Url(url)
        } else if url.starts_with('/') {
            Target::Path(url)
        } else {
            Target::Path(format!("/{}", url))
        });
    }

    let mut path = format!("/subscriptions/{}", subscription_id);
    if let Some(group) = params.get_string("resource_group")? {
        path.push_str(&format!("/resourceGroups/{}", group));
    }
    if let Some(provider) = params.get_string("provider")? {
        path.push_str(&format!("/providers/{}", provider_namespace(&provider)));
    }
    if let Some(resource_type) = params.get_string("resource_type")? {
        path.push_str(&format!("/{}", resource_type));
    }
    if let Some(name) = params.get_string("resource_name")? {
        path.push_str(&format!("/{}", name));
    }

    if let Some(subresources) = params.get("subresource").and_then(Value::as_array) {
        for sub in subresources {
            let field = |key: &str| sub.get(key).and_then(Value::as_str);
            if let Some(namespace) = field("namespace") {
                path.push_str(&format!("/providers/{}", provider_namespace(namespace)));
            }
            let resource_type = field("type").ok_or_else(|| {
                ModuleError::InvalidParameter("every subresource needs a type".to_string())
            })?;
            path.push_str(&format!("/{}", resource_type));
            if let Some(name) = field("name") {
                path.push_str(&format!("/{}", name));
            }
        }
    }

    Ok(Target::Path(path))
}

/// Newest api-version the provider lists for `resource_type`
async fn latest_api_version(
    arm: &dyn ArmApi,
    namespace: &str,
    resource_type: &str,
) -> ModuleResult<String> {
    let label = format!("provider '{}'", namespace);
    let path = format!(
        "/subscriptions/{}/providers/{}",
        arm.subscription_id(),
        namespace
    );

    let provider = get_resource(arm, &path, PROVIDERS_API_VERSION)
        .await
        .map_err(|e| ModuleError::cloud("fetching", &label, e))?
        .ok_or_else(|| ModuleError::ExecutionFailed(format!("{} is not registered", label)))?;

    let mut versions: Vec<&str> = provider
        .get("resourceTypes")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|t| {
            t.get("resourceType")
                .and_then(Value::as_str)
                .is_some_and(|name| name.eq_ignore_ascii_case(resource_type))
        })
        .filter_map(|t| t.get("apiVersions").and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .collect();

    // Dated versions sort lexically; stable releases win over previews of the same day
    versions.sort_by(|a, b| {
        let stable = |v: &str| !v.contains("preview");
        (a.get(..10), stable(a)).cmp(&(b.get(..10), stable(b)))
    });

    versions
        .last()
        .map(|v| v.to_string())
        .ok_or_else(|| {
            ModuleError::InvalidParameter(format!(
                "{} has no api-version for resource type '{}'; pass api_version",
                label, resource_type
            ))
        })
}

async fn resolve_endpoint(arm: &dyn ArmApi, params: &ModuleParams) -> ModuleResult<Endpoint> {
    let target = resource_url(params, arm.subscription_id())?;

    let api_version = match params.get_string("api_version")? {
        Some(version) => Some(version),
        None => match (params.get_string("provider")?, params.get_string("resource_type")?) {
            (Some(provider), Some(resource_type)) => {
                let namespace = provider_namespace(&provider);
                let version = latest_api_version(arm, &namespace, &resource_type).await?;
                debug!("Using api-version {} for {}/{}", version, namespace, resource_type);
                Some(version)
            }
            _ => None,
        },
    };

    let has_query_version = matches!(&target, Target::Url(u) if u.contains("api-version="));
    if api_version.is_none() && !has_query_version {
        return Err(ModuleError::MissingParameter(
            "api_version (or provider and resource_type to look it up)".to_string(),
        ));
    }

    Ok(Endpoint {
        target,
        api_version,
    })
}

fn parse_method(method: &str) -> ModuleResult<Method> {
    match method.to_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "PUT" => Ok(Method::PUT),
        "POST" => Ok(Method::POST),
        "HEAD" => Ok(Method::HEAD),
        "PATCH" => Ok(Method::PATCH),
        "DELETE" => Ok(Method::DELETE),
        "MERGE" => Method::from_bytes(b"MERGE")
            .map_err(|e| ModuleError::InvalidParameter(e.to_string())),
        _ => Err(ModuleError::InvalidParameter(format!(
            "Invalid HTTP method: {}. Supported: GET, PUT, POST, HEAD, PATCH, DELETE, MERGE",
            method
        ))),
    }
}

fn status_codes(params: &ModuleParams) -> ModuleResult<Vec<u16>> {
    let Some(value) = params.get("status_code").filter(|v| !v.is_null()) else {
        return Ok(DEFAULT_STATUS_CODES.to_vec());
    };

    let items = match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    };

    items
        .iter()
        .map(|item| {
            let code = match item {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            };
            code.and_then(|c| u16::try_from(c).ok()).ok_or_else(|| {
                ModuleError::InvalidParameter(format!("invalid status_code: {}", item))
            })
        })
        .collect()
}

fn poll_settings(params: &ModuleParams, context: &ModuleContext) -> ModuleResult<PollSettings> {
    let mut settings = context.polling;
    if let Some(timeout) = params.get_i64("polling_timeout")?.filter(|t| *t > 0) {
        settings.timeout = Duration::from_secs(timeout.unsigned_abs());
    }
    if let Some(interval) = params.get_i64("polling_interval")?.filter(|i| *i >= 0) {
        settings.interval = Duration::from_secs(interval.unsigned_abs());
        settings.honor_retry_after = false;
    }
    Ok(settings)
}

/// Send any request to ARM
pub struct AzureRmResourceModule;

#[async_trait]
impl Module for AzureRmResourceModule {
    fn name(&self) -> &'static str {
        "azure_rm_resource"
    }

    fn description(&self) -> &'static str {
        "Create, update or delete any Azure resource through the REST API"
    }

    fn params(&self) -> Vec<ParamSpec> {
        let mut specs = location_params();
        specs.extend([
            ParamSpec::new("method", ParamKind::Str)
                .choices(&["GET", "PUT", "POST", "HEAD", "PATCH", "DELETE", "MERGE"])
                .default_value("PUT"),
            ParamSpec::new("body", ParamKind::Raw).describe("Request body"),
            ParamSpec::new("status_code", ParamKind::List)
                .default_value("[200, 201, 202]")
                .describe("Status codes treated as success"),
            ParamSpec::new("idempotency", ParamKind::Bool)
                .default_value("false")
                .describe("GET first and skip the request if the body already matches"),
            ParamSpec::new("polling_timeout", ParamKind::Int)
                .describe("Seconds to wait for a long-running operation"),
            ParamSpec::new("polling_interval", ParamKind::Int)
                .describe("Seconds between polls"),
            ParamSpec::new("state", ParamKind::Str)
                .choices(&["present", "absent"])
                .default_value("present")
                .describe("absent sends DELETE"),
        ]);
        specs
    }

    fn validate_params(&self, params: &ModuleParams) -> ModuleResult<()> {
        crate::modules::validate_against(&self.params(), params)?;

        let has_url = params.get_string("url")?.is_some();
        let has_parts = ["provider", "resource_group", "resource_type"]
            .iter()
            .any(|k| params.get(*k).is_some_and(|v| !v.is_null()));
        if !has_url && !has_parts {
            return Err(ModuleError::MissingParameter(
                "url, or provider/resource_group/resource_type".to_string(),
            ));
        }

        status_codes(params)?;
        Ok(())
    }

    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let arm = context.arm()?;
        let endpoint = resolve_endpoint(arm, params).await?;
        let url = endpoint.path().to_string();

        let state = params
            .get_string("state")?
            .map(|s| s.parse::<DesiredState>())
            .transpose()
            .map_err(ModuleError::InvalidParameter)?
            .unwrap_or_default();

        let mut expected = status_codes(params)?;
        let method = match state {
            DesiredState::Absent => {
                expected.push(204);
                Method::DELETE
            }
            DesiredState::Present => parse_method(
                params
                    .get_string("method")?
                    .as_deref()
                    .unwrap_or("PUT"),
            )?,
        };

        let body = params.get("body").filter(|b| !b.is_null()).cloned();
        let label = format!("resource '{}'", url);

        let original = if params.get_bool("idempotency")?.unwrap_or(false) {
            let response = arm
                .send(endpoint.request(Method::GET))
                .await
                .map_err(|e| ModuleError::cloud("fetching", &label, e))?;
            if response.status == 404 {
                Some(None)
            } else {
                let response = response
                    .into_result()
                    .map_err(|e| ModuleError::cloud("fetching", &label, e))?;
                Some(response.body)
            }
        } else {
            None
        };

        if let Some(original) = &original {
            let unchanged = match (state, original) {
                (DesiredState::Absent, None) => true,
                (DesiredState::Present, Some(current)) if method != Method::POST => {
                    let mut difference = None;
                    let same = match &body {
                        Some(body) => default_compare(body, current, "", &mut difference),
                        None => true,
                    };
                    if let Some(difference) = &difference {
                        debug!("{}: {}", label, difference);
                    }
                    same
                }
                _ => false,
            };

            if unchanged {
                return Ok(ModuleOutput::ok(format!("{} is up to date", label))
                    .with_data("url", json!(url))
                    .with_data("response", original.clone().unwrap_or(Value::Null)));
            }
        }

        let mutating = !matches!(method, Method::GET | Method::HEAD);
        let diff = (context.diff_mode && mutating).then(|| {
            let before = original.clone().flatten().unwrap_or(Value::Null);
            let after = match state {
                DesiredState::Absent => Value::Null,
                DesiredState::Present => body.clone().unwrap_or(Value::Null),
            };
            Diff::new(before, after)
        });

        if context.check_mode && mutating {
            let mut output = ModuleOutput::changed(format!("Would send {} {}", method, url))
                .with_data("url", json!(url));
            if let Some(diff) = diff {
                output = output.with_diff(diff);
            }
            return Ok(output);
        }

        if mutating {
            info!("{} {}", method, url);
        }

        let mut request = endpoint.request(method.clone());
        if let Some(body) = body {
            request = request.with_body(body);
        }
        let response = arm
            .send(request)
            .await
            .map_err(|e| ModuleError::cloud("calling", &label, e))?;
        let status = response.status;

        if state == DesiredState::Absent && status == 404 && !expected.contains(&status) {
            return Ok(ModuleOutput::ok(format!("{} does not exist", label))
                .with_data("url", json!(url)));
        }

        if !expected.contains(&status) {
            let detail = match response.into_result() {
                Err(e) => e.to_string(),
                Ok(r) => r.body.map(|b| b.to_string()).unwrap_or_default(),
            };
            return Err(ModuleError::ExecutionFailed(format!(
                "{} {} returned unexpected status {} (expected one of {:?}): {}",
                method, url, status, expected, detail
            )));
        }

        let final_get = matches!(method, Method::PUT | Method::PATCH)
            .then(|| endpoint.request(Method::GET));
        // An accepted error status is returned as-is rather than polled
        let result = if status == 204 || status >= 400 {
            response.body
        } else {
            wait_for_completion(arm, response, final_get, &poll_settings(params, context)?)
                .await
                .map_err(|e| ModuleError::cloud("waiting for", &label, e))?
        };

        let msg = format!("{} {} returned {}", method, url, status);
        let mut output = if mutating {
            ModuleOutput::changed(msg)
        } else {
            ModuleOutput::ok(msg)
        }
        .with_data("url", json!(url))
        .with_data("status_code", json!(status))
        .with_data("response", result.unwrap_or(Value::Null));
        if let Some(diff) = diff {
            output = output.with_diff(diff);
        }
        Ok(output)
    }
}

/// Read resources, following pagination
pub struct AzureRmResourceInfoModule;

#[async_trait]
impl Module for AzureRmResourceInfoModule {
    fn name(&self) -> &'static str {
        "azure_rm_resource_info"
    }

    fn description(&self) -> &'static str {
        "Read any Azure resource or collection through the REST API"
    }

    fn params(&self) -> Vec<ParamSpec> {
        location_params()
    }

    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let arm = context.arm()?;
        let endpoint = resolve_endpoint(arm, params).await?;
        let url = endpoint.path().to_string();
        let label = format!("resource '{}'", url);

        let mut items = Vec::new();
        let mut request = Some(endpoint.request(Method::GET));
        let mut pages = 0;

        while let Some(next) = request.take() {
            let response = arm
                .send(next)
                .await
                .and_then(|r| r.into_result())
                .map_err(|e| ModuleError::cloud("fetching", &label, e))?;
            pages += 1;

            let Some(body) = response.body else {
                break;
            };

            match body.get("value").and_then(Value::as_array) {
                Some(page) => {
                    items.extend(page.iter().cloned());
                    request = body
                        .get("nextLink")
                        .and_then(Value::as_str)
                        .filter(|link| !link.is_empty())
                        .map(ArmRequest::poll);
                }
                None => items.push(body),
            }
        }

        debug!("Read {} items from {} in {} pages", items.len(), url, pages);

        Ok(ModuleOutput::ok(format!("Found {} items", items.len()))
            .with_data("url", json!(url))
            .with_data("response", Value::Array(items)))
    }
}
