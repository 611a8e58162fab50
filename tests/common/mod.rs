//! Shared test utilities for the rustible-azure test suite.
//!
//! This module provides:
//! - [`MockArm`], an in-memory Azure Resource Manager behind the `ArmApi` trait
//! - Scripted responses for long-running operations and error paths
//! - Helpers for building parameters and module contexts
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;
use serde_json::{json, Map, Value};

use rustible_azure::arm::{ArmApi, ArmRequest, ArmResponse, ArmResult, PollSettings, Target};
use rustible_azure::modules::{ModuleContext, ModuleOutput, ModuleParams, ModuleStatus};

pub const SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000001";

// ============================================================================
// Mock ARM
// ============================================================================

/// A canned response for the next request matching `method` and `target`
struct Script {
    method: Method,
    target: String,
    response: ArmResponse,
    /// Also apply the request to the in-memory store
    apply: bool,
}

/// A request as seen by the mock
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub target: String,
    pub api_version: Option<String>,
    pub body: Option<Value>,
}

/// In-memory ARM. Resources are stored by lower-cased path; PUT stores the
/// body, PATCH merges into it, DELETE removes it. Scripted responses take
/// precedence, in the order they were added.
pub struct MockArm {
    subscription_id: String,
    resources: Mutex<HashMap<String, Value>>,
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<Recorded>>,
}

impl MockArm {
    pub fn new() -> Self {
        Self {
            subscription_id: SUBSCRIPTION.to_string(),
            resources: Mutex::new(HashMap::new()),
            scripts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A mock that already contains resource group `rg` in `eastus`
    pub fn with_resource_group(group: &str, location: &str) -> Self {
        let arm = Self::new();
        arm.insert(
            &format!("/subscriptions/{}/resourceGroups/{}", SUBSCRIPTION, group),
            json!({"location": location, "properties": {"provisioningState": "Succeeded"}}),
        );
        arm
    }

    /// Store a resource, filling in `id` and `name` from the path
    pub fn insert(&self, path: &str, mut resource: Value) {
        if let Value::Object(map) = &mut resource {
            map.entry("id").or_insert_with(|| json!(path));
            map.entry("name")
                .or_insert_with(|| json!(path.rsplit('/').next().unwrap_or_default()));
        }
        self.resources.lock().insert(path.to_lowercase(), resource);
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        self.resources.lock().get(&path.to_lowercase()).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Answer the next `method` request to `target` with `response`
    pub fn script(&self, method: Method, target: &str, response: ArmResponse) {
        self.scripts.lock().push_back(Script {
            method,
            target: target.to_string(),
            response,
            apply: false,
        });
    }

    /// Like [`MockArm::script`], but still apply the request to the store
    pub fn script_and_apply(&self, method: Method, target: &str, response: ArmResponse) {
        self.scripts.lock().push_back(Script {
            method,
            target: target.to_string(),
            response,
            apply: true,
        });
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().clone()
    }

    /// Number of requests with the given method
    pub fn count(&self, method: &Method) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| &r.method == method)
            .count()
    }

    /// Requests that would have changed something
    pub fn mutations(&self) -> Vec<Recorded> {
        self.requests
            .lock()
            .iter()
            .filter(|r| !matches!(r.method, Method::GET | Method::HEAD))
            .cloned()
            .collect()
    }

    fn take_script(&self, method: &Method, target: &str) -> Option<Script> {
        let mut scripts = self.scripts.lock();
        let index = scripts
            .iter()
            .position(|s| &s.method == method && s.target.eq_ignore_ascii_case(target))?;
        scripts.remove(index)
    }

    fn apply(&self, request: &ArmRequest, path: &str) -> ArmResponse {
        let key = path.to_lowercase();
        let mut resources = self.resources.lock();

        match request.method {
            Method::GET => match resources.get(&key) {
                Some(resource) => ArmResponse::new(200).with_body(resource.clone()),
                None => not_found(path),
            },
            Method::PUT => {
                let mut body = request.body.clone().unwrap_or_else(|| json!({}));
                if let Value::Object(map) = &mut body {
                    map.insert("id".to_string(), json!(path));
                    map.insert(
                        "name".to_string(),
                        json!(path.rsplit('/').next().unwrap_or_default()),
                    );
                }
                let status = if resources.contains_key(&key) { 200 } else { 201 };
                resources.insert(key, body.clone());
                ArmResponse::new(status).with_body(body)
            }
            Method::PATCH => match resources.get_mut(&key) {
                Some(resource) => {
                    if let Some(patch) = &request.body {
                        merge(resource, patch);
                    }
                    ArmResponse::new(200).with_body(resource.clone())
                }
                None => not_found(path),
            },
            Method::DELETE => match resources.remove(&key) {
                Some(_) => ArmResponse::new(200),
                None => ArmResponse::new(204),
            },
            _ => ArmResponse::new(200).with_body(json!({})),
        }
    }
}

impl Default for MockArm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArmApi for MockArm {
    fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    async fn send(&self, request: ArmRequest) -> ArmResult<ArmResponse> {
        let target = request.target.to_string();
        self.requests.lock().push(Recorded {
            method: request.method.clone(),
            target: target.clone(),
            api_version: request.api_version.clone(),
            body: request.body.clone(),
        });

        if let Some(script) = self.take_script(&request.method, &target) {
            if script.apply {
                if let Target::Path(path) = &request.target {
                    self.apply(&request, path);
                }
            }
            return Ok(script.response);
        }

        Ok(match &request.target {
            Target::Path(path) => self.apply(&request, path),
            Target::Url(url) => not_found(url),
        })
    }
}

fn not_found(target: &str) -> ArmResponse {
    ArmResponse::new(404).with_body(json!({
        "error": {"code": "ResourceNotFound", "message": format!("{} was not found", target)}
    }))
}

/// JSON merge patch
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) if value.is_object() => merge(existing, value),
                    _ => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Build module parameters from a JSON object
pub fn params(value: Value) -> ModuleParams {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        other => panic!("parameters must be an object, got {}", other),
    }
}

/// A context that talks to `arm` and never sleeps between polls
pub fn context(arm: &Arc<MockArm>) -> ModuleContext {
    ModuleContext::new()
        .with_arm(arm.clone())
        .with_polling(PollSettings::immediate())
}

pub fn check_context(arm: &Arc<MockArm>) -> ModuleContext {
    context(arm).with_check_mode(true)
}

pub fn diff_context(arm: &Arc<MockArm>) -> ModuleContext {
    context(arm).with_diff_mode(true)
}

/// Path of a resource group in the mock subscription
pub fn group_path(group: &str) -> String {
    format!("/subscriptions/{}/resourceGroups/{}", SUBSCRIPTION, group)
}

/// Path of a provider resource in the mock subscription
pub fn provider_path(group: &str, namespace: &str, rest: &str) -> String {
    format!("{}/providers/{}/{}", group_path(group), namespace, rest)
}

pub fn tags(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

// ============================================================================
// Assertions
// ============================================================================

pub fn assert_changed(output: &ModuleOutput) {
    assert!(output.changed, "expected changed, got: {:?}", output);
    assert_eq!(output.status, ModuleStatus::Changed);
}

pub fn assert_unchanged(output: &ModuleOutput) {
    assert!(!output.changed, "expected no change, got: {:?}", output);
    assert_eq!(output.status, ModuleStatus::Ok);
}
