//! Azure Resource Manager modules.
//!
//! Every typed module is an [`AzureRmModule`] wrapped around an
//! [`AzureResource`] definition. The definition says where the resource lives,
//! how parameters become an ARM payload and which fields are echoed back; the
//! wrapper runs the shared lifecycle:
//!
//! 1. GET the resource (404 means absent)
//! 2. build the desired payload and [`decide`] what to do
//! 3. stop here in check mode
//! 4. PUT/PATCH or DELETE, then poll the long-running operation
//! 5. optionally wait until a deleted resource stops answering GET
//!
//! ## Available Modules
//!
//! - `azure_rm_resourcegroup`
//! - `azure_rm_storageaccount`
//! - `azure_rm_sqldatabase`
//! - `azure_rm_cosmosdbaccount`
//! - `azure_rm_trafficmanagerprofile`
//! - `azure_rm_resource` / `azure_rm_resource_info` (generic REST)

pub mod cosmosdb_account;
pub mod resource;
pub mod resource_group;
pub mod sql_database;
pub mod storage_account;
pub mod traffic_manager_profile;

pub use cosmosdb_account::CosmosDbAccount;
pub use resource::{AzureRmResourceInfoModule, AzureRmResourceModule};
pub use resource_group::ResourceGroup;
pub use sql_database::SqlDatabase;
pub use storage_account::StorageAccount;
pub use traffic_manager_profile::TrafficManagerProfile;

use crate::arm::{
    get_resource, wait_for_completion, wait_until_absent, ArmApi, ArmRequest, ResourceId,
};
use crate::modules::{
    Diff, Module, ModuleContext, ModuleError, ModuleOutput, ModuleParams, ModuleRegistry,
    ModuleResult, ParamExt, ParamKind, ParamSpec,
};
use crate::reconcile::{decide, Action, CompareOptions, Decision, DesiredState, ReconcileRequest, TagRequest};
use crate::transform::TransformContext;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Register every Azure module
pub fn register_all(registry: &mut ModuleRegistry) {
    registry.register(Arc::new(AzureRmModule::new(ResourceGroup)));
    registry.register(Arc::new(AzureRmModule::new(StorageAccount)));
    registry.register(Arc::new(AzureRmModule::new(SqlDatabase)));
    registry.register(Arc::new(AzureRmModule::new(CosmosDbAccount)));
    registry.register(Arc::new(AzureRmModule::new(TrafficManagerProfile)));
    registry.register(Arc::new(AzureRmResourceModule));
    registry.register(Arc::new(AzureRmResourceInfoModule));
}

/// How an existing resource is updated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    Put,
    Patch,
}

/// A typed ARM resource managed through [`AzureRmModule`]
pub trait AzureResource: Send + Sync + 'static {
    fn module_name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Human-readable kind used in messages, e.g. `storage account`
    fn kind(&self) -> &'static str;

    fn api_version(&self) -> &'static str;

    /// Resource-specific parameters. `name`, `state`, `resource_group`,
    /// `tags` and `append_tags` are added by [`AzureRmModule`].
    fn params(&self) -> Vec<ParamSpec>;

    fn in_resource_group(&self) -> bool {
        true
    }

    fn resource_id(&self, subscription_id: &str, params: &ModuleParams) -> ModuleResult<ResourceId>;

    /// Desired ARM payload (camelCase, without tags)
    fn build_payload(&self, params: &ModuleParams, ctx: &TransformContext) -> ModuleResult<Value>;

    /// Extra checks on the final create payload
    fn validate_create(&self, payload: &Value) -> ModuleResult<()> {
        let _ = payload;
        Ok(())
    }

    fn compare_options(&self) -> CompareOptions {
        CompareOptions::default()
    }

    /// JSON pointers that cannot change after creation
    fn immutable_paths(&self) -> &'static [&'static str] {
        &[]
    }

    fn update_method(&self) -> UpdateMethod {
        UpdateMethod::Put
    }

    fn supports_tags(&self) -> bool {
        true
    }

    /// Fill a missing `location` from the resource group on create
    fn location_from_resource_group(&self) -> bool {
        true
    }

    /// Poll until GET returns 404 after a delete
    fn confirm_delete(&self) -> bool {
        false
    }

    /// Fields returned to the caller
    fn echo(&self, resource: &Value) -> IndexMap<String, Value> {
        echo_fields(resource, &[("id", "/id")])
    }
}

/// Pick `(output key, JSON pointer)` pairs out of a resource, skipping absent ones
pub fn echo_fields(resource: &Value, fields: &[(&str, &str)]) -> IndexMap<String, Value> {
    fields
        .iter()
        .filter_map(|(key, pointer)| {
            resource
                .pointer(pointer)
                .filter(|v| !v.is_null())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect()
}

/// Copy the listed parameters into a mapping, skipping absent and null ones
pub fn pick_params(params: &ModuleParams, keys: &[&str]) -> Value {
    let map: Map<String, Value> = keys
        .iter()
        .filter_map(|key| {
            params
                .get(*key)
                .filter(|v| !v.is_null())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect();
    Value::Object(map)
}

/// Resource group name, required by every resource that lives in one
pub fn required_resource_group(params: &ModuleParams) -> ModuleResult<String> {
    params.get_string_required("resource_group")
}

fn common_params(in_resource_group: bool, tags: bool) -> Vec<ParamSpec> {
    let mut specs = vec![ParamSpec::new("name", ParamKind::Str)
        .required()
        .describe("Name of the resource")];

    if in_resource_group {
        specs.push(
            ParamSpec::new("resource_group", ParamKind::Str)
                .required()
                .describe("Resource group that contains the resource"),
        );
    }

    specs.push(
        ParamSpec::new("state", ParamKind::Str)
            .choices(&["present", "absent"])
            .default_value("present")
            .describe("Whether the resource should exist"),
    );

    if tags {
        specs.push(ParamSpec::new("tags", ParamKind::Dict).describe("Resource tags"));
        specs.push(
            ParamSpec::new("append_tags", ParamKind::Bool)
                .default_value("true")
                .describe("Keep existing tags that are not listed in tags"),
        );
    }

    specs
}

fn desired_state(params: &ModuleParams) -> ModuleResult<DesiredState> {
    params
        .get_string("state")?
        .map(|s| s.parse::<DesiredState>())
        .transpose()
        .map_err(ModuleError::InvalidParameter)
        .map(Option::unwrap_or_default)
}

/// Generic create/update/delete lifecycle for an [`AzureResource`]
pub struct AzureRmModule<R> {
    resource: R,
}

impl<R: AzureResource> AzureRmModule<R> {
    pub fn new(resource: R) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    async fn fetch_group_location(
        &self,
        arm: &dyn ArmApi,
        group: &str,
    ) -> ModuleResult<Value> {
        let path = ResourceId::resource_group(arm.subscription_id(), group).to_string();
        let label = format!("resource group '{}'", group);

        let group = get_resource(arm, &path, resource_group::API_VERSION)
            .await
            .map_err(|e| ModuleError::cloud("fetching", &label, e))?
            .ok_or_else(|| ModuleError::ExecutionFailed(format!("{} does not exist", label)))?;

        group
            .get("location")
            .cloned()
            .ok_or_else(|| ModuleError::ExecutionFailed(format!("{} has no location", label)))
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply(
        &self,
        arm: &dyn ArmApi,
        context: &ModuleContext,
        label: &str,
        path: &str,
        mut body: Value,
        decision: Decision,
        observed: Option<Value>,
        resource_group: Option<&str>,
    ) -> ModuleResult<ModuleOutput> {
        let create = decision.action == Action::Create;
        let api_version = self.resource.api_version();

        if let Value::Object(map) = &mut body {
            if let Some(tags) = decision.tags {
                map.insert("tags".to_string(), Value::Object(tags));
            }
        }

        if create
            && self.resource.location_from_resource_group()
            && body.get("location").map_or(true, Value::is_null)
        {
            if let Some(group) = resource_group {
                let location = self.fetch_group_location(arm, group).await?;
                if let Value::Object(map) = &mut body {
                    map.insert("location".to_string(), location);
                }
            }
        }

        // PUT replaces the resource, so an update must restate its location
        // and any tags it is not changing
        if !create && self.resource.update_method() == UpdateMethod::Put {
            for key in ["location", "tags"] {
                if !body.get(key).map_or(true, Value::is_null) {
                    continue;
                }
                let current = observed.as_ref().and_then(|r| r.get(key)).cloned();
                if let (Some(current), Value::Object(map)) = (current, &mut body) {
                    map.insert(key.to_string(), current);
                }
            }
        }

        if create {
            self.resource.validate_create(&body)?;
        }

        let (operation, verb, done) = if create {
            ("creating", "create", "Created")
        } else {
            ("updating", "update", "Updated")
        };

        let diff = context
            .diff_mode
            .then(|| Diff::new(observed.clone().unwrap_or(Value::Null), body.clone()));

        if context.check_mode {
            let mut output = ModuleOutput::changed(format!("Would {} {}", verb, label));
            if let Some(resource) = &observed {
                output = output.with_fields(self.resource.echo(resource));
            }
            if let Some(diff) = diff {
                output = output.with_diff(diff);
            }
            return Ok(output);
        }

        info!("{} {}", if create { "Creating" } else { "Updating" }, label);

        let request = match (create, self.resource.update_method()) {
            (false, UpdateMethod::Patch) => ArmRequest::patch(path, body),
            _ => ArmRequest::put(path, body),
        }
        .with_api_version(api_version);

        let response = arm
            .send(request)
            .await
            .map_err(|e| ModuleError::cloud(operation, label, e))?;

        let final_get = ArmRequest::get(path).with_api_version(api_version);
        let result = wait_for_completion(arm, response, Some(final_get), &context.polling)
            .await
            .map_err(|e| ModuleError::cloud(operation, label, e))?;

        let resource = match result {
            Some(resource) => resource,
            None => get_resource(arm, path, api_version)
                .await
                .map_err(|e| ModuleError::cloud("fetching", label, e))?
                .unwrap_or(Value::Null),
        };

        let mut output = ModuleOutput::changed(format!("{} {}", done, label))
            .with_fields(self.resource.echo(&resource));
        if let Some(diff) = diff {
            output = output.with_diff(diff);
        }
        Ok(output)
    }

    async fn remove(
        &self,
        arm: &dyn ArmApi,
        context: &ModuleContext,
        label: &str,
        path: &str,
        observed: Option<Value>,
    ) -> ModuleResult<ModuleOutput> {
        let api_version = self.resource.api_version();
        let diff = context
            .diff_mode
            .then(|| Diff::new(observed.unwrap_or(Value::Null), Value::Null));

        let mut output = if context.check_mode {
            ModuleOutput::changed(format!("Would delete {}", label))
        } else {
            info!("Deleting {}", label);

            let response = arm
                .send(ArmRequest::delete(path).with_api_version(api_version))
                .await
                .map_err(|e| ModuleError::cloud("deleting", label, e))?;

            // Already gone between the GET and the DELETE
            if response.status != 404 {
                wait_for_completion(arm, response, None, &context.polling)
                    .await
                    .map_err(|e| ModuleError::cloud("deleting", label, e))?;
            }

            if self.resource.confirm_delete() {
                wait_until_absent(arm, path, api_version, &context.polling)
                    .await
                    .map_err(|e| ModuleError::cloud("waiting for deletion of", label, e))?;
            }

            ModuleOutput::changed(format!("Deleted {}", label))
        };

        if let Some(diff) = diff {
            output = output.with_diff(diff);
        }
        Ok(output)
    }
}

#[async_trait]
impl<R: AzureResource> Module for AzureRmModule<R> {
    fn name(&self) -> &'static str {
        self.resource.module_name()
    }

    fn description(&self) -> &'static str {
        self.resource.description()
    }

    fn params(&self) -> Vec<ParamSpec> {
        let mut specs = common_params(
            self.resource.in_resource_group(),
            self.resource.supports_tags(),
        );
        specs.extend(self.resource.params());
        specs
    }

    async fn execute(
        &self,
        params: &ModuleParams,
        context: &ModuleContext,
    ) -> ModuleResult<ModuleOutput> {
        let arm = context.arm()?;
        let name = params.get_string_required("name")?;
        let label = format!("{} '{}'", self.resource.kind(), name);
        let state = desired_state(params)?;
        let resource_group = params.get_string("resource_group")?;

        let path = self
            .resource
            .resource_id(arm.subscription_id(), params)?
            .to_string();
        let api_version = self.resource.api_version();

        let observed = get_resource(arm, &path, api_version)
            .await
            .map_err(|e| ModuleError::cloud("fetching", &label, e))?;

        let desired = match state {
            DesiredState::Present => {
                let ctx = TransformContext::new(arm.subscription_id(), resource_group.clone());
                self.resource.build_payload(params, &ctx)?
            }
            DesiredState::Absent => Value::Object(Map::new()),
        };

        let tags = if self.resource.supports_tags() {
            let append = params.get_bool("append_tags")?.unwrap_or(true);
            params
                .get_object("tags")?
                .map(|tags| TagRequest::new(tags, append))
        } else {
            None
        };

        let request = ReconcileRequest::new(state, desired)
            .with_tags(tags)
            .with_compare_options(self.resource.compare_options())
            .with_immutable(self.resource.immutable_paths());

        let decision = decide(&request, observed.as_ref())?;
        match &decision.difference {
            Some(difference) => debug!("{}: {} ({})", label, decision.action, difference),
            None => debug!("{}: {}", label, decision.action),
        }

        match decision.action {
            Action::NoAction => {
                let output = match &observed {
                    Some(resource) => ModuleOutput::ok(format!("{} is up to date", label))
                        .with_fields(self.resource.echo(resource)),
                    None => ModuleOutput::ok(format!("{} does not exist", label)),
                };
                Ok(output)
            }
            Action::Create | Action::Update => {
                self.apply(
                    arm,
                    context,
                    &label,
                    &path,
                    request.desired,
                    decision,
                    observed,
                    resource_group.as_deref(),
                )
                .await
            }
            Action::Delete => self.remove(arm, context, &label, &path, observed).await,
        }
    }
}
