//! `azure_rm_resourcegroup`: resource groups.
//!
//! A resource group's location is fixed at creation; asking for a different
//! one fails instead of attempting an update.

use super::{echo_fields, AzureResource};
use crate::arm::ResourceId;
use crate::modules::{ModuleError, ModuleParams, ModuleResult, ParamExt, ParamKind, ParamSpec};
use crate::transform::TransformContext;
use indexmap::IndexMap;
use serde_json::{json, Value};

pub const API_VERSION: &str = "2021-04-01";

pub struct ResourceGroup;

impl AzureResource for ResourceGroup {
    fn module_name(&self) -> &'static str {
        "azure_rm_resourcegroup"
    }

    fn description(&self) -> &'static str {
        "Manage Azure resource groups"
    }

    fn kind(&self) -> &'static str {
        "resource group"
    }

    fn api_version(&self) -> &'static str {
        API_VERSION
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::new("location", ParamKind::Str)
            .describe("Azure region. Required when creating; cannot be changed later.")]
    }

    fn in_resource_group(&self) -> bool {
        false
    }

    fn location_from_resource_group(&self) -> bool {
        false
    }

    fn resource_id(&self, subscription_id: &str, params: &ModuleParams) -> ModuleResult<ResourceId> {
        let name = params.get_string_required("name")?;
        Ok(ResourceId::resource_group(subscription_id, name))
    }

    fn build_payload(&self, params: &ModuleParams, _ctx: &TransformContext) -> ModuleResult<Value> {
        Ok(match params.get_string("location")? {
            Some(location) => json!({ "location": location }),
            None => json!({}),
        })
    }

    fn validate_create(&self, payload: &Value) -> ModuleResult<()> {
        if payload.get("location").map_or(true, Value::is_null) {
            return Err(ModuleError::MissingParameter(
                "location is required when creating a resource group".to_string(),
            ));
        }
        Ok(())
    }

    fn immutable_paths(&self) -> &'static [&'static str] {
        &["/location"]
    }

    fn echo(&self, resource: &Value) -> IndexMap<String, Value> {
        echo_fields(
            resource,
            &[
                ("id", "/id"),
                ("name", "/name"),
                ("location", "/location"),
                ("provisioning_state", "/properties/provisioningState"),
                ("tags", "/tags"),
            ],
        )
    }
}
