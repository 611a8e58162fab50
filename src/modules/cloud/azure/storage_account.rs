//! `azure_rm_storageaccount`: storage accounts.
//!
//! Existing accounts are updated with PATCH, which is what the storage
//! resource provider expects for property changes.

use super::{echo_fields, pick_params, required_resource_group, AzureResource, UpdateMethod};
use crate::arm::ResourceId;
use crate::modules::{ModuleError, ModuleParams, ModuleResult, ParamExt, ParamKind, ParamSpec};
use crate::transform::{snake_keys, CaseStyle, PayloadMapper, Transform, TransformContext};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

pub const API_VERSION: &str = "2023-01-01";

/// Ansible spellings of storage SKUs and what ARM expects
pub const SKU_NAMES: &[(&str, &str)] = &[
    ("standard_lrs", "Standard_LRS"),
    ("standard_grs", "Standard_GRS"),
    ("standard_ragrs", "Standard_RAGRS"),
    ("standard_zrs", "Standard_ZRS"),
    ("standard_gzrs", "Standard_GZRS"),
    ("standard_ragzrs", "Standard_RAGZRS"),
    ("premium_lrs", "Premium_LRS"),
    ("premium_zrs", "Premium_ZRS"),
];

const KINDS: &[(&str, &str)] = &[
    ("storage", "Storage"),
    ("storage_v2", "StorageV2"),
    ("blob_storage", "BlobStorage"),
    ("file_storage", "FileStorage"),
    ("block_blob_storage", "BlockBlobStorage"),
];

const ACCESS_TIERS: &[(&str, &str)] = &[("hot", "Hot"), ("cool", "Cool")];

const PROPERTIES: &[&str] = &[
    "access_tier",
    "supports_https_traffic_only",
    "minimum_tls_version",
    "allow_blob_public_access",
    "custom_domain",
    "network_acls",
];

static ACCOUNT_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9]{3,24}$").unwrap());

fn mapper() -> PayloadMapper {
    PayloadMapper::new()
        .then(Transform::map("sku.name", SKU_NAMES))
        .then(Transform::map("kind", KINDS))
        .then(Transform::map("access_tier", ACCESS_TIERS))
        .then(Transform::rename("https_only", "supports_https_traffic_only"))
        .then(Transform::upper("minimum_tls_version"))
        .then(Transform::camelize("network_acls.default_action", CaseStyle::Upper))
        .extend(PROPERTIES.iter().map(|p| Transform::expand(p, "properties")))
        .camelize_keys(true)
}

pub struct StorageAccount;

impl AzureResource for StorageAccount {
    fn module_name(&self) -> &'static str {
        "azure_rm_storageaccount"
    }

    fn description(&self) -> &'static str {
        "Manage Azure storage accounts"
    }

    fn kind(&self) -> &'static str {
        "storage account"
    }

    fn api_version(&self) -> &'static str {
        API_VERSION
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("location", ParamKind::Str)
                .describe("Azure region; defaults to the resource group's location"),
            ParamSpec::new("account_type", ParamKind::Str)
                .describe("SKU, e.g. standard_lrs or Standard_LRS. Required when creating."),
            ParamSpec::new("kind", ParamKind::Str).describe("Storage, StorageV2, BlobStorage, ..."),
            ParamSpec::new("access_tier", ParamKind::Str).choices(&["hot", "cool"]),
            ParamSpec::new("https_only", ParamKind::Bool).describe("Only allow HTTPS traffic"),
            ParamSpec::new("minimum_tls_version", ParamKind::Str)
                .choices(&["tls1_0", "tls1_1", "tls1_2"]),
            ParamSpec::new("allow_blob_public_access", ParamKind::Bool),
            ParamSpec::new("custom_domain", ParamKind::Dict)
                .describe("Mapping with name and use_sub_domain"),
            ParamSpec::new("network_acls", ParamKind::Dict)
                .describe("Mapping with bypass, default_action, ip_rules, virtual_network_rules"),
        ]
    }

    fn resource_id(&self, subscription_id: &str, params: &ModuleParams) -> ModuleResult<ResourceId> {
        let name = params.get_string_required("name")?;
        if !ACCOUNT_NAME.is_match(&name) {
            return Err(ModuleError::InvalidParameter(format!(
                "Storage account name '{}' must be 3-24 lowercase letters or digits",
                name
            )));
        }

        Ok(ResourceId::provider(
            subscription_id,
            required_resource_group(params)?,
            "Microsoft.Storage",
        )
        .child("storageAccounts", name))
    }

    fn build_payload(&self, params: &ModuleParams, ctx: &TransformContext) -> ModuleResult<Value> {
        let mut payload = pick_params(
            params,
            &[
                "location",
                "kind",
                "access_tier",
                "https_only",
                "minimum_tls_version",
                "allow_blob_public_access",
                "custom_domain",
                "network_acls",
            ],
        );

        if let (Some(sku), Value::Object(map)) = (params.get_string("account_type")?, &mut payload) {
            map.insert("sku".to_string(), json!({ "name": sku }));
        }

        Ok(mapper().apply(payload, ctx))
    }

    fn validate_create(&self, payload: &Value) -> ModuleResult<()> {
        if payload.pointer("/sku/name").is_none() {
            return Err(ModuleError::MissingParameter(
                "account_type is required when creating a storage account".to_string(),
            ));
        }
        Ok(())
    }

    fn immutable_paths(&self) -> &'static [&'static str] {
        &["/location"]
    }

    fn update_method(&self) -> UpdateMethod {
        UpdateMethod::Patch
    }

    fn echo(&self, resource: &Value) -> IndexMap<String, Value> {
        let mut fields = echo_fields(
            resource,
            &[
                ("id", "/id"),
                ("name", "/name"),
                ("location", "/location"),
                ("kind", "/kind"),
                ("account_type", "/sku/name"),
                ("access_tier", "/properties/accessTier"),
                ("provisioning_state", "/properties/provisioningState"),
            ],
        );

        if let Some(endpoints) = resource.pointer("/properties/primaryEndpoints") {
            fields.insert("primary_endpoints".to_string(), snake_keys(endpoints.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn params(value: Value) -> ModuleParams {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_sku_name_is_mapped() {
        let payload = StorageAccount
            .build_payload(
                &params(json!({"name": "acct", "account_type": "standard_lrs"})),
                &TransformContext::default(),
            )
            .unwrap();
        assert_eq!(payload, json!({"sku": {"name": "Standard_LRS"}}));
    }

    #[test]
    fn test_full_payload_shape() {
        let payload = StorageAccount
            .build_payload(
                &params(json!({
                    "name": "acct",
                    "resource_group": "rg",
                    "location": "eastus",
                    "account_type": "Premium_LRS",
                    "kind": "storage_v2",
                    "access_tier": "cool",
                    "https_only": true,
                    "minimum_tls_version": "tls1_2",
                    "network_acls": {
                        "default_action": "deny",
                        "bypass": "AzureServices",
                        "ip_rules": [{"value": "10.0.0.0/24", "action": "Allow"}]
                    }
                })),
                &TransformContext::default(),
            )
            .unwrap();

        assert_eq!(
            payload,
            json!({
                "location": "eastus",
                "sku": {"name": "Premium_LRS"},
                "kind": "StorageV2",
                "properties": {
                    "accessTier": "Cool",
                    "supportsHttpsTrafficOnly": true,
                    "minimumTlsVersion": "TLS1_2",
                    "networkAcls": {
                        "defaultAction": "Deny",
                        "bypass": "AzureServices",
                        "ipRules": [{"value": "10.0.0.0/24", "action": "Allow"}]
                    }
                }
            })
        );
    }

    #[test]
    fn test_account_name_validation() {
        assert!(StorageAccount
            .resource_id("sub", &params(json!({"name": "Bad_Name", "resource_group": "rg"})))
            .is_err());
        assert_eq!(
            StorageAccount
                .resource_id("sub", &params(json!({"name": "good01", "resource_group": "rg"})))
                .unwrap()
                .to_string(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/good01"
        );
    }

    #[test]
    fn test_create_requires_sku() {
        assert!(StorageAccount.validate_create(&json!({"location": "eastus"})).is_err());
    }

    #[test]
    fn test_echo_snake_cases_endpoints() {
        let fields = StorageAccount.echo(&json!({
            "id": "/x",
            "sku": {"name": "Standard_LRS"},
            "properties": {"primaryEndpoints": {"blob": "https://a.blob/", "dfs": "https://a.dfs/"}}
        }));
        assert_eq!(fields["account_type"], json!("Standard_LRS"));
        assert_eq!(fields["primary_endpoints"]["blob"], json!("https://a.blob/"));
    }
}
