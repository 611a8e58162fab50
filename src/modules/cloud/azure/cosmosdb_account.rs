//! `azure_rm_cosmosdbaccount`: Cosmos DB database accounts.
//!
//! Account deletion is slow and the service keeps answering GET for a while
//! after the operation reports success, so deletes wait until the account is
//! really gone.

use super::{echo_fields, pick_params, required_resource_group, AzureResource};
use crate::arm::{ResourceId, ResourceIdTemplate};
use crate::modules::{ModuleError, ModuleParams, ModuleResult, ParamExt, ParamKind, ParamSpec};
use crate::reconcile::{CompareOptions, Comparison};
use crate::transform::{CaseStyle, PayloadMapper, Transform, TransformContext};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

pub const API_VERSION: &str = "2021-04-15";

const KINDS: &[(&str, &str)] = &[
    ("global_document_db", "GlobalDocumentDB"),
    ("mongo_db", "MongoDB"),
    ("parse", "Parse"),
];

/// Boolean parameters that turn into entries of `capabilities`
const CAPABILITY_FLAGS: &[(&str, &str)] = &[
    ("enable_cassandra", "EnableCassandra"),
    ("enable_table", "EnableTable"),
    ("enable_gremlin", "EnableGremlin"),
    ("enable_serverless", "EnableServerless"),
];

const PROPERTIES: &[&str] = &[
    "consistency_policy",
    "locations",
    "database_account_offer_type",
    "ip_rules",
    "is_virtual_network_filter_enabled",
    "enable_automatic_failover",
    "enable_multiple_write_locations",
    "enable_free_tier",
    "public_network_access",
    "capabilities",
    "virtual_network_rules",
];

fn mapper() -> PayloadMapper {
    let subnet = ResourceIdTemplate::new("Microsoft.Network", &["virtualNetworks", "subnets"])
        .with_parent_keys(&["virtual_network_name"]);

    PayloadMapper::new()
        .then(Transform::map("kind", KINDS))
        .then(Transform::map("database_account_offer_type", &[("Standard", "Standard")]))
        .then(Transform::camelize(
            "consistency_policy.default_consistency_level",
            CaseStyle::Upper,
        ))
        .then(Transform::rename("geo_rep_locations.name", "location_name"))
        .then(Transform::rename("geo_rep_locations", "locations"))
        .then(Transform::resource_id("virtual_network_rules.subnet", subnet))
        .then(Transform::rename("virtual_network_rules.subnet", "id"))
        .then(Transform::map(
            "public_network_access",
            &[("enabled", "Enabled"), ("disabled", "Disabled")],
        ))
        .extend(PROPERTIES.iter().map(|p| Transform::expand(p, "properties")))
        .camelize_keys(true)
}

pub struct CosmosDbAccount;

impl AzureResource for CosmosDbAccount {
    fn module_name(&self) -> &'static str {
        "azure_rm_cosmosdbaccount"
    }

    fn description(&self) -> &'static str {
        "Manage Azure Cosmos DB accounts"
    }

    fn kind(&self) -> &'static str {
        "Cosmos DB account"
    }

    fn api_version(&self) -> &'static str {
        API_VERSION
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("location", ParamKind::Str),
            ParamSpec::new("kind", ParamKind::Str)
                .choices(&["global_document_db", "mongo_db", "parse"])
                .describe("API of the account; cannot be changed after creation"),
            ParamSpec::new("consistency_policy", ParamKind::Dict).describe(
                "Mapping with default_consistency_level (eventual, session, \
                 bounded_staleness, strong, consistent_prefix), max_staleness_prefix \
                 and max_interval_in_seconds",
            ),
            ParamSpec::new("geo_rep_locations", ParamKind::List)
                .describe("List of mappings with name and failover_priority. Required when creating."),
            ParamSpec::new("database_account_offer_type", ParamKind::Str)
                .choices(&["Standard"])
                .describe("Required when creating"),
            ParamSpec::new("ip_range_filter", ParamKind::Raw)
                .describe("Comma separated string or list of IP addresses and CIDR ranges"),
            ParamSpec::new("is_virtual_network_filter_enabled", ParamKind::Bool),
            ParamSpec::new("enable_automatic_failover", ParamKind::Bool),
            ParamSpec::new("enable_cassandra", ParamKind::Bool),
            ParamSpec::new("enable_table", ParamKind::Bool),
            ParamSpec::new("enable_gremlin", ParamKind::Bool),
            ParamSpec::new("enable_serverless", ParamKind::Bool),
            ParamSpec::new("enable_multiple_write_locations", ParamKind::Bool),
            ParamSpec::new("enable_free_tier", ParamKind::Bool),
            ParamSpec::new("public_network_access", ParamKind::Str)
                .choices(&["enabled", "disabled", "Enabled", "Disabled"]),
            ParamSpec::new("virtual_network_rules", ParamKind::List).describe(
                "List of mappings with subnet (ID, or mapping with virtual_network_name, \
                 name and resource_group) and ignore_missing_vnet_service_endpoint",
            ),
        ]
    }

    fn resource_id(&self, subscription_id: &str, params: &ModuleParams) -> ModuleResult<ResourceId> {
        let name = params.get_string_required("name")?;
        Ok(ResourceId::provider(
            subscription_id,
            required_resource_group(params)?,
            "Microsoft.DocumentDB",
        )
        .child("databaseAccounts", name))
    }

    fn build_payload(&self, params: &ModuleParams, ctx: &TransformContext) -> ModuleResult<Value> {
        let mut payload = pick_params(
            params,
            &[
                "location",
                "kind",
                "consistency_policy",
                "geo_rep_locations",
                "database_account_offer_type",
                "is_virtual_network_filter_enabled",
                "enable_automatic_failover",
                "enable_multiple_write_locations",
                "enable_free_tier",
                "public_network_access",
                "virtual_network_rules",
            ],
        );

        if let Value::Object(map) = &mut payload {
            if let Some(capabilities) = capabilities(params)? {
                map.insert("capabilities".to_string(), capabilities);
            }
            if let Some(rules) = ip_rules(params)? {
                map.insert("ip_rules".to_string(), rules);
            }
        }

        Ok(mapper().apply(payload, ctx))
    }

    fn validate_create(&self, payload: &Value) -> ModuleResult<()> {
        let properties = payload.get("properties");
        let missing = [
            ("geo_rep_locations", "locations"),
            ("database_account_offer_type", "databaseAccountOfferType"),
        ]
        .into_iter()
        .find(|(_, key)| properties.and_then(|p| p.get(*key)).is_none());

        match missing {
            Some((param, _)) => Err(ModuleError::MissingParameter(format!(
                "{} is required when creating a Cosmos DB account",
                param
            ))),
            None => Ok(()),
        }
    }

    fn compare_options(&self) -> CompareOptions {
        CompareOptions::default()
            .with_leaf("locationName", Comparison::Location)
            .with_path("/properties/virtualNetworkRules/id", Comparison::CaseInsensitive)
    }

    fn immutable_paths(&self) -> &'static [&'static str] {
        &["/location", "/kind"]
    }

    fn confirm_delete(&self) -> bool {
        true
    }

    fn echo(&self, resource: &Value) -> IndexMap<String, Value> {
        echo_fields(
            resource,
            &[
                ("id", "/id"),
                ("name", "/name"),
                ("location", "/location"),
                ("kind", "/kind"),
                ("document_endpoint", "/properties/documentEndpoint"),
                ("provisioning_state", "/properties/provisioningState"),
            ],
        )
    }
}

/// `capabilities` from the `enable_*` flags, or `None` when no flag is given
fn capabilities(params: &ModuleParams) -> ModuleResult<Option<Value>> {
    let mut any = false;
    let mut enabled = Vec::new();

    for (flag, capability) in CAPABILITY_FLAGS {
        if let Some(on) = params.get_bool(flag)? {
            any = true;
            if on {
                enabled.push(json!({ "name": capability }));
            }
        }
    }

    Ok(any.then(|| Value::Array(enabled)))
}

/// `ip_range_filter` as a list of `ip_rules`
fn ip_rules(params: &ModuleParams) -> ModuleResult<Option<Value>> {
    let Some(ranges) = params.get_vec_string("ip_range_filter")? else {
        return Ok(None);
    };

    let rules = ranges
        .into_iter()
        .filter(|range| !range.is_empty())
        .map(|range| {
            let mut rule = Map::new();
            rule.insert("ip_address_or_range".to_string(), Value::String(range));
            Value::Object(rule)
        })
        .collect();
    Ok(Some(Value::Array(rules)))
}
