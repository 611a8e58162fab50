//! `azure_rm_sqldatabase`: databases on an Azure SQL logical server.

use super::{echo_fields, pick_params, required_resource_group, AzureResource};
use crate::arm::{ResourceId, ResourceIdTemplate};
use crate::modules::{ModuleParams, ModuleResult, ParamExt, ParamKind, ParamSpec};
use crate::reconcile::{CompareOptions, Comparison};
use crate::transform::{CaseStyle, PayloadMapper, Transform, TransformContext};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

pub const API_VERSION: &str = "2021-11-01";

const NAMESPACE: &str = "Microsoft.Sql";

/// Inputs that only matter when the database is created. GET never echoes
/// them, so they must not trigger an update.
const CREATE_ONLY: &[&str] = &[
    "/properties/createMode",
    "/properties/sourceDatabaseId",
    "/properties/sourceDatabaseDeletionDate",
    "/properties/restorePointInTime",
    "/properties/recoveryServicesRecoveryPointId",
    "/properties/sampleName",
];

const PROPERTIES: &[&str] = &[
    "collation",
    "create_mode",
    "source_database_id",
    "source_database_deletion_date",
    "restore_point_in_time",
    "recovery_services_recovery_point_id",
    "max_size_bytes",
    "elastic_pool_id",
    "read_scale",
    "sample_name",
    "zone_redundant",
];

fn mapper() -> PayloadMapper {
    let database = ResourceIdTemplate::new(NAMESPACE, &["servers", "databases"])
        .with_parent_keys(&["server_name"]);

    PayloadMapper::new()
        .then(Transform::camelize("create_mode", CaseStyle::Upper))
        .then(Transform::resource_id("source_database_id", database))
        .then(Transform::rename(
            "recovery_services_recovery_point_resource_id",
            "recovery_services_recovery_point_id",
        ))
        .then(Transform::map(
            "read_scale",
            &[("true", "Enabled"), ("false", "Disabled")],
        ))
        .then(Transform::map("sample_name", &[("AdventureWorksLT", "AdventureWorksLT")]))
        .then(Transform::rename("elastic_pool_name", "elastic_pool_id"))
        .extend(PROPERTIES.iter().map(|p| Transform::expand(p, "properties")))
        .camelize_keys(true)
}

pub struct SqlDatabase;

impl AzureResource for SqlDatabase {
    fn module_name(&self) -> &'static str {
        "azure_rm_sqldatabase"
    }

    fn description(&self) -> &'static str {
        "Manage Azure SQL databases"
    }

    fn kind(&self) -> &'static str {
        "SQL database"
    }

    fn api_version(&self) -> &'static str {
        API_VERSION
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("server_name", ParamKind::Str)
                .required()
                .describe("Name of the SQL server hosting the database"),
            ParamSpec::new("location", ParamKind::Str),
            ParamSpec::new("collation", ParamKind::Str),
            ParamSpec::new("create_mode", ParamKind::Str).choices(&[
                "copy",
                "default",
                "non_readable_secondary",
                "online_secondary",
                "point_in_time_restore",
                "recovery",
                "restore",
                "restore_long_term_retention_backup",
            ]),
            ParamSpec::new("source_database_id", ParamKind::Raw).describe(
                "Source database for copy and restore modes: a resource ID, a database \
                 name on the same server, or a mapping with name and server_name",
            ),
            ParamSpec::new("source_database_deletion_date", ParamKind::Str),
            ParamSpec::new("restore_point_in_time", ParamKind::Str),
            ParamSpec::new("recovery_services_recovery_point_resource_id", ParamKind::Str),
            ParamSpec::new("sku", ParamKind::Dict)
                .describe("Mapping with name, tier, size, family and capacity"),
            ParamSpec::new("max_size_bytes", ParamKind::Int),
            ParamSpec::new("elastic_pool_name", ParamKind::Str)
                .describe("Elastic pool on the same server, or its resource ID"),
            ParamSpec::new("read_scale", ParamKind::Bool),
            ParamSpec::new("sample_name", ParamKind::Str).choices(&["AdventureWorksLT"]),
            ParamSpec::new("zone_redundant", ParamKind::Bool),
        ]
    }

    fn resource_id(&self, subscription_id: &str, params: &ModuleParams) -> ModuleResult<ResourceId> {
        Ok(
            ResourceId::provider(subscription_id, required_resource_group(params)?, NAMESPACE)
                .child("servers", params.get_string_required("server_name")?)
                .child("databases", params.get_string_required("name")?),
        )
    }

    fn build_payload(&self, params: &ModuleParams, ctx: &TransformContext) -> ModuleResult<Value> {
        let server = params.get_string_required("server_name")?;
        let mut payload = pick_params(
            params,
            &[
                "location",
                "collation",
                "create_mode",
                "source_database_id",
                "source_database_deletion_date",
                "restore_point_in_time",
                "recovery_services_recovery_point_resource_id",
                "sku",
                "max_size_bytes",
                "elastic_pool_name",
                "read_scale",
                "sample_name",
                "zone_redundant",
            ],
        );

        if let Value::Object(map) = &mut payload {
            // A bare source name refers to a database on the same server
            if let Some(Value::String(name)) = map.get("source_database_id") {
                if !name.starts_with('/') {
                    let source = json!({"name": name, "server_name": server});
                    map.insert("source_database_id".to_string(), source);
                }
            }

            if let Some(Value::String(pool)) = map.get("elastic_pool_name") {
                if !pool.starts_with('/') {
                    let id = ResourceId::provider(
                        &ctx.subscription_id,
                        required_resource_group(params)?,
                        NAMESPACE,
                    )
                    .child("servers", &server)
                    .child("elasticPools", pool);
                    map.insert("elastic_pool_name".to_string(), json!(id.to_string()));
                }
            }

            if let Some(Value::Object(sku)) = map.get_mut("sku") {
                normalize_sku(sku);
            }
        }

        Ok(mapper().apply(payload, ctx))
    }

    fn compare_options(&self) -> CompareOptions {
        CREATE_ONLY
            .iter()
            .fold(CompareOptions::default(), |options, path| {
                options.with_path(path, Comparison::Ignore)
            })
            .with_leaf("collation", Comparison::CaseInsensitive)
    }

    fn immutable_paths(&self) -> &'static [&'static str] {
        &["/location"]
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
                ("database_id", "/properties/databaseId"),
                ("status", "/properties/status"),
                ("sku", "/sku"),
            ],
        )
    }
}

/// `capacity` arrives as a string from `-a` and some inventories; ARM wants a number
fn normalize_sku(sku: &mut Map<String, Value>) {
    if let Some(Value::String(capacity)) = sku.get("capacity") {
        if let Ok(capacity) = capacity.parse::<i64>() {
            sku.insert("capacity".to_string(), json!(capacity));
        }
    }
}
