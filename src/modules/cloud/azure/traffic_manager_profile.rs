//! `azure_rm_trafficmanagerprofile`: Traffic Manager profiles.

use super::{echo_fields, pick_params, required_resource_group, AzureResource};
use crate::arm::ResourceId;
use crate::modules::{ModuleParams, ModuleResult, ParamExt, ParamKind, ParamSpec};
use crate::transform::{CaseStyle, PayloadMapper, Transform, TransformContext};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

pub const API_VERSION: &str = "2022-04-01";

/// Traffic Manager is not a regional service
const GLOBAL: &str = "global";

const DEFAULT_TTL: u64 = 60;

fn mapper() -> PayloadMapper {
    PayloadMapper::new()
        .then(Transform::camelize("profile_status", CaseStyle::Upper))
        .then(Transform::camelize("routing_method", CaseStyle::Upper))
        .then(Transform::rename("routing_method", "traffic_routing_method"))
        .then(Transform::upper("monitor_config.protocol"))
        .then(Transform::camelize("monitor_config.profile_monitor_status", CaseStyle::Upper))
        .extend(
            ["profile_status", "traffic_routing_method", "dns_config", "monitor_config"]
                .iter()
                .map(|p| Transform::expand(p, "properties")),
        )
        .camelize_keys(true)
}

pub struct TrafficManagerProfile;

impl AzureResource for TrafficManagerProfile {
    fn module_name(&self) -> &'static str {
        "azure_rm_trafficmanagerprofile"
    }

    fn description(&self) -> &'static str {
        "Manage Azure Traffic Manager profiles"
    }

    fn kind(&self) -> &'static str {
        "Traffic Manager profile"
    }

    fn api_version(&self) -> &'static str {
        API_VERSION
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new("location", ParamKind::Str).default_value(GLOBAL),
            ParamSpec::new("profile_status", ParamKind::Str)
                .choices(&["enabled", "disabled"])
                .default_value("enabled"),
            ParamSpec::new("routing_method", ParamKind::Str)
                .choices(&["performance", "priority", "weighted", "geographic"])
                .default_value("performance"),
            ParamSpec::new("dns_config", ParamKind::Dict).describe(
                "Mapping with relative_name and ttl. Defaults to the profile name and 60 seconds.",
            ),
            ParamSpec::new("monitor_config", ParamKind::Dict).describe(
                "Mapping with protocol (HTTP, HTTPS, TCP), port, path, interval_in_seconds, \
                 timeout_in_seconds and tolerated_number_of_failures",
            ),
        ]
    }

    fn location_from_resource_group(&self) -> bool {
        false
    }

    fn resource_id(&self, subscription_id: &str, params: &ModuleParams) -> ModuleResult<ResourceId> {
        Ok(ResourceId::provider(
            subscription_id,
            required_resource_group(params)?,
            "Microsoft.Network",
        )
        .child("trafficmanagerprofiles", params.get_string_required("name")?))
    }

    fn build_payload(&self, params: &ModuleParams, ctx: &TransformContext) -> ModuleResult<Value> {
        let name = params.get_string_required("name")?;
        let mut payload = pick_params(
            params,
            &["location", "profile_status", "routing_method", "dns_config", "monitor_config"],
        );

        if let Value::Object(map) = &mut payload {
            map.entry("location").or_insert_with(|| json!(GLOBAL));
            map.entry("profile_status").or_insert_with(|| json!("enabled"));
            map.entry("routing_method").or_insert_with(|| json!("performance"));

            let dns = map
                .entry("dns_config")
                .or_insert_with(|| json!({ "ttl": DEFAULT_TTL }));
            if let Value::Object(dns) = dns {
                default_relative_name(dns, &name);
            }
        }

        Ok(mapper().apply(payload, ctx))
    }

    fn immutable_paths(&self) -> &'static [&'static str] {
        &["/properties/dnsConfig/relativeName"]
    }

    fn echo(&self, resource: &Value) -> IndexMap<String, Value> {
        echo_fields(
            resource,
            &[
                ("id", "/id"),
                ("name", "/name"),
                ("fqdn", "/properties/dnsConfig/fqdn"),
                ("profile_status", "/properties/profileStatus"),
                ("routing_method", "/properties/trafficRoutingMethod"),
                ("monitor_status", "/properties/monitorConfig/profileMonitorStatus"),
            ],
        )
    }
}

fn default_relative_name(dns: &mut Map<String, Value>, name: &str) {
    if dns.get("relative_name").map_or(true, Value::is_null) {
        dns.insert("relative_name".to_string(), json!(name));
    }
}
