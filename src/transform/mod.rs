//! Path-addressed payload transformations.
//!
//! Module parameters arrive in Ansible's snake_case shape. Before they are
//! sent to ARM, selected leaves are re-cased, renamed, nested under a parent
//! key, mapped through lookup tables, or expanded into full resource IDs.
//!
//! Paths are dotted (`"consistency_policy.default_consistency_level"`). When a
//! list is met on the way down, the rest of the path is applied to every
//! element. A missing or `null` intermediate silently ends the walk: none of
//! these functions fail or insert anything when the target is absent.
//!
//! ```rust
//! use rustible_azure::transform::{map_value, camelize, CaseStyle};
//! use serde_json::json;
//!
//! let mut body = json!({"sku": {"name": "standard_lrs"}, "kind": "storage_v2"});
//! map_value(&mut body, "sku.name", &[("standard_lrs", "Standard_LRS")]);
//! camelize(&mut body, "kind", CaseStyle::Upper);
//! assert_eq!(body, json!({"sku": {"name": "Standard_LRS"}, "kind": "StorageV2"}));
//! ```

pub mod case;

pub use case::{camel_to_snake, camelize_keys, snake_keys, snake_to_camel, CaseStyle};

use crate::arm::ResourceIdTemplate;
use serde_json::{Map, Value};

fn split_path(path: &str) -> Vec<&str> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

/// Call `f` with the mapping that owns the final path segment, for every
/// such mapping reachable along `segments`.
fn visit_parents(
    value: &mut Value,
    segments: &[&str],
    f: &mut dyn FnMut(&mut Map<String, Value>, &str),
) {
    match value {
        Value::Array(items) => {
            for item in items {
                visit_parents(item, segments, f);
            }
        }
        Value::Object(map) => match segments {
            [] => {}
            [last] => f(map, last),
            [first, rest @ ..] => {
                if let Some(child) = map.get_mut(*first) {
                    visit_parents(child, rest, f);
                }
            }
        },
        _ => {}
    }
}

fn lookup_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Re-case a string leaf from snake_case
pub fn camelize(value: &mut Value, path: &str, style: CaseStyle) {
    visit_parents(value, &split_path(path), &mut |map, key| {
        if let Some(Value::String(s)) = map.get_mut(key) {
            *s = snake_to_camel(s, style);
        }
    });
}

/// Upper-case a string leaf
pub fn upper(value: &mut Value, path: &str) {
    visit_parents(value, &split_path(path), &mut |map, key| {
        if let Some(Value::String(s)) = map.get_mut(key) {
            *s = s.to_uppercase();
        }
    });
}

/// Move a leaf to a sibling key
pub fn rename(value: &mut Value, path: &str, new_name: &str) {
    visit_parents(value, &split_path(path), &mut |map, key| {
        if map.get(key).map_or(true, Value::is_null) {
            return;
        }
        if let Some(old) = map.remove(key) {
            map.insert(new_name.to_string(), old);
        }
    });
}

/// Move a leaf under `outer` at the same level, creating `outer` if needed
pub fn expand(value: &mut Value, path: &str, outer: &str) {
    visit_parents(value, &split_path(path), &mut |map, key| {
        if map.get(key).map_or(true, Value::is_null) {
            return;
        }
        let Some(old) = map.remove(key) else {
            return;
        };

        let nested = map
            .entry(outer.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(nested) = nested {
            nested.insert(key.to_string(), old);
            return;
        }

        // `outer` exists but is not a mapping; leave the leaf where it was
        map.insert(key.to_string(), old);
    });
}

/// Replace a leaf through a lookup table. Keys match case-insensitively,
/// values missing from the table pass through unchanged. Booleans and
/// numbers are looked up by their string form (`true`, `42`).
pub fn map_value(value: &mut Value, path: &str, table: &[(&str, &str)]) {
    visit_parents(value, &split_path(path), &mut |map, key| {
        let Some(current) = map.get(key).and_then(lookup_key) else {
            return;
        };
        if let Some((_, to)) = table.iter().find(|(from, _)| from.eq_ignore_ascii_case(&current)) {
            map.insert(key.to_string(), Value::String((*to).to_string()));
        }
    });
}

/// Expand a name or `{name, resource_group, ...}` mapping into a full ID
pub fn resource_id(
    value: &mut Value,
    path: &str,
    template: &ResourceIdTemplate,
    ctx: &TransformContext,
) {
    visit_parents(value, &split_path(path), &mut |map, key| {
        let expanded = map.get(key).and_then(|v| {
            template.expand(v, &ctx.subscription_id, ctx.resource_group.as_deref())
        });
        if let Some(id) = expanded {
            map.insert(key.to_string(), Value::String(id));
        }
    });
}

/// Values needed to resolve resource references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformContext {
    pub subscription_id: String,
    pub resource_group: Option<String>,
}

impl TransformContext {
    pub fn new(subscription_id: impl Into<String>, resource_group: Option<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group,
        }
    }
}

/// A single declarative transformation step
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Camelize { path: String, style: CaseStyle },
    Upper { path: String },
    Rename { path: String, to: String },
    Expand { path: String, into: String },
    Map { path: String, table: Vec<(String, String)> },
    ResourceId { path: String, template: ResourceIdTemplate },
}

impl Transform {
    pub fn camelize(path: &str, style: CaseStyle) -> Self {
        Transform::Camelize {
            path: path.to_string(),
            style,
        }
    }

    pub fn upper(path: &str) -> Self {
        Transform::Upper {
            path: path.to_string(),
        }
    }

    pub fn rename(path: &str, to: &str) -> Self {
        Transform::Rename {
            path: path.to_string(),
            to: to.to_string(),
        }
    }

    pub fn expand(path: &str, into: &str) -> Self {
        Transform::Expand {
            path: path.to_string(),
            into: into.to_string(),
        }
    }

    pub fn map(path: &str, table: &[(&str, &str)]) -> Self {
        Transform::Map {
            path: path.to_string(),
            table: table
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    pub fn resource_id(path: &str, template: ResourceIdTemplate) -> Self {
        Transform::ResourceId {
            path: path.to_string(),
            template,
        }
    }

    pub fn apply(&self, value: &mut Value, ctx: &TransformContext) {
        match self {
            Transform::Camelize { path, style } => camelize(value, path, *style),
            Transform::Upper { path } => upper(value, path),
            Transform::Rename { path, to } => rename(value, path, to),
            Transform::Expand { path, into } => expand(value, path, into),
            Transform::Map { path, table } => {
                let table: Vec<(&str, &str)> = table
                    .iter()
                    .map(|(from, to)| (from.as_str(), to.as_str()))
                    .collect();
                map_value(value, path, &table);
            }
            Transform::ResourceId { path, template } => resource_id(value, path, template, ctx),
        }
    }
}

/// An ordered transformation pipeline, optionally finishing with a
/// snake_case -> camelCase key rewrite of the whole tree.
#[derive(Debug, Clone, Default)]
pub struct PayloadMapper {
    transforms: Vec<Transform>,
    camelize_keys: bool,
}

impl PayloadMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn extend(mut self, transforms: impl IntoIterator<Item = Transform>) -> Self {
        self.transforms.extend(transforms);
        self
    }

    pub fn camelize_keys(mut self, enabled: bool) -> Self {
        self.camelize_keys = enabled;
        self
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn apply(&self, mut value: Value, ctx: &TransformContext) -> Value {
        for transform in &self.transforms {
            transform.apply(&mut value, ctx);
        }

        if self.camelize_keys {
            value = camelize_keys(value);
        }

        value
    }
}
