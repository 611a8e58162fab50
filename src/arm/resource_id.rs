//! ARM resource identifiers.
//!
//! ```text
//! /subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/{type}/{name}...]
//! ```

use serde_json::Value;
use std::fmt;

/// A parsed ARM resource ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: Option<String>,
    pub namespace: Option<String>,
    /// `(type, name)` pairs, outermost first
    pub segments: Vec<(String, String)>,
}

impl ResourceId {
    /// ID of a subscription-level scope
    pub fn subscription(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: None,
            namespace: None,
            segments: Vec::new(),
        }
    }

    /// ID of a resource group
    pub fn resource_group(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
    ) -> Self {
        Self {
            resource_group: Some(resource_group.into()),
            ..Self::subscription(subscription_id)
        }
    }

    /// Start a provider resource ID inside a resource group
    pub fn provider(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            ..Self::resource_group(subscription_id, resource_group)
        }
    }

    /// Append a `type/name` segment
    pub fn child(mut self, resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        self.segments.push((resource_type.into(), name.into()));
        self
    }

    /// Name of the innermost resource
    pub fn name(&self) -> Option<&str> {
        self.segments
            .last()
            .map(|(_, name)| name.as_str())
            .or(self.resource_group.as_deref())
    }

    /// Parse an ID. Returns `None` if the string is not a well-formed ARM ID.
    pub fn parse(id: &str) -> Option<Self> {
        let parts: Vec<&str> = id.split('/').filter(|p| !p.is_empty()).collect();
        let mut iter = parts.into_iter().peekable();

        if !iter.next()?.eq_ignore_ascii_case("subscriptions") {
            return None;
        }
        let mut result = Self::subscription(iter.next()?);

        if iter
            .peek()
            .is_some_and(|p| p.eq_ignore_ascii_case("resourceGroups"))
        {
            iter.next();
            result.resource_group = Some(iter.next()?.to_string());
        }

        if iter.peek().is_some_and(|p| p.eq_ignore_ascii_case("providers")) {
            iter.next();
            result.namespace = Some(iter.next()?.to_string());
        }

        while let Some(resource_type) = iter.next() {
            let name = iter.next()?;
            result
                .segments
                .push((resource_type.to_string(), name.to_string()));
        }

        if result.namespace.is_some() && result.segments.is_empty() {
            return None;
        }

        Some(result)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/subscriptions/{}", self.subscription_id)?;
        if let Some(rg) = &self.resource_group {
            write!(f, "/resourceGroups/{}", rg)?;
        }
        if let Some(ns) = &self.namespace {
            write!(f, "/providers/{}", ns)?;
        }
        for (resource_type, name) in &self.segments {
            write!(f, "/{}/{}", resource_type, name)?;
        }
        Ok(())
    }
}

/// Describes how to build the ID of a referenced resource from a short form.
///
/// A reference may be given as:
/// - a full ID (starts with `/`), used as-is
/// - a bare name, when the template has a single type
/// - a mapping `{name, resource_group?, subscription_id?, <parent keys>...}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdTemplate {
    pub namespace: String,
    pub types: Vec<String>,
    /// Mapping keys that name each parent, one per type except the last
    pub parent_keys: Vec<String>,
}

impl ResourceIdTemplate {
    pub fn new(namespace: &str, types: &[&str]) -> Self {
        Self {
            namespace: namespace.to_string(),
            types: types.iter().map(|t| t.to_string()).collect(),
            parent_keys: Vec::new(),
        }
    }

    pub fn with_parent_keys(mut self, keys: &[&str]) -> Self {
        self.parent_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Build a full ID from `value`, or `None` if it cannot be resolved
    pub fn expand(
        &self,
        value: &Value,
        subscription_id: &str,
        resource_group: Option<&str>,
    ) -> Option<String> {
        match value {
            Value::String(s) if s.starts_with('/') => Some(s.clone()),
            Value::String(name) if self.types.len() == 1 => {
                let id = ResourceId::provider(subscription_id, resource_group?, &self.namespace)
                    .child(&self.types[0], name);
                Some(id.to_string())
            }
            Value::Object(obj) => {
                let name = obj.get("name")?.as_str()?;
                let rg = obj
                    .get("resource_group")
                    .and_then(Value::as_str)
                    .or(resource_group)?;
                let sub = obj
                    .get("subscription_id")
                    .and_then(Value::as_str)
                    .unwrap_or(subscription_id);

                let (last_type, parent_types) = self.types.split_last()?;
                if parent_types.len() != self.parent_keys.len() {
                    return None;
                }

                let mut id = ResourceId::provider(sub, rg, &self.namespace);
                for (resource_type, key) in parent_types.iter().zip(&self.parent_keys) {
                    let parent = obj.get(key.as_str())?.as_str()?;
                    id = id.child(resource_type, parent);
                }
                Some(id.child(last_type, name).to_string())
            }
            _ => None,
        }
    }
}
