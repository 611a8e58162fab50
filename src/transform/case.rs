//! Identifier case conversion between Ansible-style snake_case and the
//! camelCase/PascalCase spellings Azure expects.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

/// Target style for [`snake_to_camel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStyle {
    /// `bounded_staleness` -> `boundedStaleness`
    Lower,
    /// `bounded_staleness` -> `BoundedStaleness`
    Upper,
}

/// Convert a snake_case identifier.
///
/// Every component after the first (and the first too for [`CaseStyle::Upper`])
/// is capitalised with the rest of it lower-cased, so `standard_LRS` becomes
/// `StandardLrs`. Use a lookup table when Azure wants something irregular.
pub fn snake_to_camel(snake: &str, style: CaseStyle) -> String {
    let mut out = String::with_capacity(snake.len());

    for (i, component) in snake.split('_').enumerate() {
        if i == 0 && style == CaseStyle::Lower {
            out.push_str(component);
        } else {
            out.push_str(&capitalize(component));
        }
    }

    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

static FIRST_CAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(.)([A-Z][a-z]+)").unwrap());
static ALL_CAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// Convert a camelCase or PascalCase identifier to snake_case.
///
/// `primaryEndpoints` -> `primary_endpoints`, `HTTPSOnly` -> `https_only`
pub fn camel_to_snake(name: &str) -> String {
    let s1 = FIRST_CAP.replace_all(name, "${1}_${2}");
    ALL_CAP.replace_all(&s1, "${1}_${2}").to_lowercase()
}

/// Recursively rename mapping keys with `f`, descending into lists.
fn rename_keys(value: Value, f: &dyn Fn(&str) -> String) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (f(&k), rename_keys(v, f)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| rename_keys(v, f)).collect()),
        other => other,
    }
}

/// snake_case keys -> lowerCamelCase keys, recursively
pub fn camelize_keys(value: Value) -> Value {
    rename_keys(value, &|k| snake_to_camel(k, CaseStyle::Lower))
}

/// camelCase keys -> snake_case keys, recursively
pub fn snake_keys(value: Value) -> Value {
    rename_keys(value, &camel_to_snake)
}
