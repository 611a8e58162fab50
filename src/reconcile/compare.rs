//! Structural comparison of desired parameters against observed state.
//!
//! The comparison is one-sided: only what the desired tree mentions is
//! checked. `null` on the desired side means "don't care", and keys the
//! remote adds (`id`, `etag`, `provisioningState`, ...) are ignored.

use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// How a scalar at a given path is compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Comparison {
    /// Exact equality; numbers compare numerically
    #[default]
    Default,
    /// Azure region names: spaces removed and lower-cased (`East US` == `eastus`)
    Location,
    /// Strings compared ignoring case
    CaseInsensitive,
    /// Always equal. For create-only inputs the service never echoes back.
    Ignore,
}

/// Per-path comparison rules.
///
/// A rule is looked up by exact path first (`/properties/createMode`), then
/// by the path's final segment (`location`). Out of the box every leaf named
/// `location` uses [`Comparison::Location`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompareOptions {
    exact: HashMap<String, Comparison>,
    leaf: HashMap<String, Comparison>,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self::empty().with_leaf("location", Comparison::Location)
    }
}

impl CompareOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with no rules at all, not even the location one
    pub fn empty() -> Self {
        Self {
            exact: HashMap::new(),
            leaf: HashMap::new(),
        }
    }

    pub fn with_path(mut self, path: &str, comparison: Comparison) -> Self {
        self.exact.insert(path.to_string(), comparison);
        self
    }

    pub fn with_leaf(mut self, key: &str, comparison: Comparison) -> Self {
        self.leaf.insert(key.to_string(), comparison);
        self
    }

    pub fn rule_for(&self, path: &str) -> Comparison {
        if let Some(rule) = self.exact.get(path) {
            return *rule;
        }

        let leaf = path.rsplit('/').next().unwrap_or(path);
        self.leaf.get(leaf).copied().unwrap_or_default()
    }
}

/// The first mismatch found by a comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub path: String,
    pub desired: Value,
    pub observed: Value,
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "changed [{}] {} != {}",
            self.path, self.desired, self.observed
        )
    }
}

/// Compares trees under a set of [`CompareOptions`]
#[derive(Debug, Clone, Default)]
pub struct Comparator {
    options: CompareOptions,
}

impl Comparator {
    pub fn new(options: CompareOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompareOptions {
        &self.options
    }

    /// Returns `true` when every non-null leaf of `desired` matches
    /// `observed`. On a mismatch `report` receives the first difference, if it
    /// does not already hold one.
    pub fn compare(
        &self,
        desired: &Value,
        observed: &Value,
        path: &str,
        report: &mut Option<Difference>,
    ) -> bool {
        if desired.is_null() {
            return true;
        }

        let rule = self.options.rule_for(path);
        if rule == Comparison::Ignore {
            return true;
        }

        let equal = match (desired, observed) {
            (Value::Object(d), Value::Object(o)) => return self.compare_maps(d, o, path, report),
            (Value::Array(d), Value::Array(o)) => return self.compare_lists(d, o, path, report),
            (Value::Object(_), _) | (Value::Array(_), _) => false,
            (d, o) => scalars_equal(d, o, rule),
        };

        if !equal {
            record(report, path, desired, observed);
        }
        equal
    }

    fn compare_maps(
        &self,
        desired: &Map<String, Value>,
        observed: &Map<String, Value>,
        path: &str,
        report: &mut Option<Difference>,
    ) -> bool {
        for (key, want) in desired {
            let child = format!("{}/{}", path.trim_end_matches('/'), key);
            let have = observed.get(key).unwrap_or(&Value::Null);
            if !self.compare(want, have, &child, report) {
                return false;
            }
        }
        true
    }

    fn compare_lists(
        &self,
        desired: &[Value],
        observed: &[Value],
        path: &str,
        report: &mut Option<Difference>,
    ) -> bool {
        if desired.len() != observed.len() {
            record_lists(report, path, desired, observed);
            return false;
        }
        if desired.is_empty() {
            return true;
        }

        let all_objects = desired.iter().chain(observed).all(Value::is_object);
        if all_objects {
            if let Some(key) = universal_key(desired, observed) {
                let desired = sorted_by_key(desired, key);
                let observed = sorted_by_key(observed, key);
                return self.compare_pairwise(&desired, &observed, path, report);
            }
            return self.compare_unordered(desired, observed, path, report);
        }

        let rule = self.options.rule_for(path);
        let desired = sorted_scalars(desired, rule);
        let observed = sorted_scalars(observed, rule);
        self.compare_pairwise(&desired, &observed, path, report)
    }

    fn compare_pairwise(
        &self,
        desired: &[&Value],
        observed: &[&Value],
        path: &str,
        report: &mut Option<Difference>,
    ) -> bool {
        desired
            .iter()
            .zip(observed)
            .all(|(d, o)| self.compare(d, o, path, report))
    }

    /// Match each desired element to a distinct observed element that it
    /// compares equal to. Lists are short, so augmenting paths are fine.
    fn compare_unordered(
        &self,
        desired: &[Value],
        observed: &[Value],
        path: &str,
        report: &mut Option<Difference>,
    ) -> bool {
        let candidates: Vec<Vec<usize>> = desired
            .iter()
            .map(|d| {
                observed
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| self.compare(d, o, path, &mut None))
                    .map(|(j, _)| j)
                    .collect()
            })
            .collect();

        let mut owner: Vec<Option<usize>> = vec![None; observed.len()];
        for i in 0..desired.len() {
            let mut seen = vec![false; observed.len()];
            if !augment(i, &candidates, &mut owner, &mut seen) {
                record_lists(report, path, desired, observed);
                return false;
            }
        }
        true
    }
}

fn augment(
    i: usize,
    candidates: &[Vec<usize>],
    owner: &mut [Option<usize>],
    seen: &mut [bool],
) -> bool {
    for &j in &candidates[i] {
        if seen[j] {
            continue;
        }
        seen[j] = true;
        let free = match owner[j] {
            None => true,
            Some(other) => augment(other, candidates, owner, seen),
        };
        if free {
            owner[j] = Some(i);
            return true;
        }
    }
    false
}

/// Compare `desired` to `observed` with the default rules.
///
/// ```rust
/// use rustible_azure::reconcile::compare::default_compare;
/// use serde_json::json;
///
/// let mut report = None;
/// assert!(default_compare(
///     &json!({"location": "East US"}),
///     &json!({"location": "eastus"}),
///     "/location",
///     &mut report,
/// ));
/// ```
pub fn default_compare(
    desired: &Value,
    observed: &Value,
    path: &str,
    report: &mut Option<Difference>,
) -> bool {
    Comparator::default().compare(desired, observed, path, report)
}

fn record(report: &mut Option<Difference>, path: &str, desired: &Value, observed: &Value) {
    if report.is_none() {
        *report = Some(Difference {
            path: path.to_string(),
            desired: desired.clone(),
            observed: observed.clone(),
        });
    }
}

fn record_lists(report: &mut Option<Difference>, path: &str, desired: &[Value], observed: &[Value]) {
    record(
        report,
        path,
        &Value::Array(desired.to_vec()),
        &Value::Array(observed.to_vec()),
    );
}

fn scalars_equal(desired: &Value, observed: &Value, rule: Comparison) -> bool {
    match (rule, desired, observed) {
        (Comparison::Location, Value::String(d), Value::String(o)) => {
            normalize_location(d) == normalize_location(o)
        }
        (Comparison::CaseInsensitive, Value::String(d), Value::String(o)) => {
            d.to_lowercase() == o.to_lowercase()
        }
        (_, Value::Number(d), Value::Number(o)) => match (d.as_f64(), o.as_f64()) {
            (Some(d), Some(o)) => d == o,
            _ => d == o,
        },
        (_, d, o) => d == o,
    }
}

fn normalize_location(s: &str) -> String {
    s.replace(' ', "").to_lowercase()
}

/// A key present (and non-null) on every element of both lists
fn universal_key(desired: &[Value], observed: &[Value]) -> Option<&'static str> {
    ["id", "name"].into_iter().find(|key| {
        desired
            .iter()
            .chain(observed)
            .all(|v| v.get(key).is_some_and(|k| !k.is_null()))
    })
}

fn sorted_by_key<'a>(items: &'a [Value], key: &str) -> Vec<&'a Value> {
    let mut sorted: Vec<&Value> = items.iter().collect();
    sorted.sort_by(|a, b| value_order(&a[key], &b[key]));
    sorted
}

fn sorted_scalars(items: &[Value], rule: Comparison) -> Vec<&Value> {
    let sort_form = |v: &Value| match (rule, v) {
        (Comparison::Location, Value::String(s)) => Value::String(normalize_location(s)),
        (Comparison::CaseInsensitive, Value::String(s)) => Value::String(s.to_lowercase()),
        _ => v.clone(),
    };

    let mut sorted: Vec<&Value> = items.iter().collect();
    sorted.sort_by(|a, b| value_order(&sort_form(a), &sort_form(b)));
    sorted
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values, used only to line lists up
pub fn value_order(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(x, y)| value_order(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => sorted_repr(x).cmp(&sorted_repr(y)),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn sorted_repr(map: &Map<String, Value>) -> String {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    keys.iter()
        .map(|k| format!("{}={}", k, map[k.as_str()]))
        .collect::<Vec<_>>()
        .join(",")
}
