//! Reconciliation of desired against observed resource state.
//!
//! [`decide`] is a pure function: given an immutable [`ReconcileRequest`] and
//! the resource as currently observed (or `None` if it does not exist), it
//! returns the [`Action`] to take. It performs no I/O; the module lifecycle
//! fetches state and carries out the decision.
//!
//! | observed | state     | action                                  |
//! |----------|-----------|-----------------------------------------|
//! | absent   | `absent`  | [`Action::NoAction`]                    |
//! | absent   | `present` | [`Action::Create`]                      |
//! | present  | `absent`  | [`Action::Delete`]                      |
//! | present  | `present` | [`Action::Update`] if different, else no-op |

pub mod compare;
pub mod tags;

pub use compare::{default_compare, CompareOptions, Comparator, Comparison, Difference};
pub use tags::{merge_tags, TagMerge, TagRequest};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Requested lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl FromStr for DesiredState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "present" => Ok(DesiredState::Present),
            "absent" => Ok(DesiredState::Absent),
            other => Err(format!(
                "Invalid state '{}'. Valid states: present, absent",
                other
            )),
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesiredState::Present => write!(f, "present"),
            DesiredState::Absent => write!(f, "absent"),
        }
    }
}

/// What the lifecycle has to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    NoAction,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::NoAction => write!(f, "no_action"),
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Errors that stop reconciliation before any change is made
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReconcileError {
    #[error("Cannot change {path} from {observed} to {desired}; the field can only be set at creation")]
    ImmutableField {
        path: String,
        desired: Value,
        observed: Value,
    },
}

/// Everything [`decide`] needs to know about the desired state
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileRequest {
    pub state: DesiredState,
    /// Desired payload in the shape the service returns, without tags
    pub desired: Value,
    pub tags: Option<TagRequest>,
    pub compare: CompareOptions,
    /// JSON pointers that may not change once the resource exists
    pub immutable: Vec<String>,
}

impl ReconcileRequest {
    pub fn new(state: DesiredState, desired: Value) -> Self {
        Self {
            state,
            desired,
            tags: None,
            compare: CompareOptions::default(),
            immutable: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Option<TagRequest>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_compare_options(mut self, options: CompareOptions) -> Self {
        self.compare = options;
        self
    }

    pub fn with_immutable(mut self, paths: &[&str]) -> Self {
        self.immutable = paths.iter().map(|p| p.to_string()).collect();
        self
    }
}

/// The outcome of [`decide`]
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    /// First payload difference that triggered an update
    pub difference: Option<Difference>,
    /// Tags to send with a create or update
    pub tags: Option<Map<String, Value>>,
}

impl Decision {
    fn new(action: Action) -> Self {
        Self {
            action,
            difference: None,
            tags: None,
        }
    }

    pub fn changed(&self) -> bool {
        self.action != Action::NoAction
    }
}

/// Decide what to do about a resource
pub fn decide(
    request: &ReconcileRequest,
    observed: Option<&Value>,
) -> Result<Decision, ReconcileError> {
    let observed = match (observed, request.state) {
        (None, DesiredState::Absent) => return Ok(Decision::new(Action::NoAction)),
        (Some(_), DesiredState::Absent) => return Ok(Decision::new(Action::Delete)),
        (None, DesiredState::Present) => {
            let mut decision = Decision::new(Action::Create);
            decision.tags = request.tags.as_ref().map(|t| t.tags.clone());
            return Ok(decision);
        }
        (Some(observed), DesiredState::Present) => observed,
    };

    let comparator = Comparator::new(request.compare.clone());

    for path in &request.immutable {
        let (Some(desired), Some(current)) =
            (request.desired.pointer(path), observed.pointer(path))
        else {
            continue;
        };
        if !comparator.compare(desired, current, path, &mut None) {
            return Err(ReconcileError::ImmutableField {
                path: path.clone(),
                desired: desired.clone(),
                observed: current.clone(),
            });
        }
    }

    let mut difference = None;
    let payload_equal = comparator.compare(&request.desired, observed, "", &mut difference);

    let tag_merge = request.tags.as_ref().map(|t| {
        let existing = observed.get("tags").and_then(Value::as_object);
        merge_tags(existing, t)
    });
    let tags_changed = tag_merge.as_ref().is_some_and(|m| m.changed);

    let action = if payload_equal && !tags_changed {
        Action::NoAction
    } else {
        Action::Update
    };

    Ok(Decision {
        action,
        difference,
        tags: tag_merge.map(|m| m.tags),
    })
}
