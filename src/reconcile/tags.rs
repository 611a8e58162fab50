//! Resource tag merging.
//!
//! Tags are reconciled separately from the rest of the payload because
//! `append_tags` changes what "equal" means: with appending (the default)
//! tags that exist only on the resource are kept, without it they are removed.

use serde_json::{Map, Value};

/// Requested tags and how to apply them
#[derive(Debug, Clone, PartialEq)]
pub struct TagRequest {
    pub tags: Map<String, Value>,
    pub append: bool,
}

impl TagRequest {
    pub fn new(tags: Map<String, Value>, append: bool) -> Self {
        Self { tags, append }
    }
}

/// Outcome of merging requested tags into existing ones
#[derive(Debug, Clone, PartialEq)]
pub struct TagMerge {
    pub changed: bool,
    pub tags: Map<String, Value>,
}

/// Merge `request` into `existing`.
///
/// Every requested tag is set; when `append` is false, existing tags that
/// were not requested are dropped.
pub fn merge_tags(existing: Option<&Map<String, Value>>, request: &TagRequest) -> TagMerge {
    let mut tags = existing.cloned().unwrap_or_default();
    let mut changed = false;

    for (key, value) in &request.tags {
        if tags.get(key) != Some(value) {
            tags.insert(key.clone(), value.clone());
            changed = true;
        }
    }

    if !request.append {
        let before = tags.len();
        tags.retain(|key, _| request.tags.contains_key(key));
        changed |= tags.len() != before;
    }

    TagMerge { changed, tags }
}
