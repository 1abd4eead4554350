//! Field policy: exclusion and unordered-collection overrides.
//!
//! Paths are dotted field paths from the resource root, e.g.
//! `quotas.limits.cores`. Array elements do not add a segment.

use std::collections::BTreeSet;

use serde::Deserialize;

/// Name/path lookups consulted during traversal and reconciliation.
pub trait FieldPolicy {
    /// Whether the field should be dropped from the model.
    fn is_excluded(&self, name: &str, path: &str) -> bool;

    /// Whether an array field should be represented as a set.
    fn is_set(&self, name: &str, path: &str) -> bool;
}

/// Policy table loaded from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyTable {
    /// Field names excluded wherever they occur.
    pub excluded_fields: BTreeSet<String>,
    /// Exact field paths excluded.
    pub excluded_paths: BTreeSet<String>,
    /// Field names represented as sets wherever they occur.
    pub set_fields: BTreeSet<String>,
    /// Exact field paths represented as sets.
    pub set_paths: BTreeSet<String>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded_fields.insert(name.into());
        self
    }

    pub fn exclude_path(mut self, path: impl Into<String>) -> Self {
        self.excluded_paths.insert(path.into());
        self
    }

    pub fn set_field(mut self, name: impl Into<String>) -> Self {
        self.set_fields.insert(name.into());
        self
    }
}

impl FieldPolicy for PolicyTable {
    fn is_excluded(&self, name: &str, path: &str) -> bool {
        self.excluded_fields.contains(name) || self.excluded_paths.contains(path)
    }

    fn is_set(&self, name: &str, path: &str) -> bool {
        self.set_fields.contains(name) || self.set_paths.contains(path)
    }
}

/// Wraps a policy and disables exclusion, keeping the set lookups.
///
/// Used to find required fields the exclusion policy removed.
#[derive(Debug, Clone, Copy)]
pub struct WithoutExclusions<'a, P: ?Sized>(pub &'a P);

impl<P: FieldPolicy + ?Sized> FieldPolicy for WithoutExclusions<'_, P> {
    fn is_excluded(&self, _name: &str, _path: &str) -> bool {
        false
    }

    fn is_set(&self, name: &str, path: &str) -> bool {
        self.0.is_set(name, path)
    }
}

/// Join a parent path and a field name.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}
