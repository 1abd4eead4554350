//! Structural deduplication of nested shapes.
//!
//! Every nested object (or collection/map of objects, at any element
//! depth) is fingerprinted from the sorted `(name, type signature)` pairs
//! of its direct children. A signature spells out the whole element chain,
//! e.g. `list<map<object:Quota>>`, ending in the child's type ref. Children are processed first, so identical shapes collapse
//! onto one fingerprint at any depth. The first name seen for a
//! fingerprint wins; a name already taken by a different fingerprint gets
//! a numeric suffix.
//!
//! Naming is only stable if fields arrive in the same order on every run,
//! which the walker and reconciler guarantee by sorting by name.

use std::collections::BTreeMap;

use heck::ToUpperCamelCase;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::types::FieldDescriptor;

/// A unique nested shape, emitted once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedShape {
    pub name: String,
    pub fingerprint: String,
    pub fields: Vec<FieldDescriptor>,
}

/// A synthesized name that was already taken by a different shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameCollision {
    /// Name the shape would have had.
    pub requested: String,
    /// Name it got instead.
    pub assigned: String,
    /// Dotted path of the field that introduced it.
    pub path: String,
}

/// Fingerprint/name tables shared by every resource of one run.
///
/// Feed resources in a fixed order; the names depend on it.
#[derive(Debug, Clone, Default)]
pub struct DedupRegistry {
    names_by_fingerprint: BTreeMap<String, String>,
    fingerprints_by_name: BTreeMap<String, String>,
    shapes: BTreeMap<String, NestedShape>,
    collisions: Vec<NameCollision>,
}

impl DedupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign `attr_type_ref` to every nested shape of a finalized model.
    pub fn assign(&mut self, resource: &str, fields: &mut [FieldDescriptor]) {
        let mut path = vec![resource.to_string()];
        self.assign_level(fields, &mut path);
    }

    fn assign_level(&mut self, fields: &mut [FieldDescriptor], path: &mut Vec<String>) {
        for field in fields.iter_mut() {
            path.push(field.name.clone());

            self.assign_level(&mut field.innermost_mut().properties, path);

            if let Some(name) = self.register(field, path) {
                let mut level = Some(field);
                while let Some(descriptor) = level {
                    descriptor.attr_type_ref = Some(name.clone());
                    level = descriptor.items.as_deref_mut();
                }
            }

            path.pop();
        }
    }

    fn register(&mut self, field: &FieldDescriptor, path: &[String]) -> Option<String> {
        let children = shape_of(field)?;
        let fingerprint = fingerprint(children);

        if let Some(existing) = self.names_by_fingerprint.get(&fingerprint) {
            return Some(existing.clone());
        }

        let requested = declared_name(field).unwrap_or_else(|| path_name(path));
        let mut assigned = requested.clone();
        let mut suffix = 2;
        while self.fingerprints_by_name.contains_key(&assigned) {
            assigned = format!("{}{}", requested, suffix);
            suffix += 1;
        }

        if assigned != requested {
            debug!(%requested, %assigned, "nested type name taken, suffixed");
            self.collisions.push(NameCollision {
                requested,
                assigned: assigned.clone(),
                path: path[1..].join("."),
            });
        }

        self.names_by_fingerprint
            .insert(fingerprint.clone(), assigned.clone());
        self.fingerprints_by_name
            .insert(assigned.clone(), fingerprint.clone());
        self.shapes.insert(
            assigned.clone(),
            NestedShape {
                name: assigned.clone(),
                fingerprint,
                fields: children.to_vec(),
            },
        );

        Some(assigned)
    }

    /// Canonical name registered for a fingerprint.
    pub fn name_for(&self, fingerprint: &str) -> Option<&str> {
        self.names_by_fingerprint
            .get(fingerprint)
            .map(String::as_str)
    }

    /// Unique shapes in name order.
    pub fn shapes(&self) -> impl Iterator<Item = &NestedShape> {
        self.shapes.values()
    }

    pub fn into_shapes(self) -> Vec<NestedShape> {
        self.shapes.into_values().collect()
    }

    pub fn collisions(&self) -> &[NameCollision] {
        &self.collisions
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// Direct children of a named nested shape, if the field has one.
///
/// Objects without children are free-form and stay anonymous.
fn shape_of(field: &FieldDescriptor) -> Option<&[FieldDescriptor]> {
    let children = field.nested_properties();
    (!children.is_empty()).then_some(children)
}

/// Structural fingerprint of a shape's direct children.
pub fn fingerprint(children: &[FieldDescriptor]) -> String {
    let mut pairs: Vec<(&str, String)> = children
        .iter()
        .map(|child| (child.name.as_str(), signature(child)))
        .collect();
    pairs.sort();

    let mut hasher = Sha256::new();
    for (name, signature) in pairs {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(signature.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Resolved type of a field down its whole element chain.
fn signature(field: &FieldDescriptor) -> String {
    match field.items.as_deref() {
        Some(item) => format!("{}<{}>", field.meta.attr_kind.as_str(), signature(item)),
        None => match field.attr_type_ref.as_deref() {
            Some(type_ref) => format!("{}:{}", field.meta.label(), type_ref),
            None => field.meta.label(),
        },
    }
}

fn declared_name(field: &FieldDescriptor) -> Option<String> {
    field.innermost().ref_name.clone()
}

/// `["volume", "image_source"]` becomes `VolumeImageSource`.
fn path_name(path: &[String]) -> String {
    path.iter()
        .map(|segment| segment.to_upper_camel_case())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{find_field, SemanticType};

    fn string(name: &str) -> FieldDescriptor {
        FieldDescriptor::new(name, SemanticType::String)
    }

    fn integer(name: &str) -> FieldDescriptor {
        FieldDescriptor::new(name, SemanticType::Integer)
    }

    fn object(name: &str, properties: Vec<FieldDescriptor>) -> FieldDescriptor {
        let mut field = FieldDescriptor::new(name, SemanticType::Object);
        field.properties = properties;
        field
    }

    fn list_of(name: &str, properties: Vec<FieldDescriptor>) -> FieldDescriptor {
        let mut field = FieldDescriptor::new(name, SemanticType::Array);
        field.items = Some(Box::new(object(name, properties)));
        field.refresh_meta();
        field
    }

    #[test]
    fn identical_shapes_share_a_name() {
        let mut fields = vec![
            object("source", vec![string("host"), integer("port")]),
            object("target", vec![string("host"), integer("port")]),
        ];
        let mut registry = DedupRegistry::new();
        registry.assign("link", &mut fields);

        assert_eq!(fields[0].attr_type_ref.as_deref(), Some("LinkSource"));
        assert_eq!(fields[1].attr_type_ref.as_deref(), Some("LinkSource"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn one_differing_child_type_gets_distinct_name() {
        let mut fields = vec![
            object("source", vec![string("host"), integer("port")]),
            object("target", vec![string("host"), string("port")]),
        ];
        let mut registry = DedupRegistry::new();
        registry.assign("link", &mut fields);

        assert_eq!(fields[0].attr_type_ref.as_deref(), Some("LinkSource"));
        assert_eq!(fields[1].attr_type_ref.as_deref(), Some("LinkTarget"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn declared_ref_name_preferred() {
        let mut rules = list_of("rules", vec![integer("port")]);
        rules.items.as_mut().unwrap().ref_name = Some("SecurityGroupRule".into());
        let mut fields = vec![rules];

        let mut registry = DedupRegistry::new();
        registry.assign("security_group", &mut fields);

        assert_eq!(fields[0].attr_type_ref.as_deref(), Some("SecurityGroupRule"));
        assert_eq!(
            fields[0].items.as_ref().unwrap().attr_type_ref.as_deref(),
            Some("SecurityGroupRule")
        );
    }

    #[test]
    fn name_reuse_for_different_shape_is_suffixed() {
        let mut first = object("limits", vec![integer("cpu")]);
        first.ref_name = Some("Limits".into());
        let mut second = object("quota", vec![integer("ram")]);
        second.ref_name = Some("Limits".into());
        let mut third = object("other", vec![string("x")]);
        third.ref_name = Some("Limits".into());
        let mut fields = vec![first, second, third];

        let mut registry = DedupRegistry::new();
        registry.assign("tenant", &mut fields);

        assert_eq!(fields[0].attr_type_ref.as_deref(), Some("Limits"));
        assert_eq!(fields[1].attr_type_ref.as_deref(), Some("Limits2"));
        assert_eq!(fields[2].attr_type_ref.as_deref(), Some("Limits3"));
        assert_eq!(registry.collisions().len(), 2);
        assert_eq!(registry.collisions()[0].path, "quota");
    }

    #[test]
    fn nested_shapes_collapse_transitively() {
        let mut fields = vec![
            object("a", vec![object("inner", vec![string("v")])]),
            object("b", vec![object("inner", vec![string("v")])]),
        ];
        let mut registry = DedupRegistry::new();
        registry.assign("r", &mut fields);

        assert_eq!(fields[0].attr_type_ref, fields[1].attr_type_ref);
        let inner_a = find_field(&fields[0].properties, "inner").unwrap();
        assert_eq!(inner_a.attr_type_ref.as_deref(), Some("RAInner"));
        let inner_b = find_field(&fields[1].properties, "inner").unwrap();
        assert_eq!(inner_b.attr_type_ref.as_deref(), Some("RAInner"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn child_type_ref_distinguishes_parents() {
        let mut fields = vec![
            object("a", vec![object("inner", vec![string("v")])]),
            object("b", vec![object("inner", vec![integer("v")])]),
        ];
        let mut registry = DedupRegistry::new();
        registry.assign("r", &mut fields);

        assert_ne!(fields[0].attr_type_ref, fields[1].attr_type_ref);
    }

    #[test]
    fn shapes_shared_across_resources() {
        let mut registry = DedupRegistry::new();

        let mut first = vec![object("address", vec![string("city")])];
        registry.assign("customer", &mut first);
        let mut second = vec![object("location", vec![string("city")])];
        registry.assign("site", &mut second);

        assert_eq!(second[0].attr_type_ref.as_deref(), Some("CustomerAddress"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn free_form_and_scalar_fields_stay_anonymous() {
        let mut tags = FieldDescriptor::new("tags", SemanticType::Array);
        tags.items = Some(Box::new(string("tags")));
        let mut fields = vec![object("options", Vec::new()), tags, string("name")];

        let mut registry = DedupRegistry::new();
        registry.assign("r", &mut fields);

        assert!(fields.iter().all(|f| f.attr_type_ref.is_none()));
        assert!(registry.is_empty());
    }

    fn nested_list(name: &str, element: FieldDescriptor) -> FieldDescriptor {
        let mut inner = FieldDescriptor::new(name, SemanticType::Array);
        inner.items = Some(Box::new(element));
        let mut outer = FieldDescriptor::new(name, SemanticType::Array);
        outer.items = Some(Box::new(inner));
        outer.refresh_meta();
        outer
    }

    #[test]
    fn element_chain_distinguishes_parents() {
        let mut fields = vec![
            object("a", vec![nested_list("m", string("m"))]),
            object("b", vec![nested_list("m", integer("m"))]),
        ];
        let mut registry = DedupRegistry::new();
        registry.assign("r", &mut fields);

        assert_eq!(fields[0].attr_type_ref.as_deref(), Some("RA"));
        assert_eq!(fields[1].attr_type_ref.as_deref(), Some("RB"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn objects_under_nested_lists_are_named() {
        let mut fields = vec![
            object("a", vec![nested_list("grid", object("cell", vec![string("v")]))]),
            object("b", vec![nested_list("grid", object("cell", vec![integer("v")]))]),
        ];
        let mut registry = DedupRegistry::new();
        registry.assign("r", &mut fields);

        let grid = find_field(&fields[0].properties, "grid").unwrap();
        assert_eq!(grid.attr_type_ref.as_deref(), Some("RAGrid"));
        assert_eq!(grid.innermost().attr_type_ref.as_deref(), Some("RAGrid"));
        assert_eq!(
            grid.items.as_ref().unwrap().attr_type_ref.as_deref(),
            Some("RAGrid")
        );

        // Element shapes differ, so the parents do too.
        assert_ne!(fields[0].attr_type_ref, fields[1].attr_type_ref);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn fingerprint_ignores_child_order() {
        let a = vec![string("x"), integer("y")];
        let b = vec![integer("y"), string("x")];
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn shapes_listed_in_name_order() {
        let mut fields = vec![
            object("zeta", vec![string("a")]),
            object("alpha", vec![integer("a")]),
        ];
        let mut registry = DedupRegistry::new();
        registry.assign("r", &mut fields);

        let names: Vec<&str> = registry.shapes().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["RAlpha", "RZeta"]);
    }

    #[test]
    fn path_name_capitalizes_segments() {
        let path = vec!["volume".to_string(), "image_source".to_string()];
        assert_eq!(path_name(&path), "VolumeImageSource");
    }
}
