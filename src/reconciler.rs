//! Field reconciliation - folds per-operation field sets into one model.
//!
//! | Step | Rule |
//! |------|------|
//! | [`merge_fields`] | Primary wins Required/Type; ReadOnly is OR-ed unless primary is a path parameter |
//! | [`merge_order_fields`] | Output-only fields are read-only; shared fields are computed unless required on input |
//! | [`derive_server_computed`] | Read-only or create-absent fields are computed and never required |
//! | [`derive_force_new`] | Writable fields nobody can update force replacement |

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::policy::{join_path, FieldPolicy};
use crate::types::{sort_fields, FieldDescriptor, SemanticType};

/// Names of the two reference fields every order submission carries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderReferences {
    /// Reference to the offering being ordered.
    pub target_field: String,
    /// Reference to the scope that owns the order.
    pub origin_field: String,
}

impl Default for OrderReferences {
    fn default() -> Self {
        Self {
            target_field: "offering".to_string(),
            origin_field: "project".to_string(),
        }
    }
}

/// Structural union of two field sets keyed by name.
///
/// Used to fold a create-input schema (`primary`) with a response schema
/// (`secondary`) into one write+read model. The result is name-sorted.
pub fn merge_fields(
    primary: Vec<FieldDescriptor>,
    secondary: Vec<FieldDescriptor>,
) -> Vec<FieldDescriptor> {
    let mut merged = merge_by_name(primary, secondary, &mut merge_pair);
    sort_fields(&mut merged);
    merged
}

fn merge_pair(primary: &mut FieldDescriptor, secondary: FieldDescriptor) {
    primary.read_only = if primary.is_path_param {
        false
    } else {
        primary.read_only || secondary.read_only
    };
    fill_documentation(primary, &secondary);
    merge_nested(primary, secondary, &mut merge_pair);
}

/// Asymmetric merge for resources provisioned through an order.
///
/// `input` is accepted at submission time, `output` describes the resulting
/// resource. Both order reference fields are always present, required and
/// writable afterwards. The result is name-sorted.
pub fn merge_order_fields(
    input: Vec<FieldDescriptor>,
    output: Vec<FieldDescriptor>,
    references: &OrderReferences,
) -> Vec<FieldDescriptor> {
    let mut merged = merge_order_level(input, output);

    for name in [&references.target_field, &references.origin_field] {
        match merged.iter_mut().find(|field| &field.name == name) {
            Some(field) => force_reference(field),
            None => {
                let mut field = FieldDescriptor::new(name.as_str(), SemanticType::String);
                force_reference(&mut field);
                merged.push(field);
            }
        }
    }

    sort_fields(&mut merged);
    merged
}

fn merge_order_level(
    input: Vec<FieldDescriptor>,
    output: Vec<FieldDescriptor>,
) -> Vec<FieldDescriptor> {
    let input_names: BTreeSet<String> = input.iter().map(|f| f.name.clone()).collect();

    let mut merged = merge_by_name(input, output, &mut merge_order_pair);

    for field in merged.iter_mut().filter(|f| !input_names.contains(&f.name)) {
        // Known only from the resulting resource: the server owns it.
        field.read_only = true;
        field.mark_server_computed();
    }

    merged
}

fn merge_order_pair(input: &mut FieldDescriptor, output: FieldDescriptor) {
    if !input.required {
        input.mark_server_computed();
    }
    fill_documentation(input, &output);

    match input.semantic_type {
        SemanticType::Object => {
            let nested = std::mem::take(&mut input.properties);
            input.properties = merge_order_level(nested, output.properties);
        }
        _ => {
            if let (Some(input_item), Some(output_item)) = (input.items.as_mut(), output.items) {
                if input_item.semantic_type == SemanticType::Object {
                    let output_item = *output_item;
                    let nested = std::mem::take(&mut input_item.properties);
                    input_item.properties = merge_order_level(nested, output_item.properties);
                }
            }
        }
    }
}

fn force_reference(field: &mut FieldDescriptor) {
    field.required = true;
    field.read_only = false;
    field.server_computed = false;
    field.use_state_for_unknown = false;
}

/// Union keyed by name: entries of `first` keep their position and are
/// combined with same-named entries of `second`, which are appended
/// otherwise.
fn merge_by_name<M>(
    first: Vec<FieldDescriptor>,
    second: Vec<FieldDescriptor>,
    combine: &mut M,
) -> Vec<FieldDescriptor>
where
    M: FnMut(&mut FieldDescriptor, FieldDescriptor),
{
    let mut by_name: IndexMap<String, FieldDescriptor> = IndexMap::with_capacity(first.len());
    for field in first {
        by_name.entry(field.name.clone()).or_insert(field);
    }

    for field in second {
        match by_name.get_mut(&field.name) {
            Some(existing) => combine(existing, field),
            None => {
                by_name.insert(field.name.clone(), field);
            }
        }
    }

    by_name.into_values().collect()
}

/// Merge object properties, or element properties of collections of
/// objects, when both sides carry them.
fn merge_nested<M>(primary: &mut FieldDescriptor, secondary: FieldDescriptor, combine: &mut M)
where
    M: FnMut(&mut FieldDescriptor, FieldDescriptor),
{
    match primary.semantic_type {
        SemanticType::Object => {
            if secondary.semantic_type == SemanticType::Object {
                let nested = std::mem::take(&mut primary.properties);
                primary.properties = merge_by_name(nested, secondary.properties, combine);
            }
        }
        _ => {
            if let (Some(item), Some(other)) = (primary.items.as_mut(), secondary.items) {
                if item.semantic_type == SemanticType::Object
                    && other.semantic_type == SemanticType::Object
                {
                    let other = *other;
                    let nested = std::mem::take(&mut item.properties);
                    item.properties = merge_by_name(nested, other.properties, combine);
                }
            }
        }
    }
}

fn fill_documentation(target: &mut FieldDescriptor, other: &FieldDescriptor) {
    if target.description.is_none() {
        target.description = other.description.clone();
    }
    if target.enum_values.is_empty() && target.semantic_type == other.semantic_type {
        target.enum_values = other.enum_values.clone();
    }
    if target.ref_name.is_none() {
        target.ref_name = other.ref_name.clone();
    }
    if target.overridden_from.is_none() {
        target.overridden_from = other.overridden_from;
    }
}

/// Mark fields the server decides for a standard resource.
///
/// A field is computed when it is read-only or absent from the create
/// input. Nested fields are judged against the nested create fields.
pub fn derive_server_computed(fields: &mut [FieldDescriptor], create: &[FieldDescriptor]) {
    for field in fields.iter_mut() {
        let counterpart = create.iter().find(|c| c.name == field.name);

        if field.read_only || counterpart.is_none() {
            field.mark_server_computed();
        }

        let nested_create = counterpart
            .map(|c| c.nested_properties().to_vec())
            .unwrap_or_default();
        if let Some(children) = field.nested_properties_mut() {
            derive_server_computed(children, &nested_create);
        }
    }
}

/// Mark writable top-level fields that cannot be updated as ForceNew.
///
/// `updatable` is the union of update-input field names and declared
/// update-action parameters.
pub fn derive_force_new(fields: &mut [FieldDescriptor], updatable: &BTreeSet<String>) {
    for field in fields.iter_mut() {
        if !field.read_only && !updatable.contains(&field.name) {
            field.force_new = true;
        }
    }
}

/// Re-add required input fields that the exclusion policy removed.
///
/// `unfiltered` is the input walked with exclusion disabled. Structural
/// necessity wins over the policy at any depth: a required field is put
/// back where it was dropped, and its own subtree is filtered again so only
/// its required descendants survive exclusion. Returns the restored paths.
pub fn reinclude_required<F>(
    fields: &mut Vec<FieldDescriptor>,
    unfiltered: &[FieldDescriptor],
    policy: &F,
) -> Vec<String>
where
    F: FieldPolicy + ?Sized,
{
    let mut restored = Vec::new();
    reinclude_level(fields, unfiltered, policy, "", &mut restored);
    restored
}

fn reinclude_level<F>(
    fields: &mut Vec<FieldDescriptor>,
    unfiltered: &[FieldDescriptor],
    policy: &F,
    parent: &str,
    restored: &mut Vec<String>,
) where
    F: FieldPolicy + ?Sized,
{
    let mut added = false;

    for candidate in unfiltered {
        let path = join_path(parent, &candidate.name);

        if let Some(existing) = fields.iter_mut().find(|f| f.name == candidate.name) {
            if let Some(children) = existing.nested_properties_mut() {
                reinclude_level(children, candidate.nested_properties(), policy, &path, restored);
            }
            continue;
        }
        if !candidate.required || !policy.is_excluded(&candidate.name, &path) {
            continue;
        }

        warn!(field = %path, "excluded field is required by the schema, keeping it");
        let mut field = candidate.clone();
        restored.push(path.clone());
        if let Some(children) = field.nested_properties_mut() {
            prune_excluded(children, policy, &path, restored);
        }
        fields.push(field);
        added = true;
    }

    if added {
        sort_fields(fields);
    }
}

/// Drop excluded descendants of a restored field, keeping required ones.
fn prune_excluded<F>(
    fields: &mut Vec<FieldDescriptor>,
    policy: &F,
    parent: &str,
    restored: &mut Vec<String>,
) where
    F: FieldPolicy + ?Sized,
{
    fields.retain(|field| {
        let path = join_path(parent, &field.name);
        if !policy.is_excluded(&field.name, &path) {
            return true;
        }
        if field.required {
            warn!(field = %path, "excluded field is required by the schema, keeping it");
            restored.push(path);
        }
        field.required
    });

    for field in fields.iter_mut() {
        let path = join_path(parent, &field.name);
        if let Some(children) = field.nested_properties_mut() {
            prune_excluded(children, policy, &path, restored);
        }
    }
}

/// Mark create fields that correspond to path parameters.
///
/// Returns the parameter names without a matching field.
pub fn mark_path_params(fields: &mut [FieldDescriptor], path_params: &[String]) -> Vec<String> {
    let mut unmatched = Vec::new();
    for param in path_params {
        match fields.iter_mut().find(|f| &f.name == param) {
            Some(field) => {
                field.is_path_param = true;
                field.read_only = false;
            }
            None => unmatched.push(param.clone()),
        }
    }
    if !unmatched.is_empty() {
        debug!(?unmatched, "path parameters without a body field");
    }
    unmatched
}
