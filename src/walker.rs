//! Schema traversal - turns schema nodes into field descriptors.
//!
//! Composition keywords are flattened before a node is read:
//!
//! | Keyword | Effect |
//! |---------|--------|
//! | `allOf` | Members fill keywords the node lacks; properties merge first-declared-wins; `required` is the union |
//! | `oneOf` / `anyOf` | Without an explicit `type`, the first alternative fills what the node lacks |
//! | `$ref` | Followed through the provider; the last schema name becomes the field's `ref_name` |

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::document::SchemaProvider;
use crate::policy::{join_path, FieldPolicy};
use crate::types::{FieldDescriptor, SemanticType, WalkOptions};

/// Nesting bound for `allOf`/`oneOf` flattening, independent of field depth.
const MAX_COMPOSITION_DEPTH: usize = 8;

/// How many collection/map levels get an element descriptor below a field.
const ELEMENT_LEVELS: usize = 2;

/// Fields whose declared type disagrees with the values the API returns.
///
/// Keys are dotted path suffixes. Only the billing estimate totals are
/// known to be affected; the table has not been checked against live
/// payloads for anything else.
pub const TYPE_OVERRIDES: &[(&str, SemanticType)] = &[
    ("billing_price_estimate.current", SemanticType::Number),
    ("billing_price_estimate.tax", SemanticType::Number),
    ("billing_price_estimate.tax_current", SemanticType::Number),
    ("billing_price_estimate.total", SemanticType::Number),
];

/// Type override for a field path, if the override table has one.
pub fn type_override(path: &str) -> Option<SemanticType> {
    TYPE_OVERRIDES
        .iter()
        .find(|(suffix, _)| {
            path == *suffix
                || path
                    .strip_suffix(suffix)
                    .map(|prefix| prefix.ends_with('.'))
                    .unwrap_or(false)
        })
        .map(|(_, semantic_type)| *semantic_type)
}

/// Walk a schema node with the given policy and options.
///
/// Convenience wrapper over [`SchemaWalker`].
pub fn walk<P, F>(
    provider: &P,
    node: Option<&Value>,
    policy: &F,
    options: &WalkOptions,
    depth: usize,
) -> Vec<FieldDescriptor>
where
    P: SchemaProvider + ?Sized,
    F: FieldPolicy + ?Sized,
{
    SchemaWalker::new(provider, policy, options).walk(node, depth)
}

/// Recursive schema-to-descriptor extraction bounded by `max_depth`.
pub struct SchemaWalker<'a, P: ?Sized, F: ?Sized> {
    provider: &'a P,
    policy: &'a F,
    options: &'a WalkOptions,
}

impl<'a, P, F> SchemaWalker<'a, P, F>
where
    P: SchemaProvider + ?Sized,
    F: FieldPolicy + ?Sized,
{
    pub fn new(provider: &'a P, policy: &'a F, options: &'a WalkOptions) -> Self {
        Self {
            provider,
            policy,
            options,
        }
    }

    /// List the properties of `node` as name-sorted field descriptors.
    ///
    /// Returns an empty list for an absent node, an unresolvable node, or
    /// when `depth` has reached `max_depth`.
    pub fn walk(&self, node: Option<&Value>, depth: usize) -> Vec<FieldDescriptor> {
        let Some(node) = node else {
            return Vec::new();
        };
        match self.flatten(node, MAX_COMPOSITION_DEPTH) {
            Some(flat) => self.fields_of(&flat, "", depth),
            None => Vec::new(),
        }
    }

    fn fields_of(&self, flat: &Flattened, parent_path: &str, depth: usize) -> Vec<FieldDescriptor> {
        if depth >= self.options.max_depth {
            if !flat.properties.is_empty() {
                debug!(
                    path = parent_path,
                    depth, "max depth reached, nested properties truncated"
                );
            }
            return Vec::new();
        }

        let mut fields = Vec::with_capacity(flat.properties.len());
        for (name, prop) in &flat.properties {
            if depth == 0
                && self.options.skip_root_identifier
                && *name == self.options.identifier_field
            {
                continue;
            }

            let path = join_path(parent_path, name);
            if self.policy.is_excluded(name, &path) {
                debug!(path = %path, "field excluded by policy");
                continue;
            }

            let required = flat.required.contains(name);
            fields.push(self.field(name, prop, required, &path, depth, ELEMENT_LEVELS));
        }

        fields.sort_by(|a, b| a.name.cmp(&b.name));
        fields
    }

    fn field(
        &self,
        name: &str,
        node: &Value,
        required: bool,
        path: &str,
        depth: usize,
        element_levels: usize,
    ) -> FieldDescriptor {
        let flat = self
            .flatten(node, MAX_COMPOSITION_DEPTH)
            .unwrap_or_default();

        // Element descriptors share the field's name and path; the path
        // lookups below apply to the field itself only.
        let own_level = element_levels == ELEMENT_LEVELS;

        let declared = flat.semantic_type();
        let mut semantic_type = declared;
        let mut overridden_from = None;
        if let Some(coerced) = type_override(path).filter(|_| own_level) {
            if coerced != declared {
                warn!(
                    path,
                    declared = declared.as_str(),
                    coerced = coerced.as_str(),
                    "applying type override"
                );
                semantic_type = coerced;
                overridden_from = Some(declared);
            }
        }

        let mut field = FieldDescriptor::new(name, semantic_type);
        field.overridden_from = overridden_from;
        field.required = required;
        field.read_only = flat.bool_keyword("readOnly");
        field.description = flat.str_keyword("description");
        field.format = flat.str_keyword("format");
        field.ref_name = flat.ref_name.clone();

        if semantic_type == SemanticType::String {
            field.enum_values = flat.string_enum();
            field.pattern = flat.str_keyword("pattern");
            field.min_length = flat.keywords.get("minLength").and_then(Value::as_u64);
            field.max_length = flat.keywords.get("maxLength").and_then(Value::as_u64);
        }
        if matches!(semantic_type, SemanticType::Integer | SemanticType::Number) {
            field.minimum = flat.keywords.get("minimum").and_then(Value::as_f64);
            field.maximum = flat.keywords.get("maximum").and_then(Value::as_f64);
        }

        match semantic_type {
            SemanticType::Array => {
                // Representation is a policy decision; the schema never says.
                if own_level && self.policy.is_set(name, path) {
                    field.semantic_type = SemanticType::Set;
                }
                if element_levels > 0 {
                    field.items = flat.keywords.get("items").map(|items| {
                        Box::new(self.field(name, items, false, path, depth, element_levels - 1))
                    });
                }
            }
            SemanticType::Object => {
                if !flat.properties.is_empty() {
                    field.properties = self.fields_of(&flat, path, depth + 1);
                } else if let Some(values) = flat.typed_additional_properties() {
                    field.semantic_type = SemanticType::Map;
                    if element_levels > 0 {
                        field.items = Some(Box::new(self.field(
                            name,
                            values,
                            false,
                            path,
                            depth,
                            element_levels - 1,
                        )));
                    }
                }
            }
            _ => {}
        }

        field.refresh_meta();
        field
    }

    /// Resolve references and fold composition keywords into one view.
    fn flatten(&self, node: &Value, budget: usize) -> Option<Flattened> {
        if budget == 0 {
            debug!("composition nesting too deep, node ignored");
            return None;
        }

        let (node, ref_name) = self.provider.resolve_ref(node)?;
        let map = node.as_object()?;

        let mut flat = Flattened {
            ref_name,
            ..Flattened::default()
        };

        for (key, value) in map {
            match key.as_str() {
                "properties" => {
                    for (name, prop) in value.as_object().into_iter().flatten() {
                        flat.properties
                            .entry(name.clone())
                            .or_insert_with(|| prop.clone());
                    }
                }
                "required" => {
                    flat.required.extend(
                        value
                            .as_array()
                            .into_iter()
                            .flatten()
                            .filter_map(Value::as_str)
                            .map(String::from),
                    );
                }
                "allOf" | "oneOf" | "anyOf" | "$ref" => {}
                _ => {
                    flat.keywords.insert(key.clone(), value.clone());
                }
            }
        }

        if let Some(members) = map.get("allOf").and_then(Value::as_array) {
            let single = members.len() == 1;
            for member in members {
                if let Some(part) = self.flatten(member, budget - 1) {
                    flat.absorb(part, single);
                }
            }
        }

        if !flat.keywords.contains_key("type") {
            let first_alternative = map
                .get("oneOf")
                .or_else(|| map.get("anyOf"))
                .and_then(Value::as_array)
                .and_then(|alternatives| alternatives.first());
            if let Some(alternative) = first_alternative {
                if let Some(part) = self.flatten(alternative, budget - 1) {
                    debug!("type taken from first union alternative");
                    flat.absorb(part, false);
                }
            }
        }

        Some(flat)
    }
}

/// A schema node with references followed and compositions folded in.
#[derive(Debug, Default)]
struct Flattened {
    keywords: Map<String, Value>,
    properties: IndexMap<String, Value>,
    required: BTreeSet<String>,
    ref_name: Option<String>,
}

impl Flattened {
    /// Fill in what this view lacks from another one.
    fn absorb(&mut self, other: Flattened, take_ref_name: bool) {
        for (key, value) in other.keywords {
            self.keywords.entry(key).or_insert(value);
        }
        for (name, prop) in other.properties {
            self.properties.entry(name).or_insert(prop);
        }
        self.required.extend(other.required);
        if take_ref_name && self.ref_name.is_none() {
            self.ref_name = other.ref_name;
        }
    }

    fn semantic_type(&self) -> SemanticType {
        let declared = match self.keywords.get("type") {
            Some(Value::String(s)) => SemanticType::parse(s),
            Some(Value::Array(types)) => types
                .iter()
                .filter_map(Value::as_str)
                .find_map(SemanticType::parse),
            _ => None,
        };

        declared.unwrap_or_else(|| {
            if !self.properties.is_empty() || self.typed_additional_properties().is_some() {
                SemanticType::Object
            } else if self.keywords.contains_key("items") {
                SemanticType::Array
            } else {
                SemanticType::String
            }
        })
    }

    fn typed_additional_properties(&self) -> Option<&Value> {
        self.keywords
            .get("additionalProperties")
            .filter(|value| value.is_object())
    }

    fn bool_keyword(&self, key: &str) -> bool {
        self.keywords
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn str_keyword(&self, key: &str) -> Option<String> {
        self.keywords.get(key).and_then(Value::as_str).map(String::from)
    }

    fn string_enum(&self) -> Vec<String> {
        self.keywords
            .get("enum")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect()
    }
}
