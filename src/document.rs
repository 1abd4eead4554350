//! Schema lookups over a loaded OpenAPI document.
//!
//! The document is an immutable snapshot; every lookup borrows from it.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::loader::navigate_pointer;

/// Prefix of local component schema references.
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Upper bound on chained `$ref` hops before giving up on a node.
const MAX_REF_HOPS: usize = 32;

const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Source of schema nodes for the walker and the build pipeline.
///
/// Every lookup returns `None` as the not-found signal.
pub trait SchemaProvider {
    /// Schema declared under `components/schemas`.
    fn named_schema(&self, name: &str) -> Option<&Value>;

    /// Request body schema of an operation.
    fn request_schema(&self, operation_id: &str) -> Option<&Value>;

    /// Schema of the first successful response of an operation.
    fn response_schema(&self, operation_id: &str) -> Option<&Value>;

    /// Parameters of an operation declared `in` the given location,
    /// sorted by name.
    fn parameters(&self, operation_id: &str, location: &str) -> Vec<Parameter>;

    /// Whether the operation exists at all.
    fn has_operation(&self, operation_id: &str) -> bool;

    /// Follow a `$ref` chain to the target node.
    ///
    /// Returns the resolved node and the last referenced schema name.
    /// Dangling references resolve to `None`.
    fn resolve_ref<'a>(&'a self, node: &'a Value) -> Option<(&'a Value, Option<String>)>;
}

/// Operation parameter reduced to what the pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub required: bool,
    pub schema: Option<Value>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
struct OperationEntry {
    path: String,
    method: String,
}

/// OpenAPI 3 document indexed by operation id.
#[derive(Debug, Clone)]
pub struct OpenApiDocument {
    root: Value,
    operations: BTreeMap<String, OperationEntry>,
}

impl OpenApiDocument {
    /// Index a loaded document.
    ///
    /// Operations without an `operationId` are not addressable and are
    /// skipped. The first declaration wins on duplicate ids.
    pub fn new(root: Value) -> Self {
        let mut operations = BTreeMap::new();

        if let Some(paths) = root.get("paths").and_then(Value::as_object) {
            for (path, item) in paths {
                for method in HTTP_METHODS {
                    let Some(op_id) = item
                        .get(*method)
                        .and_then(|op| op.get("operationId"))
                        .and_then(Value::as_str)
                    else {
                        continue;
                    };
                    operations
                        .entry(op_id.to_string())
                        .or_insert_with(|| OperationEntry {
                            path: path.clone(),
                            method: (*method).to_string(),
                        });
                }
            }
        }

        Self { root, operations }
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Operation ids in lexicographic order.
    pub fn operation_ids(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    fn path_item(&self, operation_id: &str) -> Option<&Value> {
        let entry = self.operations.get(operation_id)?;
        self.root.get("paths")?.get(&entry.path)
    }

    fn operation(&self, operation_id: &str) -> Option<&Value> {
        let entry = self.operations.get(operation_id)?;
        self.path_item(operation_id)?.get(&entry.method)
    }

    fn deref<'a>(&'a self, node: &'a Value) -> Option<&'a Value> {
        self.resolve_ref(node).map(|(target, _)| target)
    }
}

impl SchemaProvider for OpenApiDocument {
    fn named_schema(&self, name: &str) -> Option<&Value> {
        self.root.get("components")?.get("schemas")?.get(name)
    }

    fn request_schema(&self, operation_id: &str) -> Option<&Value> {
        let body = self.deref(self.operation(operation_id)?.get("requestBody")?)?;
        media_schema(body.get("content")?)
    }

    fn response_schema(&self, operation_id: &str) -> Option<&Value> {
        let responses = self.operation(operation_id)?.get("responses")?.as_object()?;

        // Sorted so "200" is preferred over "201" regardless of declaration order.
        let mut codes: Vec<&String> = responses.keys().filter(|c| c.starts_with('2')).collect();
        codes.sort();

        codes.into_iter().find_map(|code| {
            let response = self.deref(responses.get(code.as_str())?)?;
            media_schema(response.get("content")?)
        })
    }

    fn parameters(&self, operation_id: &str, location: &str) -> Vec<Parameter> {
        let mut by_name: BTreeMap<String, Parameter> = BTreeMap::new();

        let sources = [
            self.path_item(operation_id).and_then(|item| item.get("parameters")),
            self.operation(operation_id).and_then(|op| op.get("parameters")),
        ];

        // Operation-level parameters come second and replace path-level ones.
        for list in sources.into_iter().flatten() {
            for raw in list.as_array().into_iter().flatten() {
                let Some(param) = self.deref(raw) else {
                    continue;
                };
                if param.get("in").and_then(Value::as_str) != Some(location) {
                    continue;
                }
                let Some(name) = param.get("name").and_then(Value::as_str) else {
                    continue;
                };
                by_name.insert(
                    name.to_string(),
                    Parameter {
                        name: name.to_string(),
                        required: param
                            .get("required")
                            .and_then(Value::as_bool)
                            .unwrap_or(location == "path"),
                        schema: param.get("schema").cloned(),
                        description: param
                            .get("description")
                            .and_then(Value::as_str)
                            .map(String::from),
                    },
                );
            }
        }

        by_name.into_values().collect()
    }

    fn has_operation(&self, operation_id: &str) -> bool {
        self.operations.contains_key(operation_id)
    }

    fn resolve_ref<'a>(&'a self, node: &'a Value) -> Option<(&'a Value, Option<String>)> {
        let mut current = node;
        let mut ref_name = None;

        for _ in 0..MAX_REF_HOPS {
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                return Some((current, ref_name));
            };
            if !reference.starts_with('#') {
                tracing::debug!(reference, "external reference left unresolved");
                return None;
            }
            current = navigate_pointer(&self.root, reference).ok()?;
            ref_name = reference.rsplit('/').next().map(String::from);
        }

        tracing::debug!("reference chain exceeded {} hops", MAX_REF_HOPS);
        None
    }
}

/// Pick the JSON media type schema from a `content` map.
///
/// Prefers `application/json`, then any `+json` type, then the first entry.
fn media_schema(content: &Value) -> Option<&Value> {
    let content = content.as_object()?;
    let media = content
        .get("application/json")
        .or_else(|| {
            content
                .iter()
                .find(|(k, _)| k.ends_with("+json"))
                .map(|(_, v)| v)
        })
        .or_else(|| content.values().next())?;
    media.get("schema")
}
