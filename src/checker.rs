//! Configuration checking - static analysis of a config against a document.
//!
//! Reports, per resource:
//! - E002: an operation or schema the model cannot be built without is missing
//! - W001: an optional operation or schema is missing (treated as empty)
//! - W002: the field policy conflicts with the schema
//! - W003: a field type was replaced from the override table
//! - W004: a nested type name was taken and got a numeric suffix
//!
//! A document that cannot be loaded at all is reported as E001.

use serde::Serialize;

use crate::config::{GeneratorConfig, ResourceConfig, ResourceKind};
use crate::dedup::DedupRegistry;
use crate::document::{OpenApiDocument, SchemaProvider};
use crate::error::ModelError;
use crate::loader::load_document_auto;
use crate::model::{ModelBuilder, ResourceModel};
use crate::policy::{join_path, FieldPolicy, WithoutExclusions};
use crate::types::FieldDescriptor;
use crate::walker::SchemaWalker;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from checking.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// Where the issue is, e.g. `update_operation` or a dotted field path.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(code: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(code: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Status of a checked resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Error,
    Warning,
}

/// Result of checking a single resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceResult {
    pub resource: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ResourceResult {
    fn new(resource: &str, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            resource: resource.to_string(),
            status: status_of(&diagnostics),
            diagnostics,
        }
    }
}

/// Result of checking every resource of a config.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub document: String,
    pub resources_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    /// Findings not tied to one resource.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
    pub results: Vec<ResourceResult>,
}

impl CheckResult {
    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    /// Whether the check passes, treating warnings as errors when `strict`.
    pub fn passes(&self, strict: bool) -> bool {
        self.is_ok() && (!strict || self.warnings == 0)
    }
}

/// Load a document (path or URL) and check the config against it.
pub fn check_source(source: &str, config: &GeneratorConfig, strict: bool) -> CheckResult {
    match load_document_auto(source) {
        Ok(root) => check(&OpenApiDocument::new(root), source, config, strict),
        Err(e) => summarize(
            source,
            vec![Diagnostic::error("E001", "/", format!("cannot load document: {}", e))],
            Vec::new(),
            strict,
        ),
    }
}

/// Check every configured resource against a loaded document.
///
/// If `strict` is true, resources with only warnings count as failed.
pub fn check<P>(provider: &P, document: &str, config: &GeneratorConfig, strict: bool) -> CheckResult
where
    P: SchemaProvider + ?Sized,
{
    let mut global = Vec::new();
    for name in config.policy.excluded_fields.intersection(&config.policy.set_fields) {
        global.push(Diagnostic::warning(
            "W002",
            format!("policy.{}", name),
            format!("field '{}' is both excluded and represented as a set", name),
        ));
    }

    let mut resources: Vec<&ResourceConfig> = config.resources.iter().collect();
    resources.sort_by(|a, b| a.name.cmp(&b.name));

    let builder = ModelBuilder::from_config(provider, config);
    let mut registry = DedupRegistry::new();
    let mut results = Vec::new();

    for resource in resources {
        let mut diagnostics = Vec::new();
        check_optional(provider, resource, &mut diagnostics);
        check_required_exclusions(provider, config, resource, &mut diagnostics);

        match builder.build(resource) {
            Ok(mut model) => {
                check_overrides(&model.fields, "", &mut diagnostics);
                check_collisions(&mut registry, &mut model, &mut diagnostics);
            }
            Err(e) => {
                let cause = match e {
                    ModelError::Resource { source, .. } => source.to_string(),
                    other => other.to_string(),
                };
                diagnostics.push(Diagnostic::error("E002", "/", cause));
            }
        }

        results.push(ResourceResult::new(&resource.name, diagnostics));
    }

    summarize(document, global, results, strict)
}

fn check_optional<P>(provider: &P, resource: &ResourceConfig, diagnostics: &mut Vec<Diagnostic>)
where
    P: SchemaProvider + ?Sized,
{
    let with_body = resource
        .update_operation
        .iter()
        .map(|op| ("update_operation", op))
        .chain(resource.update_actions.iter().map(|op| ("update_actions", op)))
        .chain(
            resource
                .termination_operation
                .iter()
                .map(|op| ("termination_operation", op)),
        );

    for (key, operation) in with_body {
        if !provider.has_operation(operation) {
            diagnostics.push(Diagnostic::warning(
                "W001",
                key,
                format!("operation '{}' not found, treated as empty", operation),
            ));
        } else if provider.request_schema(operation).is_none() {
            diagnostics.push(Diagnostic::warning(
                "W001",
                key,
                format!("operation '{}' has no request body, treated as empty", operation),
            ));
        }
    }

    if let Some(operation) = resource.list_operation.as_deref() {
        if !provider.has_operation(operation) {
            diagnostics.push(Diagnostic::warning(
                "W001",
                "list_operation",
                format!("operation '{}' not found, no filters generated", operation),
            ));
        }
    }
}

fn check_required_exclusions<P>(
    provider: &P,
    config: &GeneratorConfig,
    resource: &ResourceConfig,
    diagnostics: &mut Vec<Diagnostic>,
) where
    P: SchemaProvider + ?Sized,
{
    let input = match resource.kind {
        ResourceKind::Standard => resource
            .create_operation
            .as_deref()
            .and_then(|op| provider.request_schema(op)),
        ResourceKind::Order => resource
            .order_attributes_schema
            .as_deref()
            .and_then(|name| provider.named_schema(name)),
    };
    let Some(input) = input else {
        return;
    };

    let options = config.walk_options();
    let open = WithoutExclusions(&config.policy);
    let fields = SchemaWalker::new(provider, &open, &options).walk(Some(input), 0);
    check_required_level(&fields, "", &config.policy, diagnostics);
}

fn check_required_level<F>(
    fields: &[FieldDescriptor],
    parent: &str,
    policy: &F,
    diagnostics: &mut Vec<Diagnostic>,
) where
    F: FieldPolicy + ?Sized,
{
    for field in fields {
        let path = join_path(parent, &field.name);
        if policy.is_excluded(&field.name, &path) {
            if !field.required {
                continue;
            }
            diagnostics.push(Diagnostic::warning(
                "W002",
                path.clone(),
                format!("excluded field '{}' is required on input and was kept", path),
            ));
        }
        check_required_level(field.nested_properties(), &path, policy, diagnostics);
    }
}

fn check_overrides(fields: &[FieldDescriptor], parent: &str, diagnostics: &mut Vec<Diagnostic>) {
    for field in fields {
        let path = join_path(parent, &field.name);
        if let Some(declared) = field.overridden_from {
            diagnostics.push(Diagnostic::warning(
                "W003",
                path.clone(),
                format!(
                    "declared {}, overridden to {}",
                    declared.as_str(),
                    field.semantic_type.as_str()
                ),
            ));
        }
        check_overrides(field.nested_properties(), &path, diagnostics);
    }
}

fn check_collisions(
    registry: &mut DedupRegistry,
    model: &mut ResourceModel,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let before = registry.collisions().len();
    registry.assign(&model.name, &mut model.fields);
    registry.assign(
        &format!("{}_termination", model.name),
        &mut model.termination_fields,
    );

    for collision in &registry.collisions()[before..] {
        diagnostics.push(Diagnostic::warning(
            "W004",
            collision.path.clone(),
            format!(
                "nested type name '{}' already taken, using '{}'",
                collision.requested, collision.assigned
            ),
        ));
    }
}

fn status_of(diagnostics: &[Diagnostic]) -> CheckStatus {
    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        CheckStatus::Error
    } else if diagnostics.is_empty() {
        CheckStatus::Ok
    } else {
        CheckStatus::Warning
    }
}

fn summarize(
    document: &str,
    diagnostics: Vec<Diagnostic>,
    results: Vec<ResourceResult>,
    strict: bool,
) -> CheckResult {
    let all = || {
        diagnostics
            .iter()
            .chain(results.iter().flat_map(|r| r.diagnostics.iter()))
    };
    let errors = all().filter(|d| d.severity == Severity::Error).count();
    let warnings = all().filter(|d| d.severity == Severity::Warning).count();

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != CheckStatus::Ok
            } else {
                r.status == CheckStatus::Error
            }
        })
        .count();

    CheckResult {
        document: document.to_string(),
        resources_checked: results.len(),
        passed: results.len() - failed,
        failed,
        errors,
        warnings,
        diagnostics,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyTable;
    use serde_json::json;

    fn document() -> OpenApiDocument {
        OpenApiDocument::new(json!({
            "paths": {
                "/orders/": {
                    "get": {
                        "operationId": "orders_retrieve",
                        "responses": { "200": { "content": { "application/json": {
                            "schema": {
                                "type": "object",
                                "properties": {
                                    "name": { "type": "string" },
                                    "billing_price_estimate": {
                                        "type": "object",
                                        "properties": {
                                            "total": { "type": "string" },
                                            "tax": { "type": "string" }
                                        }
                                    }
                                }
                            }
                        }}}}
                    }
                }
            },
            "components": { "schemas": {
                "OrderAttributes": {
                    "type": "object",
                    "required": ["name"],
                    "properties": { "name": { "type": "string" } }
                }
            }}
        }))
    }

    fn config(resources: Vec<ResourceConfig>) -> GeneratorConfig {
        GeneratorConfig {
            resources,
            ..GeneratorConfig::default()
        }
    }

    fn codes(result: &CheckResult) -> Vec<String> {
        result
            .diagnostics
            .iter()
            .chain(result.results.iter().flat_map(|r| r.diagnostics.iter()))
            .map(|d| d.code.clone())
            .collect()
    }

    fn order() -> ResourceConfig {
        ResourceConfig {
            retrieve_operation: Some("orders_retrieve".into()),
            ..ResourceConfig::order("marketplace_order", "OrderAttributes")
        }
    }

    #[test]
    fn missing_required_schema_is_error() {
        let result = check(
            &document(),
            "doc.json",
            &config(vec![ResourceConfig::order("tenant", "Missing")]),
            false,
        );
        assert!(!result.is_ok());
        assert_eq!(codes(&result), vec!["E002"]);
        assert_eq!(result.results[0].status, CheckStatus::Error);
        assert_eq!(result.failed, 1);
    }

    #[test]
    fn overrides_reported_as_warnings() {
        let result = check(&document(), "doc.json", &config(vec![order()]), false);
        assert!(result.is_ok());
        assert_eq!(codes(&result), vec!["W003", "W003"]);
        assert!(!result.passes(true));
        assert!(result.passes(false));
    }

    #[test]
    fn missing_optional_operation_is_warning() {
        let resource = ResourceConfig {
            update_operation: Some("orders_update".into()),
            ..order()
        };
        let result = check(&document(), "doc.json", &config(vec![resource]), true);
        assert!(codes(&result).contains(&"W001".to_string()));
        assert_eq!(result.results[0].status, CheckStatus::Warning);
        assert_eq!(result.failed, 1);
    }

    #[test]
    fn policy_conflicts_reported() {
        let mut config = config(vec![order()]);
        config.policy = PolicyTable::new().exclude("name").set_field("name");

        let result = check(&document(), "doc.json", &config, false);
        let codes = codes(&result);
        assert_eq!(codes.iter().filter(|c| *c == "W002").count(), 2);
    }

    #[test]
    fn override_matching_declared_type_not_reported() {
        let document = OpenApiDocument::new(json!({
            "paths": {
                "/orders/": {
                    "get": {
                        "operationId": "orders_retrieve",
                        "responses": { "200": { "content": { "application/json": {
                            "schema": {
                                "type": "object",
                                "properties": {
                                    "billing_price_estimate": {
                                        "type": "object",
                                        "properties": {
                                            "total": { "type": "number" },
                                            "tax": { "type": "string" }
                                        }
                                    }
                                }
                            }
                        }}}}
                    }
                }
            },
            "components": { "schemas": {
                "OrderAttributes": { "type": "object", "properties": {} }
            }}
        }));

        let result = check(&document, "doc.json", &config(vec![order()]), false);
        let diagnostics = &result.results[0].diagnostics;
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "W003");
        assert_eq!(diagnostics[0].path, "billing_price_estimate.tax");
        assert_eq!(diagnostics[0].message, "declared string, overridden to number");
    }

    #[test]
    fn nested_required_exclusion_reported() {
        let document = OpenApiDocument::new(json!({
            "paths": {
                "/orders/": {
                    "get": {
                        "operationId": "orders_retrieve",
                        "responses": { "200": { "content": { "application/json": {
                            "schema": { "type": "object", "properties": {} }
                        }}}}
                    }
                }
            },
            "components": { "schemas": {
                "OrderAttributes": {
                    "type": "object",
                    "properties": {
                        "customer": {
                            "type": "object",
                            "required": ["url"],
                            "properties": {
                                "name": { "type": "string" },
                                "url": { "type": "string" }
                            }
                        },
                        "note": {
                            "type": "object",
                            "required": ["url"],
                            "properties": { "url": { "type": "string" } }
                        }
                    }
                }
            }}
        }));
        let mut config = config(vec![order()]);
        config.policy = PolicyTable::new().exclude("url").exclude("note");

        let result = check(&document, "doc.json", &config, false);
        let paths: Vec<&str> = result.results[0]
            .diagnostics
            .iter()
            .filter(|d| d.code == "W002")
            .map(|d| d.path.as_str())
            .collect();
        assert_eq!(paths, vec!["customer.url"]);
    }

    #[test]
    fn unloadable_document_is_e001() {
        let result = check_source("/nonexistent/openapi.json", &config(vec![]), false);
        assert_eq!(codes(&result), vec!["E001"]);
        assert!(!result.is_ok());
    }
}
