//! Generator configuration.
//!
//! Loaded from JSON or YAML, checked against [`config_schema`] so problems
//! come back with JSON-Pointer paths, then deserialized.
//!
//! ```yaml
//! max_depth: 3
//! policy:
//!   excluded_fields: [url, marketplace_resource_uuid]
//!   set_fields: [security_groups]
//! resources:
//!   - name: volume
//!     create_operation: openstack_volumes_create
//!     retrieve_operation: openstack_volumes_retrieve
//!     update_operation: openstack_volumes_partial_update
//!     update_actions: [openstack_volumes_extend]
//!   - name: tenant
//!     kind: order
//!     order_attributes_schema: OpenStackTenantCreateOrderAttributes
//!     retrieve_operation: openstack_tenants_retrieve
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ConfigError, ConfigIssue};
use crate::loader::load_document;
use crate::policy::PolicyTable;
use crate::reconciler::OrderReferences;
use crate::types::{WalkOptions, DEFAULT_IDENTIFIER_FIELD, DEFAULT_MAX_DEPTH};

/// How a resource comes into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Created directly through its own create operation.
    #[default]
    Standard,
    /// Provisioned asynchronously through an order against an offering.
    Order,
}

/// Operations and schemas that describe one resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceConfig {
    pub name: String,
    #[serde(default)]
    pub kind: ResourceKind,
    /// Create operation; required for standard resources.
    #[serde(default)]
    pub create_operation: Option<String>,
    /// Operation whose response describes the resource. Falls back to the
    /// create operation's response for standard resources.
    #[serde(default)]
    pub retrieve_operation: Option<String>,
    #[serde(default)]
    pub update_operation: Option<String>,
    /// Operations whose request bodies declare updatable parameters.
    #[serde(default)]
    pub update_actions: Vec<String>,
    /// List operation whose query parameters become data-source filters.
    #[serde(default)]
    pub list_operation: Option<String>,
    #[serde(default)]
    pub termination_operation: Option<String>,
    /// Named schema of the order submission attributes.
    #[serde(default)]
    pub order_attributes_schema: Option<String>,
}

impl ResourceConfig {
    /// Standard resource with the given create operation.
    pub fn standard(name: impl Into<String>, create_operation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ResourceKind::Standard,
            create_operation: Some(create_operation.into()),
            retrieve_operation: None,
            update_operation: None,
            update_actions: Vec::new(),
            list_operation: None,
            termination_operation: None,
            order_attributes_schema: None,
        }
    }

    /// Order resource with the given submission attribute schema.
    pub fn order(name: impl Into<String>, attributes_schema: impl Into<String>) -> Self {
        Self {
            kind: ResourceKind::Order,
            create_operation: None,
            order_attributes_schema: Some(attributes_schema.into()),
            ..Self::standard(name, "")
        }
    }
}

/// Top-level generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneratorConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_skip_root_identifier")]
    pub skip_root_identifier: bool,
    #[serde(default = "default_identifier_field")]
    pub identifier_field: String,
    #[serde(default)]
    pub policy: PolicyTable,
    #[serde(default)]
    pub order: OrderReferences,
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_skip_root_identifier() -> bool {
    true
}

fn default_identifier_field() -> String {
    DEFAULT_IDENTIFIER_FIELD.to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            skip_root_identifier: default_skip_root_identifier(),
            identifier_field: default_identifier_field(),
            policy: PolicyTable::default(),
            order: OrderReferences::default(),
            resources: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    /// Load and validate a config file (JSON or YAML).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let value = load_document(path)?;
        Self::from_value(&value)
    }

    /// Validate and deserialize an already-parsed config.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        validate_config(value)?;

        let config: GeneratorConfig =
            serde_json::from_value(value.clone()).map_err(|e| ConfigError::InvalidShape {
                message: e.to_string(),
            })?;

        let mut seen = BTreeSet::new();
        for resource in &config.resources {
            if !seen.insert(resource.name.as_str()) {
                return Err(ConfigError::InvalidShape {
                    message: format!("duplicate resource name '{}'", resource.name),
                });
            }
        }

        Ok(config)
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            max_depth: self.max_depth,
            skip_root_identifier: self.skip_root_identifier,
            identifier_field: self.identifier_field.clone(),
        }
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name == name)
    }
}

/// JSON Schema every config document must satisfy.
pub fn config_schema() -> Value {
    let names = json!({ "type": "array", "items": { "type": "string" }, "uniqueItems": true });
    let operation = json!({ "type": "string", "minLength": 1 });

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "additionalProperties": false,
        "properties": {
            "max_depth": { "type": "integer", "minimum": 1 },
            "skip_root_identifier": { "type": "boolean" },
            "identifier_field": { "type": "string", "minLength": 1 },
            "policy": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "excluded_fields": names,
                    "excluded_paths": names,
                    "set_fields": names,
                    "set_paths": names
                }
            },
            "order": {
                "type": "object",
                "additionalProperties": false,
                "properties": {
                    "target_field": { "type": "string", "minLength": 1 },
                    "origin_field": { "type": "string", "minLength": 1 }
                }
            },
            "resources": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["name"],
                    "properties": {
                        "name": { "type": "string", "pattern": "^[a-z][a-z0-9_]*$" },
                        "kind": { "enum": ["standard", "order"] },
                        "create_operation": operation,
                        "retrieve_operation": operation,
                        "update_operation": operation,
                        "update_actions": { "type": "array", "items": operation },
                        "list_operation": operation,
                        "termination_operation": operation,
                        "order_attributes_schema": operation
                    }
                }
            }
        }
    })
}

/// Validate a parsed config against [`config_schema`].
///
/// # Errors
///
/// Returns `ConfigError::Invalid` listing every finding.
pub fn validate_config(value: &Value) -> Result<(), ConfigError> {
    let schema = config_schema();
    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::InvalidShape {
        message: e.to_string(),
    })?;

    let errors: Vec<ConfigIssue> = validator
        .iter_errors(value)
        .map(|e| ConfigIssue {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn empty_config_uses_defaults() {
        let config = GeneratorConfig::from_value(&json!({})).unwrap();
        assert_eq!(config, GeneratorConfig::default());
        assert_eq!(config.max_depth, 3);
        assert!(config.skip_root_identifier);
        assert_eq!(config.order.target_field, "offering");
        assert_eq!(config.order.origin_field, "project");
    }

    #[test]
    fn resources_deserialize() {
        let config = GeneratorConfig::from_value(&json!({
            "resources": [
                { "name": "volume", "create_operation": "volumes_create", "update_actions": ["volumes_extend"] },
                { "name": "tenant", "kind": "order", "order_attributes_schema": "TenantAttributes" }
            ]
        }))
        .unwrap();

        let volume = config.resource("volume").unwrap();
        assert_eq!(volume.kind, ResourceKind::Standard);
        assert_eq!(volume.update_actions, vec!["volumes_extend"]);

        let tenant = config.resource("tenant").unwrap();
        assert_eq!(tenant.kind, ResourceKind::Order);
        assert_eq!(tenant.order_attributes_schema.as_deref(), Some("TenantAttributes"));
    }

    #[test]
    fn unknown_key_reported_with_path() {
        let result = GeneratorConfig::from_value(&json!({
            "resources": [{ "name": "volume", "create_op": "x" }]
        }));
        match result {
            Err(ConfigError::Invalid { errors }) => {
                assert!(errors.iter().any(|e| e.path == "/resources/0"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn max_depth_must_be_positive() {
        let result = GeneratorConfig::from_value(&json!({ "max_depth": 0 }));
        match result {
            Err(ConfigError::Invalid { errors }) => assert_eq!(errors[0].path, "/max_depth"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_resource_names_rejected() {
        let result = GeneratorConfig::from_value(&json!({
            "resources": [{ "name": "volume" }, { "name": "volume" }]
        }));
        assert!(matches!(result, Err(ConfigError::InvalidShape { .. })));
    }

    #[test]
    fn load_yaml_config() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "max_depth: 2\npolicy:\n  excluded_fields: [url]\nresources:\n  - name: volume\n    create_operation: volumes_create"
        )
        .unwrap();

        let config = GeneratorConfig::load(file.path()).unwrap();
        assert_eq!(config.max_depth, 2);
        assert!(config.policy.excluded_fields.contains("url"));
        assert_eq!(config.walk_options().max_depth, 2);
    }

    #[test]
    fn order_constructor_sets_kind() {
        let resource = ResourceConfig::order("tenant", "TenantAttributes");
        assert_eq!(resource.kind, ResourceKind::Order);
        assert!(resource.create_operation.is_none());
    }
}
