//! Per-resource model building and the generation run.
//!
//! A run builds every selected resource independently, in name order,
//! then makes one deduplication pass over all successful models so nested
//! type names come from a single namespace.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::{GeneratorConfig, ResourceConfig, ResourceKind};
use crate::dedup::{DedupRegistry, NameCollision, NestedShape};
use crate::document::SchemaProvider;
use crate::error::ModelError;
use crate::policy::{FieldPolicy, PolicyTable, WithoutExclusions};
use crate::reconciler::{
    derive_force_new, derive_server_computed, mark_path_params, merge_fields, merge_order_fields,
    reinclude_required, OrderReferences,
};
use crate::types::{sort_fields, FieldDescriptor, SemanticType, WalkOptions};
use crate::walker::SchemaWalker;

/// Canonical read/write surface of one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceModel {
    pub name: String,
    pub kind: ResourceKind,
    pub fields: Vec<FieldDescriptor>,
    /// Data-source-only lookup filters.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FieldDescriptor>,
    /// Optional inputs accepted when the resource is terminated.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub termination_fields: Vec<FieldDescriptor>,
}

/// Builds resource models from a schema provider and a policy.
pub struct ModelBuilder<'a, P: ?Sized, F: ?Sized> {
    provider: &'a P,
    policy: &'a F,
    options: WalkOptions,
    references: OrderReferences,
}

impl<'a, P: SchemaProvider + ?Sized> ModelBuilder<'a, P, PolicyTable> {
    /// Builder using the policy, walk options and order references of a config.
    pub fn from_config(provider: &'a P, config: &'a GeneratorConfig) -> Self {
        Self::new(provider, &config.policy, config.walk_options())
            .order_references(config.order.clone())
    }
}

impl<'a, P, F> ModelBuilder<'a, P, F>
where
    P: SchemaProvider + ?Sized,
    F: FieldPolicy + ?Sized,
{
    pub fn new(provider: &'a P, policy: &'a F, options: WalkOptions) -> Self {
        Self {
            provider,
            policy,
            options,
            references: OrderReferences::default(),
        }
    }

    pub fn order_references(mut self, references: OrderReferences) -> Self {
        self.references = references;
        self
    }

    /// Build the model of one resource.
    ///
    /// # Errors
    ///
    /// Returns `ModelError::Resource` naming the resource when a required
    /// operation or schema is missing. Optional inputs degrade to empty.
    pub fn build(&self, resource: &ResourceConfig) -> Result<ResourceModel, ModelError> {
        let fields = match resource.kind {
            ResourceKind::Standard => self.build_standard(resource),
            ResourceKind::Order => self.build_order(resource),
        }
        .map_err(|e| ModelError::for_resource(&resource.name, e))?;

        let mut model = ResourceModel {
            name: resource.name.clone(),
            kind: resource.kind,
            fields,
            filters: self.filters(resource),
            termination_fields: self.optional_request_fields(resource.termination_operation.as_deref()),
        };
        finalize(&mut model.fields);
        finalize(&mut model.filters);
        finalize(&mut model.termination_fields);

        debug!(
            resource = %model.name,
            fields = model.fields.len(),
            filters = model.filters.len(),
            "model built"
        );
        Ok(model)
    }

    fn build_standard(&self, resource: &ResourceConfig) -> Result<Vec<FieldDescriptor>, ModelError> {
        let create_op = resource
            .create_operation
            .as_deref()
            .ok_or(ModelError::MissingOperation {
                role: "create operation",
            })?;
        self.require_operation(create_op)?;
        let create_schema =
            self.provider
                .request_schema(create_op)
                .ok_or_else(|| ModelError::SchemaNotFound {
                    name: format!("{} request body", create_op),
                })?;

        let response_op = resource.retrieve_operation.as_deref().unwrap_or(create_op);
        self.require_operation(response_op)?;
        let response_schema =
            self.provider
                .response_schema(response_op)
                .ok_or_else(|| ModelError::SchemaNotFound {
                    name: format!("{} response", response_op),
                })?;

        let mut create = self.walk_input(create_schema);

        let path_params: Vec<String> = self
            .provider
            .parameters(create_op, "path")
            .into_iter()
            .map(|param| param.name)
            .collect();
        for name in mark_path_params(&mut create, &path_params) {
            create.push(routing_field(name));
        }
        sort_fields(&mut create);

        let response = self.walker().walk(Some(response_schema), 0);

        let mut fields = merge_fields(create.clone(), response);
        derive_server_computed(&mut fields, &create);
        derive_force_new(&mut fields, &self.updatable(resource));
        Ok(fields)
    }

    fn build_order(&self, resource: &ResourceConfig) -> Result<Vec<FieldDescriptor>, ModelError> {
        let schema_name =
            resource
                .order_attributes_schema
                .as_deref()
                .ok_or(ModelError::MissingOperation {
                    role: "order attributes schema",
                })?;
        let input_schema =
            self.provider
                .named_schema(schema_name)
                .ok_or_else(|| ModelError::SchemaNotFound {
                    name: schema_name.to_string(),
                })?;

        let output_op = resource
            .retrieve_operation
            .as_deref()
            .ok_or(ModelError::MissingOperation {
                role: "retrieve operation",
            })?;
        self.require_operation(output_op)?;
        let output_schema =
            self.provider
                .response_schema(output_op)
                .ok_or_else(|| ModelError::SchemaNotFound {
                    name: format!("{} response", output_op),
                })?;

        let input = self.walk_input(input_schema);
        let output = self.walker().walk(Some(output_schema), 0);

        let mut fields = merge_order_fields(input, output, &self.references);
        derive_force_new(&mut fields, &self.updatable(resource));
        Ok(fields)
    }

    /// Walk an input schema and restore required fields the policy dropped.
    fn walk_input(&self, schema: &Value) -> Vec<FieldDescriptor> {
        let mut fields = self.walker().walk(Some(schema), 0);
        let open = WithoutExclusions(self.policy);
        let unfiltered = SchemaWalker::new(self.provider, &open, &self.options).walk(Some(schema), 0);
        reinclude_required(&mut fields, &unfiltered, self.policy);
        fields
    }

    fn walker(&self) -> SchemaWalker<'_, P, F> {
        SchemaWalker::new(self.provider, self.policy, &self.options)
    }

    fn require_operation(&self, operation: &str) -> Result<(), ModelError> {
        if self.provider.has_operation(operation) {
            Ok(())
        } else {
            Err(ModelError::OperationNotFound {
                operation: operation.to_string(),
            })
        }
    }

    /// Names settable after creation: update input plus action parameters.
    fn updatable(&self, resource: &ResourceConfig) -> BTreeSet<String> {
        resource
            .update_operation
            .iter()
            .chain(resource.update_actions.iter())
            .flat_map(|op| self.optional_request_fields(Some(op.as_str())))
            .map(|field| field.name)
            .collect()
    }

    /// Request body fields of an optional operation; absent means empty.
    fn optional_request_fields(&self, operation: Option<&str>) -> Vec<FieldDescriptor> {
        let Some(operation) = operation else {
            return Vec::new();
        };
        match self.provider.request_schema(operation) {
            Some(schema) => self.walker().walk(Some(schema), 0),
            None => {
                debug!(operation, "optional schema missing, treated as empty");
                Vec::new()
            }
        }
    }

    fn filters(&self, resource: &ResourceConfig) -> Vec<FieldDescriptor> {
        let Some(list_op) = resource.list_operation.as_deref() else {
            return Vec::new();
        };

        let mut properties = Map::new();
        for param in self.provider.parameters(list_op, "query") {
            let mut schema = param.schema.unwrap_or_else(|| json!({ "type": "string" }));
            if let (Some(description), Some(map)) = (param.description, schema.as_object_mut()) {
                map.entry("description").or_insert(Value::String(description));
            }
            properties.insert(param.name, schema);
        }
        let synthetic = json!({ "type": "object", "properties": Value::Object(properties) });

        // A query parameter named like the identifier is still a filter.
        let options = self.options.clone().skip_root_identifier(false);
        let mut filters =
            SchemaWalker::new(self.provider, self.policy, &options).walk(Some(&synthetic), 0);
        for filter in &mut filters {
            filter.data_source_only = true;
            filter.required = false;
            filter.read_only = false;
        }
        filters
    }
}

/// Required string field for a path parameter with no body counterpart.
fn routing_field(name: String) -> FieldDescriptor {
    let mut field = FieldDescriptor::new(name, SemanticType::String);
    field.required = true;
    field.is_path_param = true;
    field.schema_skip = true;
    field
}

fn finalize(fields: &mut [FieldDescriptor]) {
    for field in fields.iter_mut() {
        field.refresh_meta();
    }
    sort_fields(fields);
}

/// Outcome of one generation run.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Successfully built models, name-ordered.
    pub models: Vec<ResourceModel>,
    /// Unique nested shapes across all models, name-ordered.
    pub types: Vec<NestedShape>,
    pub collisions: Vec<NameCollision>,
    /// One resource-named error per failed resource.
    pub failures: Vec<ModelError>,
}

impl GenerationReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// JSON view handed to the template layer.
    pub fn to_json(&self) -> Value {
        json!({
            "resources": self.models,
            "types": self.types,
        })
    }
}

/// Build every configured resource (or only the named ones).
///
/// Resources are processed in name order and deduplicated in one final
/// pass, so the output is identical across runs over the same inputs.
pub fn generate<P>(provider: &P, config: &GeneratorConfig, only: &[String]) -> GenerationReport
where
    P: SchemaProvider + ?Sized,
{
    let mut report = GenerationReport::default();

    for name in only {
        if config.resource(name).is_none() {
            report.failures.push(ModelError::UnknownResource { name: name.clone() });
        }
    }

    let mut selected: Vec<&ResourceConfig> = config
        .resources
        .iter()
        .filter(|r| only.is_empty() || only.contains(&r.name))
        .collect();
    selected.sort_by(|a, b| a.name.cmp(&b.name));

    let builder = ModelBuilder::from_config(provider, config);
    for resource in selected {
        match builder.build(resource) {
            Ok(model) => report.models.push(model),
            Err(e) => report.failures.push(e),
        }
    }

    let mut registry = DedupRegistry::new();
    for model in &mut report.models {
        registry.assign(&model.name, &mut model.fields);
        registry.assign(
            &format!("{}_termination", model.name),
            &mut model.termination_fields,
        );
    }
    report.collisions = registry.collisions().to_vec();
    report.types = registry.into_shapes();

    report
}
