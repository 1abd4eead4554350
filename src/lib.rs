//! Resource Model Generator
//!
//! Builds a canonical, typed resource model for every managed resource of
//! an HTTP API from its OpenAPI document.
//!
//! Each resource is described by operations (create, retrieve, update,
//! actions) or, for order-provisioned resources, by an order attribute
//! schema. Their schemas are walked into field descriptors, merged into one
//! read/write model, annotated with lifecycle flags and finally
//! deduplicated so structurally identical nested shapes share one name.
//!
//! # Example
//!
//! ```
//! use resource_model::{generate, GeneratorConfig, OpenApiDocument, ResourceConfig};
//! use serde_json::json;
//!
//! let document = OpenApiDocument::new(json!({
//!     "paths": {
//!         "/keys/": {
//!             "post": {
//!                 "operationId": "keys_create",
//!                 "requestBody": { "content": { "application/json": { "schema": {
//!                     "type": "object",
//!                     "required": ["name"],
//!                     "properties": { "name": { "type": "string" } }
//!                 }}}},
//!                 "responses": { "201": { "content": { "application/json": { "schema": {
//!                     "type": "object",
//!                     "properties": {
//!                         "uuid": { "type": "string", "readOnly": true },
//!                         "name": { "type": "string" },
//!                         "fingerprint": { "type": "string", "readOnly": true }
//!                     }
//!                 }}}}}
//!             }
//!         }
//!     }
//! }));
//!
//! let config = GeneratorConfig {
//!     resources: vec![ResourceConfig::standard("ssh_key", "keys_create")],
//!     ..GeneratorConfig::default()
//! };
//!
//! let report = generate(&document, &config, &[]);
//! let key = &report.models[0];
//!
//! // No update operation, so the name can only be set at creation.
//! assert!(key.fields.iter().any(|f| f.name == "name" && f.required && f.force_new));
//! assert!(key.fields.iter().any(|f| f.name == "fingerprint" && f.server_computed));
//! ```
//!
//! # Field Flags
//!
//! | Flag | Set when |
//! |------|----------|
//! | `required` | Required on create input (never together with `server_computed`) |
//! | `read_only` | Read-only in a response and not a path parameter |
//! | `server_computed` | Read-only, or absent from the create input |
//! | `force_new` | Writable and not accepted by any update operation or action |
//! | `is_path_param` | Routed through the create URL |
//! | `data_source_only` | List filter, only meaningful for lookups |

mod checker;
mod config;
mod dedup;
mod document;
mod error;
mod loader;
mod model;
mod policy;
mod reconciler;
mod type_resolver;
mod types;
mod walker;

pub use checker::{
    check, check_source, CheckResult, CheckStatus, Diagnostic, ResourceResult, Severity,
};
pub use config::{config_schema, validate_config, GeneratorConfig, ResourceConfig, ResourceKind};
pub use dedup::{fingerprint, DedupRegistry, NameCollision, NestedShape};
pub use document::{OpenApiDocument, Parameter, SchemaProvider};
pub use error::{ConfigError, ConfigIssue, LoadError, ModelError};
pub use loader::{is_url, load_document, load_document_auto, load_document_str, navigate_pointer};
pub use model::{generate, GenerationReport, ModelBuilder, ResourceModel};
pub use policy::{join_path, FieldPolicy, PolicyTable, WithoutExclusions};
pub use reconciler::{
    derive_force_new, derive_server_computed, mark_path_params, merge_fields, merge_order_fields,
    reinclude_required, OrderReferences,
};
pub use type_resolver::{element_kind, resolve as resolve_meta};
pub use types::{
    find_field, nesting_depth, sort_fields, AttrKind, FieldDescriptor, Presence, SemanticType,
    TypeMeta, ValueConversion, WalkOptions, DEFAULT_IDENTIFIER_FIELD, DEFAULT_MAX_DEPTH,
};
pub use walker::{type_override, walk, SchemaWalker, TYPE_OVERRIDES};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
