//! Core types shared by the walker, reconciler and deduplicator.

use serde::{Deserialize, Serialize};

/// Default recursion cap for nested object extraction.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Default name of the resource identity field.
pub const DEFAULT_IDENTIFIER_FIELD: &str = "uuid";

/// Semantic type of a schema field.
///
/// `Set` is an array that the policy table asked to represent as an
/// unordered collection; the source schema never distinguishes the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Integer,
    Boolean,
    Number,
    Array,
    Set,
    Object,
    Map,
}

impl SemanticType {
    /// Parse a JSON Schema `type` keyword.
    ///
    /// Returns `None` for `null` and unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(SemanticType::String),
            "integer" => Some(SemanticType::Integer),
            "boolean" => Some(SemanticType::Boolean),
            "number" => Some(SemanticType::Number),
            "array" => Some(SemanticType::Array),
            "object" => Some(SemanticType::Object),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::String => "string",
            SemanticType::Integer => "integer",
            SemanticType::Boolean => "boolean",
            SemanticType::Number => "number",
            SemanticType::Array => "array",
            SemanticType::Set => "set",
            SemanticType::Object => "object",
            SemanticType::Map => "map",
        }
    }

    /// True for array and set.
    pub fn is_collection(&self) -> bool {
        matches!(self, SemanticType::Array | SemanticType::Set)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            SemanticType::String
                | SemanticType::Integer
                | SemanticType::Boolean
                | SemanticType::Number
        )
    }
}

/// Attribute kind handed to the emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrKind {
    String,
    Int64,
    Float64,
    Bool,
    List,
    Set,
    Map,
    Object,
}

impl AttrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKind::String => "string",
            AttrKind::Int64 => "int64",
            AttrKind::Float64 => "float64",
            AttrKind::Bool => "bool",
            AttrKind::List => "list",
            AttrKind::Set => "set",
            AttrKind::Map => "map",
            AttrKind::Object => "object",
        }
    }
}

/// Scalar conversion the emitter applies when reading a value back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueConversion {
    String,
    Int64,
    Float64,
    Bool,
}

/// Generation metadata derived from a field's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TypeMeta {
    pub attr_kind: AttrKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_kind: Option<AttrKind>,
    pub is_nested: bool,
    pub is_complex: bool,
    pub is_date_time: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversion: Option<ValueConversion>,
}

impl TypeMeta {
    /// Compact type label, e.g. `string` or `list<object>`.
    pub fn label(&self) -> String {
        match self.element_kind {
            Some(element) => format!("{}<{}>", self.attr_kind.as_str(), element.as_str()),
            None if self.is_date_time => "string:date-time".to_string(),
            None => self.attr_kind.as_str().to_string(),
        }
    }
}

impl Default for TypeMeta {
    fn default() -> Self {
        Self {
            attr_kind: AttrKind::String,
            element_kind: None,
            is_nested: false,
            is_complex: false,
            is_date_time: false,
            conversion: Some(ValueConversion::String),
        }
    }
}

/// How a field's value is expected to be present in the emitted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// The user must set it.
    Required,
    /// The user may set it; absence is meaningful.
    Optional,
    /// The server decides the value.
    Computed,
}

/// Canonical description of one schema field plus generation metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Element descriptor for arrays, sets and maps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldDescriptor>>,
    /// Children of an object, sorted by name once finalized.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<FieldDescriptor>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub required: bool,
    pub read_only: bool,
    pub server_computed: bool,
    pub use_state_for_unknown: bool,
    pub force_new: bool,
    pub is_path_param: bool,
    pub data_source_only: bool,
    pub schema_skip: bool,
    /// Name declared by the source schema through `$ref`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
    /// Canonical nested type name assigned by deduplication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attr_type_ref: Option<String>,
    /// Declared type the override table replaced, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overridden_from: Option<SemanticType>,
    pub meta: TypeMeta,
}

impl FieldDescriptor {
    /// Create an optional, writable field of the given type.
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
            format: None,
            description: None,
            items: None,
            properties: Vec::new(),
            enum_values: Vec::new(),
            minimum: None,
            maximum: None,
            min_length: None,
            max_length: None,
            pattern: None,
            required: false,
            read_only: false,
            server_computed: false,
            use_state_for_unknown: false,
            force_new: false,
            is_path_param: false,
            data_source_only: false,
            schema_skip: false,
            ref_name: None,
            attr_type_ref: None,
            overridden_from: None,
            meta: crate::type_resolver::resolve(semantic_type, None, None),
        }
    }

    /// Semantic type of the element, for collections and maps.
    pub fn item_type(&self) -> Option<SemanticType> {
        self.items.as_ref().map(|item| item.semantic_type)
    }

    /// Innermost element descriptor, following nested collections and
    /// maps. A field without `items` is its own element.
    pub fn innermost(&self) -> &FieldDescriptor {
        match self.items.as_deref() {
            Some(item) => item.innermost(),
            None => self,
        }
    }

    pub fn innermost_mut(&mut self) -> &mut FieldDescriptor {
        match self.items {
            Some(ref mut item) => item.innermost_mut(),
            None => self,
        }
    }

    /// Children describing the nested shape: object properties, or the
    /// innermost element's properties for collections and maps of objects.
    pub fn nested_properties(&self) -> &[FieldDescriptor] {
        let element = self.innermost();
        match element.semantic_type {
            SemanticType::Object => &element.properties,
            _ => &[],
        }
    }

    pub fn nested_properties_mut(&mut self) -> Option<&mut Vec<FieldDescriptor>> {
        let element = self.innermost_mut();
        match element.semantic_type {
            SemanticType::Object => Some(&mut element.properties),
            _ => None,
        }
    }

    /// Mark the field as decided by the server.
    pub fn mark_server_computed(&mut self) {
        self.server_computed = true;
        self.required = false;
        self.use_state_for_unknown = true;
    }

    pub fn presence(&self) -> Presence {
        if self.server_computed && !self.required {
            Presence::Computed
        } else if self.required {
            Presence::Required
        } else {
            Presence::Optional
        }
    }

    /// Recompute `meta` from the current type, recursively.
    pub fn refresh_meta(&mut self) {
        if let Some(item) = self.items.as_mut() {
            item.refresh_meta();
        }
        for child in &mut self.properties {
            child.refresh_meta();
        }
        self.meta = crate::type_resolver::resolve(
            self.semantic_type,
            self.item_type(),
            self.format.as_deref(),
        );
    }
}

/// Sort fields by name at every level.
pub fn sort_fields(fields: &mut [FieldDescriptor]) {
    fields.sort_by(|a, b| a.name.cmp(&b.name));
    for field in fields.iter_mut() {
        sort_fields(&mut field.properties);
        if let Some(item) = field.items.as_mut() {
            sort_fields(std::slice::from_mut(&mut **item));
        }
    }
}

/// Number of property levels in a field tree (a flat list is 1).
pub fn nesting_depth(fields: &[FieldDescriptor]) -> usize {
    fields
        .iter()
        .map(|field| 1 + nesting_depth(field.nested_properties()))
        .max()
        .unwrap_or(0)
}

/// Find a field by name in a list.
pub fn find_field<'a>(fields: &'a [FieldDescriptor], name: &str) -> Option<&'a FieldDescriptor> {
    fields.iter().find(|field| field.name == name)
}

/// Options controlling schema traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    pub max_depth: usize,
    /// Suppress the identifier field at the root level only.
    pub skip_root_identifier: bool,
    pub identifier_field: String,
}

impl WalkOptions {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Self::default()
        }
    }

    pub fn skip_root_identifier(mut self, skip: bool) -> Self {
        self.skip_root_identifier = skip;
        self
    }
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            skip_root_identifier: false,
            identifier_field: DEFAULT_IDENTIFIER_FIELD.to_string(),
        }
    }
}
