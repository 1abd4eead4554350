//! Mapping from semantic types to generation metadata.

use crate::types::{AttrKind, SemanticType, TypeMeta, ValueConversion};

/// String formats carried as a timestamp with the raw text alongside.
const DATE_TIME_FORMATS: &[&str] = &["date-time"];

/// Resolve generation metadata for a field.
///
/// `item_type` is the element type of arrays, sets and maps; it is ignored
/// for every other type. A missing element type means string elements.
pub fn resolve(
    semantic_type: SemanticType,
    item_type: Option<SemanticType>,
    format: Option<&str>,
) -> TypeMeta {
    match semantic_type {
        SemanticType::String => {
            let is_date_time = format
                .map(|f| DATE_TIME_FORMATS.contains(&f))
                .unwrap_or(false);
            TypeMeta {
                attr_kind: AttrKind::String,
                element_kind: None,
                is_nested: false,
                is_complex: false,
                is_date_time,
                // Date-time values need both the raw text and the parsed
                // time, so there is no plain scalar conversion for them.
                conversion: if is_date_time {
                    None
                } else {
                    Some(ValueConversion::String)
                },
            }
        }
        SemanticType::Integer => scalar(AttrKind::Int64, ValueConversion::Int64),
        SemanticType::Number => scalar(AttrKind::Float64, ValueConversion::Float64),
        SemanticType::Boolean => scalar(AttrKind::Bool, ValueConversion::Bool),
        SemanticType::Array => collection(AttrKind::List, item_type),
        SemanticType::Set => collection(AttrKind::Set, item_type),
        SemanticType::Map => collection(AttrKind::Map, item_type),
        SemanticType::Object => TypeMeta {
            attr_kind: AttrKind::Object,
            element_kind: None,
            is_nested: true,
            is_complex: true,
            is_date_time: false,
            conversion: None,
        },
    }
}

/// Attribute kind used for an element of the given type.
pub fn element_kind(item_type: SemanticType) -> AttrKind {
    match item_type {
        SemanticType::String => AttrKind::String,
        SemanticType::Integer => AttrKind::Int64,
        SemanticType::Number => AttrKind::Float64,
        SemanticType::Boolean => AttrKind::Bool,
        SemanticType::Array => AttrKind::List,
        SemanticType::Set => AttrKind::Set,
        SemanticType::Map => AttrKind::Map,
        SemanticType::Object => AttrKind::Object,
    }
}

fn scalar(attr_kind: AttrKind, conversion: ValueConversion) -> TypeMeta {
    TypeMeta {
        attr_kind,
        element_kind: None,
        is_nested: false,
        is_complex: false,
        is_date_time: false,
        conversion: Some(conversion),
    }
}

fn collection(attr_kind: AttrKind, item_type: Option<SemanticType>) -> TypeMeta {
    let item_type = item_type.unwrap_or(SemanticType::String);
    TypeMeta {
        attr_kind,
        element_kind: Some(element_kind(item_type)),
        is_nested: item_type == SemanticType::Object,
        is_complex: true,
        is_date_time: false,
        conversion: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_string() {
        let meta = resolve(SemanticType::String, None, None);
        assert_eq!(meta.attr_kind, AttrKind::String);
        assert_eq!(meta.conversion, Some(ValueConversion::String));
        assert!(!meta.is_complex);
        assert!(!meta.is_date_time);
    }

    #[test]
    fn date_time_string_drops_conversion() {
        let meta = resolve(SemanticType::String, None, Some("date-time"));
        assert!(meta.is_date_time);
        assert_eq!(meta.conversion, None);
        assert_eq!(meta.attr_kind, AttrKind::String);
    }

    #[test]
    fn other_string_formats_are_plain() {
        let meta = resolve(SemanticType::String, None, Some("uuid"));
        assert!(!meta.is_date_time);
        assert_eq!(meta.conversion, Some(ValueConversion::String));
    }

    #[test]
    fn numeric_scalars() {
        assert_eq!(resolve(SemanticType::Integer, None, None).attr_kind, AttrKind::Int64);
        assert_eq!(resolve(SemanticType::Number, None, None).attr_kind, AttrKind::Float64);
        assert_eq!(resolve(SemanticType::Boolean, None, None).attr_kind, AttrKind::Bool);
    }

    #[test]
    fn list_of_strings_is_complex_not_nested() {
        let meta = resolve(SemanticType::Array, Some(SemanticType::String), None);
        assert_eq!(meta.attr_kind, AttrKind::List);
        assert_eq!(meta.element_kind, Some(AttrKind::String));
        assert!(meta.is_complex);
        assert!(!meta.is_nested);
    }

    #[test]
    fn set_of_objects_is_nested() {
        let meta = resolve(SemanticType::Set, Some(SemanticType::Object), None);
        assert_eq!(meta.attr_kind, AttrKind::Set);
        assert_eq!(meta.element_kind, Some(AttrKind::Object));
        assert!(meta.is_nested);
    }

    #[test]
    fn map_defaults_to_string_elements() {
        let meta = resolve(SemanticType::Map, None, None);
        assert_eq!(meta.attr_kind, AttrKind::Map);
        assert_eq!(meta.element_kind, Some(AttrKind::String));
        assert!(meta.is_complex);
    }

    #[test]
    fn object_is_nested_and_complex() {
        let meta = resolve(SemanticType::Object, None, None);
        assert!(meta.is_nested);
        assert!(meta.is_complex);
        assert_eq!(meta.conversion, None);
    }

    #[test]
    fn item_type_ignored_for_scalars() {
        assert_eq!(
            resolve(SemanticType::Integer, Some(SemanticType::Object), None),
            resolve(SemanticType::Integer, None, None)
        );
    }
}
