//! Maps protobuf field kinds onto OpenAPI schemas.
//!
//! [`map_field`] handles everything that has a fixed representation (scalars, well-known
//! types, the array/map shape of a field) and defers named messages and enums to the
//! [`SchemaGenerator`](crate::schema_generator::SchemaGenerator), which owns the
//! `components.schemas` registry.

use crate::config::{Int64Encoding, MappingOptions};
use crate::descriptor::{Field, FieldKind, ProtoSet, ScalarKind};
use crate::error::{Error, Result};
use crate::schema_generator::Schema;
use indexmap::IndexMap;

/// Result of mapping one field
#[derive(Debug, Clone, PartialEq)]
pub enum Mapping {
    /// Fully mapped schema that needs no registry entry
    Inline(Schema),
    /// Named message, to be built by the schema generator
    Message(String),
    /// Named enum, to be built by the schema generator
    Enum(String),
    /// `repeated` field
    Array(Box<Mapping>),
    /// `map<K, V>` field, holding the mapping of the value type
    Map(Box<Mapping>),
}

impl Mapping {
    /// Whether this mapping can be expressed as a query or path parameter
    pub fn is_parameter_compatible(&self) -> bool {
        match self {
            Mapping::Inline(schema) => schema.is_primitive(),
            Mapping::Enum(_) => true,
            Mapping::Array(inner) => matches!(
                inner.as_ref(),
                Mapping::Enum(_) | Mapping::Inline(_)
            ) && inner.is_parameter_compatible(),
            Mapping::Message(_) | Mapping::Map(_) => false,
        }
    }
}

/// Map a field to its OpenAPI representation
pub fn map_field(field: &Field, protos: &ProtoSet, options: &MappingOptions) -> Result<Mapping> {
    if let FieldKind::Message(type_name) = &field.kind {
        let message = protos.message(type_name).ok_or_else(|| {
            Error::Invariant(format!(
                "field {} references unknown message {}",
                field.name, type_name
            ))
        })?;

        if message.map_entry {
            let value = message.field("value").ok_or_else(|| {
                Error::Invariant(format!("map entry {} has no value field", type_name))
            })?;
            let value_mapping = map_kind(&value.kind, protos, options)?;
            return Ok(Mapping::Map(Box::new(value_mapping)));
        }
    }

    let mapping = map_kind(&field.kind, protos, options)?;
    if field.is_repeated() {
        Ok(Mapping::Array(Box::new(mapping)))
    } else {
        Ok(mapping)
    }
}

/// Map a field kind, ignoring its cardinality
pub fn map_kind(kind: &FieldKind, protos: &ProtoSet, options: &MappingOptions) -> Result<Mapping> {
    match kind {
        FieldKind::Scalar(scalar) => Ok(Mapping::Inline(map_scalar(*scalar, options))),
        FieldKind::Message(type_name) | FieldKind::Enum(type_name) => {
            if let Some(schema) = well_known_schema(type_name, options) {
                return Ok(Mapping::Inline(schema));
            }
            match kind {
                FieldKind::Message(_) => Ok(Mapping::Message(type_name.clone())),
                _ => {
                    if protos.enum_type(type_name).is_none() {
                        return Err(Error::Invariant(format!(
                            "reference to unknown enum {}",
                            type_name
                        )));
                    }
                    Ok(Mapping::Enum(type_name.clone()))
                }
            }
        }
    }
}

/// Map a scalar kind to a primitive schema
pub fn map_scalar(kind: ScalarKind, options: &MappingOptions) -> Schema {
    let int64 = |format: &str| match options.int64_encoding {
        Int64Encoding::String => Schema::primitive("string", Some(format)),
        Int64Encoding::Integer => Schema::primitive("integer", Some(format)),
    };

    match kind {
        ScalarKind::Int32
        | ScalarKind::Sint32
        | ScalarKind::Sfixed32
        | ScalarKind::Uint32
        | ScalarKind::Fixed32 => Schema::primitive("integer", Some("int32")),
        ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => int64("int64"),
        ScalarKind::Uint64 | ScalarKind::Fixed64 => int64("uint64"),
        ScalarKind::Float => Schema::primitive("number", Some("float")),
        ScalarKind::Double => Schema::primitive("number", Some("double")),
        ScalarKind::Bool => Schema::primitive("boolean", None),
        ScalarKind::String => Schema::primitive("string", None),
        ScalarKind::Bytes => Schema::primitive("string", Some("byte")),
    }
}

/// Fixed schema of a well-known type, if `type_name` is one
pub fn well_known_schema(type_name: &str, options: &MappingOptions) -> Option<Schema> {
    let name = type_name.strip_prefix("google.protobuf.")?;

    let schema = match name {
        "Timestamp" => Schema::primitive("string", Some("date-time")),
        "Duration" => Schema::primitive("string", Some("duration")),
        "FieldMask" => Schema::primitive("string", Some("field-mask")),
        "DoubleValue" => map_scalar(ScalarKind::Double, options),
        "FloatValue" => map_scalar(ScalarKind::Float, options),
        "Int64Value" => map_scalar(ScalarKind::Int64, options),
        "UInt64Value" => map_scalar(ScalarKind::Uint64, options),
        "Int32Value" => map_scalar(ScalarKind::Int32, options),
        "UInt32Value" => map_scalar(ScalarKind::Uint32, options),
        "BoolValue" => map_scalar(ScalarKind::Bool, options),
        "StringValue" => map_scalar(ScalarKind::String, options),
        "BytesValue" => map_scalar(ScalarKind::Bytes, options),
        "Empty" => Schema::object(IndexMap::new()),
        "Struct" => Schema::map(Schema::any()),
        "Value" | "NullValue" => Schema::any(),
        "ListValue" => Schema::array(Schema::any()),
        "Any" => {
            let mut properties = IndexMap::new();
            properties.insert("@type".to_string(), Schema::primitive("string", None));
            let mut schema = Schema::object(properties);
            schema.additional_properties = Some(Box::new(Schema::any()));
            schema
        }
        _ => return None,
    };

    Some(schema)
}
