use crate::config::MappingOptions;
use crate::descriptor::{Cardinality, EnumType, Field, MessageType, ProtoSet};
use crate::error::{Error, Result};
use crate::type_mapper::{self, Mapping};
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Prefix of every component schema reference
pub const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Schema generator - converts proto messages and enums to OpenAPI schemas
pub struct SchemaGenerator<'a> {
    /// Resolved descriptors used to look up referenced types
    protos: &'a ProtoSet,
    options: MappingOptions,
    /// Generated component schemas keyed by fully-qualified type name
    schemas: IndexMap<String, Schema>,
    /// Build state of every type seen so far; consulted before recursing
    visited: HashMap<String, BuildState>,
}

/// Registry state of a named type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    InProgress,
    Built,
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to another schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "date-time")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Properties for object types, in declaration order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Schema>>,
    /// Value schema for map types
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Box<Schema>>,
    /// Required field names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Enum values for enum types
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl Schema {
    /// Schema accepting any value (`{}`)
    pub fn any() -> Self {
        Self::default()
    }

    pub fn primitive(schema_type: &str, format: Option<&str>) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            format: format.map(str::to_string),
            ..Self::default()
        }
    }

    /// `$ref` to a component schema
    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("{}{}", SCHEMA_REF_PREFIX, name)),
            ..Self::default()
        }
    }

    pub fn array(items: Schema) -> Self {
        Self {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    /// Object schema; an empty property list is omitted
    pub fn object(properties: IndexMap<String, Schema>) -> Self {
        Self {
            schema_type: Some("object".to_string()),
            properties: if properties.is_empty() {
                None
            } else {
                Some(properties)
            },
            ..Self::default()
        }
    }

    /// Object schema with arbitrary keys and values of one schema
    pub fn map(values: Schema) -> Self {
        Self {
            schema_type: Some("object".to_string()),
            additional_properties: Some(Box::new(values)),
            ..Self::default()
        }
    }

    pub fn string_enum(values: Vec<String>) -> Self {
        Self {
            schema_type: Some("string".to_string()),
            enum_values: Some(values),
            ..Self::default()
        }
    }

    /// Whether this is a plain scalar schema
    pub fn is_primitive(&self) -> bool {
        self.reference.is_none()
            && matches!(
                self.schema_type.as_deref(),
                Some("string") | Some("integer") | Some("number") | Some("boolean")
            )
    }
}

impl<'a> SchemaGenerator<'a> {
    /// Create a new SchemaGenerator over a resolved descriptor set
    pub fn new(protos: &'a ProtoSet, options: MappingOptions) -> Self {
        debug!("Initializing SchemaGenerator");
        Self {
            protos,
            options,
            schemas: IndexMap::new(),
            visited: HashMap::new(),
        }
    }

    /// Descriptors this generator resolves against
    pub fn protos(&self) -> &'a ProtoSet {
        self.protos
    }

    /// Property or parameter name of a field
    pub fn property_name(&self, field: &Field) -> String {
        if self.options.json_names {
            field.json_name.clone()
        } else {
            field.name.clone()
        }
    }

    /// Schema for a whole message used as a request or response body.
    ///
    /// Well-known types are inlined, everything else becomes a `$ref`.
    pub fn message_schema(&mut self, type_name: &str) -> Result<Schema> {
        if let Some(schema) = type_mapper::well_known_schema(type_name, &self.options) {
            return Ok(schema);
        }
        self.build_message(type_name)
    }

    /// Map a field through the type mapper and resolve the named types it defers
    pub fn field_mapping(&self, field: &Field) -> Result<Mapping> {
        type_mapper::map_field(field, self.protos, &self.options)
    }

    /// Schema for a single field
    pub fn field_schema(&mut self, field: &Field) -> Result<Schema> {
        let mapping = self.field_mapping(field)?;
        let mut schema = self.realize(mapping)?;
        if schema.reference.is_none() {
            schema.description = field.description.clone();
            if field.deprecated {
                schema.deprecated = Some(true);
            }
        }
        Ok(schema)
    }

    /// Turn a mapping into a schema, building any named type it refers to
    pub fn realize(&mut self, mapping: Mapping) -> Result<Schema> {
        match mapping {
            Mapping::Inline(schema) => Ok(schema),
            Mapping::Message(name) => self.build_message(&name),
            Mapping::Enum(name) => self.build_enum(&name),
            Mapping::Array(inner) => Ok(Schema::array(self.realize(*inner)?)),
            Mapping::Map(inner) => Ok(Schema::map(self.realize(*inner)?)),
        }
    }

    /// Ensure the component schema of a message exists and return a reference to it
    fn build_message(&mut self, type_name: &str) -> Result<Schema> {
        // Checked before touching fields so recursive messages terminate
        if let Some(state) = self.visited.get(type_name) {
            debug!("Schema for {} already {:?}", type_name, state);
            return Ok(Schema::reference(type_name));
        }

        let protos = self.protos;
        let message = protos.message(type_name).ok_or_else(|| {
            Error::Invariant(format!("reference to unknown message {}", type_name))
        })?;
        if message.map_entry {
            return Err(Error::Invariant(format!(
                "map entry {} used outside of a map field",
                type_name
            )));
        }

        debug!("Generating message schema for: {}", type_name);
        self.visited
            .insert(type_name.to_string(), BuildState::InProgress);

        let schema = self.message_body(message)?;
        self.schemas.insert(type_name.to_string(), schema);
        self.visited.insert(type_name.to_string(), BuildState::Built);

        Ok(Schema::reference(type_name))
    }

    fn message_body(&mut self, message: &MessageType) -> Result<Schema> {
        for group in &message.oneofs {
            debug!(
                "Flattening oneof {}.{} ({} members)",
                message.full_name,
                group.name,
                group.fields.len()
            );
        }

        let mut properties = IndexMap::new();
        let mut required = Vec::new();

        for field in &message.fields {
            let name = self.property_name(field);
            let schema = self.field_schema(field)?;
            if field.cardinality == Cardinality::Required {
                required.push(name.clone());
            }
            properties.insert(name, schema);
        }

        let mut schema = Schema::object(properties);
        schema.description = message.description.clone();
        if message.deprecated {
            schema.deprecated = Some(true);
        }
        if !required.is_empty() {
            schema.required = Some(required);
        }
        Ok(schema)
    }

    /// Ensure the component schema of an enum exists and return a reference to it
    fn build_enum(&mut self, type_name: &str) -> Result<Schema> {
        if self.visited.contains_key(type_name) {
            return Ok(Schema::reference(type_name));
        }

        let enum_type = self.protos.enum_type(type_name).ok_or_else(|| {
            Error::Invariant(format!("reference to unknown enum {}", type_name))
        })?;

        debug!("Generating enum schema for: {}", type_name);
        let schema = enum_schema(enum_type);
        self.schemas.insert(type_name.to_string(), schema);
        self.visited.insert(type_name.to_string(), BuildState::Built);

        Ok(Schema::reference(type_name))
    }

    /// Get all generated schemas
    pub fn get_schemas(&self) -> &IndexMap<String, Schema> {
        &self.schemas
    }

    pub fn into_schemas(self) -> IndexMap<String, Schema> {
        self.schemas
    }
}

fn enum_schema(enum_type: &EnumType) -> Schema {
    let values = enum_type
        .values
        .iter()
        .map(|value| value.name.clone())
        .collect();
    let mut schema = Schema::string_enum(values);
    schema.description = enum_type.description.clone();
    schema
}
