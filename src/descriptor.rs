//! Proto-side data model consumed by the generator.
//!
//! These types describe an already-resolved set of protobuf files: every type reference
//! is a fully-qualified name (without the leading dot) that can be looked up in the
//! owning [`ProtoSet`]. They are normally produced by [`crate::loader`] from a
//! `prost_reflect::DescriptorPool`, but can also be built by hand.
//!
//! # Example
//!
//! ```
//! use protoc_gen_oas::descriptor::{Field, MessageType, Method, ProtoSet, ScalarKind, ServiceType};
//!
//! let protos = ProtoSet::new()
//!     .with_message(
//!         MessageType::new("Point")
//!             .with_field(Field::scalar("x", 1, ScalarKind::Int32))
//!             .with_field(Field::scalar("y", 2, ScalarKind::Int32)),
//!     )
//!     .with_service(ServiceType::new("Geo").with_method(Method::new("Echo", "Point", "Point")));
//!
//! assert!(protos.message("Point").is_some());
//! ```

use std::collections::HashMap;

/// Scalar field kinds of the protobuf type system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

/// Declared kind of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarKind),
    /// Reference to a message by fully-qualified name
    Message(String),
    /// Reference to an enum by fully-qualified name
    Enum(String),
}

/// Field label
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cardinality {
    #[default]
    Optional,
    /// proto2 `required`
    Required,
    /// `repeated`, also used by map fields
    Repeated,
}

/// A message field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field name as declared in the .proto file
    pub name: String,
    /// Name used by the proto3 JSON mapping
    pub json_name: String,
    pub number: u32,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
    /// Name of the (non-synthetic) oneof this field belongs to
    pub oneof: Option<String>,
    pub deprecated: bool,
    pub description: Option<String>,
}

impl Field {
    /// Create a singular field of the given kind
    pub fn new(name: impl Into<String>, number: u32, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            json_name: json_name(&name),
            name,
            number,
            kind,
            cardinality: Cardinality::Optional,
            oneof: None,
            deprecated: false,
            description: None,
        }
    }

    pub fn scalar(name: impl Into<String>, number: u32, kind: ScalarKind) -> Self {
        Self::new(name, number, FieldKind::Scalar(kind))
    }

    pub fn message(name: impl Into<String>, number: u32, type_name: impl Into<String>) -> Self {
        Self::new(name, number, FieldKind::Message(type_name.into()))
    }

    pub fn enumeration(name: impl Into<String>, number: u32, type_name: impl Into<String>) -> Self {
        Self::new(name, number, FieldKind::Enum(type_name.into()))
    }

    /// Mark the field as `repeated`
    pub fn repeated(mut self) -> Self {
        self.cardinality = Cardinality::Repeated;
        self
    }

    /// Mark the field as proto2 `required`
    pub fn required(mut self) -> Self {
        self.cardinality = Cardinality::Required;
        self
    }

    pub fn in_oneof(mut self, oneof: impl Into<String>) -> Self {
        self.oneof = Some(oneof.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }
}

/// A oneof group; members are listed by field name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneofGroup {
    pub name: String,
    pub fields: Vec<String>,
}

/// A message type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType {
    pub full_name: String,
    /// Fields in declaration order
    pub fields: Vec<Field>,
    pub oneofs: Vec<OneofGroup>,
    /// Synthetic `FooEntry` message generated by the compiler for a `map<K, V>` field
    pub map_entry: bool,
    pub deprecated: bool,
    pub description: Option<String>,
}

impl MessageType {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            fields: Vec::new(),
            oneofs: Vec::new(),
            map_entry: false,
            deprecated: false,
            description: None,
        }
    }

    /// Create the synthetic entry message of a `map<K, V>` field
    pub fn map_entry(full_name: impl Into<String>, key: ScalarKind, value: FieldKind) -> Self {
        let mut entry = Self::new(full_name)
            .with_field(Field::scalar("key", 1, key))
            .with_field(Field::new("value", 2, value));
        entry.map_entry = true;
        entry
    }

    pub fn with_field(mut self, field: Field) -> Self {
        if let Some(oneof) = &field.oneof {
            match self.oneofs.iter_mut().find(|group| &group.name == oneof) {
                Some(group) => group.fields.push(field.name.clone()),
                None => self.oneofs.push(OneofGroup {
                    name: oneof.clone(),
                    fields: vec![field.name.clone()],
                }),
            }
        }
        self.fields.push(field);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Look up a field by its proto name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
}

/// An enum type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub full_name: String,
    /// Values in declaration order
    pub values: Vec<EnumValue>,
    pub description: Option<String>,
}

impl EnumType {
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            values: Vec::new(),
            description: None,
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, number: i32) -> Self {
        self.values.push(EnumValue {
            name: name.into(),
            number,
        });
        self
    }
}

/// HTTP methods an operation can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    /// Parse the `kind` of a custom HTTP pattern (case-insensitive)
    pub fn from_custom(kind: &str) -> Option<Self> {
        match kind.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "PUT" => Some(HttpMethod::Put),
            "POST" => Some(HttpMethod::Post),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            "HEAD" => Some(HttpMethod::Head),
            "OPTIONS" => Some(HttpMethod::Options),
            "TRACE" => Some(HttpMethod::Trace),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }
}

/// Which part of the input message is sent as the request body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BodySelector {
    /// No request body; non-path fields become query parameters
    #[default]
    None,
    /// `body: "*"`, the whole input message
    Whole,
    /// `body: "<field>"`, a single top-level field of the input message
    Field(String),
}

/// HTTP binding of a method, taken from its `google.api.http` option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBinding {
    pub method: HttpMethod,
    /// Path template, e.g. `/v1/{name=shelves/*}/books`
    pub path: String,
    pub body: BodySelector,
    /// Output field returned as the response body instead of the whole message
    pub response_body: Option<String>,
    pub additional_bindings: Vec<HttpBinding>,
}

impl HttpBinding {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: BodySelector::None,
            response_body: None,
            additional_bindings: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: BodySelector) -> Self {
        self.body = body;
        self
    }

    pub fn with_response_body(mut self, field: impl Into<String>) -> Self {
        self.response_body = Some(field.into());
        self
    }

    pub fn with_additional_binding(mut self, binding: HttpBinding) -> Self {
        self.additional_bindings.push(binding);
        self
    }
}

/// An RPC method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    /// Fully-qualified input message name
    pub input_type: String,
    /// Fully-qualified output message name
    pub output_type: String,
    pub http: Option<HttpBinding>,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub deprecated: bool,
    pub description: Option<String>,
}

impl Method {
    pub fn new(
        name: impl Into<String>,
        input_type: impl Into<String>,
        output_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input_type: input_type.into(),
            output_type: output_type.into(),
            http: None,
            client_streaming: false,
            server_streaming: false,
            deprecated: false,
            description: None,
        }
    }

    pub fn with_http(mut self, binding: HttpBinding) -> Self {
        self.http = Some(binding);
        self
    }
}

/// A service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceType {
    pub full_name: String,
    /// Unqualified service name
    pub name: String,
    /// Methods in declaration order
    pub methods: Vec<Method>,
    pub description: Option<String>,
}

impl ServiceType {
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .rsplit('.')
            .next()
            .unwrap_or(full_name.as_str())
            .to_string();
        Self {
            full_name,
            name,
            methods: Vec::new(),
            description: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Fully-qualified name of one of this service's methods
    pub fn method_full_name(&self, method: &Method) -> String {
        format!("{}.{}", self.full_name, method.name)
    }
}

/// A resolved set of protobuf files
///
/// Holds every message and enum visible to the compiler, keyed by fully-qualified name,
/// plus the services the generator should emit operations for.
#[derive(Debug, Clone, Default)]
pub struct ProtoSet {
    messages: HashMap<String, MessageType>,
    enums: HashMap<String, EnumType>,
    services: Vec<ServiceType>,
}

impl ProtoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: MessageType) -> Self {
        self.add_message(message);
        self
    }

    pub fn with_enum(mut self, enum_type: EnumType) -> Self {
        self.add_enum(enum_type);
        self
    }

    pub fn with_service(mut self, service: ServiceType) -> Self {
        self.add_service(service);
        self
    }

    pub fn add_message(&mut self, message: MessageType) {
        self.messages.insert(message.full_name.clone(), message);
    }

    pub fn add_enum(&mut self, enum_type: EnumType) {
        self.enums.insert(enum_type.full_name.clone(), enum_type);
    }

    pub fn add_service(&mut self, service: ServiceType) {
        self.services.push(service);
    }

    pub fn message(&self, full_name: &str) -> Option<&MessageType> {
        self.messages.get(full_name)
    }

    pub fn enum_type(&self, full_name: &str) -> Option<&EnumType> {
        self.enums.get(full_name)
    }

    /// Services in file and declaration order
    pub fn services(&self) -> &[ServiceType] {
        &self.services
    }
}

/// Compute the proto3 JSON name of a field the way protoc does:
/// underscores are dropped and the following letter is upper-cased.
pub fn json_name(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut capitalize_next = false;
    for c in name.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}
