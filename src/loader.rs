//! Builds a [`ProtoSet`] from a resolved `prost_reflect::DescriptorPool`.
//!
//! Besides the type graph this reads the `google.api.http` method option and proto
//! comments (when the descriptors carry `source_code_info`).

use crate::descriptor::{
    BodySelector, Cardinality as FieldCardinality, EnumType, EnumValue, Field, FieldKind,
    HttpBinding, HttpMethod, MessageType, Method, OneofGroup, ProtoSet, ScalarKind, ServiceType,
};
use crate::error::{Error, Result};
use log::{debug, warn};
use prost::Message;
use prost_reflect::{
    Cardinality, DescriptorPool, EnumDescriptor, FieldDescriptor, FileDescriptor, Kind,
    MessageDescriptor, MethodDescriptor, ServiceDescriptor,
};
use std::collections::HashMap;

/// Field number of the `google.api.http` extension of `MethodOptions`
const HTTP_OPTION_TAG: u32 = 72295728;

/// `google.api.HttpRule`, decoded straight from the method options
#[derive(Clone, PartialEq, Message)]
pub(crate) struct HttpRule {
    #[prost(string, tag = "1")]
    pub selector: String,
    #[prost(oneof = "HttpPattern", tags = "2, 3, 4, 5, 6, 8")]
    pub pattern: Option<HttpPattern>,
    #[prost(string, tag = "7")]
    pub body: String,
    #[prost(string, tag = "12")]
    pub response_body: String,
    #[prost(message, repeated, tag = "11")]
    pub additional_bindings: Vec<HttpRule>,
}

#[derive(Clone, PartialEq, prost::Oneof)]
pub(crate) enum HttpPattern {
    #[prost(string, tag = "2")]
    Get(String),
    #[prost(string, tag = "3")]
    Put(String),
    #[prost(string, tag = "4")]
    Post(String),
    #[prost(string, tag = "5")]
    Delete(String),
    #[prost(string, tag = "6")]
    Patch(String),
    #[prost(message, tag = "8")]
    Custom(CustomHttpPattern),
}

#[derive(Clone, PartialEq, Message)]
pub(crate) struct CustomHttpPattern {
    #[prost(string, tag = "1")]
    pub kind: String,
    #[prost(string, tag = "2")]
    pub path: String,
}

/// The subset of `MethodOptions` the generator cares about
#[derive(Clone, PartialEq, Message)]
pub(crate) struct RawMethodOptions {
    #[prost(message, optional, tag = "72295728")]
    pub http: Option<HttpRule>,
}

/// Comments of one file keyed by source location path
#[derive(Default)]
struct Comments {
    by_path: HashMap<Vec<i32>, String>,
}

impl Comments {
    fn of_file(file: &FileDescriptor) -> Self {
        let mut by_path = HashMap::new();
        if let Some(info) = &file.file_descriptor_proto().source_code_info {
            for location in &info.location {
                let text = location
                    .leading_comments
                    .as_deref()
                    .or(location.trailing_comments.as_deref())
                    .map(clean_comment)
                    .filter(|text| !text.is_empty());
                if let Some(text) = text {
                    by_path.insert(location.path.clone(), text);
                }
            }
        }
        Self { by_path }
    }

    fn get(&self, path: &[i32]) -> Option<String> {
        self.by_path.get(path).cloned()
    }
}

/// Strip comment indentation and surrounding blank lines
fn clean_comment(raw: &str) -> String {
    raw.lines()
        .map(|line| line.strip_prefix(' ').unwrap_or(line).trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Loads descriptors out of a pool
struct Loader<'p> {
    pool: &'p DescriptorPool,
    comments: HashMap<String, Comments>,
}

impl ProtoSet {
    /// Build a ProtoSet from a descriptor pool.
    ///
    /// All messages and enums of the pool are loaded. Services are taken from the files
    /// listed in `files_to_generate`, or from every file when the list is empty.
    pub fn from_pool(pool: &DescriptorPool, files_to_generate: &[String]) -> Result<Self> {
        debug!("Loading descriptors from {} files", pool.files().len());
        let mut loader = Loader {
            pool,
            comments: HashMap::new(),
        };
        loader.load(files_to_generate)
    }
}

impl<'p> Loader<'p> {
    fn load(&mut self, files_to_generate: &[String]) -> Result<ProtoSet> {
        for file in self.pool.files() {
            self.comments
                .insert(file.name().to_string(), Comments::of_file(&file));
        }

        let mut protos = ProtoSet::new();

        for message in self.pool.all_messages() {
            protos.add_message(self.message(&message));
        }
        for enum_desc in self.pool.all_enums() {
            protos.add_enum(self.enumeration(&enum_desc));
        }

        for file in self.pool.files() {
            let wanted = files_to_generate.is_empty()
                || files_to_generate.iter().any(|name| name == file.name());
            if !wanted {
                continue;
            }
            for service in file.services() {
                protos.add_service(self.service(&service)?);
            }
        }

        debug!("Loaded {} services", protos.services().len());
        Ok(protos)
    }

    fn comment(&self, file: &FileDescriptor, path: &[i32]) -> Option<String> {
        self.comments.get(file.name()).and_then(|c| c.get(path))
    }

    fn message(&self, message: &MessageDescriptor) -> MessageType {
        let mut result = MessageType::new(message.full_name());
        result.map_entry = message.is_map_entry();
        result.deprecated = message
            .descriptor_proto()
            .options
            .as_ref()
            .and_then(|options| options.deprecated)
            .unwrap_or(false);
        result.description = self.comment(&message.parent_file(), message.path());

        for oneof in message.oneofs() {
            if oneof.is_synthetic() {
                continue;
            }
            result.oneofs.push(OneofGroup {
                name: oneof.name().to_string(),
                fields: oneof.fields().map(|f| f.name().to_string()).collect(),
            });
        }

        result.fields = message.fields().map(|field| self.field(&field)).collect();
        result
    }

    fn field(&self, field: &FieldDescriptor) -> Field {
        let cardinality = match field.cardinality() {
            Cardinality::Repeated => FieldCardinality::Repeated,
            Cardinality::Required => FieldCardinality::Required,
            Cardinality::Optional => FieldCardinality::Optional,
        };

        let mut result = Field::new(field.name(), field.number(), field_kind(field.kind()));
        result.json_name = field.json_name().to_string();
        result.cardinality = cardinality;
        result.oneof = field
            .containing_oneof()
            .filter(|oneof| !oneof.is_synthetic())
            .map(|oneof| oneof.name().to_string());
        result.deprecated = field
            .field_descriptor_proto()
            .options
            .as_ref()
            .and_then(|options| options.deprecated)
            .unwrap_or(false);
        result.description = self.comment(&field.parent_file(), field.path());
        result
    }

    fn enumeration(&self, enum_desc: &EnumDescriptor) -> EnumType {
        let mut result = EnumType::new(enum_desc.full_name());
        result.values = enum_desc
            .values()
            .map(|value| EnumValue {
                name: value.name().to_string(),
                number: value.number(),
            })
            .collect();
        result.description = self.comment(&enum_desc.parent_file(), enum_desc.path());
        result
    }

    fn service(&self, service: &ServiceDescriptor) -> Result<ServiceType> {
        let mut result = ServiceType::new(service.full_name());
        result.description = self.comment(&service.parent_file(), service.path());
        for method in service.methods() {
            result.methods.push(self.method(&method)?);
        }
        Ok(result)
    }

    fn method(&self, method: &MethodDescriptor) -> Result<Method> {
        let mut result = Method::new(
            method.name(),
            method.input().full_name(),
            method.output().full_name(),
        );
        result.client_streaming = method.is_client_streaming();
        result.server_streaming = method.is_server_streaming();
        result.deprecated = method
            .method_descriptor_proto()
            .options
            .as_ref()
            .and_then(|options| options.deprecated)
            .unwrap_or(false);
        result.description = self.comment(&method.parent_file(), method.path());

        let options = method.options().encode_to_vec();
        result.http = http_binding(method.full_name(), &options)?;
        if result.client_streaming || result.server_streaming {
            warn!(
                "{} is a streaming method; it is documented as a unary call",
                method.full_name()
            );
        }
        Ok(result)
    }
}

fn field_kind(kind: Kind) -> FieldKind {
    match kind {
        Kind::Double => FieldKind::Scalar(ScalarKind::Double),
        Kind::Float => FieldKind::Scalar(ScalarKind::Float),
        Kind::Int32 => FieldKind::Scalar(ScalarKind::Int32),
        Kind::Int64 => FieldKind::Scalar(ScalarKind::Int64),
        Kind::Uint32 => FieldKind::Scalar(ScalarKind::Uint32),
        Kind::Uint64 => FieldKind::Scalar(ScalarKind::Uint64),
        Kind::Sint32 => FieldKind::Scalar(ScalarKind::Sint32),
        Kind::Sint64 => FieldKind::Scalar(ScalarKind::Sint64),
        Kind::Fixed32 => FieldKind::Scalar(ScalarKind::Fixed32),
        Kind::Fixed64 => FieldKind::Scalar(ScalarKind::Fixed64),
        Kind::Sfixed32 => FieldKind::Scalar(ScalarKind::Sfixed32),
        Kind::Sfixed64 => FieldKind::Scalar(ScalarKind::Sfixed64),
        Kind::Bool => FieldKind::Scalar(ScalarKind::Bool),
        Kind::String => FieldKind::Scalar(ScalarKind::String),
        Kind::Bytes => FieldKind::Scalar(ScalarKind::Bytes),
        Kind::Message(message) => FieldKind::Message(message.full_name().to_string()),
        Kind::Enum(enum_desc) => FieldKind::Enum(enum_desc.full_name().to_string()),
    }
}

/// Decode the `google.api.http` option from encoded `MethodOptions`
pub(crate) fn http_binding(method: &str, encoded_options: &[u8]) -> Result<Option<HttpBinding>> {
    let options = RawMethodOptions::decode(encoded_options)?;
    match options.http {
        Some(rule) => {
            debug!("{} has http option (tag {})", method, HTTP_OPTION_TAG);
            Ok(Some(convert_rule(method, &rule, true)?))
        }
        None => Ok(None),
    }
}

fn convert_rule(method: &str, rule: &HttpRule, top_level: bool) -> Result<HttpBinding> {
    let (http_method, path) = match &rule.pattern {
        Some(HttpPattern::Get(path)) => (HttpMethod::Get, path.clone()),
        Some(HttpPattern::Put(path)) => (HttpMethod::Put, path.clone()),
        Some(HttpPattern::Post(path)) => (HttpMethod::Post, path.clone()),
        Some(HttpPattern::Delete(path)) => (HttpMethod::Delete, path.clone()),
        Some(HttpPattern::Patch(path)) => (HttpMethod::Patch, path.clone()),
        Some(HttpPattern::Custom(custom)) => {
            let http_method = HttpMethod::from_custom(&custom.kind).ok_or_else(|| {
                Error::mapping(
                    method,
                    format!("unsupported custom HTTP verb {:?}", custom.kind),
                )
            })?;
            (http_method, custom.path.clone())
        }
        None => {
            return Err(Error::mapping(
                method,
                "google.api.http option has no HTTP pattern",
            ))
        }
    };

    let body = match rule.body.as_str() {
        "" => BodySelector::None,
        "*" => BodySelector::Whole,
        field => BodySelector::Field(field.to_string()),
    };

    let mut binding = HttpBinding::new(http_method, path).with_body(body);
    if !rule.response_body.is_empty() {
        binding = binding.with_response_body(rule.response_body.clone());
    }

    if top_level {
        for additional in &rule.additional_bindings {
            binding = binding.with_additional_binding(convert_rule(method, additional, false)?);
        }
    } else if !rule.additional_bindings.is_empty() {
        warn!("{}: nested additional_bindings are ignored", method);
    }

    Ok(binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost_types::{
        field_descriptor_proto::{Label, Type},
        source_code_info::Location,
        DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
        MessageOptions, MethodDescriptorProto, OneofDescriptorProto, ServiceDescriptorProto,
        SourceCodeInfo,
    };

    fn field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            r#type: Some(ty as i32),
            label: Some(label as i32),
            ..Default::default()
        }
    }

    fn message_field(name: &str, number: i32, type_name: &str, label: Label) -> FieldDescriptorProto {
        FieldDescriptorProto {
            type_name: Some(type_name.to_string()),
            ..field(name, number, Type::Message, label)
        }
    }

    fn geo_file() -> FileDescriptorProto {
        let counts_entry = DescriptorProto {
            name: Some("CountsEntry".to_string()),
            field: vec![
                field("key", 1, Type::String, Label::Optional),
                field("value", 2, Type::Int32, Label::Optional),
            ],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let point = DescriptorProto {
            name: Some("Point".to_string()),
            field: vec![
                field("x", 1, Type::Int32, Label::Optional),
                field("y", 2, Type::Int32, Label::Optional),
                message_field("counts", 3, ".geo.Point.CountsEntry", Label::Repeated),
                FieldDescriptorProto {
                    oneof_index: Some(0),
                    ..field("label", 4, Type::String, Label::Optional)
                },
                FieldDescriptorProto {
                    oneof_index: Some(0),
                    ..field("code", 5, Type::Int64, Label::Optional)
                },
            ],
            nested_type: vec![counts_entry],
            oneof_decl: vec![OneofDescriptorProto {
                name: Some("tag".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let service = ServiceDescriptorProto {
            name: Some("Geo".to_string()),
            method: vec![MethodDescriptorProto {
                name: Some("Echo".to_string()),
                input_type: Some(".geo.Point".to_string()),
                output_type: Some(".geo.Point".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        FileDescriptorProto {
            name: Some("geo.proto".to_string()),
            package: Some("geo".to_string()),
            message_type: vec![point],
            service: vec![service],
            syntax: Some("proto3".to_string()),
            source_code_info: Some(SourceCodeInfo {
                location: vec![
                    Location {
                        path: vec![4, 0],
                        leading_comments: Some(" A point on the plane.\n".to_string()),
                        ..Default::default()
                    },
                    Location {
                        path: vec![4, 0, 2, 0],
                        trailing_comments: Some(" Horizontal offset.\n".to_string()),
                        ..Default::default()
                    },
                    Location {
                        path: vec![6, 0, 2, 0],
                        leading_comments: Some(" Returns its input.\n".to_string()),
                        ..Default::default()
                    },
                ],
            }),
            ..Default::default()
        }
    }

    fn pool() -> DescriptorPool {
        DescriptorPool::from_file_descriptor_set(FileDescriptorSet {
            file: vec![geo_file()],
        })
        .unwrap()
    }

    #[test]
    fn test_load_messages_and_services() {
        let protos = ProtoSet::from_pool(&pool(), &[]).unwrap();

        let point = protos.message("geo.Point").unwrap();
        let names: Vec<&str> = point.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y", "counts", "label", "code"]);
        assert_eq!(point.fields[0].kind, FieldKind::Scalar(ScalarKind::Int32));
        assert_eq!(
            point.fields[2].kind,
            FieldKind::Message("geo.Point.CountsEntry".to_string())
        );
        assert!(point.fields[2].is_repeated());

        let entry = protos.message("geo.Point.CountsEntry").unwrap();
        assert!(entry.map_entry);

        assert_eq!(protos.services().len(), 1);
        let service = &protos.services()[0];
        assert_eq!(service.full_name, "geo.Geo");
        assert_eq!(service.methods[0].input_type, "geo.Point");
        assert!(service.methods[0].http.is_none());
    }

    #[test]
    fn test_load_oneofs() {
        let protos = ProtoSet::from_pool(&pool(), &[]).unwrap();
        let point = protos.message("geo.Point").unwrap();

        assert_eq!(point.oneofs.len(), 1);
        assert_eq!(point.oneofs[0].name, "tag");
        assert_eq!(point.oneofs[0].fields, vec!["label", "code"]);
        assert_eq!(point.fields[3].oneof.as_deref(), Some("tag"));
    }

    #[test]
    fn test_load_comments() {
        let protos = ProtoSet::from_pool(&pool(), &[]).unwrap();
        let point = protos.message("geo.Point").unwrap();

        assert_eq!(point.description.as_deref(), Some("A point on the plane."));
        assert_eq!(point.fields[0].description.as_deref(), Some("Horizontal offset."));
        assert_eq!(
            protos.services()[0].methods[0].description.as_deref(),
            Some("Returns its input.")
        );
    }

    #[test]
    fn test_files_to_generate_filter() {
        let protos = ProtoSet::from_pool(&pool(), &["other.proto".to_string()]).unwrap();
        assert!(protos.services().is_empty());
        // Types stay resolvable regardless of the filter
        assert!(protos.message("geo.Point").is_some());
    }

    fn encode_options(rule: HttpRule) -> Vec<u8> {
        RawMethodOptions { http: Some(rule) }.encode_to_vec()
    }

    #[test]
    fn test_decode_http_rule() {
        let bytes = encode_options(HttpRule {
            pattern: Some(HttpPattern::Post("/v1/books".to_string())),
            body: "*".to_string(),
            additional_bindings: vec![HttpRule {
                pattern: Some(HttpPattern::Put("/v1/books/{id}".to_string())),
                body: "book".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });

        let binding = http_binding("lib.Library.CreateBook", &bytes)
            .unwrap()
            .unwrap();
        assert_eq!(binding.method, HttpMethod::Post);
        assert_eq!(binding.path, "/v1/books");
        assert_eq!(binding.body, BodySelector::Whole);
        assert_eq!(binding.additional_bindings.len(), 1);
        assert_eq!(
            binding.additional_bindings[0].body,
            BodySelector::Field("book".to_string())
        );
    }

    #[test]
    fn test_decode_custom_verb() {
        let bytes = encode_options(HttpRule {
            pattern: Some(HttpPattern::Custom(CustomHttpPattern {
                kind: "HEAD".to_string(),
                path: "/v1/ping".to_string(),
            })),
            ..Default::default()
        });
        let binding = http_binding("svc.Ping", &bytes).unwrap().unwrap();
        assert_eq!(binding.method, HttpMethod::Head);

        let bytes = encode_options(HttpRule {
            pattern: Some(HttpPattern::Custom(CustomHttpPattern {
                kind: "PURGE".to_string(),
                path: "/v1/cache".to_string(),
            })),
            ..Default::default()
        });
        assert!(matches!(
            http_binding("svc.Purge", &bytes),
            Err(Error::Mapping { .. })
        ));
    }

    #[test]
    fn test_rule_without_pattern_fails() {
        let bytes = encode_options(HttpRule::default());
        assert!(matches!(
            http_binding("svc.Nothing", &bytes),
            Err(Error::Mapping { .. })
        ));
    }

    #[test]
    fn test_options_without_http_rule() {
        assert!(http_binding("svc.Plain", &[]).unwrap().is_none());
    }

    #[test]
    fn test_clean_comment() {
        assert_eq!(clean_comment(" First line.\n Second line.\n"), "First line.\nSecond line.");
    }
}
