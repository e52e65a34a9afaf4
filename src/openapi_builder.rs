use crate::config::GeneratorConfig;
use crate::descriptor::{
    BodySelector, Cardinality, Field, FieldKind, HttpBinding, HttpMethod, MessageType, Method,
    ServiceType,
};
use crate::error::{Error, Result};
use crate::path_template::PathTemplate;
use crate::schema_generator::{Schema, SchemaGenerator};
use crate::type_mapper;
use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const JSON_MEDIA_TYPE: &str = "application/json";

/// OpenAPI document builder
pub struct OpenApiBuilder {
    /// Value of the `openapi` field
    openapi: String,
    /// OpenAPI info section
    info: Info,
    /// One tag per service that contributed operations
    tags: IndexMap<String, Tag>,
    /// Paths collection (URL path -> PathItem)
    paths: IndexMap<String, PathItem>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// API version
    pub version: String,
}

/// OpenAPI Tag object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Operation>,
}

impl PathItem {
    /// Slot holding the operation for an HTTP method
    pub fn operation_mut(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Trace => &mut self.trace,
        }
    }

    pub fn operation(&self, method: HttpMethod) -> Option<&Operation> {
        match method {
            HttpMethod::Get => self.get.as_ref(),
            HttpMethod::Put => self.put.as_ref(),
            HttpMethod::Post => self.post.as_ref(),
            HttpMethod::Delete => self.delete.as_ref(),
            HttpMethod::Options => self.options.as_ref(),
            HttpMethod::Head => self.head.as_ref(),
            HttpMethod::Patch => self.patch.as_ref(),
            HttpMethod::Trace => self.trace.as_ref(),
        }
    }
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "operationId")]
    pub operation_id: String,
    /// Parameters (path, query)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code
    pub responses: IndexMap<String, Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<bool>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query)
    #[serde(rename = "in")]
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    pub schema: Schema,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub content: IndexMap<String, MediaType>,
    pub required: bool,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<IndexMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub schemas: IndexMap<String, Schema>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<Tag>,
    pub paths: IndexMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

/// Everything needed to build one operation
struct BindingContext<'m> {
    service: &'m ServiceType,
    method: &'m Method,
    binding: &'m HttpBinding,
    /// Position among the method's bindings; 0 is the primary binding
    index: usize,
}

impl OpenApiBuilder {
    /// Create a builder taking `openapi` and `info` verbatim from the configuration
    pub fn new(config: &GeneratorConfig) -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            openapi: config.openapi_version.clone(),
            info: Info {
                title: config.title.clone(),
                description: config.description.clone(),
                version: config.version.clone(),
            },
            tags: IndexMap::new(),
            paths: IndexMap::new(),
        }
    }

    /// Add every HTTP binding of a method to the document
    pub fn add_method(
        &mut self,
        service: &ServiceType,
        method: &Method,
        schema_gen: &mut SchemaGenerator<'_>,
    ) -> Result<()> {
        let full_name = service.method_full_name(method);
        debug!("Adding method: {}", full_name);

        let bindings = match &method.http {
            Some(binding) => {
                let mut bindings = vec![binding];
                bindings.extend(binding.additional_bindings.iter());
                bindings.into_iter().cloned().collect()
            }
            None => vec![fallback_binding(service, method)],
        };

        // Routes bound by this method so far
        let mut bound: HashSet<(String, HttpMethod)> = HashSet::new();

        for (index, binding) in bindings.iter().enumerate() {
            let ctx = BindingContext {
                service,
                method,
                binding,
                index,
            };
            let (path, operation) = self.build_operation(&ctx, schema_gen)?;

            debug!("  {} {}", binding.method.as_str(), path);
            let slot = self
                .paths
                .entry(path.clone())
                .or_default()
                .operation_mut(binding.method);
            if slot.is_some() {
                if bound.contains(&(path.clone(), binding.method)) {
                    // Bindings differing only in variable patterns share one OpenAPI path
                    warn!(
                        "{}: {} {} repeats an earlier binding, keeping the first",
                        full_name,
                        binding.method.as_str(),
                        binding.path
                    );
                    continue;
                }
                return Err(Error::mapping(
                    &full_name,
                    format!("{} {} is already bound", binding.method.as_str(), path),
                ));
            }
            *slot = Some(operation);
            bound.insert((path, binding.method));
        }

        self.tags.entry(service.name.clone()).or_insert_with(|| Tag {
            name: service.name.clone(),
            description: service.description.clone(),
        });

        Ok(())
    }

    fn build_operation(
        &self,
        ctx: &BindingContext<'_>,
        schema_gen: &mut SchemaGenerator<'_>,
    ) -> Result<(String, Operation)> {
        let full_name = ctx.service.method_full_name(ctx.method);
        let fail = |message: String| Error::mapping(&full_name, message);

        let protos = schema_gen.protos();
        let input = protos.message(&ctx.method.input_type).ok_or_else(|| {
            Error::Invariant(format!(
                "input type {} of {} not found",
                ctx.method.input_type, full_name
            ))
        })?;

        let template = PathTemplate::parse(&ctx.binding.path).map_err(&fail)?;

        let mut parameters = Vec::new();
        // Top-level input fields already carried by the path or the body
        let mut consumed: HashSet<&str> = HashSet::new();

        for variable in &template.variables {
            let field = resolve_field_path(schema_gen, input, variable).map_err(&fail)?;
            let mapping = schema_gen.field_mapping(field)?;
            if field.is_repeated() || !mapping.is_parameter_compatible() {
                return Err(fail(format!(
                    "path variable {{{}}} must reference a singular scalar or enum field",
                    variable
                )));
            }
            parameters.push(Parameter {
                name: variable.clone(),
                location: "path".to_string(),
                description: field.description.clone(),
                required: true,
                schema: schema_gen.realize(mapping)?,
            });
            if let Some(head) = variable.split('.').next() {
                consumed.insert(head);
            }
        }

        // The input graph is registered even when it is split into parameters
        let input_schema = schema_gen.message_schema(&input.full_name)?;

        let request_body = match &ctx.binding.body {
            BodySelector::None => None,
            BodySelector::Whole => Some(json_body(input_schema)),
            BodySelector::Field(name) => {
                let field = input.field(name).ok_or_else(|| {
                    fail(format!(
                        "body field {:?} not found in {}",
                        name, input.full_name
                    ))
                })?;
                let is_message = matches!(field.kind, FieldKind::Message(_));
                if !is_message || field.is_repeated() {
                    return Err(fail(format!(
                        "body field {:?} must be a singular message field",
                        name
                    )));
                }
                consumed.insert(field.name.as_str());
                Some(json_body(schema_gen.field_schema(field)?))
            }
        };

        if ctx.binding.body != BodySelector::Whole {
            for field in &input.fields {
                if consumed.contains(field.name.as_str()) {
                    continue;
                }
                let mapping = schema_gen.field_mapping(field)?;
                if !mapping.is_parameter_compatible() {
                    debug!(
                        "Skipping query parameter {}.{}: not a scalar",
                        input.full_name, field.name
                    );
                    continue;
                }
                parameters.push(Parameter {
                    name: schema_gen.property_name(field),
                    location: "query".to_string(),
                    description: field.description.clone(),
                    required: field.cardinality == Cardinality::Required,
                    schema: schema_gen.realize(mapping)?,
                });
            }
        }

        let response_schema = match &ctx.binding.response_body {
            Some(name) => {
                schema_gen.message_schema(&ctx.method.output_type)?;
                let output = protos.message(&ctx.method.output_type).ok_or_else(|| {
                    Error::Invariant(format!(
                        "output type {} of {} not found",
                        ctx.method.output_type, full_name
                    ))
                })?;
                let field = output.field(name).ok_or_else(|| {
                    fail(format!(
                        "response body field {:?} not found in {}",
                        name, output.full_name
                    ))
                })?;
                schema_gen.field_schema(field)?
            }
            None => schema_gen.message_schema(&ctx.method.output_type)?,
        };

        let mut responses = IndexMap::new();
        responses.insert(
            "200".to_string(),
            Response {
                description: "Successful response".to_string(),
                content: Some(json_content(response_schema)),
            },
        );

        let operation_id = if ctx.index == 0 {
            format!("{}_{}", ctx.service.full_name, ctx.method.name)
        } else {
            format!("{}_{}_{}", ctx.service.full_name, ctx.method.name, ctx.index)
        };

        let operation = Operation {
            tags: vec![ctx.service.name.clone()],
            description: ctx.method.description.clone(),
            operation_id,
            parameters,
            request_body,
            responses,
            deprecated: ctx.method.deprecated.then_some(true),
        };

        Ok((template.path, operation))
    }

    /// Build the final OpenAPI document with deterministic ordering
    pub fn build(self, schema_gen: SchemaGenerator<'_>) -> OpenApiDocument {
        debug!("Building final OpenAPI document");

        let mut paths = self.paths;
        paths.sort_keys();

        let mut schemas = schema_gen.into_schemas();
        schemas.sort_keys();
        let components = if schemas.is_empty() {
            None
        } else {
            Some(Components { schemas })
        };

        let mut tags: Vec<Tag> = self.tags.into_values().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        OpenApiDocument {
            openapi: self.openapi,
            info: self.info,
            tags,
            paths,
            components,
        }
    }
}

/// Binding used for methods without a `google.api.http` option
fn fallback_binding(service: &ServiceType, method: &Method) -> HttpBinding {
    HttpBinding::new(
        HttpMethod::Post,
        format!("/{}/{}", service.full_name, method.name),
    )
    .with_body(BodySelector::Whole)
}

/// Walk a dotted field path (`book.author.id`) through nested messages
fn resolve_field_path<'p>(
    schema_gen: &SchemaGenerator<'p>,
    message: &'p MessageType,
    path: &str,
) -> std::result::Result<&'p Field, String> {
    let protos = schema_gen.protos();
    let mut current = message;
    let mut segments = path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let field = current.field(segment).ok_or_else(|| {
            format!(
                "path variable {{{}}} references unknown field {:?} of {}",
                path, segment, current.full_name
            )
        })?;

        if segments.peek().is_none() {
            return Ok(field);
        }

        current = match &field.kind {
            FieldKind::Message(type_name)
                if !field.is_repeated()
                    && type_mapper::well_known_schema(type_name, &Default::default()).is_none() =>
            {
                protos.message(type_name).ok_or_else(|| {
                    format!("path variable {{{}}} crosses unknown type {}", path, type_name)
                })?
            }
            _ => {
                return Err(format!(
                    "path variable {{{}}}: field {:?} is not a singular message",
                    path, segment
                ))
            }
        };
    }

    Err(format!("empty path variable in {}", message.full_name))
}

fn json_content(schema: Schema) -> IndexMap<String, MediaType> {
    let mut content = IndexMap::new();
    content.insert(JSON_MEDIA_TYPE.to_string(), MediaType { schema });
    content
}

fn json_body(schema: Schema) -> RequestBody {
    RequestBody {
        content: json_content(schema),
        required: true,
    }
}
