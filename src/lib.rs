//! protoc-gen-oas - OpenAPI 3.x documents from protobuf service descriptors.
//!
//! The generator walks the services of a set of protobuf descriptors and produces one
//! OpenAPI document: every RPC becomes an operation, routed by its `google.api.http`
//! annotation or by a `POST /<package.Service>/<Method>` fallback, and every reachable
//! message and enum becomes a named component schema.
//!
//! # Architecture
//!
//! 1. [`loader`] - Builds a [`descriptor::ProtoSet`] from a `prost_reflect::DescriptorPool`
//! 2. [`type_mapper`] - Maps protobuf field kinds to schema mappings
//! 3. [`schema_generator`] - Builds component schemas, cycle-safe
//! 4. [`openapi_builder`] - Builds operations and assembles the document
//! 5. [`serializer`] - Renders YAML or JSON with the configured indentation
//! 6. [`plugin`] and [`cli`] - The protoc plugin protocol and the command line
//!
//! # Example Usage
//!
//! ```
//! use protoc_gen_oas::config::GeneratorConfig;
//! use protoc_gen_oas::descriptor::{Field, MessageType, Method, ProtoSet, ScalarKind, ServiceType};
//!
//! let protos = ProtoSet::new()
//!     .with_message(
//!         MessageType::new("geo.Point")
//!             .with_field(Field::scalar("x", 1, ScalarKind::Int32))
//!             .with_field(Field::scalar("y", 2, ScalarKind::Int32)),
//!     )
//!     .with_service(
//!         ServiceType::new("geo.Geo").with_method(Method::new("Echo", "geo.Point", "geo.Point")),
//!     );
//!
//! let config = GeneratorConfig::default().with_title("Geo").with_version("1.0");
//! let yaml = protoc_gen_oas::generate(&protos, &config).unwrap();
//! assert!(yaml.contains("/geo.Geo/Echo:"));
//! ```

pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod openapi_builder;
pub mod path_template;
pub mod plugin;
pub mod schema_generator;
pub mod serializer;
pub mod type_mapper;

use config::GeneratorConfig;
use descriptor::ProtoSet;
use error::Result;
use log::{debug, info};
use openapi_builder::{OpenApiBuilder, OpenApiDocument};
use schema_generator::SchemaGenerator;

/// Build the OpenAPI document for every service in `protos`.
///
/// Each call starts from an empty schema registry, so repeated calls with the same
/// input produce identical documents.
pub fn build_document(protos: &ProtoSet, config: &GeneratorConfig) -> Result<OpenApiDocument> {
    let version = config.validate()?;
    debug!("Generating OpenAPI {} document", version);

    let mut schema_gen = SchemaGenerator::new(protos, config.mapping_options());
    let mut builder = OpenApiBuilder::new(config);

    for service in protos.services() {
        debug!("Adding service {} ({} methods)", service.full_name, service.methods.len());
        for method in &service.methods {
            builder.add_method(service, method, &mut schema_gen)?;
        }
    }

    let document = builder.build(schema_gen);
    info!(
        "Built document with {} paths and {} schemas",
        document.paths.len(),
        document
            .components
            .as_ref()
            .map_or(0, |components| components.schemas.len())
    );
    Ok(document)
}

/// Generate the rendered document (YAML or JSON per `config.format`).
pub fn generate(protos: &ProtoSet, config: &GeneratorConfig) -> Result<String> {
    let document = build_document(protos, config)?;
    serializer::render(&document, config)
}
