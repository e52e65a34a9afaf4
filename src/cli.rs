use crate::config::{GeneratorConfig, OutputFormat, DEFAULT_OPENAPI_VERSION};
use crate::descriptor::ProtoSet;
use crate::plugin::{self, PluginRequest};
use crate::serializer::write_to_file;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{debug, info, warn};
use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::compiler::CodeGeneratorResponse;
use std::fs;
use std::io::{Read, Write};
use std::path::PathBuf;

/// protoc-gen-oas - Generate an OpenAPI 3.x document from protobuf services
///
/// Run without arguments as a protoc plugin (`protoc --oas_out=. --oas_opt=title=Foo`),
/// or standalone on a descriptor set produced by
/// `protoc --descriptor_set_out=FILE --include_imports --include_source_info`.
#[derive(Parser, Debug)]
#[command(name = "protoc-gen-oas")]
#[command(author, about, long_about = None)]
pub struct CliArgs {
    /// OpenAPI version of the document (3.0.x or 3.1.x)
    #[arg(long = "openapi", default_value = DEFAULT_OPENAPI_VERSION)]
    pub openapi: String,

    /// Title of the API
    #[arg(long, default_value = "")]
    pub title: String,

    /// Description of the API
    #[arg(long, default_value = "")]
    pub description: String,

    /// Version of the API
    #[arg(long, default_value = "")]
    pub version: String,

    /// Indentation width of the generated document
    #[arg(long, default_value_t = 2)]
    pub indent: usize,

    /// Output file name without extension
    #[arg(long, default_value = "openapi")]
    pub filename: String,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub format: OutputFormat,

    /// Encode 64-bit integers as strings, as the proto3 JSON mapping does
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub int64_as_string: bool,

    /// Use lowerCamelCase JSON names for properties instead of proto field names
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub json_names: bool,

    /// Serialized FileDescriptorSet to read (standalone mode)
    #[arg(long = "descriptor-set", value_name = "FILE")]
    pub descriptor_set: Option<PathBuf>,

    /// Generate services from this proto file only; may be repeated (default: all files)
    #[arg(long = "file", value_name = "PROTO")]
    pub files: Vec<String>,

    /// Directory to write the document to (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl CliArgs {
    /// Parse plugin parameters (`title=Foo,indent=4`) with the same definition as the
    /// command line
    pub fn from_plugin_parameter(parameter: Option<&str>) -> Result<Self> {
        let args = plugin::parameter_args(parameter.unwrap_or_default());
        debug!("Plugin arguments: {:?}", args);
        let args = std::iter::once("protoc-gen-oas".to_string()).chain(args);
        CliArgs::try_parse_from(args).context("Invalid plugin parameter")
    }

    /// The generator configuration selected by these arguments
    pub fn to_config(&self) -> GeneratorConfig {
        GeneratorConfig::default()
            .with_openapi_version(self.openapi.clone())
            .with_title(self.title.clone())
            .with_description(self.description.clone())
            .with_version(self.version.clone())
            .with_indent(self.indent)
            .with_filename(self.filename.clone())
            .with_format(self.format)
            .with_int64_as_string(self.int64_as_string)
            .with_json_names(self.json_names)
    }
}

/// Run one protoc plugin invocation.
///
/// Generation errors are reported to protoc through the response; only a request that
/// cannot be read or decoded, or a failed write, is returned as an error.
pub fn run_plugin<R: Read, W: Write>(mut input: R, mut output: W) -> Result<()> {
    let mut bytes = Vec::new();
    input
        .read_to_end(&mut bytes)
        .context("Failed to read CodeGeneratorRequest")?;

    let request = PluginRequest::decode(&bytes).context("Failed to decode CodeGeneratorRequest")?;

    let response = match plugin_file(&request) {
        Ok((name, content)) => {
            debug!("Emitting {} ({} bytes)", name, content.len());
            plugin::file_response(name, content)
        }
        Err(e) => {
            warn!("Generation failed: {:#}", e);
            plugin::error_response(format!("{:#}", e))
        }
    };

    write_response(&response, &mut output)
}

fn plugin_file(request: &PluginRequest) -> Result<(String, String)> {
    let args = CliArgs::from_plugin_parameter(request.parameter.as_deref())?;
    let config = args.to_config();
    let protos = ProtoSet::from_pool(&request.pool, &request.files_to_generate)?;
    let content = crate::generate(&protos, &config)?;
    Ok((config.output_file_name(), content))
}

fn write_response<W: Write>(response: &CodeGeneratorResponse, output: &mut W) -> Result<()> {
    output
        .write_all(&response.encode_to_vec())
        .context("Failed to write CodeGeneratorResponse")?;
    output.flush().context("Failed to flush CodeGeneratorResponse")?;
    Ok(())
}

/// Run the standalone workflow on a descriptor set file
pub fn run_standalone(args: CliArgs) -> Result<()> {
    debug!("Parsed arguments: {:?}", args);

    let Some(descriptor_set) = &args.descriptor_set else {
        anyhow::bail!("--descriptor-set is required when running outside protoc");
    };

    info!("Reading descriptor set: {}", descriptor_set.display());
    let bytes = fs::read(descriptor_set)
        .with_context(|| format!("Failed to read descriptor set: {}", descriptor_set.display()))?;
    let pool = DescriptorPool::decode(bytes.as_slice())
        .with_context(|| format!("Invalid descriptor set: {}", descriptor_set.display()))?;
    info!("Loaded {} proto files", pool.files().len());

    let protos = ProtoSet::from_pool(&pool, &args.files)?;
    if protos.services().is_empty() {
        warn!("No services found; the document will have no paths");
    }

    let config = args.to_config();
    info!("Generating {:?} document...", config.format);
    let content = crate::generate(&protos, &config)?;

    match &args.output_dir {
        Some(dir) => {
            let path = dir.join(config.output_file_name());
            info!("Writing output to: {}", path.display());
            write_to_file(&content, &path)?;
            info!("Successfully wrote OpenAPI document to {}", path.display());
        }
        None => print!("{}", content),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_config_defaults() {
        let args = CliArgs::try_parse_from(["protoc-gen-oas"]).unwrap();
        assert_eq!(args.to_config(), GeneratorConfig::default());
    }

    #[test]
    fn test_standalone_flags() {
        let args = CliArgs::try_parse_from([
            "protoc-gen-oas",
            "--descriptor-set",
            "api.pb",
            "--openapi",
            "3.0.3",
            "--title",
            "Library",
            "--version",
            "2.0",
            "--indent",
            "4",
            "-f",
            "json",
            "--int64-as-string",
            "false",
            "-o",
            "out",
        ])
        .unwrap();

        assert_eq!(args.descriptor_set, Some(PathBuf::from("api.pb")));
        assert_eq!(args.output_dir, Some(PathBuf::from("out")));

        let config = args.to_config();
        assert_eq!(config.openapi_version, "3.0.3");
        assert_eq!(config.title, "Library");
        assert_eq!(config.version, "2.0");
        assert_eq!(config.indent, 4);
        assert_eq!(config.format, OutputFormat::Json);
        assert!(!config.int64_as_string);
        assert!(config.json_names);
        assert_eq!(config.output_file_name(), "openapi.json");
    }

    #[test]
    fn test_plugin_parameter() {
        let args = CliArgs::from_plugin_parameter(Some(
            "title=Pet Store,indent=4,filename=pets,json_names=false",
        ))
        .unwrap();
        let config = args.to_config();

        assert_eq!(config.title, "Pet Store");
        assert_eq!(config.indent, 4);
        assert_eq!(config.output_file_name(), "pets.yaml");
        assert!(!config.json_names);
    }

    #[test]
    fn test_plugin_parameter_absent() {
        let args = CliArgs::from_plugin_parameter(None).unwrap();
        assert_eq!(args.to_config(), GeneratorConfig::default());
    }

    #[test]
    fn test_plugin_parameter_unknown_key() {
        assert!(CliArgs::from_plugin_parameter(Some("colour=blue")).is_err());
        assert!(CliArgs::from_plugin_parameter(Some("indent=wide")).is_err());
    }

    #[test]
    fn test_standalone_requires_descriptor_set() {
        let args = CliArgs::try_parse_from(["protoc-gen-oas", "--title", "x"]).unwrap();
        assert!(run_standalone(args).is_err());
    }
}
