//! Generator configuration.
//!
//! A [`GeneratorConfig`] is an immutable value threaded explicitly through the engine.
//! Nothing is read from the environment, so independent runs in one process never
//! interfere with each other.

use crate::error::{Error, Result};
use clap::ValueEnum;
use std::fmt;
use std::str::FromStr;

/// OpenAPI version emitted when none is configured
pub const DEFAULT_OPENAPI_VERSION: &str = "3.1.0";

/// Output format of the rendered document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    #[default]
    Yaml,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// File extension used for this format
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }
}

/// A validated OpenAPI version (`3.0.x` or `3.1.x`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenApiVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FromStr for OpenApiVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Config(format!("invalid OpenAPI version {:?}", s));

        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        let version = OpenApiVersion {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
        };

        if version.major != 3 || version.minor > 1 {
            return Err(Error::Config(format!(
                "unsupported OpenAPI version {}, expected 3.0.x or 3.1.x",
                version
            )));
        }

        Ok(version)
    }
}

impl fmt::Display for OpenApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// How 64-bit integer fields are represented in JSON schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Int64Encoding {
    /// `type: string` with an `int64`/`uint64` format, matching the proto3 JSON mapping
    String,
    /// `type: integer` with an `int64`/`uint64` format
    Integer,
}

/// Options consumed by the type mapper and schema generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingOptions {
    pub int64_encoding: Int64Encoding,
    /// Use the JSON name (`lowerCamelCase`) of fields instead of the proto name
    pub json_names: bool,
}

impl Default for MappingOptions {
    fn default() -> Self {
        Self {
            int64_encoding: Int64Encoding::String,
            json_names: true,
        }
    }
}

/// Complete configuration of one generator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Value of the top-level `openapi` field
    pub openapi_version: String,
    pub title: String,
    pub description: String,
    pub version: String,
    /// Indentation width of the rendered document
    pub indent: usize,
    /// Output file name without extension
    pub filename: String,
    pub format: OutputFormat,
    pub int64_as_string: bool,
    pub json_names: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            openapi_version: DEFAULT_OPENAPI_VERSION.to_string(),
            title: String::new(),
            description: String::new(),
            version: String::new(),
            indent: 2,
            filename: "openapi".to_string(),
            format: OutputFormat::Yaml,
            int64_as_string: true,
            json_names: true,
        }
    }
}

impl GeneratorConfig {
    pub fn with_openapi_version(mut self, version: impl Into<String>) -> Self {
        self.openapi_version = version.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_int64_as_string(mut self, enabled: bool) -> Self {
        self.int64_as_string = enabled;
        self
    }

    pub fn with_json_names(mut self, enabled: bool) -> Self {
        self.json_names = enabled;
        self
    }

    /// Validate the configuration and return the parsed OpenAPI version
    pub fn validate(&self) -> Result<OpenApiVersion> {
        if self.indent == 0 {
            return Err(Error::Config("indent must be at least 1".to_string()));
        }
        if self.filename.trim().is_empty() {
            return Err(Error::Config("filename must not be empty".to_string()));
        }
        self.openapi_version.parse()
    }

    /// Name of the generated file, e.g. `openapi.yaml`
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.filename, self.format.extension())
    }

    /// Options for the type mapper and schema generator
    pub fn mapping_options(&self) -> MappingOptions {
        MappingOptions {
            int64_encoding: if self.int64_as_string {
                Int64Encoding::String
            } else {
                Int64Encoding::Integer
            },
            json_names: self.json_names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GeneratorConfig::default();
        let version = config.validate().unwrap();

        assert_eq!(version.to_string(), "3.1.0");
        assert_eq!(config.indent, 2);
        assert_eq!(config.output_file_name(), "openapi.yaml");
    }

    #[test]
    fn test_accepts_3_0_and_3_1() {
        assert!("3.0.3".parse::<OpenApiVersion>().is_ok());
        assert!("3.1.0".parse::<OpenApiVersion>().is_ok());
        assert!("3.1.12".parse::<OpenApiVersion>().is_ok());
    }

    #[test]
    fn test_rejects_unparseable_version() {
        for bad in ["", "3", "3.1", "3.1.x", "v3.1.0", "3.1.0.1", "3..0"] {
            let result = bad.parse::<OpenApiVersion>();
            assert!(matches!(result, Err(Error::Config(_))), "{:?} should fail", bad);
        }
    }

    #[test]
    fn test_rejects_unsupported_version() {
        assert!(matches!("2.0.0".parse::<OpenApiVersion>(), Err(Error::Config(_))));
        assert!(matches!("3.2.0".parse::<OpenApiVersion>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_rejects_zero_indent() {
        let config = GeneratorConfig::default().with_indent(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_json_file_name() {
        let config = GeneratorConfig::default()
            .with_filename("api")
            .with_format(OutputFormat::Json);
        assert_eq!(config.output_file_name(), "api.json");
    }

    #[test]
    fn test_mapping_options() {
        let config = GeneratorConfig::default()
            .with_int64_as_string(false)
            .with_json_names(false);
        let options = config.mapping_options();

        assert_eq!(options.int64_encoding, Int64Encoding::Integer);
        assert!(!options.json_names);
    }
}
