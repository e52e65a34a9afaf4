use thiserror::Error;

/// Result type alias for the generator
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the generator
///
/// Every variant aborts generation: no partial document is ever produced.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid generator configuration (OpenAPI version, indentation, ...)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A method cannot be mapped onto HTTP with its binding and input/output types
    #[error("cannot map method {method}: {message}")]
    Mapping { method: String, message: String },

    /// The descriptor set violates a guarantee of the proto compiler
    #[error("descriptor invariant violated: {0}")]
    Invariant(String),

    /// Descriptors could not be decoded or linked
    #[error("descriptor error: {0}")]
    Descriptor(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a mapping error attributed to a fully-qualified method name
    pub fn mapping(method: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Mapping {
            method: method.into(),
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(format!("YAML: {}", err))
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::Descriptor(err.to_string())
    }
}

impl From<prost_reflect::DescriptorError> for Error {
    fn from(err: prost_reflect::DescriptorError) -> Self {
        Error::Descriptor(err.to_string())
    }
}
