//! protoc plugin protocol.
//!
//! The request is decoded with the descriptor files kept as raw bytes so that
//! `prost_reflect` sees every option and extension, including `google.api.http`.

use crate::error::Result;
use log::debug;
use prost::Message;
use prost_reflect::DescriptorPool;
use prost_types::compiler::{code_generator_response, CodeGeneratorResponse};

/// `CodeGeneratorResponse.Feature.FEATURE_PROTO3_OPTIONAL`
pub const FEATURE_PROTO3_OPTIONAL: u64 = 1;

/// `google.protobuf.compiler.CodeGeneratorRequest` with undecoded `proto_file` entries
#[derive(Clone, PartialEq, Message)]
struct RawCodeGeneratorRequest {
    #[prost(string, repeated, tag = "1")]
    pub file_to_generate: Vec<String>,
    #[prost(string, optional, tag = "2")]
    pub parameter: Option<String>,
    #[prost(bytes = "vec", repeated, tag = "15")]
    pub proto_file: Vec<Vec<u8>>,
}

/// `google.protobuf.FileDescriptorSet` with undecoded files
#[derive(Clone, PartialEq, Message)]
struct RawFileDescriptorSet {
    #[prost(bytes = "vec", repeated, tag = "1")]
    pub file: Vec<Vec<u8>>,
}

/// A decoded plugin request
#[derive(Debug)]
pub struct PluginRequest {
    /// Files named on the protoc command line
    pub files_to_generate: Vec<String>,
    /// The raw `--oas_opt` string, if any
    pub parameter: Option<String>,
    /// Every file of the request, dependencies included
    pub pool: DescriptorPool,
}

impl PluginRequest {
    /// Decode an encoded `CodeGeneratorRequest`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let request = RawCodeGeneratorRequest::decode(bytes)?;
        debug!(
            "Plugin request: {} files to generate, {} proto files, parameter {:?}",
            request.file_to_generate.len(),
            request.proto_file.len(),
            request.parameter
        );

        let set = RawFileDescriptorSet {
            file: request.proto_file,
        };
        let pool = DescriptorPool::decode(set.encode_to_vec().as_slice())?;

        Ok(Self {
            files_to_generate: request.file_to_generate,
            parameter: request.parameter,
            pool,
        })
    }
}

/// Turn a plugin parameter string into command-line arguments.
///
/// `title=Foo,indent=4` becomes `["--title=Foo", "--indent=4"]`. Keys may use
/// underscores in place of hyphens; a key without a value becomes a bare flag.
pub fn parameter_args(parameter: &str) -> Vec<String> {
    parameter
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((key, value)) => format!("--{}={}", key.trim().replace('_', "-"), value),
            None => format!("--{}", item.replace('_', "-")),
        })
        .collect()
}

/// A response carrying one generated file
pub fn file_response(name: String, content: String) -> CodeGeneratorResponse {
    CodeGeneratorResponse {
        supported_features: Some(FEATURE_PROTO3_OPTIONAL),
        file: vec![code_generator_response::File {
            name: Some(name),
            content: Some(content),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// A response reporting a generation error to protoc
pub fn error_response(message: String) -> CodeGeneratorResponse {
    CodeGeneratorResponse {
        error: Some(message),
        supported_features: Some(FEATURE_PROTO3_OPTIONAL),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use prost_types::compiler::CodeGeneratorRequest;
    use prost_types::{DescriptorProto, FileDescriptorProto};

    #[test]
    fn test_parameter_args() {
        assert_eq!(
            parameter_args("title=My API,indent=4,int64_as_string=false"),
            vec!["--title=My API", "--indent=4", "--int64-as-string=false"]
        );
        assert_eq!(parameter_args(""), Vec::<String>::new());
        assert_eq!(parameter_args("json_names , "), vec!["--json-names"]);
        assert_eq!(
            parameter_args("description=a=b"),
            vec!["--description=a=b"]
        );
    }

    #[test]
    fn test_decode_request() {
        let file = FileDescriptorProto {
            name: Some("thing.proto".to_string()),
            package: Some("demo".to_string()),
            syntax: Some("proto3".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Thing".to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let request = CodeGeneratorRequest {
            file_to_generate: vec!["thing.proto".to_string()],
            parameter: Some("title=Demo".to_string()),
            proto_file: vec![file],
            ..Default::default()
        };

        let decoded = PluginRequest::decode(&request.encode_to_vec()).unwrap();

        assert_eq!(decoded.files_to_generate, vec!["thing.proto"]);
        assert_eq!(decoded.parameter.as_deref(), Some("title=Demo"));
        assert!(decoded.pool.get_message_by_name("demo.Thing").is_some());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(PluginRequest::decode(&[0xff, 0xff, 0xff]).is_err());
    }

    #[test]
    fn test_responses() {
        let ok = file_response("openapi.yaml".to_string(), "openapi: 3.1.0\n".to_string());
        assert_eq!(ok.error, None);
        assert_eq!(ok.supported_features, Some(FEATURE_PROTO3_OPTIONAL));
        assert_eq!(ok.file[0].name.as_deref(), Some("openapi.yaml"));

        let failed = error_response("boom".to_string());
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.file.is_empty());
    }
}
