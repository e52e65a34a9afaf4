//! Serialization module for rendering OpenAPI documents as YAML or JSON.
//!
//! YAML block structure is emitted here so the indentation width is configurable;
//! quoting of individual scalars is left to `serde_yaml`.

use crate::config::{GeneratorConfig, OutputFormat};
use crate::error::{Error, Result};
use crate::openapi_builder::OpenApiDocument;
use anyhow::Context;
use log::debug;
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;

/// Banner placed above every generated YAML document
pub const GENERATED_BANNER: &str = "# generated by protoc-gen-oas. DO NOT EDIT\n\n";

/// Render a document in the configured format and indentation.
///
/// YAML output starts with [`GENERATED_BANNER`]; JSON has no comment syntax and is
/// emitted bare.
pub fn render(doc: &OpenApiDocument, config: &GeneratorConfig) -> Result<String> {
    match config.format {
        OutputFormat::Yaml => {
            let mut out = String::from(GENERATED_BANNER);
            out.push_str(&serialize_yaml(doc, config.indent)?);
            Ok(out)
        }
        OutputFormat::Json => serialize_json(doc, config.indent),
    }
}

/// Serializes a document to YAML with the given indentation width.
pub fn serialize_yaml(doc: &OpenApiDocument, indent: usize) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML (indent {})", indent);
    let value = serde_yaml::to_value(doc)?;
    let mut emitter = YamlEmitter {
        out: String::new(),
        indent: indent.max(1),
    };
    emitter.document(&value)?;
    Ok(emitter.out)
}

/// Serializes a document to pretty-printed JSON with the given indentation width.
pub fn serialize_json(doc: &OpenApiDocument, indent: usize) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON (indent {})", indent);
    let indent = " ".repeat(indent.max(1));
    let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    doc.serialize(&mut serializer)?;
    buf.push(b'\n');
    String::from_utf8(buf).map_err(|e| Error::Serialization(e.to_string()))
}

/// Writes string content to a file.
///
/// Parent directories are created when missing; an existing file is overwritten.
pub fn write_to_file(content: &str, path: &Path) -> anyhow::Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Block-style YAML writer over a `serde_yaml::Value` tree
struct YamlEmitter {
    out: String,
    indent: usize,
}

impl YamlEmitter {
    fn document(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Mapping(map) if !map.is_empty() => self.mapping(map, 0, false),
            Value::Sequence(seq) if !seq.is_empty() => self.sequence(seq, 0, false),
            other => {
                let text = self.inline(other)?;
                self.out.push_str(&text);
                self.out.push('\n');
                Ok(())
            }
        }
    }

    /// Write a non-empty mapping at `column`; with `inline_first` the first key continues
    /// the current line (after a sequence dash).
    fn mapping(&mut self, map: &Mapping, column: usize, inline_first: bool) -> Result<()> {
        for (i, (key, value)) in map.iter().enumerate() {
            if i > 0 || !inline_first {
                self.pad(column);
            }
            let key = self.scalar(key)?;
            self.out.push_str(&key);
            self.out.push(':');
            self.nested(value, column)?;
        }
        Ok(())
    }

    fn sequence(&mut self, seq: &[Value], column: usize, inline_first: bool) -> Result<()> {
        for (i, item) in seq.iter().enumerate() {
            if i > 0 || !inline_first {
                self.pad(column);
            }
            self.out.push_str("- ");
            match item {
                // Content after "- " starts two columns further in
                Value::Mapping(map) if !map.is_empty() => self.mapping(map, column + 2, true)?,
                Value::Sequence(inner) if !inner.is_empty() => {
                    self.sequence(inner, column + 2, true)?
                }
                other => {
                    let text = self.inline(other)?;
                    self.out.push_str(&text);
                    self.out.push('\n');
                }
            }
        }
        Ok(())
    }

    /// Write the value of a mapping entry whose key sits at `column`
    fn nested(&mut self, value: &Value, column: usize) -> Result<()> {
        match value {
            Value::Mapping(map) if !map.is_empty() => {
                self.out.push('\n');
                self.mapping(map, column + self.indent, false)
            }
            Value::Sequence(seq) if !seq.is_empty() => {
                self.out.push('\n');
                self.sequence(seq, column + self.indent, false)
            }
            other => {
                let text = self.inline(other)?;
                self.out.push(' ');
                self.out.push_str(&text);
                self.out.push('\n');
                Ok(())
            }
        }
    }

    /// Single-line rendering of a scalar or empty collection
    fn inline(&self, value: &Value) -> Result<String> {
        match value {
            Value::Mapping(map) if map.is_empty() => Ok("{}".to_string()),
            Value::Sequence(seq) if seq.is_empty() => Ok("[]".to_string()),
            other => self.scalar(other),
        }
    }

    fn scalar(&self, value: &Value) -> Result<String> {
        match value {
            Value::String(s) if s.contains('\n') || s.contains('\r') => {
                // JSON strings are valid double-quoted YAML scalars
                Ok(serde_json::to_string(s)?)
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                let text = serde_yaml::to_string(value)?;
                let text = text.trim_end_matches('\n');
                match value {
                    // A folded scalar would break the block layout
                    Value::String(s) if text.contains('\n') => Ok(serde_json::to_string(s)?),
                    _ => Ok(text.to_string()),
                }
            }
            Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => Err(
                Error::Serialization("unexpected non-scalar YAML value".to_string()),
            ),
        }
    }

    fn pad(&mut self, column: usize) {
        for _ in 0..column {
            self.out.push(' ');
        }
    }
}
