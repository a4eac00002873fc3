//! Document text codec and source loading.
//!
//! Decoding accepts multi-document YAML streams (JSON is a YAML subset).
//! Encoding sorts mapping keys so output is deterministic regardless of
//! hash order.

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use serde::Deserialize;

use crate::value::{Value, ValueKind};

/// Encoding/output failures surfaced by the [`Emitter`].
#[derive(Debug)]
pub enum EncodeError {
    Yaml(serde_yaml::Error),
    Json(serde_json::Error),
    Io(io::Error),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodeError::Yaml(e) => write!(f, "yaml encode error: {}", e),
            EncodeError::Json(e) => write!(f, "json encode error: {}", e),
            EncodeError::Io(e) => write!(f, "write error: {}", e),
        }
    }
}

impl std::error::Error for EncodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodeError::Yaml(e) => Some(e),
            EncodeError::Json(e) => Some(e),
            EncodeError::Io(e) => Some(e),
        }
    }
}

/// Read a document source that is either a path to an existing file or
/// inline text. Anything that does not name a file on disk is taken
/// verbatim.
pub fn read_source(source: &str) -> io::Result<String> {
    if Path::new(source).is_file() {
        std::fs::read_to_string(source)
    } else {
        Ok(source.to_string())
    }
}

/// Iterate the documents of a (possibly multi-document) YAML stream.
/// Each document is decoded on demand, so documents before a malformed
/// one can still be processed and emitted.
pub fn documents(input: &str) -> impl Iterator<Item = Result<Value, serde_yaml::Error>> + '_ {
    serde_yaml::Deserializer::from_str(input)
        .map(|doc| serde_yaml::Value::deserialize(doc).map(from_yaml))
}

/// Decode a single YAML document; multi-document input is an error.
pub fn decode_document(input: &str) -> Result<Value, serde_yaml::Error> {
    let raw: serde_yaml::Value = serde_yaml::from_str(input)?;
    Ok(from_yaml(raw))
}

/// Encode one document as YAML (no stream separator).
pub fn encode_yaml(value: &Value) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&to_yaml(value))
}

/// Encode one document as compact JSON.
pub fn encode_json(value: &Value) -> Result<String, serde_json::Error> {
    serde_json::to_string(&to_json(value))
}

fn from_yaml(raw: serde_yaml::Value) -> Value {
    match raw {
        serde_yaml::Value::Null => Value::null(),
        serde_yaml::Value::Bool(b) => Value::boolean(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::integer(i)
            } else {
                Value::float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_yaml::Value::String(s) => Value::string(s),
        serde_yaml::Value::Sequence(items) => {
            Value::sequence(items.into_iter().map(from_yaml).collect())
        }
        serde_yaml::Value::Mapping(map) => {
            let mut out = HashMap::new();
            for (key, value) in map {
                out.insert(key_string(&key), from_yaml(value));
            }
            Value::mapping(out)
        }
        serde_yaml::Value::Tagged(tagged) => from_yaml(tagged.value),
    }
}

/// Mapping keys are scalars, commonly strings; everything is stringified
/// the way it reads in the source text.
fn key_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

fn to_yaml(value: &Value) -> serde_yaml::Value {
    match value.kind() {
        ValueKind::Null => serde_yaml::Value::Null,
        ValueKind::Boolean(b) => serde_yaml::Value::Bool(*b),
        ValueKind::Integer(n) => serde_yaml::Value::Number(serde_yaml::Number::from(*n)),
        ValueKind::Float(n) => serde_yaml::Value::Number(serde_yaml::Number::from(*n)),
        ValueKind::String(s) => serde_yaml::Value::String(s.clone()),
        ValueKind::Sequence(items) => {
            serde_yaml::Value::Sequence(items.iter().map(to_yaml).collect())
        }
        ValueKind::Mapping(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_yaml::Mapping::new();
            for key in keys {
                out.insert(serde_yaml::Value::String(key.clone()), to_yaml(&map[key]));
            }
            serde_yaml::Value::Mapping(out)
        }
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value.kind() {
        ValueKind::Null => serde_json::Value::Null,
        ValueKind::Boolean(b) => serde_json::Value::Bool(*b),
        ValueKind::Integer(n) => serde_json::Value::Number(serde_json::Number::from(*n)),
        ValueKind::Float(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueKind::String(s) => serde_json::Value::String(s.clone()),
        ValueKind::Sequence(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect())
        }
        ValueKind::Mapping(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for key in keys {
                out.insert(key.clone(), to_json(&map[key]));
            }
            serde_json::Value::Object(out)
        }
    }
}

/// Output serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Incremental document writer: one serialized document per surviving
/// input document, flushed as soon as it is produced. YAML documents are
/// separated with `---`; JSON is emitted one document per line.
pub struct Emitter<W: Write> {
    out: W,
    format: OutputFormat,
    emitted: usize,
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Emitter {
            out,
            format,
            emitted: 0,
        }
    }

    pub fn emit(&mut self, doc: &Value) -> Result<(), EncodeError> {
        match self.format {
            OutputFormat::Yaml => {
                if self.emitted > 0 {
                    self.out.write_all(b"---\n").map_err(EncodeError::Io)?;
                }
                let text = encode_yaml(doc).map_err(EncodeError::Yaml)?;
                self.out.write_all(text.as_bytes()).map_err(EncodeError::Io)?;
            }
            OutputFormat::Json => {
                let text = encode_json(doc).map_err(EncodeError::Json)?;
                self.out.write_all(text.as_bytes()).map_err(EncodeError::Io)?;
                self.out.write_all(b"\n").map_err(EncodeError::Io)?;
            }
        }
        self.out.flush().map_err(EncodeError::Io)?;
        self.emitted += 1;
        Ok(())
    }
}
