//! Text decoders: raw source text -> flat key/value mapping
//!
//! Decoders are pure. `KeyValueDecoder` never fails and degrades to a partial
//! mapping; `JsonDecoder` rejects text that is not a JSON object so the cycle
//! is aborted instead of acting on a half-written file.

use crate::error::DecodeError;
use crate::state::StateMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Text format of the upstream source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// JSON object, nested objects flattened with `.`
    #[default]
    Json,
    /// `key=value` / `key: value` lines
    Kv,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFormat::Json => write!(f, "json"),
            SourceFormat::Kv => write!(f, "kv"),
        }
    }
}

/// Pure mapping from raw text to flat key/value pairs
pub trait Decoder: Send + Sync {
    fn decode(&self, raw: &str) -> Result<StateMap, DecodeError>;
}

/// JSON object decoder
///
/// Strings are kept verbatim, numbers and booleans are stringified, `null`
/// becomes `""`, nested objects and arrays are flattened (`a.b`, `list.0`).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn decode(&self, raw: &str) -> Result<StateMap, DecodeError> {
        let root: Value = serde_json::from_str(raw)?;
        let Value::Object(fields) = root else {
            return Err(DecodeError::NotAnObject(json_kind(&root)));
        };

        let mut out = StateMap::new();
        for (key, value) in fields {
            flatten_into(&mut out, key, value);
        }
        Ok(out)
    }
}

fn flatten_into(out: &mut StateMap, prefix: String, value: Value) {
    match value {
        Value::Object(fields) => {
            for (key, nested) in fields {
                flatten_into(out, format!("{prefix}.{key}"), nested);
            }
        }
        Value::Array(items) => {
            for (idx, nested) in items.into_iter().enumerate() {
                flatten_into(out, format!("{prefix}.{idx}"), nested);
            }
        }
        Value::String(s) => {
            out.insert(prefix, s);
        }
        Value::Null => {
            out.insert(prefix, String::new());
        }
        other => {
            out.insert(prefix, other.to_string());
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Line-oriented `key=value` decoder
///
/// Blank lines and `#`/`;` comments are skipped, as are lines without a
/// separator or with an empty key. The first `=` or `:` splits the line;
/// later duplicates win.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyValueDecoder;

impl Decoder for KeyValueDecoder {
    fn decode(&self, raw: &str) -> Result<StateMap, DecodeError> {
        let mut out = StateMap::new();
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let Some(idx) = line.find(['=', ':']) else {
                continue;
            };
            let key = line[..idx].trim();
            if key.is_empty() {
                continue;
            }
            out.insert(key.to_string(), line[idx + 1..].trim().to_string());
        }
        Ok(out)
    }
}
