//! Conversion between JSON and node streams.
//!
//! ```
//! use stream_index::stream::{from_json, to_json};
//!
//! let stream = from_json(r#"{"name": "alice", "age": 30}"#).unwrap();
//! let json = to_json(&stream).unwrap();
//! assert_eq!(json, r#"{"age":30,"name":"alice"}"#);
//! ```
//!
//! # Mapping
//!
//! | stream | JSON                                     |
//! |--------|------------------------------------------|
//! | `nil`  | null                                     |
//! | `bool` | true/false                               |
//! | `int`  | integer (fits i64)                       |
//! | `float`| other number                             |
//! | `bin`  | string with `b64:` prefix (valid base64) |
//! | `str`  | other string                             |
//! | `arr`  | array                                    |
//! | `map`  | object                                   |
//!
//! Object members are written in the order `serde_json` iterates them, which
//! is sorted by key.

use base64::Engine;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::stream::document::Stream;
use crate::stream::encode::StreamWriter;
use crate::stream::value::{TypedValue, Value};

/// Parse a JSON string into a stream.
///
/// # Errors
///
/// Returns `Error::JsonParse` if the JSON is invalid.
pub fn from_json(json: &str) -> Result<Stream<'static>> {
    let json_value: JsonValue =
        serde_json::from_str(json).map_err(|e| Error::JsonParse(e.to_string()))?;

    let mut writer = StreamWriter::new();
    write_value(&mut writer, &json_value)?;
    writer.finish()
}

fn write_value(w: &mut StreamWriter, value: &JsonValue) -> Result<()> {
    match value {
        JsonValue::Null => {
            w.nil();
        }

        JsonValue::Bool(b) => {
            w.bool(*b);
        }

        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                w.int(i);
            } else {
                w.float(n.as_f64().unwrap_or(0.0));
            }
        }

        JsonValue::String(s) => {
            if let Some(b64_payload) = s.strip_prefix("b64:")
                && let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(b64_payload)
            {
                w.bin(&bytes);
            } else {
                w.str(s);
            }
        }

        JsonValue::Array(items) => {
            w.begin_array(items.len() as u32);
            for item in items {
                write_value(w, item)?;
            }
            w.end()?;
        }

        JsonValue::Object(obj) => {
            w.begin_map(obj.len() as u32);
            for (key, item) in obj {
                w.str(key);
                write_value(w, item)?;
            }
            w.end()?;
        }
    }
    Ok(())
}

/// Convert a whole stream to a JSON string.
///
/// # Errors
///
/// Returns `Error::NonFiniteFloat` if a float is NaN or infinite, and other
/// errors if the stream is malformed.
pub fn to_json(stream: &Stream) -> Result<String> {
    value_to_json(stream, stream.root_addr())
}

/// Convert the subtree rooted at `addr` to a JSON string.
///
/// Used to re-read parts of a stream the index only refers to by offset.
///
/// # Errors
///
/// As for [`to_json`], plus `Error::AddressOutOfBounds` for a bad `addr`.
pub fn value_to_json(stream: &Stream, addr: u32) -> Result<String> {
    let json_value = node_to_json(stream.value(addr)?, stream.as_bytes())?;
    serde_json::to_string(&json_value).map_err(|e| Error::JsonSerialize(e.to_string()))
}

fn node_to_json(value: Value, data: &[u8]) -> Result<JsonValue> {
    match value.typed()? {
        TypedValue::Nil => Ok(JsonValue::Null),

        TypedValue::Bool(b) => Ok(JsonValue::Bool(b)),

        TypedValue::Int(n) => Ok(JsonValue::Number(n.into())),

        TypedValue::Float(f) => {
            let num = serde_json::Number::from_f64(f).ok_or(Error::NonFiniteFloat(f))?;
            Ok(JsonValue::Number(num))
        }

        TypedValue::Str(s) => Ok(JsonValue::String(s.to_string())),

        TypedValue::Bytes(bytes) => {
            let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
            Ok(JsonValue::String(format!("b64:{encoded}")))
        }

        TypedValue::Arr { count } => {
            let children = children(value, data, count as usize)?;
            let items = children
                .into_iter()
                .map(|child| node_to_json(child, data))
                .collect::<Result<Vec<_>>>()?;
            Ok(JsonValue::Array(items))
        }

        TypedValue::Map { count } => {
            let children = children(value, data, count as usize * 2)?;
            let mut obj = serde_json::Map::new();
            for pair in children.chunks_exact(2) {
                let key = match pair[0].typed()? {
                    TypedValue::Str(s) => s.to_string(),
                    _ => {
                        return Err(Error::UnexpectedKind {
                            expected: "str",
                            found: pair[0].node_type().name(),
                        });
                    }
                };
                obj.insert(key, node_to_json(pair[1], data)?);
            }
            Ok(JsonValue::Object(obj))
        }
    }
}

/// The `n` direct children of a container node.
///
/// Every child must lie inside the container body, so `n` can never exceed
/// the body length.
fn children<'a>(container: Value<'a>, data: &'a [u8], n: usize) -> Result<Vec<Value<'a>>> {
    let start = container.body_start() as usize;
    let end = (container.addr() as usize)
        .checked_add(container.node_size()?)
        .filter(|&end| end <= data.len())
        .ok_or(Error::TruncatedValue)?;
    if n > end.saturating_sub(start) {
        return Err(Error::TruncatedValue);
    }

    let mut out = Vec::with_capacity(n);
    let mut pos = start;
    for _ in 0..n {
        if pos >= end {
            return Err(Error::TruncatedValue);
        }
        let child = Value::new(data, pos as u32)?;
        pos = pos
            .checked_add(child.node_size()?)
            .filter(|&next| next <= end)
            .ok_or(Error::TruncatedValue)?;
        out.push(child);
    }
    Ok(out)
}
