//! Firestore typed-value codec.
//!
//! Firestore's REST API wraps every value in a single-key object naming its
//! type (`{"stringValue": "x"}`, `{"mapValue": {"fields": {...}}}`). These
//! helpers convert between that encoding and plain JSON.
//!
//! Plain JSON has no timestamp, reference, geopoint or bytes type, so those
//! decode to strings and maps. Writing a document back goes through
//! [`encode_fields_preserving`], which reuses the stored typed value for
//! every field whose plain value did not change.

use serde_json::{Map, Number, Value, json};

use contentsync_shared::{ContentSyncError, Result};

/// Decode a Firestore `fields` map into a plain JSON object.
pub fn decode_fields(fields: &Map<String, Value>) -> Result<Map<String, Value>> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|decoded| (k.clone(), decoded)))
        .collect()
}

/// Decode one Firestore typed value.
pub fn decode_value(value: &Value) -> Result<Value> {
    let obj = value
        .as_object()
        .ok_or_else(|| ContentSyncError::parse(format!("expected typed value, got {value}")))?;

    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| ContentSyncError::parse("empty typed value"))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => Ok(Value::Bool(inner.as_bool().unwrap_or(false))),
        "integerValue" => decode_integer(inner),
        "doubleValue" => decode_double(inner),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => {
            Ok(Value::String(inner.as_str().unwrap_or_default().to_string()))
        }
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            values
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array)
        }
        "mapValue" => {
            let empty = Map::new();
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .unwrap_or(&empty);
            decode_fields(fields).map(Value::Object)
        }
        other => Err(ContentSyncError::parse(format!(
            "unsupported Firestore value type '{other}'"
        ))),
    }
}

/// Integers travel as decimal strings.
fn decode_integer(inner: &Value) -> Result<Value> {
    match inner {
        Value::String(s) => s
            .parse::<i64>()
            .map(|n| Value::Number(n.into()))
            .map_err(|e| ContentSyncError::parse(format!("bad integerValue '{s}': {e}"))),
        Value::Number(n) => Ok(Value::Number(n.clone())),
        other => Err(ContentSyncError::parse(format!("bad integerValue {other}"))),
    }
}

/// Doubles are JSON numbers, except the non-finite ones which come as strings.
fn decode_double(inner: &Value) -> Result<Value> {
    match inner {
        Value::Number(n) => Ok(Value::Number(n.clone())),
        Value::String(s) => Ok(s
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)),
        other => Err(ContentSyncError::parse(format!("bad doubleValue {other}"))),
    }
}

/// Encode a plain JSON object as a Firestore `fields` map.
pub fn encode_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

/// Encode one plain JSON value as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            json!({ "integerValue": n.to_string() })
        }
        Value::Number(n) => json!({ "doubleValue": n }),
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode `map` against the document's current typed `fields`.
///
/// A field whose decoded original equals its new plain value is written with
/// the original typed value. Changed maps and arrays are walked so that
/// untouched nested values keep their wire type too.
pub fn encode_fields_preserving(
    map: &Map<String, Value>,
    original: &Map<String, Value>,
) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| {
            let encoded = match original.get(k) {
                Some(typed) => encode_value_preserving(v, typed),
                None => encode_value(v),
            };
            (k.clone(), encoded)
        })
        .collect()
}

/// Encode one plain value against its current typed value.
pub fn encode_value_preserving(value: &Value, original: &Value) -> Value {
    if decode_value(original).is_ok_and(|decoded| decoded == *value) {
        return original.clone();
    }

    match (value, typed_kind(original)) {
        (Value::Object(map), Some(("mapValue", inner))) => {
            let empty = Map::new();
            let fields = inner
                .get("fields")
                .and_then(Value::as_object)
                .unwrap_or(&empty);
            json!({ "mapValue": { "fields": encode_fields_preserving(map, fields) } })
        }
        (Value::Array(items), Some(("arrayValue", inner))) => {
            let originals = inner
                .get("values")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let values: Vec<Value> = items
                .iter()
                .enumerate()
                .map(|(i, item)| match originals.get(i) {
                    Some(typed) => encode_value_preserving(item, typed),
                    None => encode_value(item),
                })
                .collect();
            json!({ "arrayValue": { "values": values } })
        }
        _ => encode_value(value),
    }
}

fn typed_kind(value: &Value) -> Option<(&str, &Value)> {
    let (kind, inner) = value.as_object()?.iter().next()?;
    Some((kind.as_str(), inner))
}
