//! Leaf value codec.
//!
//! Strings are stored as-is so that keys and values stay readable; every
//! other value is stored as JSON. Map keys use the same rule when they
//! become key components.
//!
//! Optional strings are JSON: `null` and `"null"` must stay distinct.

use serde_json::Value;

use crate::descriptor::{json_integer, Descriptor, ScalarKind};
use crate::error::{EncodingError, EncodingResult};
use crate::selector::Scalar;

/// Serializes a value of type `descriptor` to its stored form.
pub fn serialize(value: &Value, descriptor: &Descriptor) -> EncodingResult<String> {
    match (descriptor, value) {
        (Descriptor::Scalar(ScalarKind::String), Value::String(s)) => Ok(s.clone()),
        _ => serde_json::to_string(value).map_err(|e| EncodingError::Codec(e.to_string())),
    }
}

/// Parses a stored value as type `descriptor`.
///
/// The result is normalized: struct fields missing from the stored JSON
/// get their zero value.
pub fn deserialize(text: &str, descriptor: &Descriptor) -> EncodingResult<Value> {
    match descriptor {
        Descriptor::Scalar(ScalarKind::String) => Ok(Value::String(text.to_string())),
        _ => {
            let parsed: Value =
                serde_json::from_str(text).map_err(|e| EncodingError::Codec(e.to_string()))?;
            descriptor.normalize(parsed).map_err(|_| {
                EncodingError::Codec(format!("{text:?} is not a valid value for this type"))
            })
        }
    }
}

/// Key component for a map key.
pub fn serialize_key(key: &Scalar) -> String {
    match key {
        Scalar::String(s) => s.clone(),
        other => other.to_json().to_string(),
    }
}

/// Parses a key component as a map key of kind `kind`.
pub fn deserialize_key(segment: &str, kind: ScalarKind) -> EncodingResult<Scalar> {
    let invalid = |reason: String| EncodingError::InvalidMapKey {
        segment: segment.to_string(),
        reason,
    };
    match kind {
        ScalarKind::String => Ok(Scalar::String(segment.to_string())),
        ScalarKind::Int(bits) | ScalarKind::Uint(bits) => {
            let n = segment
                .parse::<i128>()
                .map_err(|e| invalid(e.to_string()))?;
            kind.integer(n)
                .ok_or_else(|| invalid(format!("out of range for a {bits}-bit key")))
        }
        ScalarKind::Float => segment
            .parse::<f64>()
            .map(Scalar::Float)
            .map_err(|e| invalid(e.to_string())),
        ScalarKind::Bool => segment
            .parse::<bool>()
            .map(Scalar::Bool)
            .map_err(|e| invalid(e.to_string())),
    }
}

/// Reads a scalar out of a JSON value of kind `kind`.
pub fn scalar_from_json(value: &Value, kind: ScalarKind) -> Option<Scalar> {
    match kind {
        ScalarKind::String => value.as_str().map(|s| Scalar::String(s.to_string())),
        ScalarKind::Int(_) | ScalarKind::Uint(_) => {
            json_integer(value).and_then(|n| kind.integer(n))
        }
        ScalarKind::Float => value.as_f64().map(Scalar::Float),
        ScalarKind::Bool => value.as_bool().map(Scalar::Bool),
    }
}
