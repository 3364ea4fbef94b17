use ciborium::value::{Integer, Value};

use crate::error::{CustodyError, DecodingError};

pub(crate) fn encode(value: &Value) -> Result<Vec<u8>, CustodyError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out)
        .map_err(|e| CustodyError::Encoding(format!("cbor: {e}")))?;
    Ok(out)
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Value, DecodingError> {
    ciborium::de::from_reader(bytes).map_err(|e| DecodingError::MalformedReturn(format!("cbor: {e}")))
}

pub(crate) fn uint(value: u64) -> Value {
    Value::Integer(Integer::from(value))
}

pub(crate) fn int(value: i64) -> Value {
    Value::Integer(Integer::from(value))
}

pub(crate) fn bytes(value: impl Into<Vec<u8>>) -> Value {
    Value::Bytes(value.into())
}

/// Decodes a fixed-arity CBOR tuple.
pub(crate) fn tuple(bytes: &[u8], arity: usize) -> Result<Vec<Value>, DecodingError> {
    match decode(bytes)? {
        Value::Array(items) if items.len() == arity => Ok(items),
        other => Err(DecodingError::MalformedReturn(format!(
            "expected a {arity}-element array, got {other:?}"
        ))),
    }
}

pub(crate) fn as_i64(value: &Value) -> Result<i64, DecodingError> {
    value
        .as_integer()
        .and_then(|int| i64::try_from(int).ok())
        .ok_or_else(|| DecodingError::MalformedReturn(format!("expected an integer, got {value:?}")))
}

pub(crate) fn as_u64(value: &Value) -> Result<u64, DecodingError> {
    value
        .as_integer()
        .and_then(|int| u64::try_from(int).ok())
        .ok_or_else(|| {
            DecodingError::MalformedReturn(format!("expected an unsigned integer, got {value:?}"))
        })
}

pub(crate) fn as_bool(value: &Value) -> Result<bool, DecodingError> {
    value
        .as_bool()
        .ok_or_else(|| DecodingError::MalformedReturn(format!("expected a bool, got {value:?}")))
}

pub(crate) fn as_bytes(value: &Value) -> Result<Vec<u8>, DecodingError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes.clone()),
        // Lotus encodes empty return values as null in some actor versions.
        Value::Null => Ok(Vec::new()),
        other => Err(DecodingError::MalformedReturn(format!(
            "expected a byte string, got {other:?}"
        ))),
    }
}
