use serde_json::Value;

use crate::error::BackendError;

/// Convert a `(result, error?)` completion payload into a call result.
///
/// An error always wins over a result. A completion carrying neither is
/// treated as a successful call returning `null` when `allow_empty` is set,
/// otherwise as an `empty_completion` error.
pub fn normalize_call_completion(
    result: Option<Value>,
    error: Option<BackendError>,
    allow_empty: bool,
) -> Result<Value, BackendError> {
    match (result, error) {
        (_, Some(error)) => Err(error),
        (Some(value), None) => Ok(value),
        (None, None) if allow_empty => Ok(Value::Null),
        (None, None) => Err(BackendError::empty_completion()),
    }
}
