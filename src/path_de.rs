//! serde bridge with JSON-path context in error messages.
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::NonConformingFloats;
use crate::codec::serde_bridge::{ValueDeserializer, ValueSerializer};
use crate::error::CodecError;
use crate::value::JsonValue;

/// Parse JSON text, reporting the path of the first syntax/shape error.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, CodecError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(syntax_error)
}

pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(syntax_error)
}

/// Deserialize a serde type out of an already parsed value. Float fields accept
/// the `floats` tokens.
pub fn from_json_value<T: DeserializeOwned>(
    value: &JsonValue,
    floats: Option<&NonConformingFloats>,
) -> Result<T, CodecError> {
    let de = ValueDeserializer { value, floats };
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = serde_path(err.path());
        match err.into_inner() {
            CodecError::Data { message, .. } => CodecError::Data { path, message },
            CodecError::TypeMismatch { expected, found, .. } => CodecError::TypeMismatch { path, expected, found },
            other => other,
        }
    })
}

/// Serialize a serde type into a value. Non-finite floats become the `floats`
/// tokens, or fail with `NonConformingFloat` without them.
pub fn to_json_value<T: Serialize + ?Sized>(
    value: &T,
    floats: Option<&NonConformingFloats>,
) -> Result<JsonValue, CodecError> {
    value.serialize(ValueSerializer { floats })
}

fn syntax_error(err: serde_path_to_error::Error<serde_json::Error>) -> CodecError {
    let path = serde_path(err.path());
    CodecError::Syntax { path, message: err.into_inner().to_string() }
}

// serde_path_to_error renders the root as "." and keys as "a.b[0]"
fn serde_path(path: &serde_path_to_error::Path) -> String {
    let rendered = path.to_string();
    match rendered.as_str() {
        "." => String::new(),
        p if p.starts_with('[') => p.to_string(),
        p => format!(".{p}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Deserialize)]
    #[allow(dead_code)]
    struct Point { x: f64, y: f64 }

    #[test]
    fn data_errors_name_the_field() {
        let value = JsonValue::from(serde_json::json!({"x": 1.0, "y": "up"}));
        let err = from_json_value::<Point>(&value, None).unwrap_err();
        match err {
            CodecError::Data { path, .. } => assert_eq!(path, ".y"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn syntax_errors_are_reported() {
        let err = from_str_with_path::<JsonValue>("{\"a\": [1, }").unwrap_err();
        assert!(matches!(err, CodecError::Syntax { .. }));
    }
}
