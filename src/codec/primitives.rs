//! [`Codable`] for scalars, containers and dates.
use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use indexmap::IndexMap;

use super::{Codable, PolymorphicCodec};
use crate::dates;
use crate::error::CodecError;
use crate::value::{JsonObject, JsonValue};

impl Codable for JsonValue {
    fn decode(value: &JsonValue, _codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        Ok(value.clone())
    }

    fn encode(&self, _codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        Ok(self.clone())
    }
}

impl Codable for String {
    fn decode(value: &JsonValue, _codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        value.as_str().map(str::to_string).ok_or_else(|| CodecError::mismatch("string", value))
    }

    fn encode(&self, _codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        Ok(JsonValue::String(self.clone()))
    }
}

impl Codable for bool {
    fn decode(value: &JsonValue, _codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        value.as_bool().ok_or_else(|| CodecError::mismatch("boolean", value))
    }

    fn encode(&self, _codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        Ok(JsonValue::Boolean(*self))
    }
}

impl Codable for i64 {
    fn decode(value: &JsonValue, _codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        value.as_i64().ok_or_else(|| CodecError::mismatch("integer", value))
    }

    fn encode(&self, _codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        Ok(JsonValue::Integer(*self))
    }
}

// narrower integers go through i64 and a range check
macro_rules! narrow_integer {
    ($($ty:ty),+) => {
        $(
            impl Codable for $ty {
                fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
                    let wide = i64::decode(value, codec)?;
                    <$ty>::try_from(wide).map_err(|_| {
                        CodecError::data(format!("{wide} is out of range for {}", stringify!($ty)))
                    })
                }

                fn encode(&self, _codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
                    i64::try_from(*self)
                        .map(JsonValue::Integer)
                        .map_err(|_| CodecError::data(format!("{self} does not fit in a JSON integer")))
                }
            }
        )+
    };
}

narrow_integer!(i32, u32, u64);

/// Non-finite values use the codec's [`NonConformingFloats`](super::NonConformingFloats) tokens.
impl Codable for f64 {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        if let Some(n) = value.as_f64() {
            return Ok(n);
        }
        let token = value.as_str();
        codec
            .options()
            .non_conforming_floats
            .as_ref()
            .zip(token)
            .and_then(|(floats, token)| floats.parse(token))
            .ok_or_else(|| CodecError::mismatch("number", value))
    }

    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        if self.is_finite() {
            return Ok(JsonValue::from(*self));
        }
        match codec.options().non_conforming_floats.as_ref().and_then(|f| f.token(*self)) {
            Some(token) => Ok(JsonValue::from(token)),
            None => Err(CodecError::NonConformingFloat(*self)),
        }
    }
}

impl<T: Codable> Codable for Option<T> {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        match value {
            JsonValue::Null => Ok(None),
            other => T::decode(other, codec).map(Some),
        }
    }

    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        match self {
            Some(v) => v.encode(codec),
            None => Ok(JsonValue::Null),
        }
    }
}

impl<T: Codable> Codable for Vec<T> {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        let items = value.as_array().ok_or_else(|| CodecError::mismatch("array", value))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| T::decode(item, codec).map_err(|e| e.at_index(i)))
            .collect()
    }

    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        self.iter()
            .enumerate()
            .map(|(i, item)| item.encode(codec).map_err(|e| e.at_index(i)))
            .collect::<Result<Vec<_>, _>>()
            .map(JsonValue::Array)
    }
}

fn decode_entries<T: Codable>(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Vec<(String, T)>, CodecError> {
    let map = value.as_object().ok_or_else(|| CodecError::mismatch("object", value))?;
    map.iter()
        .map(|(k, v)| T::decode(v, codec).map(|v| (k.clone(), v)).map_err(|e| e.at_key(k)))
        .collect()
}

fn encode_entries<'a, T: Codable + 'a>(
    entries: impl Iterator<Item = (&'a String, &'a T)>,
    codec: &PolymorphicCodec<'_>,
) -> Result<JsonValue, CodecError> {
    let mut out = JsonObject::new();
    for (k, v) in entries {
        out.insert(k.clone(), v.encode(codec).map_err(|e| e.at_key(k))?);
    }
    Ok(JsonValue::Object(out))
}

impl<T: Codable> Codable for IndexMap<String, T> {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        decode_entries(value, codec).map(|entries| entries.into_iter().collect())
    }

    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        encode_entries(self.iter(), codec)
    }
}

impl<T: Codable> Codable for BTreeMap<String, T> {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        decode_entries(value, codec).map(|entries| entries.into_iter().collect())
    }

    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        encode_entries(self.iter(), codec)
    }
}

fn decode_date_string<T, E: std::fmt::Display>(
    value: &JsonValue,
    what: &str,
    parse: impl FnOnce(&str) -> Result<T, E>,
) -> Result<T, CodecError> {
    let src = value.as_str().ok_or_else(|| CodecError::mismatch("string", value))?;
    parse(src).map_err(|e| CodecError::data(format!("`{src}` is not a valid {what}: {e}")))
}

impl Codable for DateTime<FixedOffset> {
    fn decode(value: &JsonValue, _codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        decode_date_string(value, "timestamp", dates::parse_timestamp)
    }

    fn encode(&self, _codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        Ok(JsonValue::String(dates::format_timestamp(self)))
    }
}

impl Codable for NaiveDate {
    fn decode(value: &JsonValue, _codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        decode_date_string(value, "date", dates::parse_date)
    }

    fn encode(&self, _codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        Ok(JsonValue::String(dates::format_date(self)))
    }
}

impl Codable for NaiveTime {
    fn decode(value: &JsonValue, _codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        decode_date_string(value, "time", dates::parse_time)
    }

    fn encode(&self, _codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        Ok(JsonValue::String(dates::format_time(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecOptions, NonConformingFloats};
    use crate::registry::TypeRegistry;
    use serde_json::json;

    fn value(v: serde_json::Value) -> JsonValue { JsonValue::from(v) }

    #[test]
    fn integers_and_floats_cross_decode() {
        let registry = TypeRegistry::new();
        let codec = PolymorphicCodec::new(&registry);
        assert_eq!(i64::decode(&value(json!(4.0)), &codec), Ok(4));
        assert_eq!(f64::decode(&value(json!(4)), &codec), Ok(4.0));
        assert!(i64::decode(&value(json!(4.5)), &codec).is_err());
        assert!(u32::decode(&value(json!(-1)), &codec).is_err());
        // 2^63 is one past i64::MAX
        assert!(i64::decode(&JsonValue::from(9_223_372_036_854_775_808.0), &codec).is_err());
        assert!(u64::decode(&JsonValue::from(1.8e19), &codec).is_err());
    }

    #[test]
    fn non_conforming_floats_use_tokens() {
        let registry = TypeRegistry::new();
        let codec = PolymorphicCodec::new(&registry);
        assert_eq!(f64::INFINITY.encode(&codec), Ok(JsonValue::from("Infinity")));
        assert_eq!(f64::NEG_INFINITY.encode(&codec), Ok(JsonValue::from("-Infinity")));
        assert!(f64::decode(&JsonValue::from("NaN"), &codec).unwrap().is_nan());

        let custom = PolymorphicCodec::new(&registry).with_options(CodecOptions {
            non_conforming_floats: Some(NonConformingFloats {
                positive_infinity: "+inf".into(),
                ..NonConformingFloats::default()
            }),
            ..CodecOptions::default()
        });
        assert_eq!(f64::INFINITY.encode(&custom), Ok(JsonValue::from("+inf")));
        assert!(f64::decode(&JsonValue::from("Infinity"), &custom).is_err());

        let strict = PolymorphicCodec::new(&registry).with_options(CodecOptions {
            non_conforming_floats: None,
            ..CodecOptions::default()
        });
        assert!(matches!(f64::NAN.encode(&strict), Err(CodecError::NonConformingFloat(_))));
    }

    #[test]
    fn containers_prefix_error_paths() {
        let registry = TypeRegistry::new();
        let codec = PolymorphicCodec::new(&registry);
        let err = IndexMap::<String, Vec<i64>>::decode(&value(json!({"a": [1, "x"]})), &codec).unwrap_err();
        assert_eq!(err.to_string(), "at $.a[1]: expected integer, found string");
    }

    #[test]
    fn dates_use_the_shared_formats() {
        let registry = TypeRegistry::new();
        let codec = PolymorphicCodec::new(&registry);
        let ts = DateTime::<FixedOffset>::decode(&value(json!("2024-01-02T03:04:05.006+01:00")), &codec).unwrap();
        assert_eq!(ts.encode(&codec), Ok(JsonValue::from("2024-01-02T03:04:05.006+01:00")));
        assert!(NaiveDate::decode(&value(json!("02/01/2024")), &codec).is_err());
    }

    #[test]
    fn option_maps_null() {
        let registry = TypeRegistry::new();
        let codec = PolymorphicCodec::new(&registry);
        assert_eq!(Option::<String>::decode(&JsonValue::Null, &codec), Ok(None));
        assert_eq!(None::<String>.encode(&codec), Ok(JsonValue::Null));
    }
}
