//! Closed JSON value model.
//!
//! Unlike `serde_json::Value`, integers and floating point numbers are distinct
//! arms, so `42` and `42.0` survive a decode/encode cycle unchanged. Equality and
//! hashing are structural; object equality ignores key order (as JSON does) while
//! the map itself keeps insertion order for encoding.
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type JsonObject = IndexMap<String, JsonValue>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum JsonValue {
    #[default]
    Null,
    Boolean(bool),
    String(String),
    Integer(i64),
    Number(OrderedFloat<f64>),
    Array(Vec<JsonValue>),
    Object(JsonObject),
}

impl JsonValue {
    /// Short JSON-ish name of the arm, used in mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Boolean(_) => "boolean",
            JsonValue::String(_) => "string",
            JsonValue::Integer(_) => "integer",
            JsonValue::Number(_) => "number",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, JsonValue::Null) }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsonValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JsonValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral view. Accepts a `Number` only when it has no fractional part
    /// and fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        // i64::MAX rounds up to 2^63 as an f64, so the upper bound is exclusive
        const UPPER: f64 = 9_223_372_036_854_775_808.0;
        match self {
            JsonValue::Integer(i) => Some(*i),
            JsonValue::Number(n) if n.0.is_finite() && n.0.fract() == 0.0
                && n.0 >= i64::MIN as f64 && n.0 < UPPER => Some(n.0 as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JsonValue::Integer(i) => Some(*i as f64),
            JsonValue::Number(n) => Some(n.0),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<JsonValue>> {
        match self {
            JsonValue::Array(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&JsonObject> {
        match self {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut JsonObject> {
        match self {
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Object member lookup; `None` for missing keys and non-objects.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Keys of an object in their current order.
    pub fn keys(&self) -> Vec<&str> {
        self.as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Resolve an RFC 6901 JSON Pointer.
    pub fn pointer(&self, pointer: &str) -> Option<&JsonValue> {
        if pointer.is_empty() {
            return Some(self);
        }
        if !pointer.starts_with('/') {
            return None;
        }
        pointer.split('/').skip(1).try_fold(self, |node, token| {
            let token = token.replace("~1", "/").replace("~0", "~");
            match node {
                JsonValue::Object(map) => map.get(&token),
                JsonValue::Array(xs) => token.parse::<usize>().ok().and_then(|i| xs.get(i)),
                _ => None,
            }
        })
    }
}

// ------------------------------- Hashing ---------------------------------- //

impl Hash for JsonValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            JsonValue::Null => {}
            JsonValue::Boolean(b) => b.hash(state),
            JsonValue::String(s) => s.hash(state),
            JsonValue::Integer(i) => i.hash(state),
            JsonValue::Number(n) => n.hash(state),
            JsonValue::Array(xs) => xs.hash(state),
            JsonValue::Object(map) => {
                // order-independent, to agree with `Eq`
                let mut acc = 0u64;
                for (k, v) in map {
                    let mut h = DefaultHasher::new();
                    k.hash(&mut h);
                    v.hash(&mut h);
                    acc = acc.wrapping_add(h.finish());
                }
                map.len().hash(state);
                acc.hash(state);
            }
        }
    }
}

// ----------------------------- Conversions -------------------------------- //

impl From<bool> for JsonValue {
    fn from(b: bool) -> Self { JsonValue::Boolean(b) }
}

impl From<&str> for JsonValue {
    fn from(s: &str) -> Self { JsonValue::String(s.to_string()) }
}

impl From<String> for JsonValue {
    fn from(s: String) -> Self { JsonValue::String(s) }
}

impl From<i64> for JsonValue {
    fn from(i: i64) -> Self { JsonValue::Integer(i) }
}

impl From<i32> for JsonValue {
    fn from(i: i32) -> Self { JsonValue::Integer(i as i64) }
}

impl From<f64> for JsonValue {
    fn from(n: f64) -> Self { JsonValue::Number(OrderedFloat(n)) }
}

impl From<Vec<JsonValue>> for JsonValue {
    fn from(xs: Vec<JsonValue>) -> Self { JsonValue::Array(xs) }
}

impl From<JsonObject> for JsonValue {
    fn from(map: JsonObject) -> Self { JsonValue::Object(map) }
}

impl From<serde_json::Value> for JsonValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Boolean(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    JsonValue::Integer(i)
                } else {
                    // u64 beyond i64 range, or a float
                    JsonValue::Number(OrderedFloat(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(s) => JsonValue::String(s),
            Value::Array(xs) => JsonValue::Array(xs.into_iter().map(JsonValue::from).collect()),
            Value::Object(map) => JsonValue::Object(
                map.into_iter().map(|(k, v)| (k, JsonValue::from(v))).collect()
            ),
        }
    }
}

/// Non-finite numbers have no JSON spelling and become `null`.
impl From<JsonValue> for serde_json::Value {
    fn from(value: JsonValue) -> Self {
        use serde_json::Value;
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Boolean(b) => Value::Bool(b),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Integer(i) => Value::from(i),
            JsonValue::Number(n) => serde_json::Number::from_f64(n.0)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            JsonValue::Array(xs) => Value::Array(xs.into_iter().map(Value::from).collect()),
            JsonValue::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
            ),
        }
    }
}

impl From<&JsonValue> for serde_json::Value {
    fn from(value: &JsonValue) -> Self { serde_json::Value::from(value.clone()) }
}

// -------------------------------- Serde ----------------------------------- //

impl Serialize for JsonValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            JsonValue::Null => serializer.serialize_unit(),
            JsonValue::Boolean(b) => serializer.serialize_bool(*b),
            JsonValue::String(s) => serializer.serialize_str(s),
            JsonValue::Integer(i) => serializer.serialize_i64(*i),
            JsonValue::Number(n) => serializer.serialize_f64(n.0),
            JsonValue::Array(xs) => {
                let mut seq = serializer.serialize_seq(Some(xs.len()))?;
                for x in xs { seq.serialize_element(x)?; }
                seq.end()
            }
            JsonValue::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries { map.serialize_entry(k, v)?; }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for JsonValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(JsonValueVisitor)
    }
}

struct JsonValueVisitor;

impl<'de> Visitor<'de> for JsonValueVisitor {
    type Value = JsonValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<JsonValue, E> { Ok(JsonValue::Null) }
    fn visit_none<E: de::Error>(self) -> Result<JsonValue, E> { Ok(JsonValue::Null) }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<JsonValue, D::Error> {
        JsonValue::deserialize(d)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<JsonValue, E> { Ok(JsonValue::Boolean(b)) }
    fn visit_i64<E: de::Error>(self, i: i64) -> Result<JsonValue, E> { Ok(JsonValue::Integer(i)) }

    fn visit_u64<E: de::Error>(self, u: u64) -> Result<JsonValue, E> {
        Ok(match i64::try_from(u) {
            Ok(i) => JsonValue::Integer(i),
            Err(_) => JsonValue::Number(OrderedFloat(u as f64)),
        })
    }

    fn visit_f64<E: de::Error>(self, n: f64) -> Result<JsonValue, E> {
        Ok(JsonValue::Number(OrderedFloat(n)))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<JsonValue, E> {
        Ok(JsonValue::String(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<JsonValue, E> {
        Ok(JsonValue::String(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<JsonValue, A::Error> {
        let mut xs = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(x) = seq.next_element()? { xs.push(x); }
        Ok(JsonValue::Array(xs))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<JsonValue, A::Error> {
        let mut map = JsonObject::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, JsonValue>()? {
            map.insert(k, v);
        }
        Ok(JsonValue::Object(map))
    }
}

impl fmt::Display for JsonValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

impl std::str::FromStr for JsonValue {
    type Err = crate::error::CodecError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        crate::path_de::from_str_with_path(src)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn integer_and_number_stay_distinct_through_text() {
        let v: JsonValue = r#"{"a": 42, "b": 42.0, "c": -7, "d": 1.5e3}"#.parse().unwrap();
        assert_eq!(v.get("a"), Some(&JsonValue::Integer(42)));
        assert_eq!(v.get("b"), Some(&JsonValue::from(42.0)));
        assert_eq!(v.get("c"), Some(&JsonValue::Integer(-7)));
        assert_ne!(JsonValue::Integer(42), JsonValue::from(42.0));

        let text = v.to_string();
        assert_eq!(text, r#"{"a":42,"b":42.0,"c":-7,"d":1500.0}"#);
        let back: JsonValue = text.parse().unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn huge_unsigned_falls_back_to_number() {
        let v: JsonValue = "18446744073709551615".parse().unwrap();
        assert!(matches!(v, JsonValue::Number(_)));
    }

    #[test]
    fn integral_view_stops_at_the_i64_range() {
        assert_eq!(JsonValue::from(9_223_372_036_854_774_784.0).as_i64(), Some(9_223_372_036_854_774_784));
        assert_eq!(JsonValue::from(9_223_372_036_854_775_808.0).as_i64(), None);
        assert_eq!(JsonValue::from(i64::MIN as f64).as_i64(), Some(i64::MIN));
        assert_eq!(JsonValue::from(-9_223_372_036_854_777_856.0).as_i64(), None);
        assert_eq!(JsonValue::Integer(i64::MAX).as_i64(), Some(i64::MAX));
    }

    #[test]
    fn object_equality_and_hash_ignore_key_order() {
        let a = JsonValue::from(serde_json::json!({"x": 1, "y": [true, null]}));
        let b = JsonValue::from(serde_json::json!({"y": [true, null], "x": 1}));
        assert_eq!(a, b);
        let set: HashSet<JsonValue> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn key_order_is_preserved_for_encoding() {
        let v: JsonValue = r#"{"z": 1, "a": 2, "m": 3}"#.parse().unwrap();
        assert_eq!(v.keys(), vec!["z", "a", "m"]);
    }

    #[test]
    fn serde_json_bridge_round_trips() {
        let src = serde_json::json!({"n": null, "list": [1, 2.5, "s"], "nested": {"ok": false}});
        let ours = JsonValue::from(src.clone());
        assert_eq!(serde_json::Value::from(ours), src);
    }

    #[test]
    fn non_finite_numbers_bridge_to_null() {
        let v = JsonValue::from(f64::INFINITY);
        assert_eq!(serde_json::Value::from(v), serde_json::Value::Null);
    }

    #[test]
    fn pointer_walks_objects_and_arrays() {
        let v = JsonValue::from(serde_json::json!({"data": {"items": [{"a/b": 1}]}}));
        assert_eq!(v.pointer("/data/items/0/a~1b"), Some(&JsonValue::Integer(1)));
        assert_eq!(v.pointer(""), Some(&v));
        assert_eq!(v.pointer("/missing"), None);
    }

    #[test]
    fn integral_numbers_read_as_integers() {
        assert_eq!(JsonValue::from(3.0).as_i64(), Some(3));
        assert_eq!(JsonValue::from(3.5).as_i64(), None);
        assert_eq!(JsonValue::Integer(3).as_f64(), Some(3.0));
    }
}
