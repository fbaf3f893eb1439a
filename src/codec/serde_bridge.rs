//! serde data model ↔ [`JsonValue`] without going through `serde_json::Value`,
//! which cannot hold non-finite floats. Both directions apply the codec's
//! [`NonConformingFloats`] tokens.
use serde::de::{self, DeserializeSeed, IntoDeserializer, Visitor};
use serde::ser::{self, Serialize};

use super::NonConformingFloats;
use crate::error::CodecError;
use crate::value::{JsonObject, JsonValue};

impl ser::Error for CodecError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        CodecError::data(msg.to_string())
    }
}

impl de::Error for CodecError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        CodecError::data(msg.to_string())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SERIALIZE
// ————————————————————————————————————————————————————————————————————————————

/// Serializes into a [`JsonValue`]. Without float tokens a non-finite `f64`
/// is a [`CodecError::NonConformingFloat`].
#[derive(Clone, Copy)]
pub(crate) struct ValueSerializer<'a> {
    pub floats: Option<&'a NonConformingFloats>,
}

impl<'a> ValueSerializer<'a> {
    fn value<T: Serialize + ?Sized>(self, value: &T) -> Result<JsonValue, CodecError> {
        value.serialize(self)
    }

    fn key<T: Serialize + ?Sized>(self, key: &T) -> Result<String, CodecError> {
        match self.value(key)? {
            JsonValue::String(s) => Ok(s),
            JsonValue::Integer(i) => Ok(i.to_string()),
            JsonValue::Boolean(b) => Ok(b.to_string()),
            other => Err(CodecError::data(format!("object keys must be strings, found {}", other.kind()))),
        }
    }
}

impl<'a> ser::Serializer for ValueSerializer<'a> {
    type Ok = JsonValue;
    type Error = CodecError;
    type SerializeSeq = SeqBuilder<'a>;
    type SerializeTuple = SeqBuilder<'a>;
    type SerializeTupleStruct = SeqBuilder<'a>;
    type SerializeTupleVariant = SeqBuilder<'a>;
    type SerializeMap = ObjectBuilder<'a>;
    type SerializeStruct = ObjectBuilder<'a>;
    type SerializeStructVariant = ObjectBuilder<'a>;

    fn serialize_bool(self, v: bool) -> Result<JsonValue, CodecError> { Ok(JsonValue::Boolean(v)) }
    fn serialize_i8(self, v: i8) -> Result<JsonValue, CodecError> { Ok(JsonValue::Integer(v.into())) }
    fn serialize_i16(self, v: i16) -> Result<JsonValue, CodecError> { Ok(JsonValue::Integer(v.into())) }
    fn serialize_i32(self, v: i32) -> Result<JsonValue, CodecError> { Ok(JsonValue::Integer(v.into())) }
    fn serialize_i64(self, v: i64) -> Result<JsonValue, CodecError> { Ok(JsonValue::Integer(v)) }
    fn serialize_u8(self, v: u8) -> Result<JsonValue, CodecError> { Ok(JsonValue::Integer(v.into())) }
    fn serialize_u16(self, v: u16) -> Result<JsonValue, CodecError> { Ok(JsonValue::Integer(v.into())) }
    fn serialize_u32(self, v: u32) -> Result<JsonValue, CodecError> { Ok(JsonValue::Integer(v.into())) }

    fn serialize_u64(self, v: u64) -> Result<JsonValue, CodecError> {
        i64::try_from(v)
            .map(JsonValue::Integer)
            .map_err(|_| CodecError::data(format!("{v} does not fit in a JSON integer")))
    }

    fn serialize_f32(self, v: f32) -> Result<JsonValue, CodecError> {
        self.serialize_f64(v.into())
    }

    fn serialize_f64(self, v: f64) -> Result<JsonValue, CodecError> {
        if v.is_finite() {
            return Ok(JsonValue::from(v));
        }
        match self.floats.and_then(|floats| floats.token(v)) {
            Some(token) => Ok(JsonValue::from(token)),
            None => Err(CodecError::NonConformingFloat(v)),
        }
    }

    fn serialize_char(self, v: char) -> Result<JsonValue, CodecError> { Ok(JsonValue::String(v.to_string())) }
    fn serialize_str(self, v: &str) -> Result<JsonValue, CodecError> { Ok(JsonValue::from(v)) }

    fn serialize_bytes(self, v: &[u8]) -> Result<JsonValue, CodecError> {
        Ok(JsonValue::Array(v.iter().map(|b| JsonValue::Integer((*b).into())).collect()))
    }

    fn serialize_none(self) -> Result<JsonValue, CodecError> { Ok(JsonValue::Null) }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<JsonValue, CodecError> {
        self.value(value)
    }

    fn serialize_unit(self) -> Result<JsonValue, CodecError> { Ok(JsonValue::Null) }
    fn serialize_unit_struct(self, _name: &'static str) -> Result<JsonValue, CodecError> { Ok(JsonValue::Null) }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<JsonValue, CodecError> {
        Ok(JsonValue::from(variant))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<JsonValue, CodecError> {
        self.value(value)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<JsonValue, CodecError> {
        let mut out = JsonObject::with_capacity(1);
        out.insert(variant.to_string(), self.value(value)?);
        Ok(JsonValue::Object(out))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder<'a>, CodecError> {
        Ok(SeqBuilder { ser: self, variant: None, items: Vec::with_capacity(len.unwrap_or(0)) })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder<'a>, CodecError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqBuilder<'a>, CodecError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqBuilder<'a>, CodecError> {
        Ok(SeqBuilder { ser: self, variant: Some(variant), items: Vec::with_capacity(len) })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<ObjectBuilder<'a>, CodecError> {
        Ok(ObjectBuilder { ser: self, variant: None, map: JsonObject::with_capacity(len.unwrap_or(0)), next_key: None })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<ObjectBuilder<'a>, CodecError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<ObjectBuilder<'a>, CodecError> {
        Ok(ObjectBuilder { ser: self, variant: Some(variant), map: JsonObject::with_capacity(len), next_key: None })
    }
}

// externally tagged variants wrap their payload as `{variant: payload}`
fn tagged(variant: Option<&'static str>, payload: JsonValue) -> JsonValue {
    match variant {
        None => payload,
        Some(variant) => {
            let mut out = JsonObject::with_capacity(1);
            out.insert(variant.to_string(), payload);
            JsonValue::Object(out)
        }
    }
}

pub(crate) struct SeqBuilder<'a> {
    ser: ValueSerializer<'a>,
    variant: Option<&'static str>,
    items: Vec<JsonValue>,
}

impl SeqBuilder<'_> {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CodecError> {
        let index = self.items.len();
        let item = self.ser.value(value).map_err(|e| e.at_index(index))?;
        self.items.push(item);
        Ok(())
    }

    fn done(self) -> JsonValue {
        tagged(self.variant, JsonValue::Array(self.items))
    }
}

impl ser::SerializeSeq for SeqBuilder<'_> {
    type Ok = JsonValue;
    type Error = CodecError;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CodecError> { self.push(value) }
    fn end(self) -> Result<JsonValue, CodecError> { Ok(self.done()) }
}

impl ser::SerializeTuple for SeqBuilder<'_> {
    type Ok = JsonValue;
    type Error = CodecError;
    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CodecError> { self.push(value) }
    fn end(self) -> Result<JsonValue, CodecError> { Ok(self.done()) }
}

impl ser::SerializeTupleStruct for SeqBuilder<'_> {
    type Ok = JsonValue;
    type Error = CodecError;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CodecError> { self.push(value) }
    fn end(self) -> Result<JsonValue, CodecError> { Ok(self.done()) }
}

impl ser::SerializeTupleVariant for SeqBuilder<'_> {
    type Ok = JsonValue;
    type Error = CodecError;
    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CodecError> { self.push(value) }
    fn end(self) -> Result<JsonValue, CodecError> { Ok(self.done()) }
}

pub(crate) struct ObjectBuilder<'a> {
    ser: ValueSerializer<'a>,
    variant: Option<&'static str>,
    map: JsonObject,
    next_key: Option<String>,
}

impl ObjectBuilder<'_> {
    fn entry<T: Serialize + ?Sized>(&mut self, key: String, value: &T) -> Result<(), CodecError> {
        let encoded = self.ser.value(value).map_err(|e| e.at_key(&key))?;
        self.map.insert(key, encoded);
        Ok(())
    }

    fn done(self) -> JsonValue {
        tagged(self.variant, JsonValue::Object(self.map))
    }
}

impl ser::SerializeMap for ObjectBuilder<'_> {
    type Ok = JsonValue;
    type Error = CodecError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), CodecError> {
        self.next_key = Some(self.ser.key(key)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), CodecError> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| CodecError::data("map value serialized before its key"))?;
        self.entry(key, value)
    }

    fn end(self) -> Result<JsonValue, CodecError> { Ok(self.done()) }
}

impl ser::SerializeStruct for ObjectBuilder<'_> {
    type Ok = JsonValue;
    type Error = CodecError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), CodecError> {
        self.entry(key.to_string(), value)
    }

    fn end(self) -> Result<JsonValue, CodecError> { Ok(self.done()) }
}

impl ser::SerializeStructVariant for ObjectBuilder<'_> {
    type Ok = JsonValue;
    type Error = CodecError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, key: &'static str, value: &T) -> Result<(), CodecError> {
        self.entry(key.to_string(), value)
    }

    fn end(self) -> Result<JsonValue, CodecError> { Ok(self.done()) }
}

// ————————————————————————————————————————————————————————————————————————————
// DESERIALIZE
// ————————————————————————————————————————————————————————————————————————————

/// Deserializes out of a borrowed [`JsonValue`]. Float fields accept the
/// configured tokens; integer fields accept integral `Number`s.
#[derive(Clone, Copy)]
pub(crate) struct ValueDeserializer<'a> {
    pub value: &'a JsonValue,
    pub floats: Option<&'a NonConformingFloats>,
}

impl<'a> ValueDeserializer<'a> {
    fn at(self, value: &'a JsonValue) -> Self {
        Self { value, floats: self.floats }
    }

    fn float_token(self) -> Option<f64> {
        self.floats.zip(self.value.as_str()).and_then(|(floats, token)| floats.parse(token))
    }
}

macro_rules! integral {
    ($($method:ident),+) => {
        $(
            fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
                match (self.value, self.value.as_i64()) {
                    (JsonValue::Number(_), Some(i)) => visitor.visit_i64(i),
                    _ => self.deserialize_any(visitor),
                }
            }
        )+
    };
}

impl<'de, 'a> de::Deserializer<'de> for ValueDeserializer<'a> {
    type Error = CodecError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        match self.value {
            JsonValue::Null => visitor.visit_unit(),
            JsonValue::Boolean(b) => visitor.visit_bool(*b),
            JsonValue::Integer(i) => visitor.visit_i64(*i),
            JsonValue::Number(n) => visitor.visit_f64(n.0),
            JsonValue::String(s) => visitor.visit_str(s),
            JsonValue::Array(items) => {
                let mut seq = ArrayAccess { de: self, items: items.iter(), index: 0 };
                let out = visitor.visit_seq(&mut seq)?;
                match seq.items.len() {
                    0 => Ok(out),
                    rest => Err(de::Error::invalid_length(seq.index + rest, &"fewer elements in array")),
                }
            }
            JsonValue::Object(map) => visitor.visit_map(ObjectAccess { de: self, entries: map.iter(), value: None }),
        }
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        match self.float_token() {
            Some(n) => visitor.visit_f64(n),
            None => self.deserialize_any(visitor),
        }
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        self.deserialize_f64(visitor)
    }

    integral!(
        deserialize_i8, deserialize_i16, deserialize_i32, deserialize_i64,
        deserialize_u8, deserialize_u16, deserialize_u32, deserialize_u64
    );

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, CodecError> {
        match self.value {
            JsonValue::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        match self.value {
            JsonValue::String(variant) => visitor.visit_enum(str_de(variant)),
            JsonValue::Object(map) if map.len() == 1 => {
                let Some((variant, payload)) = map.iter().next() else {
                    return Err(de::Error::invalid_length(0, &"an object with one key"));
                };
                visitor.visit_enum(TaggedAccess { de: self.at(payload), variant })
            }
            other => Err(CodecError::mismatch("string or single-key object", other)),
        }
    }

    serde::forward_to_deserialize_any! {
        bool i128 u128 char str string bytes byte_buf unit unit_struct
        seq tuple tuple_struct map struct identifier ignored_any
    }
}

fn str_de(s: &str) -> de::value::StrDeserializer<'_, CodecError> {
    s.into_deserializer()
}

struct ArrayAccess<'a> {
    de: ValueDeserializer<'a>,
    items: std::slice::Iter<'a, JsonValue>,
    index: usize,
}

impl<'de, 'a> de::SeqAccess<'de> for ArrayAccess<'a> {
    type Error = CodecError;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>, CodecError> {
        match self.items.next() {
            None => Ok(None),
            Some(item) => {
                self.index += 1;
                seed.deserialize(self.de.at(item)).map(Some)
            }
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct ObjectAccess<'a> {
    de: ValueDeserializer<'a>,
    entries: indexmap::map::Iter<'a, String, JsonValue>,
    value: Option<&'a JsonValue>,
}

impl<'de, 'a> de::MapAccess<'de> for ObjectAccess<'a> {
    type Error = CodecError;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, CodecError> {
        match self.entries.next() {
            None => Ok(None),
            Some((key, value)) => {
                self.value = Some(value);
                seed.deserialize(str_de(key)).map(Some)
            }
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, CodecError> {
        let value = self.value.take().ok_or_else(|| CodecError::data("map value requested before its key"))?;
        seed.deserialize(self.de.at(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct TaggedAccess<'a> {
    de: ValueDeserializer<'a>,
    variant: &'a str,
}

impl<'de, 'a> de::EnumAccess<'de> for TaggedAccess<'a> {
    type Error = CodecError;
    type Variant = ValueDeserializer<'a>;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant), CodecError> {
        let variant = seed.deserialize(str_de(self.variant))?;
        Ok((variant, self.de))
    }
}

impl<'de, 'a> de::VariantAccess<'de> for ValueDeserializer<'a> {
    type Error = CodecError;

    fn unit_variant(self) -> Result<(), CodecError> {
        match self.value {
            JsonValue::Null => Ok(()),
            other => Err(CodecError::mismatch("null", other)),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, CodecError> {
        seed.deserialize(self)
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, CodecError> {
        de::Deserializer::deserialize_any(self, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, CodecError> {
        de::Deserializer::deserialize_any(self, visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    enum Mark {
        Dot,
        Tick(u8),
        Span { from: f64, to: f64 },
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        count: u32,
        scale: Option<f64>,
        marks: Vec<Mark>,
        pair: (i64, String),
    }

    fn sample() -> Sample {
        Sample {
            count: 3,
            scale: Some(f64::NEG_INFINITY),
            marks: vec![Mark::Dot, Mark::Tick(4), Mark::Span { from: 0.5, to: f64::INFINITY }],
            pair: (-1, "x".into()),
        }
    }

    #[test]
    fn serde_shapes_map_onto_json_values() {
        let floats = NonConformingFloats::default();
        let encoded = sample().serialize(ValueSerializer { floats: Some(&floats) }).unwrap();
        assert_eq!(encoded, JsonValue::from(json!({
            "count": 3,
            "scale": "-Infinity",
            "marks": ["Dot", {"Tick": 4}, {"Span": {"from": 0.5, "to": "Infinity"}}],
            "pair": [-1, "x"]
        })));

        let decoded = Sample::deserialize(ValueDeserializer { value: &encoded, floats: Some(&floats) }).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn strict_floats_are_rejected_both_ways() {
        let err = sample().serialize(ValueSerializer { floats: None }).unwrap_err();
        assert!(matches!(err, CodecError::NonConformingFloat(n) if n == f64::NEG_INFINITY));

        let value = JsonValue::from(json!({"count": 1, "scale": "Infinity", "marks": [], "pair": [0, ""]}));
        assert!(Sample::deserialize(ValueDeserializer { value: &value, floats: None }).is_err());
    }

    #[test]
    fn integral_numbers_decode_as_integers() {
        let value = JsonValue::from(json!({"count": 2.0, "scale": null, "marks": [], "pair": [7.0, "y"]}));
        let decoded = Sample::deserialize(ValueDeserializer { value: &value, floats: None }).unwrap();
        assert_eq!(decoded.count, 2);
        assert_eq!(decoded.scale, None);
        assert_eq!(decoded.pair, (7, "y".into()));
    }
}
