//! Polymorphic decode/encode dispatch.
//!
//! A polymorphic object carries a discriminator (`"type"` by default) naming its
//! concrete variant. Decoding reads the discriminator, looks the variant up in
//! the interface's [`Serializer`](crate::Serializer) and runs that variant's own
//! [`Codable::decode`]. Encoding runs the variant's [`Codable::encode`] and writes
//! the discriminator as the first key of the resulting object.
//!
//! Interfaces are trait objects (`dyn Shape`) implementing [`Interface`]; concrete
//! variants implement [`Variant`] and declare membership with [`implements!`].
pub mod primitives;
pub(crate) mod serde_bridge;

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

use indexmap::IndexMap;
use tracing::trace;

use crate::document::Documentable;
use crate::document::TypeDescription;
use crate::error::CodecError;
use crate::registry::TypeRegistry;
use crate::value::{JsonObject, JsonValue};

pub const DEFAULT_DISCRIMINATOR_KEY: &str = "type";

// ------------------------------- Options ---------------------------------- //

/// String tokens used for floats JSON cannot spell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonConformingFloats {
    pub positive_infinity: String,
    pub negative_infinity: String,
    pub nan: String,
}

impl Default for NonConformingFloats {
    fn default() -> Self {
        Self {
            positive_infinity: "Infinity".to_string(),
            negative_infinity: "-Infinity".to_string(),
            nan: "NaN".to_string(),
        }
    }
}

impl NonConformingFloats {
    pub fn token(&self, n: f64) -> Option<&str> {
        if n.is_nan() {
            Some(&self.nan)
        } else if n == f64::INFINITY {
            Some(&self.positive_infinity)
        } else if n == f64::NEG_INFINITY {
            Some(&self.negative_infinity)
        } else {
            None
        }
    }

    pub fn parse(&self, token: &str) -> Option<f64> {
        if token == self.nan {
            Some(f64::NAN)
        } else if token == self.positive_infinity {
            Some(f64::INFINITY)
        } else if token == self.negative_infinity {
            Some(f64::NEG_INFINITY)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecOptions {
    /// `None` makes non-finite floats an encode error.
    pub non_conforming_floats: Option<NonConformingFloats>,
    /// Emit variant fields in their documented order (discriminator still first).
    pub ordered_keys: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self { non_conforming_floats: Some(NonConformingFloats::default()), ordered_keys: false }
    }
}

/// Where decoded values were loaded from. Handed to every decoded variant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceContext {
    pub bundle: Option<String>,
    pub package: Option<String>,
}

impl ResourceContext {
    pub fn bundle(bundle: impl Into<String>) -> Self {
        Self { bundle: Some(bundle.into()), package: None }
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }
}

// -------------------------------- Traits ---------------------------------- //

/// Two-way conversion between a Rust value and a [`JsonValue`].
///
/// The codec is threaded through so nested polymorphic fields can dispatch
/// against the same registry and options.
pub trait Codable: Sized {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError>;
    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError>;
}

/// A concrete member of one or more polymorphic families.
pub trait Variant: Codable + Documentable + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Explicit discriminator. Without one the Rust type name is used, minus
    /// its module path and generic arguments: `Wrapper<A>` and `Wrapper<B>`
    /// both default to `Wrapper`, so generic variants need an explicit name.
    const TYPE_NAME: Option<&'static str> = None;

    /// Discriminator of this instance.
    fn type_name(&self) -> Cow<'static, str> {
        Cow::Borrowed(static_type_name::<Self>())
    }

    /// Values registered by [`Serializer::add_type`](crate::Serializer::add_type).
    fn examples() -> Vec<Self> {
        Vec::new()
    }

    fn attach_resources(&mut self, _resources: &ResourceContext) {}
}

/// Object-safe view of any [`Variant`].
pub trait PolymorphicValue: Any + fmt::Debug + Send + Sync {
    fn discriminator(&self) -> Cow<'static, str>;
    fn encode_fields(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError>;
    fn field_order(&self) -> Vec<String>;
    fn as_any(&self) -> &dyn Any;
    fn as_value(&self) -> &dyn PolymorphicValue;
    fn into_value(self: Box<Self>) -> Box<dyn PolymorphicValue>;
    fn value_eq(&self, other: &dyn PolymorphicValue) -> bool;
}

impl<V: Variant> PolymorphicValue for V {
    fn discriminator(&self) -> Cow<'static, str> { self.type_name() }

    fn encode_fields(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        self.encode(codec)
    }

    fn field_order(&self) -> Vec<String> {
        V::describe().fields.into_iter().map(|f| f.key).collect()
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_value(&self) -> &dyn PolymorphicValue { self }
    fn into_value(self: Box<Self>) -> Box<dyn PolymorphicValue> { self }

    fn value_eq(&self, other: &dyn PolymorphicValue) -> bool {
        other.as_any().downcast_ref::<V>().is_some_and(|other| self == other)
    }
}

/// Implemented on the trait object of a polymorphic family, e.g.
/// `impl Interface for dyn Shape`.
pub trait Interface: Send + Sync + 'static {
    /// Registry key.
    const NAME: &'static str;
    const DISCRIMINATOR_KEY: &'static str = DEFAULT_DISCRIMINATOR_KEY;

    /// Fields shared by all variants, including the discriminator.
    fn describe() -> TypeDescription;

    fn as_polymorphic(&self) -> &dyn PolymorphicValue;
    fn into_polymorphic(self: Box<Self>) -> Box<dyn PolymorphicValue>;
}

/// Membership of a variant in an interface. Usually written with [`implements!`].
pub trait Implements<I: Interface + ?Sized>: Variant {
    fn into_interface(self) -> Box<I>;
}

/// `implements!(dyn Shape => Circle, Square);`
#[macro_export]
macro_rules! implements {
    ($iface:ty => $($variant:ty),+ $(,)?) => {
        $(
            impl $crate::codec::Implements<$iface> for $variant {
                fn into_interface(self) -> Box<$iface> { Box::new(self) }
            }
        )+
    };
}

/// Objects that predate [`Codable`] and can only hand out a dictionary.
pub trait DictionaryRepresentable: fmt::Debug {
    /// Explicit discriminator, if the value knows it.
    fn type_name(&self) -> Option<Cow<'_, str>> { None }

    fn type_identity(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }

    fn to_dictionary(&self) -> JsonObject;
}

/// Discriminator of a variant type without an instance at hand.
pub fn static_type_name<V: Variant>() -> &'static str {
    V::TYPE_NAME.unwrap_or_else(|| short_type_name(std::any::type_name::<V>()))
}

/// `my_crate::model::Circle<T>` → `Circle`
pub fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    head.rsplit("::").next().unwrap_or(head)
}

// -------------------------------- Codec ----------------------------------- //

/// Entry point for polymorphic decode/encode against one registry.
#[derive(Clone, Debug)]
pub struct PolymorphicCodec<'r> {
    registry: &'r TypeRegistry,
    options: CodecOptions,
    resources: ResourceContext,
}

impl<'r> PolymorphicCodec<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self { registry, options: CodecOptions::default(), resources: ResourceContext::default() }
    }

    pub fn with_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_resources(mut self, resources: ResourceContext) -> Self {
        self.resources = resources;
        self
    }

    pub fn registry(&self) -> &'r TypeRegistry { self.registry }
    pub fn options(&self) -> &CodecOptions { &self.options }
    pub fn resources(&self) -> &ResourceContext { &self.resources }

    /// Decode one polymorphic object as a member of interface `I`.
    pub fn decode<I: Interface + ?Sized>(&self, value: &JsonValue) -> Result<Box<I>, CodecError> {
        let serializer = self
            .registry
            .serializer_for::<I>()
            .ok_or_else(|| CodecError::UnregisteredInterface(I::NAME.to_string()))?;
        serializer.decode(value, self)
    }

    /// Decode every element of an array; the first failure wins.
    pub fn decode_array<I: Interface + ?Sized>(&self, value: &JsonValue) -> Result<Vec<Box<I>>, CodecError> {
        let items = value.as_array().ok_or_else(|| CodecError::mismatch("array", value))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.decode::<I>(item).map_err(|e| e.at_index(i)))
            .collect()
    }

    /// Decode by interface name, for callers that only know the name at runtime.
    pub fn decode_named(&self, interface: &str, value: &JsonValue) -> Result<Box<dyn PolymorphicValue>, CodecError> {
        let serializer = self
            .registry
            .serializer_named(interface)
            .ok_or_else(|| CodecError::UnregisteredInterface(interface.to_string()))?;
        serializer.decode_value(value, self)
    }

    /// [`decode_array`](Self::decode_array) by interface name.
    pub fn decode_array_named(
        &self,
        interface: &str,
        value: &JsonValue,
    ) -> Result<Vec<Box<dyn PolymorphicValue>>, CodecError> {
        let items = value.as_array().ok_or_else(|| CodecError::mismatch("array", value))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.decode_named(interface, item).map_err(|e| e.at_index(i)))
            .collect()
    }

    pub fn decode_str<I: Interface + ?Sized>(&self, src: &str) -> Result<Box<I>, CodecError> {
        let value: JsonValue = crate::path_de::from_str_with_path(src)?;
        self.decode::<I>(&value)
    }

    /// Decode a non-polymorphic document (e.g. a root type holding polymorphic fields).
    pub fn decode_document<T: Codable>(&self, value: &JsonValue) -> Result<T, CodecError> {
        T::decode(value, self)
    }

    pub fn encode_document<T: Codable>(&self, value: &T) -> Result<JsonValue, CodecError> {
        value.encode(self)
    }

    pub fn encode<I: Interface + ?Sized>(&self, value: &I) -> Result<JsonValue, CodecError> {
        self.encode_value(value.as_polymorphic(), I::DISCRIMINATOR_KEY)
    }

    pub fn encode_to_string<I: Interface + ?Sized>(&self, value: &I) -> Result<String, CodecError> {
        let encoded = self.encode(value)?;
        serde_json::to_string(&encoded).map_err(|e| CodecError::data(e.to_string()))
    }

    /// Encode a variant and inject its discriminator as the first key.
    ///
    /// Fails with `InvalidEncodingContext` when the variant does not encode to
    /// an object: the discriminator needs a keyed container.
    pub fn encode_value(&self, value: &dyn PolymorphicValue, key: &str) -> Result<JsonValue, CodecError> {
        let discriminator = value.discriminator();
        let body = value.encode_fields(self)?;
        let JsonValue::Object(mut fields) = body else {
            return Err(CodecError::InvalidEncodingContext(discriminator.into_owned()));
        };
        trace!(%discriminator, fields = fields.len(), "encode variant");

        let mut out = JsonObject::with_capacity(fields.len() + 1);
        out.insert(key.to_string(), JsonValue::String(discriminator.into_owned()));
        if self.options.ordered_keys {
            for k in value.field_order() {
                if k == key { continue; }
                if let Some(v) = fields.shift_remove(&k) {
                    out.insert(k, v);
                }
            }
        }
        for (k, v) in fields {
            if k != key {
                out.insert(k, v);
            }
        }
        Ok(JsonValue::Object(out))
    }

    /// Encode a dictionary-shaped legacy value. An existing discriminator entry
    /// keeps its value; either way it is moved to the front.
    pub fn encode_dictionary(&self, value: &dyn DictionaryRepresentable, key: &str) -> Result<JsonValue, CodecError> {
        let mut dictionary = value.to_dictionary();
        let discriminator = match dictionary.shift_remove(key) {
            Some(existing) => existing,
            None => {
                let name = value
                    .type_name()
                    .map(Cow::into_owned)
                    .unwrap_or_else(|| value.type_identity().to_string());
                JsonValue::String(name)
            }
        };
        let mut out = JsonObject::with_capacity(dictionary.len() + 1);
        out.insert(key.to_string(), discriminator);
        out.extend(dictionary);
        Ok(JsonValue::Object(out))
    }
}

// ------------------------------- Wrappers --------------------------------- //

/// A field holding one member of interface `I`.
pub struct Polymorphic<I: Interface + ?Sized>(pub Box<I>);

impl<I: Interface + ?Sized> Polymorphic<I> {
    pub fn new<V: Implements<I>>(variant: V) -> Self {
        Self(variant.into_interface())
    }

    pub fn into_inner(self) -> Box<I> { self.0 }
}

impl<I: Interface + ?Sized> Deref for Polymorphic<I> {
    type Target = I;
    fn deref(&self) -> &I { &self.0 }
}

impl<I: Interface + ?Sized> fmt::Debug for Polymorphic<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.0.as_polymorphic(), f)
    }
}

impl<I: Interface + ?Sized> PartialEq for Polymorphic<I> {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_polymorphic().value_eq(other.0.as_polymorphic())
    }
}

impl<I: Interface + ?Sized> Codable for Polymorphic<I> {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        codec.decode::<I>(value).map(Polymorphic)
    }

    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        codec.encode::<I>(&self.0)
    }
}

/// A field holding an array of members of interface `I`.
pub struct PolymorphicList<I: Interface + ?Sized>(pub Vec<Box<I>>);

impl<I: Interface + ?Sized> PolymorphicList<I> {
    pub fn new() -> Self { Self(Vec::new()) }

    pub fn push<V: Implements<I>>(&mut self, variant: V) {
        self.0.push(variant.into_interface());
    }

    pub fn len(&self) -> usize { self.0.len() }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &I> { self.0.iter().map(|b| &**b) }
}

impl<I: Interface + ?Sized> Default for PolymorphicList<I> {
    fn default() -> Self { Self::new() }
}

impl<I: Interface + ?Sized> fmt::Debug for PolymorphicList<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(|b| b.as_polymorphic())).finish()
    }
}

impl<I: Interface + ?Sized> PartialEq for PolymorphicList<I> {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().zip(&other.0).all(|(a, b)| a.as_polymorphic().value_eq(b.as_polymorphic()))
    }
}

impl<I: Interface + ?Sized> Codable for PolymorphicList<I> {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        codec.decode_array::<I>(value).map(PolymorphicList)
    }

    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        self.0.iter().map(|item| codec.encode::<I>(&**item)).collect::<Result<Vec<_>, _>>().map(JsonValue::Array)
    }
}

/// A field holding a string-keyed map of members of interface `I`.
pub struct PolymorphicMap<I: Interface + ?Sized>(pub IndexMap<String, Box<I>>);

impl<I: Interface + ?Sized> PolymorphicMap<I> {
    pub fn new() -> Self { Self(IndexMap::new()) }

    pub fn insert<V: Implements<I>>(&mut self, key: impl Into<String>, variant: V) {
        self.0.insert(key.into(), variant.into_interface());
    }
}

impl<I: Interface + ?Sized> Default for PolymorphicMap<I> {
    fn default() -> Self { Self::new() }
}

impl<I: Interface + ?Sized> fmt::Debug for PolymorphicMap<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter().map(|(k, v)| (k, v.as_polymorphic()))).finish()
    }
}

impl<I: Interface + ?Sized> PartialEq for PolymorphicMap<I> {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self.0.iter().all(|(k, a)| {
                other.0.get(k).is_some_and(|b| a.as_polymorphic().value_eq(b.as_polymorphic()))
            })
    }
}

impl<I: Interface + ?Sized> Codable for PolymorphicMap<I> {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        let map = value.as_object().ok_or_else(|| CodecError::mismatch("object", value))?;
        let mut out = IndexMap::with_capacity(map.len());
        for (k, v) in map {
            out.insert(k.clone(), codec.decode::<I>(v).map_err(|e| e.at_key(k))?);
        }
        Ok(Self(out))
    }

    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        let mut out = JsonObject::with_capacity(self.0.len());
        for (k, v) in &self.0 {
            out.insert(k.clone(), codec.encode::<I>(&**v)?);
        }
        Ok(JsonValue::Object(out))
    }
}

// --------------------------- Keyed containers ----------------------------- //

/// Keyed read access for hand-written [`Codable::decode`] impls.
pub struct ObjectReader<'a, 'r> {
    map: &'a JsonObject,
    codec: &'a PolymorphicCodec<'r>,
}

impl<'a, 'r> ObjectReader<'a, 'r> {
    pub fn new(value: &'a JsonValue, codec: &'a PolymorphicCodec<'r>) -> Result<Self, CodecError> {
        let map = value.as_object().ok_or_else(|| CodecError::mismatch("object", value))?;
        Ok(Self { map, codec })
    }

    /// Missing and `null` both count as absent.
    pub fn required<T: Codable>(&self, key: &str) -> Result<T, CodecError> {
        match self.map.get(key) {
            None | Some(JsonValue::Null) => Err(CodecError::MissingField { path: format!(".{key}") }),
            Some(v) => T::decode(v, self.codec).map_err(|e| e.at_key(key)),
        }
    }

    pub fn optional<T: Codable>(&self, key: &str) -> Result<Option<T>, CodecError> {
        match self.map.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(v) => T::decode(v, self.codec).map(Some).map_err(|e| e.at_key(key)),
        }
    }

    pub fn contains(&self, key: &str) -> bool { self.map.contains_key(key) }
}

/// Keyed write access for hand-written [`Codable::encode`] impls.
pub struct ObjectWriter<'a, 'r> {
    map: JsonObject,
    codec: &'a PolymorphicCodec<'r>,
}

impl<'a, 'r> ObjectWriter<'a, 'r> {
    pub fn new(codec: &'a PolymorphicCodec<'r>) -> Self {
        Self { map: JsonObject::new(), codec }
    }

    pub fn field<T: Codable>(mut self, key: &str, value: &T) -> Result<Self, CodecError> {
        let encoded = value.encode(self.codec).map_err(|e| e.at_key(key))?;
        self.map.insert(key.to_string(), encoded);
        Ok(self)
    }

    /// Skips `None` instead of writing `null`.
    pub fn optional_field<T: Codable>(self, key: &str, value: &Option<T>) -> Result<Self, CodecError> {
        match value {
            Some(v) => self.field(key, v),
            None => Ok(self),
        }
    }

    pub fn finish(self) -> JsonValue { JsonValue::Object(self.map) }
}

/// Implement [`Codable`] through serde for plain data types. The codec's
/// non-conforming float tokens apply to every `f64` inside.
#[macro_export]
macro_rules! serde_codable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::codec::Codable for $ty {
                fn decode(
                    value: &$crate::JsonValue,
                    codec: &$crate::codec::PolymorphicCodec<'_>,
                ) -> Result<Self, $crate::CodecError> {
                    $crate::path_de::from_json_value(value, codec.options().non_conforming_floats.as_ref())
                }

                fn encode(
                    &self,
                    codec: &$crate::codec::PolymorphicCodec<'_>,
                ) -> Result<$crate::JsonValue, $crate::CodecError> {
                    $crate::path_de::to_json_value(self, codec.options().non_conforming_floats.as_ref())
                }
            }
        )+
    };
}

// ------------------------------- Tests ------------------------------------ //
