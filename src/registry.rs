//! Interface registry.
//!
//! One [`Serializer`] per interface, keyed by [`Interface::NAME`]. Each serializer
//! maps discriminator strings to a decode routine, the variant's description and
//! its registered examples. Registration is expected to finish before concurrent
//! decoding starts; after that the registry is only read.
use std::any::Any;
use std::fmt;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::codec::{
    static_type_name, CodecOptions, Implements, Interface, PolymorphicCodec, PolymorphicValue,
};
use crate::document::{Documentable, TypeDescription, TypeRef};
use crate::error::{CodecError, RegistryWarning};
use crate::value::JsonValue;

type DecodeFn<I> = fn(&JsonValue, &PolymorphicCodec<'_>) -> Result<Box<I>, CodecError>;

/// Default-object strategy for discriminators with no registered variant.
/// Receives the whole object and the unmatched discriminator.
pub type Fallback<I> =
    Box<dyn Fn(&JsonValue, &str, &PolymorphicCodec<'_>) -> Result<Box<I>, CodecError> + Send + Sync>;

struct VariantEntry<I: Interface + ?Sized> {
    decode: DecodeFn<I>,
    type_ref: TypeRef,
    /// The variant lists the discriminator among its own fields and wants to see it.
    declares_discriminator: bool,
    examples: Vec<Box<I>>,
}

fn decode_variant<I, V>(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Box<I>, CodecError>
where
    I: Interface + ?Sized,
    V: Implements<I>,
{
    let mut variant = V::decode(value, codec)?;
    variant.attach_resources(codec.resources());
    Ok(variant.into_interface())
}

// ------------------------------ Serializer -------------------------------- //

pub struct Serializer<I: Interface + ?Sized> {
    variants: IndexMap<String, VariantEntry<I>>,
    fallback: Option<Fallback<I>>,
}

impl<I: Interface + ?Sized> Default for Serializer<I> {
    fn default() -> Self { Self::new() }
}

impl<I: Interface + ?Sized> Serializer<I> {
    pub fn new() -> Self {
        Self { variants: IndexMap::new(), fallback: None }
    }

    pub fn interface_name(&self) -> &'static str { I::NAME }

    /// Register (or replace) the variant of `example`, keyed by its discriminator.
    pub fn add<V: Implements<I>>(&mut self, example: V) -> &mut Self {
        let discriminator = example.type_name().into_owned();
        self.insert::<V>(discriminator, vec![example.into_interface()]);
        self
    }

    /// Register (or replace) `V` with the examples it provides itself.
    pub fn add_type<V: Implements<I>>(&mut self) -> &mut Self {
        let examples = V::examples().into_iter().map(<V as Implements<I>>::into_interface).collect();
        self.insert::<V>(static_type_name::<V>().to_string(), examples);
        self
    }

    pub fn with<V: Implements<I>>(mut self, example: V) -> Self {
        self.add(example);
        self
    }

    pub fn with_type<V: Implements<I>>(mut self) -> Self {
        self.add_type::<V>();
        self
    }

    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&JsonValue, &str, &PolymorphicCodec<'_>) -> Result<Box<I>, CodecError> + Send + Sync + 'static,
    {
        self.set_fallback(fallback);
        self
    }

    pub fn set_fallback<F>(&mut self, fallback: F)
    where
        F: Fn(&JsonValue, &str, &PolymorphicCodec<'_>) -> Result<Box<I>, CodecError> + Send + Sync + 'static,
    {
        self.fallback = Some(Box::new(fallback));
    }

    fn insert<V: Implements<I>>(&mut self, discriminator: String, examples: Vec<Box<I>>) {
        let entry = VariantEntry {
            decode: decode_variant::<I, V>,
            type_ref: TypeRef::of::<V>(),
            declares_discriminator: V::describe().has_field(I::DISCRIMINATOR_KEY),
            examples,
        };
        if self.variants.insert(discriminator.clone(), entry).is_some() {
            debug!(interface = I::NAME, %discriminator, "variant replaced");
        } else {
            trace!(interface = I::NAME, %discriminator, "variant added");
        }
    }

    pub fn is_registered(&self, discriminator: &str) -> bool {
        self.variants.contains_key(discriminator)
    }

    pub fn discriminators(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    /// Every registered example, in registration order.
    pub fn examples(&self) -> Vec<&I> {
        self.variants.values().flat_map(|e| e.examples.iter().map(|b| &**b)).collect()
    }

    pub fn decode(&self, value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Box<I>, CodecError> {
        let map = value.as_object().ok_or_else(|| CodecError::mismatch("object", value))?;
        let key = I::DISCRIMINATOR_KEY;
        let discriminator = map
            .get(key)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| CodecError::DiscriminatorMissing {
                interface: I::NAME.to_string(),
                key: key.to_string(),
            })?;

        let Some(entry) = self.variants.get(discriminator) else {
            return match &self.fallback {
                Some(fallback) => {
                    warn!(interface = I::NAME, %discriminator, "unknown variant, using fallback");
                    fallback(value, discriminator, codec)
                }
                None => Err(CodecError::UnknownVariant {
                    interface: I::NAME.to_string(),
                    discriminator: discriminator.to_string(),
                }),
            };
        };

        trace!(interface = I::NAME, %discriminator, "decode variant");
        if entry.declares_discriminator {
            (entry.decode)(value, codec)
        } else {
            let mut body = map.clone();
            body.shift_remove(key);
            (entry.decode)(&JsonValue::Object(body), codec)
        }
    }
}

// --------------------------- Erased serializer ---------------------------- //

/// Interface-agnostic view of a [`Serializer`], used for runtime lookups by name
/// and by the schema builder.
pub trait ErasedSerializer: Any + Send + Sync {
    fn interface_name(&self) -> &'static str;
    fn discriminator_key(&self) -> &'static str;
    fn describe_interface(&self) -> TypeDescription;
    fn discriminators(&self) -> Vec<String>;
    fn is_registered(&self, discriminator: &str) -> bool;
    /// The type registered under `discriminator`.
    fn variant_type(&self, discriminator: &str) -> Option<TypeRef>;
    /// Examples of one variant, encoded with the discriminator injected.
    fn encoded_examples(&self, discriminator: &str, codec: &PolymorphicCodec<'_>) -> Result<Vec<JsonValue>, CodecError>;
    fn decode_value(&self, value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Box<dyn PolymorphicValue>, CodecError>;
    fn validate(&self, codec: &PolymorphicCodec<'_>) -> Vec<RegistryWarning>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<I: Interface + ?Sized> ErasedSerializer for Serializer<I> {
    fn interface_name(&self) -> &'static str { I::NAME }
    fn discriminator_key(&self) -> &'static str { I::DISCRIMINATOR_KEY }
    fn describe_interface(&self) -> TypeDescription { I::describe() }

    fn discriminators(&self) -> Vec<String> {
        self.variants.keys().cloned().collect()
    }

    fn is_registered(&self, discriminator: &str) -> bool {
        self.variants.contains_key(discriminator)
    }

    fn variant_type(&self, discriminator: &str) -> Option<TypeRef> {
        self.variants.get(discriminator).map(|e| e.type_ref)
    }

    fn encoded_examples(&self, discriminator: &str, codec: &PolymorphicCodec<'_>) -> Result<Vec<JsonValue>, CodecError> {
        let Some(entry) = self.variants.get(discriminator) else {
            return Ok(Vec::new());
        };
        entry.examples.iter().map(|example| codec.encode::<I>(&**example)).collect()
    }

    fn decode_value(&self, value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Box<dyn PolymorphicValue>, CodecError> {
        self.decode(value, codec).map(|decoded| decoded.into_polymorphic())
    }

    fn validate(&self, codec: &PolymorphicCodec<'_>) -> Vec<RegistryWarning> {
        let mut warnings = Vec::new();
        let key = I::DISCRIMINATOR_KEY;
        for (discriminator, entry) in &self.variants {
            if entry.examples.is_empty() {
                warnings.push(RegistryWarning::NoExamples {
                    interface: I::NAME.to_string(),
                    discriminator: discriminator.clone(),
                });
            }
            for example in &entry.examples {
                let round_trip = |reason: String| RegistryWarning::RoundTrip {
                    interface: I::NAME.to_string(),
                    discriminator: discriminator.clone(),
                    reason,
                };
                let encoded = match codec.encode::<I>(&**example) {
                    Ok(encoded) => encoded,
                    Err(err) => {
                        warnings.push(round_trip(err.to_string()));
                        continue;
                    }
                };
                let written = encoded.get(key).and_then(JsonValue::as_str).unwrap_or_default();
                if written != discriminator {
                    warnings.push(RegistryWarning::DiscriminatorMismatch {
                        interface: I::NAME.to_string(),
                        registered: discriminator.clone(),
                        encoded: written.to_string(),
                    });
                    continue;
                }
                match self.decode(&encoded, codec) {
                    Ok(decoded) if decoded.as_polymorphic().value_eq(example.as_polymorphic()) => {}
                    Ok(decoded) => warnings.push(round_trip(format!(
                        "decoded {:?} differs from {:?}",
                        decoded.as_polymorphic(),
                        example.as_polymorphic()
                    ))),
                    Err(err) => warnings.push(round_trip(err.to_string())),
                }
            }
        }
        warnings
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

// ------------------------------- Registry --------------------------------- //

/// Explicitly constructed registry handed to every codec and schema build.
#[derive(Default)]
pub struct TypeRegistry {
    serializers: IndexMap<String, Box<dyn ErasedSerializer>>,
    roots: Vec<TypeRef>,
}

impl TypeRegistry {
    pub fn new() -> Self { Self::default() }

    /// Last registration for an interface name wins.
    pub fn register<I: Interface + ?Sized>(&mut self, serializer: Serializer<I>) -> &mut Self {
        debug!(interface = I::NAME, variants = serializer.variants.len(), "register interface");
        self.serializers.insert(I::NAME.to_string(), Box::new(serializer));
        self
    }

    pub fn with_serializer<I: Interface + ?Sized>(mut self, serializer: Serializer<I>) -> Self {
        self.register(serializer);
        self
    }

    /// Register a standalone document type for schema generation.
    pub fn add_root<T: Documentable + 'static>(&mut self) -> &mut Self {
        let root = TypeRef::of::<T>();
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
        self
    }

    pub fn with_root<T: Documentable + 'static>(mut self) -> Self {
        self.add_root::<T>();
        self
    }

    pub fn roots(&self) -> &[TypeRef] { &self.roots }

    pub fn serializer_for<I: Interface + ?Sized>(&self) -> Option<&Serializer<I>> {
        self.serializers.get(I::NAME)?.as_any().downcast_ref::<Serializer<I>>()
    }

    pub fn serializer_for_mut<I: Interface + ?Sized>(&mut self) -> Option<&mut Serializer<I>> {
        self.serializers.get_mut(I::NAME)?.as_any_mut().downcast_mut::<Serializer<I>>()
    }

    pub fn serializer_named(&self, interface: &str) -> Option<&dyn ErasedSerializer> {
        self.serializers.get(interface).map(|s| &**s)
    }

    pub fn is_interface_registered(&self, interface: &str) -> bool {
        self.serializers.contains_key(interface)
    }

    pub fn is_registered(&self, interface: &str, discriminator: &str) -> bool {
        self.serializer_named(interface).is_some_and(|s| s.is_registered(discriminator))
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &dyn ErasedSerializer> {
        self.serializers.values().map(|s| &**s)
    }

    pub fn set_fallback<I: Interface + ?Sized>(
        &mut self,
        fallback: impl Fn(&JsonValue, &str, &PolymorphicCodec<'_>) -> Result<Box<I>, CodecError> + Send + Sync + 'static,
    ) -> Result<(), CodecError> {
        let serializer = self
            .serializer_for_mut::<I>()
            .ok_or_else(|| CodecError::UnregisteredInterface(I::NAME.to_string()))?;
        serializer.set_fallback(fallback);
        Ok(())
    }

    /// Round-trip every registered example. Findings are advisory: they are
    /// logged and returned, never raised.
    pub fn validate(&self, options: &CodecOptions) -> Vec<RegistryWarning> {
        let codec = PolymorphicCodec::new(self).with_options(options.clone());
        let warnings: Vec<_> = self.interfaces().flat_map(|s| s.validate(&codec)).collect();
        for warning in &warnings {
            warn!("{warning}");
        }
        warnings
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field(
                "interfaces",
                &self.serializers.iter().map(|(k, s)| (k, s.discriminators())).collect::<Vec<_>>(),
            )
            .field("roots", &self.roots)
            .finish()
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codable;
    use crate::demo::{self, Circle, Shape, Square};
    use serde_json::json;

    #[test]
    fn demo_registry_validates_cleanly() {
        let registry = demo::registry();
        assert_eq!(registry.validate(&CodecOptions::default()), vec![]);
    }

    #[test]
    fn every_example_round_trips() {
        let registry = demo::registry();
        let codec = PolymorphicCodec::new(&registry);
        let serializer = registry.serializer_for::<dyn Shape>().unwrap();
        for example in serializer.examples() {
            let encoded = codec.encode::<dyn Shape>(example).unwrap();
            assert_eq!(encoded.keys()[0], "type");
            let decoded = codec.decode::<dyn Shape>(&encoded).unwrap();
            assert!(decoded.as_polymorphic().value_eq(example.as_polymorphic()));
            assert_eq!(decoded.as_polymorphic().discriminator(), example.as_polymorphic().discriminator());
        }
    }

    #[test]
    fn lookups_by_name() {
        let registry = demo::registry();
        assert!(registry.is_registered("Shape", "circle"));
        assert!(!registry.is_registered("Shape", "triangle"));
        assert!(!registry.is_registered("Animal", "cat"));
        assert!(registry.serializer_named("Shape").is_some());
        assert_eq!(registry.serializer_named("Shape").unwrap().discriminator_key(), "type");
    }

    #[test]
    fn registering_an_interface_again_replaces_it() {
        let mut registry = demo::registry();
        registry.register(Serializer::<dyn Shape>::new().with(Square { side: 1.0, label: None }));
        let serializer = registry.serializer_for::<dyn Shape>().unwrap();
        assert_eq!(serializer.discriminators().collect::<Vec<_>>(), vec!["square"]);
    }

    #[test]
    fn mismatched_examples_are_reported() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Oval { width: f64 }
        crate::serde_codable!(Oval);
        impl Documentable for Oval {
            fn describe() -> TypeDescription { TypeDescription::object("Oval") }
        }
        impl crate::codec::Variant for Oval {
            const TYPE_NAME: Option<&'static str> = Some("oval");
            fn examples() -> Vec<Self> { vec![Oval { width: f64::NAN }] }
        }
        impl Shape for Oval {
            fn area(&self) -> f64 { 0.0 }
        }
        crate::implements!(dyn Shape => Oval);

        let mut registry = TypeRegistry::new();
        registry.register(Serializer::<dyn Shape>::new().with_type::<Oval>().with(Circle { radius: 1.0 }));
        let codec = PolymorphicCodec::new(&registry);
        let encoded = codec.encode::<dyn Shape>(&Oval { width: f64::NAN }).unwrap();
        assert_eq!(encoded.get("width"), Some(&JsonValue::from("NaN")));

        // the "NaN" token decodes, but NaN never equals itself
        let warnings = registry.validate(&CodecOptions::default());
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            RegistryWarning::RoundTrip { discriminator, reason, .. }
                if discriminator == "oval" && reason.starts_with("decoded")
        ));
    }

    #[test]
    fn variants_without_examples_are_flagged() {
        let mut registry = TypeRegistry::new();
        registry.register(Serializer::<dyn Shape>::new().with_type::<demo::Polygon>());
        let warnings = registry.validate(&CodecOptions::default());
        assert_eq!(warnings, vec![RegistryWarning::NoExamples {
            interface: "Shape".into(),
            discriminator: "polygon".into(),
        }]);
    }

    #[test]
    fn fallback_on_unregistered_interface_is_an_error() {
        let mut registry = TypeRegistry::new();
        let result = registry.set_fallback::<dyn Shape>(|_, _, _| Err(CodecError::data("nope")));
        assert_eq!(result, Err(CodecError::UnregisteredInterface("Shape".into())));
    }

    #[test]
    fn fallback_sees_the_whole_object() {
        let registry = TypeRegistry::new().with_serializer(
            Serializer::<dyn Shape>::new()
                .with(Circle { radius: 1.0 })
                .with_fallback(|value, _, codec| {
                    let radius = value.get("size").map(|v| f64::decode(v, codec)).transpose()?.unwrap_or(0.0);
                    Ok(Box::new(Circle { radius }) as Box<dyn Shape>)
                }),
        );
        let codec = PolymorphicCodec::new(&registry);
        let shape = codec.decode::<dyn Shape>(&JsonValue::from(json!({"type": "blob", "size": 4}))).unwrap();
        assert_eq!(shape.area(), std::f64::consts::PI * 16.0);
    }
}
