//! Polymorphic JSON with a `"type"` discriminator, plus JSON Schema generation
//! for the registered families.
//!
//! ```ignore
//! let registry = json_sealed::demo::registry();
//! let codec = PolymorphicCodec::new(&registry);
//! let shape = codec.decode_str::<dyn Shape>(r#"{"type":"circle","radius":2.5}"#)?;
//! let docs = SchemaGraphBuilder::new(&registry, SchemaOptions::default()).build()?;
//! ```
pub mod cli;
pub mod codec;
pub mod dates;
pub mod demo;
pub mod document;
pub mod error;
pub mod path_de;
pub mod registry;
pub mod schema;
pub mod value;

pub use codec::{
    Codable, CodecOptions, DictionaryRepresentable, Implements, Interface, NonConformingFloats, ObjectReader,
    ObjectWriter, Polymorphic, PolymorphicCodec, PolymorphicList, PolymorphicMap, PolymorphicValue, ResourceContext,
    Variant,
};
pub use document::{
    Documentable, FieldDescription, PrimitiveType, PropertyDescriptor, TypeDescription, TypeKind, TypeRef,
};
pub use error::{CodecError, RegistryWarning, SchemaError};
pub use registry::{ErasedSerializer, Serializer, TypeRegistry};
pub use schema::{SchemaDocument, SchemaGraphBuilder, SchemaOptions};
pub use value::{JsonObject, JsonValue};
