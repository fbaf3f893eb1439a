//! Self-descriptions used for schema generation.
//!
//! Every type that appears in a schema describes its own shape through
//! [`Documentable::describe`]. No instance is needed and no reflection is
//! involved: the description is plain data (ordered fields, requiredness, a
//! [`PropertyDescriptor`] per field and example payloads).
use std::any::TypeId;
use std::fmt;

use crate::error::SchemaError;
use crate::value::JsonValue;

pub trait Documentable {
    fn describe() -> TypeDescription;
}

/// How a type is rendered: as an object, or as one of the string shapes.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeKind {
    /// Not declared; rejected at build time.
    Unknown,
    Object,
    /// Closed set of allowed strings.
    StringEnum(Vec<String>),
    /// Free-form string, optionally constrained by a regex.
    StringLiteral { pattern: Option<String> },
    /// Open set: known values are listed but others are allowed.
    StringOptionSet(Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Integer,
    Number,
    Boolean,
    DateTime,
    Date,
    Time,
    Uri,
}

impl PrimitiveType {
    pub fn json_type(self) -> &'static str {
        match self {
            PrimitiveType::Integer => "integer",
            PrimitiveType::Number => "number",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::String
            | PrimitiveType::DateTime
            | PrimitiveType::Date
            | PrimitiveType::Time
            | PrimitiveType::Uri => "string",
        }
    }

    pub fn format(self) -> Option<&'static str> {
        match self {
            PrimitiveType::DateTime => Some("date-time"),
            PrimitiveType::Date => Some("date"),
            PrimitiveType::Time => Some("time"),
            PrimitiveType::Uri => Some("uri"),
            _ => None,
        }
    }
}

/// Lazy handle to another documentable type.
///
/// Equality is by [`TypeId`], so two handles to the same type compare equal no
/// matter where they were created, and distinct instantiations of a generic
/// type stay distinct.
#[derive(Clone, Copy)]
pub struct TypeRef {
    type_id: TypeId,
    type_name: &'static str,
    describe: fn() -> TypeDescription,
}

impl TypeRef {
    pub fn of<T: Documentable + 'static>() -> Self {
        Self { type_id: TypeId::of::<T>(), type_name: std::any::type_name::<T>(), describe: T::describe }
    }

    pub fn describe(&self) -> TypeDescription { (self.describe)() }

    pub fn type_id(&self) -> TypeId { self.type_id }

    /// Rust type name, for diagnostics only.
    pub fn type_name(&self) -> &'static str { self.type_name }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool { self.type_id == other.type_id }
}

impl Eq for TypeRef {}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.type_name).finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyDescriptor {
    Primitive(PrimitiveType),
    PrimitiveArray(PrimitiveType),
    PrimitiveDictionary(PrimitiveType),
    Reference(TypeRef),
    ReferenceArray(TypeRef),
    ReferenceDictionary(TypeRef),
    /// A polymorphic field, by interface name.
    Interface(String),
    InterfaceArray(String),
    InterfaceDictionary(String),
    Constant(JsonValue),
    Any,
}

impl PropertyDescriptor {
    pub fn reference<T: Documentable + 'static>() -> Self { Self::Reference(TypeRef::of::<T>()) }
    pub fn reference_array<T: Documentable + 'static>() -> Self { Self::ReferenceArray(TypeRef::of::<T>()) }
    pub fn reference_dictionary<T: Documentable + 'static>() -> Self { Self::ReferenceDictionary(TypeRef::of::<T>()) }
    pub fn interface(name: impl Into<String>) -> Self { Self::Interface(name.into()) }
    pub fn interface_array(name: impl Into<String>) -> Self { Self::InterfaceArray(name.into()) }
    pub fn interface_dictionary(name: impl Into<String>) -> Self { Self::InterfaceDictionary(name.into()) }

    /// The documentable type this property points at, if any.
    pub fn type_ref(&self) -> Option<&TypeRef> {
        match self {
            Self::Reference(t) | Self::ReferenceArray(t) | Self::ReferenceDictionary(t) => Some(t),
            _ => None,
        }
    }

    /// The interface this property points at, if any.
    pub fn interface_name(&self) -> Option<&str> {
        match self {
            Self::Interface(n) | Self::InterfaceArray(n) | Self::InterfaceDictionary(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescription {
    pub key: String,
    pub property: PropertyDescriptor,
    pub required: bool,
    pub description: Option<String>,
}

impl FieldDescription {
    pub fn new(key: impl Into<String>, property: PropertyDescriptor) -> Self {
        Self { key: key.into(), property, required: false, description: None }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describing(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }
}

/// Shape of one type: what `orderedFieldKeys`, `isFieldRequired` and
/// `fieldPropertyFor` answer, plus presentation details.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDescription {
    pub name: String,
    pub kind: TypeKind,
    pub description: Option<String>,
    /// `None` inherits the build's base URL.
    pub base_url: Option<String>,
    pub fields: Vec<FieldDescription>,
    pub examples: Vec<JsonValue>,
    /// Open types accept additional properties / further variants.
    pub is_open: bool,
}

impl TypeDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TypeKind::Unknown,
            description: None,
            base_url: None,
            fields: Vec::new(),
            examples: Vec::new(),
            is_open: true,
        }
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self { kind: TypeKind::Object, ..Self::new(name) }
    }

    pub fn string_enum<S: Into<String>>(name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self { kind: TypeKind::StringEnum(values), ..Self::new(name) }
    }

    pub fn string_literal(name: impl Into<String>, pattern: Option<&str>) -> Self {
        let pattern = pattern.map(str::to_string);
        Self { kind: TypeKind::StringLiteral { pattern }, ..Self::new(name) }
    }

    pub fn option_set<S: Into<String>>(name: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        Self { kind: TypeKind::StringOptionSet(values), ..Self::new(name) }
    }

    pub fn with_description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn field(mut self, field: FieldDescription) -> Self {
        self.fields.push(field);
        self
    }

    pub fn required(self, key: impl Into<String>, property: PropertyDescriptor) -> Self {
        self.field(FieldDescription::new(key, property).required())
    }

    pub fn optional(self, key: impl Into<String>, property: PropertyDescriptor) -> Self {
        self.field(FieldDescription::new(key, property))
    }

    pub fn example(mut self, example: impl Into<JsonValue>) -> Self {
        self.examples.push(example.into());
        self
    }

    pub fn closed(mut self) -> Self {
        self.is_open = false;
        self
    }

    pub fn ordered_field_keys(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.key.as_str()).collect()
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.key == key)
    }

    pub fn field_for(&self, key: &str) -> Result<&FieldDescription, SchemaError> {
        self.fields
            .iter()
            .find(|f| f.key == key)
            .ok_or_else(|| SchemaError::InvalidCodingKey {
                type_name: self.name.clone(),
                key: key.to_string(),
            })
    }

    pub fn is_field_required(&self, key: &str) -> Result<bool, SchemaError> {
        self.field_for(key).map(|f| f.required)
    }

    pub fn property_for(&self, key: &str) -> Result<&PropertyDescriptor, SchemaError> {
        self.field_for(key).map(|f| &f.property)
    }

    pub fn is_object(&self) -> bool { matches!(self.kind, TypeKind::Object) }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unit;
    impl Documentable for Unit {
        fn describe() -> TypeDescription {
            TypeDescription::string_enum("Unit", ["cm", "in"])
        }
    }

    struct Wrapper<T>(std::marker::PhantomData<T>);
    impl<T> Documentable for Wrapper<T> {
        fn describe() -> TypeDescription { TypeDescription::object("Wrapper") }
    }

    #[test]
    fn generic_instantiations_get_distinct_type_refs() {
        assert_eq!(TypeRef::of::<Wrapper<u8>>(), TypeRef::of::<Wrapper<u8>>());
        assert_ne!(TypeRef::of::<Wrapper<u8>>(), TypeRef::of::<Wrapper<u16>>());
        assert_ne!(TypeRef::of::<Unit>(), TypeRef::of::<Wrapper<u8>>());
        assert!(TypeRef::of::<Wrapper<u8>>().type_name().ends_with("Wrapper<u8>"));
    }

    #[test]
    fn field_lookup_by_key() {
        let desc = TypeDescription::object("Ruler")
            .required("length", PropertyDescriptor::Primitive(PrimitiveType::Number))
            .optional("unit", PropertyDescriptor::reference::<Unit>());

        assert_eq!(desc.ordered_field_keys(), vec!["length", "unit"]);
        assert_eq!(desc.is_field_required("length"), Ok(true));
        assert_eq!(desc.is_field_required("unit"), Ok(false));
        assert_eq!(desc.property_for("unit").unwrap().type_ref().unwrap().describe().name, "Unit");
    }

    #[test]
    fn unknown_key_is_an_invalid_coding_key() {
        let desc = TypeDescription::object("Ruler");
        assert_eq!(
            desc.property_for("width"),
            Err(SchemaError::InvalidCodingKey { type_name: "Ruler".into(), key: "width".into() })
        );
    }

    #[test]
    fn type_refs_compare_by_type() {
        assert_eq!(TypeRef::of::<Unit>(), TypeRef::of::<Unit>());
        assert_eq!(
            PropertyDescriptor::reference::<Unit>(),
            PropertyDescriptor::Reference(TypeRef::of::<Unit>())
        );
        assert_ne!(PropertyDescriptor::reference::<Unit>(), PropertyDescriptor::reference_array::<Unit>());
    }
}
