//! A small `Shape` family and a `Drawing` document, registered the way an
//! application would register its own model.
use std::f64::consts::PI;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::codec::{
    Codable, Interface, ObjectReader, ObjectWriter, PolymorphicCodec, PolymorphicList, PolymorphicValue,
    ResourceContext, Variant,
};
use crate::document::{Documentable, PrimitiveType, PropertyDescriptor, TypeDescription};
use crate::error::CodecError;
use crate::registry::{Serializer, TypeRegistry};
use crate::value::JsonValue;
use crate::{implements, serde_codable};

pub trait Shape: PolymorphicValue {
    fn area(&self) -> f64;
}

impl Interface for dyn Shape {
    const NAME: &'static str = "Shape";

    fn describe() -> TypeDescription {
        TypeDescription::object("Shape")
            .with_description("Something that can be placed on a drawing.")
            .required("type", PropertyDescriptor::reference::<ShapeType>())
            .optional("label", PropertyDescriptor::Primitive(PrimitiveType::String))
    }

    fn as_polymorphic(&self) -> &dyn PolymorphicValue { self.as_value() }
    fn into_polymorphic(self: Box<Self>) -> Box<dyn PolymorphicValue> { self.into_value() }
}

/// Allowed `Shape` discriminators.
pub struct ShapeType;

impl Documentable for ShapeType {
    fn describe() -> TypeDescription {
        TypeDescription::string_enum("ShapeType", ["circle", "square", "polygon", "sticker"])
    }
}

// -------------------------------- Variants -------------------------------- //

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub radius: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Square {
    pub side: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub points: Vec<Point>,
    pub closed: bool,
    pub label: Option<String>,
}

/// An image looked up in whatever bundle the document was loaded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sticker {
    #[serde(rename = "imageName")]
    pub image_name: String,
    #[serde(skip)]
    pub bundle: Option<String>,
}

serde_codable!(Circle, Square, Sticker);

impl Codable for Polygon {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        let reader = ObjectReader::new(value, codec)?;
        Ok(Polygon {
            points: reader.required("points")?,
            closed: reader.required("closed")?,
            label: reader.optional("label")?,
        })
    }

    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        Ok(ObjectWriter::new(codec)
            .field("closed", &self.closed)?
            .field("points", &self.points)?
            .optional_field("label", &self.label)?
            .finish())
    }
}

impl Documentable for Circle {
    fn describe() -> TypeDescription {
        TypeDescription::object("Circle")
            .required("radius", PropertyDescriptor::Primitive(PrimitiveType::Number))
            .closed()
    }
}

impl Documentable for Square {
    fn describe() -> TypeDescription {
        TypeDescription::object("Square")
            .required("side", PropertyDescriptor::Primitive(PrimitiveType::Number))
            .optional("label", PropertyDescriptor::Primitive(PrimitiveType::String))
            .closed()
    }
}

impl Documentable for Polygon {
    fn describe() -> TypeDescription {
        TypeDescription::object("Polygon")
            .with_description("Points in drawing order.")
            .required("points", PropertyDescriptor::reference_array::<Point>())
            .required("closed", PropertyDescriptor::Primitive(PrimitiveType::Boolean))
            .optional("label", PropertyDescriptor::Primitive(PrimitiveType::String))
    }
}

impl Documentable for Sticker {
    fn describe() -> TypeDescription {
        TypeDescription::object("Sticker")
            .required("imageName", PropertyDescriptor::Primitive(PrimitiveType::String))
    }
}

impl Variant for Circle {
    const TYPE_NAME: Option<&'static str> = Some("circle");
}

impl Variant for Square {
    const TYPE_NAME: Option<&'static str> = Some("square");

    fn examples() -> Vec<Self> {
        vec![
            Square { side: 2.0, label: None },
            Square { side: 1.0, label: Some("tile".to_string()) },
        ]
    }
}

impl Variant for Polygon {
    const TYPE_NAME: Option<&'static str> = Some("polygon");
}

impl Variant for Sticker {
    const TYPE_NAME: Option<&'static str> = Some("sticker");

    fn attach_resources(&mut self, resources: &ResourceContext) {
        self.bundle = resources.bundle.clone();
    }
}

impl Shape for Circle {
    fn area(&self) -> f64 { PI * self.radius * self.radius }
}

impl Shape for Square {
    fn area(&self) -> f64 { self.side * self.side }
}

impl Shape for Polygon {
    /// Shoelace formula; an open polygon has no area.
    fn area(&self) -> f64 {
        if !self.closed || self.points.len() < 3 {
            return 0.0;
        }
        let n = self.points.len();
        let twice: f64 = (0..n)
            .map(|i| {
                let (a, b) = (&self.points[i], &self.points[(i + 1) % n]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice.abs() / 2.0
    }
}

impl Shape for Sticker {
    fn area(&self) -> f64 { 0.0 }
}

implements!(dyn Shape => Circle, Square, Polygon, Sticker);

// ------------------------------ Plain types ------------------------------- //

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

serde_codable!(Point);

impl Documentable for Point {
    fn describe() -> TypeDescription {
        TypeDescription::object("Point")
            .required("x", PropertyDescriptor::Primitive(PrimitiveType::Number))
            .required("y", PropertyDescriptor::Primitive(PrimitiveType::Number))
            .closed()
    }
}

/// Root document holding a list of shapes.
#[derive(Debug, PartialEq)]
pub struct Drawing {
    pub title: String,
    pub origin: Point,
    pub shapes: PolymorphicList<dyn Shape>,
    pub created: Option<DateTime<FixedOffset>>,
}

impl Drawing {
    pub fn total_area(&self) -> f64 {
        self.shapes.iter().map(|shape| shape.area()).sum()
    }
}

impl Codable for Drawing {
    fn decode(value: &JsonValue, codec: &PolymorphicCodec<'_>) -> Result<Self, CodecError> {
        let reader = ObjectReader::new(value, codec)?;
        Ok(Drawing {
            title: reader.required("title")?,
            origin: reader.required("origin")?,
            shapes: reader.required("shapes")?,
            created: reader.optional("created")?,
        })
    }

    fn encode(&self, codec: &PolymorphicCodec<'_>) -> Result<JsonValue, CodecError> {
        Ok(ObjectWriter::new(codec)
            .field("title", &self.title)?
            .field("origin", &self.origin)?
            .field("shapes", &self.shapes)?
            .optional_field("created", &self.created)?
            .finish())
    }
}

impl Documentable for Drawing {
    fn describe() -> TypeDescription {
        TypeDescription::object("Drawing")
            .with_description("A titled canvas of shapes.")
            .required("title", PropertyDescriptor::Primitive(PrimitiveType::String))
            .required("origin", PropertyDescriptor::reference::<Point>())
            .required("shapes", PropertyDescriptor::interface_array(<dyn Shape as Interface>::NAME))
            .optional("created", PropertyDescriptor::Primitive(PrimitiveType::DateTime))
            .example(json!({
                "title": "Tiles",
                "origin": {"x": 0.0, "y": 0.0},
                "shapes": [
                    {"type": "square", "side": 1.0},
                    {"type": "circle", "radius": 0.5}
                ],
                "created": "2024-05-01T09:30:00.000+00:00"
            }))
    }
}

pub fn registry() -> TypeRegistry {
    let shapes = Serializer::<dyn Shape>::new()
        .with(Circle { radius: 2.5 })
        .with_type::<Square>()
        .with(Polygon {
            points: vec![Point { x: 0.0, y: 0.0 }, Point { x: 4.0, y: 0.0 }, Point { x: 0.0, y: 3.0 }],
            closed: true,
            label: Some("triangle".to_string()),
        })
        .with(Sticker { image_name: "star".to_string(), bundle: None });
    TypeRegistry::new().with_serializer(shapes).with_root::<Drawing>()
}

// ------------------------------- Tests ------------------------------------ //
