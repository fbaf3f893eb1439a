//! JSON Schema (draft-07 subset) for registered families and root documents.
//!
//! A build walks the registry into a [`graph`] of every reachable type, decides
//! which types get their own document and which are embedded as `definitions`,
//! then [`render`]s one document per root.
mod graph;
mod render;

use tracing::debug;

use crate::error::SchemaError;
use crate::registry::TypeRegistry;

pub const DEFAULT_BASE_URL: &str = "https://example.org/schemas";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Documents on this base URL are the ones [`SchemaGraphBuilder::build`] returns.
    pub base_url: String,
    pub include_examples: bool,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self { base_url: DEFAULT_BASE_URL.to_string(), include_examples: true }
    }
}

impl SchemaOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), ..Self::default() }
    }

    pub fn without_examples(mut self) -> Self {
        self.include_examples = false;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SchemaDocument {
    pub name: String,
    /// `<baseUrl>/<name>.json`
    pub id: String,
    pub base_url: String,
    pub json: serde_json::Value,
}

impl SchemaDocument {
    pub fn file_name(&self) -> String { format!("{}.json", self.name) }

    pub fn to_pretty_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.json)
    }
}

/// One schema build over a registry. Every call starts from an empty graph.
pub struct SchemaGraphBuilder<'r> {
    registry: &'r TypeRegistry,
    options: SchemaOptions,
}

impl<'r> SchemaGraphBuilder<'r> {
    pub fn new(registry: &'r TypeRegistry, mut options: SchemaOptions) -> Self {
        options.base_url = options.base_url.trim_end_matches('/').to_string();
        Self { registry, options }
    }

    pub fn options(&self) -> &SchemaOptions { &self.options }

    /// Root documents on the target base URL.
    pub fn build(&self) -> Result<Vec<SchemaDocument>, SchemaError> {
        let docs = self.build_all()?;
        Ok(docs.into_iter().filter(|doc| doc.base_url == self.options.base_url).collect())
    }

    /// Root documents on every base URL.
    pub fn build_all(&self) -> Result<Vec<SchemaDocument>, SchemaError> {
        let graph = graph::build_graph(self.registry, &self.options)?;
        let docs: Vec<SchemaDocument> =
            graph.roots().map(|root| render::render_document(&graph, root, &self.options)).collect();
        debug!(documents = docs.len(), base_url = %self.options.base_url, "schemas rendered");
        Ok(docs)
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Interface, PolymorphicValue, Variant};
    use crate::demo::{self, Circle, Shape, Square};
    use crate::document::{Documentable, PrimitiveType, PropertyDescriptor, TypeDescription};
    use crate::registry::Serializer;
    use serde_json::json;

    fn find<'a>(docs: &'a [SchemaDocument], name: &str) -> &'a serde_json::Value {
        &docs.iter().find(|doc| doc.name == name).unwrap().json
    }

    #[test]
    fn shape_family_document() {
        let registry = TypeRegistry::new().with_serializer(
            Serializer::<dyn Shape>::new().with(Circle { radius: 2.5 }).with(Square { side: 1.0, label: None }),
        );
        let docs = SchemaGraphBuilder::new(&registry, SchemaOptions::default()).build().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_name(), "Shape.json");

        let shape = &docs[0].json;
        assert_eq!(shape["$schema"], json!(render::DRAFT_07));
        assert_eq!(shape["$id"], json!("https://example.org/schemas/Shape.json"));
        assert_eq!(shape["title"], json!("Shape"));
        assert_eq!(shape["properties"]["type"], json!({"$ref": "#ShapeType"}));
        assert_eq!(shape["required"], json!(["type"]));
        assert_eq!(shape.get("additionalProperties"), None);

        let definitions = shape["definitions"].as_object().unwrap();
        assert_eq!(definitions.keys().collect::<Vec<_>>(), vec!["ShapeType", "Circle", "Square"]);
        assert_eq!(definitions["ShapeType"]["enum"], json!(["circle", "square", "polygon", "sticker"]));
        assert_eq!(
            definitions["Circle"],
            json!({
                "$id": "#Circle",
                "type": "object",
                "title": "Circle",
                "properties": {
                    "type": {"$ref": "#ShapeType", "const": "circle"},
                    "radius": {"type": "number"}
                },
                "required": ["type", "radius"],
                "allOf": [{"$ref": "#Shape"}],
                "additionalProperties": false,
                "examples": [{"type": "circle", "radius": 2.5}]
            })
        );
        assert_eq!(definitions["Square"]["allOf"], json!([{"$ref": "#Shape"}]));
        assert_eq!(definitions["Square"]["required"], json!(["type", "side"]));
        // the interface carries every variant's examples
        assert_eq!(
            shape["examples"],
            json!([{"type": "circle", "radius": 2.5}, {"type": "square", "side": 1.0}])
        );
    }

    #[test]
    fn inherited_fields_are_not_redeclared() {
        let docs = SchemaGraphBuilder::new(&demo::registry(), SchemaOptions::default()).build().unwrap();
        let square = &find(&docs, "Shape")["definitions"]["Square"];
        assert_eq!(square["properties"].get("label"), None);
        assert_eq!(square["properties"]["side"], json!({"type": "number"}));
    }

    trait Layer: PolymorphicValue {}

    impl Interface for dyn Layer {
        const NAME: &'static str = "Layer";

        fn describe() -> TypeDescription {
            TypeDescription::object("Layer")
                .required("type", PropertyDescriptor::Primitive(PrimitiveType::String))
                .required("name", PropertyDescriptor::Primitive(PrimitiveType::String))
        }

        fn as_polymorphic(&self) -> &dyn PolymorphicValue { self.as_value() }
        fn into_polymorphic(self: Box<Self>) -> Box<dyn PolymorphicValue> { self.into_value() }
    }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Fill { name: String, color: String }

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Tag { name: i64 }

    crate::serde_codable!(Fill, Tag);

    impl Documentable for Fill {
        fn describe() -> TypeDescription {
            TypeDescription::object("Fill")
                .required("name", PropertyDescriptor::Primitive(PrimitiveType::String))
                .required("color", PropertyDescriptor::Primitive(PrimitiveType::String))
        }
    }

    impl Documentable for Tag {
        fn describe() -> TypeDescription {
            TypeDescription::object("Tag").required("name", PropertyDescriptor::Primitive(PrimitiveType::Integer))
        }
    }

    impl Variant for Fill {
        const TYPE_NAME: Option<&'static str> = Some("fill");
    }
    impl Variant for Tag {
        const TYPE_NAME: Option<&'static str> = Some("tag");
    }
    impl Layer for Fill {}
    impl Layer for Tag {}
    crate::implements!(dyn Layer => Fill, Tag);

    #[test]
    fn inherited_required_fields_are_not_redeclared() {
        let registry = TypeRegistry::new().with_serializer(
            Serializer::<dyn Layer>::new()
                .with(Fill { name: "sky".into(), color: "blue".into() })
                .with(Tag { name: 7 }),
        );
        let docs = SchemaGraphBuilder::new(&registry, SchemaOptions::default()).build().unwrap();
        let layer = find(&docs, "Layer");
        assert_eq!(layer["required"], json!(["type", "name"]));

        // same key, same descriptor: left to the interface
        let fill = &layer["definitions"]["Fill"];
        assert_eq!(fill["properties"].get("name"), None);
        assert_eq!(fill["required"], json!(["type", "color"]));
        assert_eq!(fill["allOf"], json!([{"$ref": "#Layer"}]));

        // same key, different descriptor: declared again
        let tag = &layer["definitions"]["Tag"];
        assert_eq!(tag["properties"]["name"], json!({"type": "integer"}));
        assert_eq!(tag["required"], json!(["type", "name"]));
    }

    #[test]
    fn shared_types_get_their_own_document() {
        let docs = SchemaGraphBuilder::new(&demo::registry(), SchemaOptions::default()).build().unwrap();
        let names: Vec<_> = docs.iter().map(|doc| doc.name.as_str()).collect();
        assert_eq!(names, vec!["Drawing", "Shape", "Point"]);

        let drawing = find(&docs, "Drawing");
        assert_eq!(drawing["properties"]["origin"], json!({"$ref": "Point.json"}));
        assert_eq!(drawing["properties"]["shapes"], json!({"type": "array", "items": {"$ref": "Shape.json"}}));
        assert_eq!(drawing["properties"]["created"], json!({"type": "string", "format": "date-time"}));
        assert_eq!(drawing["required"], json!(["title", "origin", "shapes"]));
        assert_eq!(drawing.get("definitions"), None);

        let polygon = &find(&docs, "Shape")["definitions"]["Polygon"];
        assert_eq!(polygon["properties"]["points"], json!({"type": "array", "items": {"$ref": "Point.json"}}));
        assert_eq!(polygon.get("additionalProperties"), None);

        let point = find(&docs, "Point");
        assert_eq!(point["additionalProperties"], json!(false));
        assert_eq!(point.get("definitions"), None);
    }

    #[test]
    fn examples_can_be_left_out() {
        let docs = SchemaGraphBuilder::new(&demo::registry(), SchemaOptions::default().without_examples())
            .build()
            .unwrap();
        assert!(docs.iter().all(|doc| doc.json.get("examples").is_none()));
        assert_eq!(find(&docs, "Shape")["definitions"]["Circle"].get("examples"), None);
    }

    struct Palette;
    struct Swatch;
    impl Documentable for Palette {
        fn describe() -> TypeDescription {
            TypeDescription::object("Palette")
                .required("swatches", PropertyDescriptor::reference_dictionary::<Swatch>())
                .optional("favorite", PropertyDescriptor::interface(<dyn Shape as Interface>::NAME))
        }
    }
    impl Documentable for Swatch {
        fn describe() -> TypeDescription {
            TypeDescription::string_literal("Swatch", Some("^#[0-9a-f]{6}$"))
                .with_base_url("https://colors.example.com/")
        }
    }

    #[test]
    fn references_across_base_urls() {
        let registry = demo::registry().with_root::<Palette>();
        let builder = SchemaGraphBuilder::new(&registry, SchemaOptions::new("https://example.org/schemas/"));

        let docs = builder.build().unwrap();
        assert!(docs.iter().all(|doc| doc.base_url == "https://example.org/schemas"));
        let palette = find(&docs, "Palette");
        assert_eq!(
            palette["properties"]["swatches"],
            json!({"type": "object", "additionalProperties": {"$ref": "https://colors.example.com/Swatch.json"}})
        );
        assert_eq!(palette["properties"]["favorite"], json!({"$ref": "Shape.json"}));

        let all = builder.build_all().unwrap();
        let swatch = find(&all, "Swatch");
        assert_eq!(swatch["$id"], json!("https://colors.example.com/Swatch.json"));
        assert_eq!(swatch["type"], json!("string"));
        assert_eq!(swatch["pattern"], json!("^#[0-9a-f]{6}$"));
    }

    struct Badge;
    impl Documentable for Badge {
        fn describe() -> TypeDescription {
            TypeDescription::object("Badge")
                .required("shape", PropertyDescriptor::reference::<demo::ShapeType>())
                .optional("size", PropertyDescriptor::Primitive(PrimitiveType::Integer))
        }
    }

    #[test]
    fn definitions_of_other_documents() {
        let registry = demo::registry().with_root::<Badge>();
        let docs = SchemaGraphBuilder::new(&registry, SchemaOptions::default()).build().unwrap();
        // ShapeType is now reachable from two roots
        let badge = find(&docs, "Badge");
        assert_eq!(badge["properties"]["shape"], json!({"$ref": "ShapeType.json"}));
        let circle = &find(&docs, "Shape")["definitions"]["Circle"];
        assert_eq!(circle["properties"]["type"], json!({"$ref": "ShapeType.json", "const": "circle"}));
    }

    struct Boxed<T>(std::marker::PhantomData<T>);
    impl<T> Documentable for Boxed<T> {
        fn describe() -> TypeDescription {
            TypeDescription::object("Boxed").optional("size", PropertyDescriptor::Primitive(PrimitiveType::Integer))
        }
    }

    struct Crate;
    impl Documentable for Crate {
        fn describe() -> TypeDescription {
            TypeDescription::object("Crate")
                .required("small", PropertyDescriptor::reference::<Boxed<u8>>())
                .required("large", PropertyDescriptor::reference::<Boxed<u64>>())
        }
    }

    #[test]
    fn generic_instantiations_are_distinct_types() {
        let registry = TypeRegistry::new().with_root::<Crate>();
        let err = SchemaGraphBuilder::new(&registry, SchemaOptions::default()).build().unwrap_err();
        assert_eq!(err, SchemaError::DuplicateTypeName { name: "Boxed".into() });
    }

    struct Pin;
    impl Documentable for Pin {
        fn describe() -> TypeDescription {
            TypeDescription::object("Pin").required("marker", PropertyDescriptor::reference::<Circle>())
        }
    }

    #[test]
    fn promoted_variants_point_back_into_the_interface_document() {
        let registry = demo::registry().with_root::<Pin>();
        let docs = SchemaGraphBuilder::new(&registry, SchemaOptions::default()).build().unwrap();
        assert_eq!(find(&docs, "Pin")["properties"]["marker"], json!({"$ref": "Circle.json"}));

        let circle = find(&docs, "Circle");
        assert_eq!(circle["$id"], json!("https://example.org/schemas/Circle.json"));
        assert_eq!(circle["properties"]["type"], json!({"$ref": "Shape.json#ShapeType", "const": "circle"}));
        assert_eq!(circle["allOf"], json!([{"$ref": "Shape.json"}]));
        let definitions = find(&docs, "Shape")["definitions"].as_object().unwrap();
        assert!(!definitions.contains_key("Circle"));
    }
}
