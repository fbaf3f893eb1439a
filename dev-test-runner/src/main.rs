//! Round-trips the demo registry, then any JSON files given on the command line.
//!
//! Files holding an object with a `type` key are read as a `Shape`, anything
//! else as a `Drawing`.
use anyhow::{Context, Result, bail};
use colored::Colorize;
use json_sealed::demo::{self, Drawing, Shape};
use json_sealed::{CodecOptions, Documentable, Interface, JsonValue, PolymorphicCodec, TypeRegistry};

fn round_trip(codec: &PolymorphicCodec<'_>, value: &JsonValue) -> Result<JsonValue> {
    if value.get("type").is_some() {
        let shape = codec.decode::<dyn Shape>(value)?;
        Ok(codec.encode::<dyn Shape>(&*shape)?)
    } else {
        let drawing = codec.decode_document::<Drawing>(value)?;
        Ok(codec.encode_document(&drawing)?)
    }
}

fn check(codec: &PolymorphicCodec<'_>, label: &str, value: &JsonValue) -> bool {
    match round_trip(codec, value) {
        Ok(encoded) if &encoded == value => {
            eprintln!("{} {label}", "✅".green());
            true
        }
        Ok(encoded) => {
            eprintln!("{} {label}: re-encoded as {encoded}", "❌".red());
            false
        }
        Err(error) => {
            eprintln!("{} {label}: {}", "❌".red(), format!("{error:#}").red());
            false
        }
    }
}

fn run_registry_examples(registry: &TypeRegistry) -> usize {
    let codec = PolymorphicCodec::new(registry);
    let mut failures = registry.validate(&CodecOptions::default()).len();
    for example in Drawing::describe().examples {
        if !check(&codec, "Drawing example", &example) {
            failures += 1;
        }
    }
    if let Some(serializer) = registry.serializer_for::<dyn Shape>() {
        for example in serializer.examples() {
            let label = format!("Shape example `{}`", example.as_polymorphic().discriminator());
            match codec.encode::<dyn Shape>(example) {
                Ok(encoded) if check(&codec, &label, &encoded) => {}
                Ok(_) => failures += 1,
                Err(error) => {
                    eprintln!("{} {label}: {error}", "❌".red());
                    failures += 1;
                }
            }
        }
    }
    failures
}

fn main() -> Result<()> {
    let registry = demo::registry();
    let codec = PolymorphicCodec::new(&registry);
    let mut failures = run_registry_examples(&registry);

    for path in std::env::args().skip(1) {
        let source = std::fs::read_to_string(&path).with_context(|| format!("failed to read {path}"))?;
        let value: JsonValue = source.parse().with_context(|| format!("failed to parse {path}"))?;
        if !check(&codec, &path, &value) {
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} round-trip failures");
    }
    Ok(())
}
