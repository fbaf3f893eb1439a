//! CLI over the demo registry: schema | decode | validate | list
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::debug;

use crate::codec::{CodecOptions, PolymorphicCodec, ResourceContext};
use crate::schema::{DEFAULT_BASE_URL, SchemaGraphBuilder, SchemaOptions};
use crate::value::JsonValue;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// decode/encode polymorphic JSON and generate JSON Schema for the registered families
#[derive(Parser, Debug)]
#[command(name = "json-sealed", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// write one JSON Schema document per root type
    Schema(SchemaOut),
    /// decode documents against an interface and re-encode them
    Decode(DecodeOut),
    /// round-trip every registered example
    Validate,
    /// print registered interfaces and their discriminators
    List,
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/shapes)
    #[arg(long)]
    json_pointer: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct SchemaOut {
    /// base URL of the generated documents
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// output directory (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// leave `examples` out of every document
    #[arg(long)]
    no_examples: bool,
}

#[derive(clap::Parser, Debug)]
struct DecodeOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// interface each document (or array element) belongs to
    #[arg(long, default_value = "Shape")]
    interface: String,

    /// emit fields in their documented order
    #[arg(long)]
    ordered_keys: bool,

    /// bundle attached to every decoded value
    #[arg(long)]
    bundle: Option<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Calls `apply` with a label and the selected value of every input document.
    fn load_process(&self, mut apply: impl FnMut(String, JsonValue)) -> Result<()> {
        let source_paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file ({source_path_str})"))?;
            let documents: Vec<(String, &str)> = if self.ndjson {
                source
                    .lines()
                    .enumerate()
                    .filter(|(_, line)| !line.trim().is_empty())
                    .map(|(i, line)| (format!("{source_path_str}:{}", i + 1), line))
                    .collect()
            } else {
                vec![(source_path_str.clone(), source.as_str())]
            };
            for (label, text) in documents {
                let json_value: JsonValue = crate::path_de::from_str_with_path(text)
                    .with_context(|| format!("failed to parse JSON source ({label})"))?;
                let json_value = match self.json_pointer.as_deref() {
                    None => json_value,
                    Some(pointer) => json_value
                        .pointer(pointer)
                        .cloned()
                        .ok_or_else(|| anyhow!("json pointer {pointer} matched nothing in {label}"))?,
                };
                apply(label, json_value);
            }
        }
        Ok(())
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        let registry = crate::demo::registry();
        match &self.cmd {
            Command::Schema(target) => {
                let mut options = SchemaOptions::new(target.base_url.clone());
                options.include_examples = !target.no_examples;
                let docs = SchemaGraphBuilder::new(&registry, options).build()?;
                match target.out.as_ref() {
                    Some(out) => {
                        std::fs::create_dir_all(out)
                            .with_context(|| format!("failed to create {}", out.display()))?;
                        for doc in &docs {
                            let path = out.join(doc.file_name());
                            std::fs::write(&path, doc.to_pretty_string()?)
                                .with_context(|| format!("failed to write {}", path.display()))?;
                            eprintln!("✅ {}", path.display());
                        }
                    }
                    None => {
                        let all: serde_json::Map<String, serde_json::Value> =
                            docs.into_iter().map(|doc| (doc.name, doc.json)).collect();
                        println!("{}", serde_json::to_string_pretty(&all)?);
                    }
                }
                Ok(())
            }
            Command::Decode(target) => {
                let serializer = registry
                    .serializer_named(&target.interface)
                    .ok_or_else(|| anyhow!("unknown interface `{}`", target.interface))?;
                let key = serializer.discriminator_key();
                let mut codec = PolymorphicCodec::new(&registry)
                    .with_options(CodecOptions { ordered_keys: target.ordered_keys, ..CodecOptions::default() });
                if let Some(bundle) = target.bundle.as_ref() {
                    codec = codec.with_resources(ResourceContext::bundle(bundle.clone()));
                }

                let round_trip = |value: &JsonValue| -> Result<JsonValue, crate::CodecError> {
                    match value {
                        JsonValue::Array(_) => codec
                            .decode_array_named(&target.interface, value)?
                            .iter()
                            .enumerate()
                            .map(|(i, decoded)| codec.encode_value(&**decoded, key).map_err(|e| e.at_index(i)))
                            .collect::<Result<Vec<_>, _>>()
                            .map(JsonValue::Array),
                        other => {
                            let decoded = codec.decode_named(&target.interface, other)?;
                            codec.encode_value(&*decoded, key)
                        }
                    }
                };

                let mut encoded = Vec::<serde_json::Value>::new();
                let (mut total, mut failed) = (0usize, 0usize);
                target.input_settings.load_process(|label, value| {
                    total += 1;
                    match round_trip(&value) {
                        Ok(value) => {
                            eprintln!("{} {label}", "✅".green());
                            encoded.push(serde_json::Value::from(value));
                        }
                        Err(error) => {
                            failed += 1;
                            eprintln!("{} {label}: {}", "❌".red(), error.to_string().red());
                        }
                    }
                })?;
                debug!(total, failed, "decode finished");

                let output = serde_json::to_string_pretty(&encoded)?;
                match target.out.as_ref() {
                    Some(out) => {
                        if let Some(parent) = out.parent() {
                            std::fs::create_dir_all(parent)?;
                        }
                        std::fs::write(out, &output).with_context(|| format!("failed to write {}", out.display()))?;
                    }
                    None => println!("{output}"),
                }
                if failed > 0 {
                    return Err(anyhow!("{failed} of {total} documents failed to decode"));
                }
                Ok(())
            }
            Command::Validate => {
                let warnings = registry.validate(&CodecOptions::default());
                for serializer in registry.interfaces() {
                    for discriminator in serializer.discriminators() {
                        let mark = if warnings.iter().any(|w| warning_concerns(w, serializer.interface_name(), &discriminator)) {
                            "❌".red()
                        } else {
                            "✅".green()
                        };
                        eprintln!("{mark} {}/{discriminator}", serializer.interface_name());
                    }
                }
                for warning in &warnings {
                    eprintln!("   {}", warning.to_string().yellow());
                }
                if !warnings.is_empty() {
                    return Err(anyhow!("{} registry warnings", warnings.len()));
                }
                Ok(())
            }
            Command::List => {
                for serializer in registry.interfaces() {
                    println!("{} (discriminator `{}`)", serializer.interface_name().bold(), serializer.discriminator_key());
                    for discriminator in serializer.discriminators() {
                        println!("  - {discriminator}");
                    }
                }
                for root in registry.roots() {
                    println!("{} (root document)", root.describe().name.bold());
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn warning_concerns(warning: &crate::RegistryWarning, interface: &str, discriminator: &str) -> bool {
    use crate::RegistryWarning::*;
    match warning {
        RoundTrip { interface: i, discriminator: d, .. } | NoExamples { interface: i, discriminator: d } => {
            i == interface && d == discriminator
        }
        DiscriminatorMismatch { interface: i, registered, .. } => i == interface && registered == discriminator,
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // explicit glob that matched nothing is an error
                return Err(anyhow!("glob pattern matched no files: {pattern}"));
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decode_flags() {
        let cli = CommandLineInterface::try_parse_from([
            "json-sealed", "decode", "--interface", "Shape", "-i", "a.json", "b/*.json", "--ordered-keys",
        ])
        .unwrap();
        let Command::Decode(decode) = cli.cmd else { panic!("expected decode") };
        assert_eq!(decode.input_settings.input, vec!["a.json", "b/*.json"]);
        assert!(decode.ordered_keys);
        assert!(!decode.input_settings.ndjson);
    }

    #[test]
    fn schema_defaults() {
        let cli = CommandLineInterface::try_parse_from(["json-sealed", "schema"]).unwrap();
        let Command::Schema(schema) = cli.cmd else { panic!("expected schema") };
        assert_eq!(schema.base_url, DEFAULT_BASE_URL);
        assert!(!schema.no_examples);
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["does/not/exist.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("does/not/exist.json")]);
        assert!(resolve_file_path_patterns(["/definitely/missing/*.json"]).is_err());
    }
}
