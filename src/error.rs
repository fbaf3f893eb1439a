use thiserror::Error;

/// Decode/encode failures.
///
/// Data errors (`TypeMismatch`, `MissingField`, `Data`) carry a JSON path relative
/// to the value handed to the codec; containers prepend their own segment as the
/// error bubbles out. Dispatch errors are passed through untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("no serializer registered for interface `{0}`")]
    UnregisteredInterface(String),

    #[error("`{interface}` object has no string `{key}` discriminator")]
    DiscriminatorMissing { interface: String, key: String },

    #[error("unknown `{interface}` variant `{discriminator}`")]
    UnknownVariant { interface: String, discriminator: String },

    #[error("`{0}` can only be encoded as a JSON object")]
    InvalidEncodingContext(String),

    #[error("at ${path}: expected {expected}, found {found}")]
    TypeMismatch { path: String, expected: &'static str, found: &'static str },

    #[error("at ${path}: missing required field")]
    MissingField { path: String },

    #[error("at ${path}: {message}")]
    Data { path: String, message: String },

    #[error("invalid JSON at ${path}: {message}")]
    Syntax { path: String, message: String },

    #[error("non-finite number {0} needs a non-conforming float strategy")]
    NonConformingFloat(f64),
}

impl CodecError {
    pub fn mismatch(expected: &'static str, found: &crate::JsonValue) -> Self {
        CodecError::TypeMismatch { path: String::new(), expected, found: found.kind() }
    }

    pub fn data(message: impl Into<String>) -> Self {
        CodecError::Data { path: String::new(), message: message.into() }
    }

    /// Prefix the error path with an object key.
    pub fn at_key(self, key: &str) -> Self {
        self.prefixed(&format!(".{key}"))
    }

    /// Prefix the error path with an array index.
    pub fn at_index(self, index: usize) -> Self {
        self.prefixed(&format!("[{index}]"))
    }

    fn prefixed(self, segment: &str) -> Self {
        match self {
            CodecError::TypeMismatch { path, expected, found } => {
                CodecError::TypeMismatch { path: format!("{segment}{path}"), expected, found }
            }
            CodecError::MissingField { path } => {
                CodecError::MissingField { path: format!("{segment}{path}") }
            }
            CodecError::Data { path, message } => {
                CodecError::Data { path: format!("{segment}{path}"), message }
            }
            other => other,
        }
    }
}

/// Schema build failures. Any of these aborts the whole build.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("interface `{interface}` referenced by `{referenced_by}` is not registered")]
    MissingInterfaceRegistration { interface: String, referenced_by: String },

    #[error("cannot classify `{name}`: {reason}")]
    UnclassifiableType { name: String, reason: String },

    #[error("`{type_name}` does not declare a field `{key}`")]
    InvalidCodingKey { type_name: String, key: String },

    #[error("`{0}` is not usable as a schema name")]
    InvalidTypeName(String),

    #[error("`{name}` is described by two different types")]
    DuplicateTypeName { name: String },

    #[error("example of `{type_name}` failed to encode: {source}")]
    Example { type_name: String, source: CodecError },
}

/// Advisory findings from [`crate::TypeRegistry::validate`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryWarning {
    #[error("`{interface}` example `{discriminator}` does not round-trip: {reason}")]
    RoundTrip { interface: String, discriminator: String, reason: String },

    #[error("`{interface}` example registered as `{registered}` encodes as `{encoded}`")]
    DiscriminatorMismatch { interface: String, registered: String, encoded: String },

    #[error("`{interface}` variant `{discriminator}` has no examples")]
    NoExamples { interface: String, discriminator: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_accumulate_outwards() {
        let err = CodecError::mismatch("number", &crate::JsonValue::from("x"))
            .at_key("radius")
            .at_index(2)
            .at_key("shapes");
        assert_eq!(err.to_string(), "at $.shapes[2].radius: expected number, found string");
    }

    #[test]
    fn dispatch_errors_keep_their_shape() {
        let err = CodecError::UnknownVariant {
            interface: "Shape".into(),
            discriminator: "triangle".into(),
        };
        assert_eq!(err.clone().at_key("shape"), err);
    }
}
