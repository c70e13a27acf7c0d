use std::fmt;

/// Error produced by generated decode/encode entry points.
///
/// Carries enough context to point at the offending type, field, and
/// container key without holding onto the input value.
#[derive(Debug, Clone)]
pub struct CodableError {
    pub type_name: String,
    pub field_name: Option<String>,
    pub key: Option<String>,
    pub kind: ErrorKind,
}

#[derive(Debug, Clone)]
pub enum ErrorKind {
    MissingKey,
    TypeMismatch { expected: &'static str, actual: String },
    OutOfRange { value: String, target_type: &'static str },
    InvalidContainer { actual: String },
    NoVariantMatched { tag: String, valid_tags: Vec<String> },
    Parse(String),
    Custom(String),
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MissingKey => write!(f, "required key is missing"),
            ErrorKind::TypeMismatch { expected, actual } => {
                write!(f, "type mismatch: expected {expected}, found {actual}")
            }
            ErrorKind::OutOfRange { value, target_type } => {
                write!(f, "value '{value}' is out of range for {target_type}")
            }
            ErrorKind::InvalidContainer { actual } => {
                write!(f, "expected a keyed container, found {actual}")
            }
            ErrorKind::NoVariantMatched { tag, valid_tags } => {
                write!(
                    f,
                    "no variant matched tag '{tag}', expected one of: {}",
                    valid_tags.join(", ")
                )
            }
            ErrorKind::Parse(msg) => write!(f, "parse error: {msg}"),
            ErrorKind::Custom(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for CodableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error decoding {}", self.type_name)?;

        if let Some(ref field) = self.field_name {
            write!(f, " field '{field}'")?;
        }

        if let Some(ref key) = self.key {
            if self.field_name.as_deref() != Some(key.as_str()) {
                write!(f, " (key: '{key}')")?;
            }
        }

        write!(f, ": {}", self.kind)
    }
}

impl std::error::Error for CodableError {}

impl CodableError {
    pub fn missing_key(
        type_name: impl Into<String>,
        field_name: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: Some(field_name.into()),
            key: Some(key.into()),
            kind: ErrorKind::MissingKey,
        }
    }

    pub fn type_mismatch(expected: &'static str, actual: impl Into<String>) -> Self {
        Self {
            type_name: String::new(),
            field_name: None,
            key: None,
            kind: ErrorKind::TypeMismatch { expected, actual: actual.into() },
        }
    }

    pub fn out_of_range(value: impl Into<String>, target_type: &'static str) -> Self {
        Self {
            type_name: String::new(),
            field_name: None,
            key: None,
            kind: ErrorKind::OutOfRange { value: value.into(), target_type },
        }
    }

    pub fn invalid_container(
        type_name: impl Into<String>,
        key: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let key = key.into();
        Self {
            type_name: type_name.into(),
            field_name: None,
            key: (!key.is_empty()).then_some(key),
            kind: ErrorKind::InvalidContainer { actual: actual.into() },
        }
    }

    pub fn no_variant_matched(
        type_name: impl Into<String>,
        tag: impl Into<String>,
        valid_tags: Vec<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: None,
            key: None,
            kind: ErrorKind::NoVariantMatched { tag: tag.into(), valid_tags },
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            type_name: String::new(),
            field_name: None,
            key: None,
            kind: ErrorKind::Parse(message.into()),
        }
    }

    pub fn custom(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            field_name: None,
            key: None,
            kind: ErrorKind::Custom(message.into()),
        }
    }

    /// Fills in type/field/key context on an error bubbling out of a
    /// nested decode, without clobbering context the inner decode set.
    pub fn with_field(mut self, type_name: &str, field_name: &str, key: &str) -> Self {
        if self.type_name.is_empty() {
            self.type_name = type_name.to_string();
        }
        if self.field_name.is_none() {
            self.field_name = Some(field_name.to_string());
        }
        if self.key.is_none() {
            self.key = Some(key.to_string());
        }
        self
    }
}
