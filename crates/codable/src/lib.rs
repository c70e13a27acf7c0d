//! Key-path driven encode/decode over keyed containers.
//!
//! `#[derive(Codable)]` synthesizes [`Decode`] and [`Encode`]
//! implementations from per-field `#[codable(...)]` attributes: nested
//! key paths, missing/error default fallbacks, helper coders, and tagged
//! enum discrimination. The container model is `serde_json::Value`; the
//! generated code only goes through the primitives in [`container`] and
//! [`helpers`].

pub mod coders;
pub mod container;
pub mod convert;
pub mod error;
pub mod helpers;

pub use coders::{BoolAsInt, HelperCoder, NumberAsString};
pub use codable_derive::Codable;
pub use container::{as_object, nested, nested_mut, nested_opt, probe, Probe};
pub use error::{CodableError, ErrorKind};
pub use helpers::Decoded;

pub use serde_json::Value;

/// The keyed container type. `preserve_order` is enabled so encoded key
/// order follows write order.
pub type Map = serde_json::Map<String, Value>;

/// Decodes a value of this type from a keyed-container tree.
pub trait Decode: Sized {
    fn decode(value: &Value) -> Result<Self, CodableError>;
}

/// Encodes this value into a keyed-container tree.
pub trait Encode {
    fn encode(&self) -> Result<Value, CodableError>;
}

pub fn type_name_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn from_value<T: Decode>(value: &Value) -> Result<T, CodableError> {
    T::decode(value)
}

pub fn to_value<T: Encode + ?Sized>(value: &T) -> Result<Value, CodableError> {
    value.encode()
}

/// Parses JSON text and decodes it in one step.
pub fn from_str<T: Decode>(contents: &str) -> Result<T, CodableError> {
    let value: Value =
        serde_json::from_str(contents).map_err(|err| CodableError::parse(err.to_string()))?;
    T::decode(&value)
}

/// Encodes a value and serializes it to JSON text.
pub fn to_string<T: Encode + ?Sized>(value: &T) -> Result<String, CodableError> {
    let encoded = value.encode()?;
    serde_json::to_string(&encoded).map_err(|err| CodableError::parse(err.to_string()))
}
