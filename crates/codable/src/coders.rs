//! User-supplied helper coders substituted for a field's native
//! decode/encode via `#[codable(with = ...)]`.

use crate::error::CodableError;
use crate::{type_name_of, Value};

/// A custom decode/encode routine for one field.
///
/// The derive evaluates the `with = ...` expression once per call site,
/// so coders are typically unit structs exposed as constants.
pub trait HelperCoder {
    type Value;

    fn decode(&self, value: &Value) -> Result<Self::Value, CodableError>;
    fn encode(&self, value: &Self::Value) -> Result<Value, CodableError>;
}

/// Codes an `i64` that travels as a decimal string.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberAsString;

impl HelperCoder for NumberAsString {
    type Value = i64;

    fn decode(&self, value: &Value) -> Result<i64, CodableError> {
        match value {
            Value::String(s) => s
                .parse::<i64>()
                .map_err(|_| CodableError::type_mismatch("numeric string", s.clone())),
            other => Err(CodableError::type_mismatch(
                "numeric string",
                type_name_of(other),
            )),
        }
    }

    fn encode(&self, value: &i64) -> Result<Value, CodableError> {
        Ok(Value::String(value.to_string()))
    }
}

/// Codes a `bool` that travels as `0`/`1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolAsInt;

impl HelperCoder for BoolAsInt {
    type Value = bool;

    fn decode(&self, value: &Value) -> Result<bool, CodableError> {
        match value.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            Some(n) => Err(CodableError::type_mismatch("0 or 1", n.to_string())),
            None => Err(CodableError::type_mismatch("0 or 1", type_name_of(value))),
        }
    }

    fn encode(&self, value: &bool) -> Result<Value, CodableError> {
        Ok(Value::from(if *value { 1 } else { 0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn number_as_string_round_trips() {
        let coder = NumberAsString;
        assert_eq!(coder.decode(&json!("42")).unwrap(), 42);
        assert_eq!(coder.encode(&42).unwrap(), json!("42"));
        assert!(coder.decode(&json!(42)).is_err());
        assert!(coder.decode(&json!("nope")).is_err());
    }

    #[test]
    fn bool_as_int_rejects_other_numbers() {
        let coder = BoolAsInt;
        assert_eq!(coder.decode(&json!(1)).unwrap(), true);
        assert_eq!(coder.decode(&json!(0)).unwrap(), false);
        assert!(coder.decode(&json!(2)).is_err());
        assert_eq!(coder.encode(&true).unwrap(), json!(1));
    }
}
