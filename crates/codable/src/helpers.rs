//! Terminal decode/encode forms invoked by derive-generated code.
//!
//! Everything here operates on a single keyed container level; the
//! generated code is responsible for walking the key-path tree and
//! picking the right form per field.

use crate::coders::HelperCoder;
use crate::error::CodableError;
use crate::{Decode, Encode, Map, Value};

/// Outcome of a fallback-aware field decode. Presence is checked before
/// any decode is attempted so the missing/error defaults stay distinct.
pub enum Decoded<T> {
    Value(T),
    Missing,
    Error(CodableError),
}

pub fn decode_required<T: Decode>(
    obj: &Map,
    key: &str,
    type_name: &str,
    field_name: &str,
) -> Result<T, CodableError> {
    match obj.get(key) {
        Some(value) => {
            T::decode(value).map_err(|err| err.with_field(type_name, field_name, key))
        }
        None => Err(CodableError::missing_key(type_name, field_name, key)),
    }
}

/// Presence-tolerant decode for `Option` fields: absent key and explicit
/// null both read as `None`; a present value of the wrong shape is still
/// an error.
pub fn decode_optional<T: Decode>(
    obj: &Map,
    key: &str,
    type_name: &str,
    field_name: &str,
) -> Result<Option<T>, CodableError> {
    match obj.get(key) {
        Some(value) => Option::<T>::decode(value)
            .map_err(|err| err.with_field(type_name, field_name, key)),
        None => Ok(None),
    }
}

pub fn try_decode<T: Decode>(obj: &Map, key: &str) -> Decoded<T> {
    match obj.get(key) {
        Some(value) => match T::decode(value) {
            Ok(decoded) => Decoded::Value(decoded),
            Err(err) => Decoded::Error(err),
        },
        None => Decoded::Missing,
    }
}

pub fn decode_required_with<H: HelperCoder>(
    helper: &H,
    obj: &Map,
    key: &str,
    type_name: &str,
    field_name: &str,
) -> Result<H::Value, CodableError> {
    match obj.get(key) {
        Some(value) => helper
            .decode(value)
            .map_err(|err| err.with_field(type_name, field_name, key)),
        None => Err(CodableError::missing_key(type_name, field_name, key)),
    }
}

pub fn decode_optional_with<H: HelperCoder>(
    helper: &H,
    obj: &Map,
    key: &str,
    type_name: &str,
    field_name: &str,
) -> Result<Option<H::Value>, CodableError> {
    match obj.get(key) {
        Some(Value::Null) | None => Ok(None),
        Some(value) => helper
            .decode(value)
            .map(Some)
            .map_err(|err| err.with_field(type_name, field_name, key)),
    }
}

pub fn try_decode_with<H: HelperCoder>(helper: &H, obj: &Map, key: &str) -> Decoded<H::Value> {
    match obj.get(key) {
        Some(value) => match helper.decode(value) {
            Ok(decoded) => Decoded::Value(decoded),
            Err(err) => Decoded::Error(err),
        },
        None => Decoded::Missing,
    }
}

pub fn encode_field<T: Encode>(
    obj: &mut Map,
    key: &str,
    value: &T,
) -> Result<(), CodableError> {
    obj.insert(key.to_string(), value.encode()?);
    Ok(())
}

/// `None` writes nothing, mirroring the presence-tolerant decode.
pub fn encode_optional<T: Encode>(
    obj: &mut Map,
    key: &str,
    value: &Option<T>,
) -> Result<(), CodableError> {
    if let Some(inner) = value {
        obj.insert(key.to_string(), inner.encode()?);
    }
    Ok(())
}

pub fn encode_field_with<H: HelperCoder>(
    helper: &H,
    obj: &mut Map,
    key: &str,
    value: &H::Value,
) -> Result<(), CodableError> {
    obj.insert(key.to_string(), helper.encode(value)?);
    Ok(())
}

pub fn encode_optional_with<H: HelperCoder>(
    helper: &H,
    obj: &mut Map,
    key: &str,
    value: &Option<H::Value>,
) -> Result<(), CodableError> {
    if let Some(inner) = value {
        obj.insert(key.to_string(), helper.encode(inner)?);
    }
    Ok(())
}

/// Lenient string probe used by the tag-probing union strategy: absence,
/// null, and non-string shapes all read as "no tag".
pub fn probe_string(obj: &Map, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

/// Merges a delegated payload object into a container that already holds
/// the discriminator; the tag written first is never overwritten.
pub fn merge_payload(
    obj: &mut Map,
    payload: Value,
    type_name: &str,
) -> Result<(), CodableError> {
    match payload {
        Value::Object(entries) => {
            for (key, value) in entries {
                obj.entry(key).or_insert(value);
            }
            Ok(())
        }
        other => Err(CodableError::custom(
            type_name,
            format!(
                "tagged payload must encode to a keyed container, found {}",
                crate::type_name_of(&other)
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn decode_optional_tolerates_absence_and_null() {
        let map = obj(json!({"a": null, "b": "x"}));
        assert_eq!(decode_optional::<String>(&map, "a", "T", "a").unwrap(), None);
        assert_eq!(decode_optional::<String>(&map, "gone", "T", "g").unwrap(), None);
        assert_eq!(
            decode_optional::<String>(&map, "b", "T", "b").unwrap(),
            Some("x".to_string())
        );
        assert!(decode_optional::<i64>(&map, "b", "T", "b").is_err());
    }

    #[test]
    fn try_decode_checks_presence_before_decoding() {
        let map = obj(json!({"n": "not a number"}));
        assert!(matches!(try_decode::<i64>(&map, "gone"), Decoded::Missing));
        assert!(matches!(try_decode::<i64>(&map, "n"), Decoded::Error(_)));
        let map = obj(json!({"n": 4}));
        assert!(matches!(try_decode::<i64>(&map, "n"), Decoded::Value(4)));
    }

    #[test]
    fn merge_payload_keeps_existing_tag() {
        let mut map = obj(json!({"type": "a"}));
        merge_payload(&mut map, json!({"type": "b", "x": 1}), "E").unwrap();
        assert_eq!(Value::Object(map), json!({"type": "a", "x": 1}));
    }

    #[test]
    fn encode_optional_skips_none() {
        let mut map = Map::new();
        encode_optional::<String>(&mut map, "k", &None).unwrap();
        assert!(map.is_empty());
    }
}
