use crate::error::CodableError;
use crate::{type_name_of, Map, Value};

/// Result of a presence-aware nested-container lookup.
///
/// Decode fallbacks need to distinguish "the key was never there" from
/// "the key was there but did not hold a keyed container", because the
/// missing-default and the error-default can differ.
#[derive(Debug)]
pub enum Probe<'a> {
    Found(&'a Map),
    Missing,
    Invalid,
}

/// Views a value as a keyed container, or fails with the root type name.
pub fn as_object<'a>(value: &'a Value, type_name: &str) -> Result<&'a Map, CodableError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CodableError::invalid_container(
            type_name,
            "",
            type_name_of(other),
        )),
    }
}

/// Strict nested-container open: missing or non-object is an error.
pub fn nested<'a>(
    obj: &'a Map,
    key: &str,
    type_name: &str,
) -> Result<&'a Map, CodableError> {
    match obj.get(key) {
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(CodableError::invalid_container(
            type_name,
            key,
            type_name_of(other),
        )),
        None => Err(CodableError::missing_key(type_name, key, key)),
    }
}

/// Lenient nested-container open used when nothing below needs the
/// missing/error distinction: anything but an object reads as absent.
pub fn nested_opt<'a>(obj: &'a Map, key: &str) -> Option<&'a Map> {
    match obj.get(key) {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Presence-aware nested-container open for defaulted subtrees.
pub fn probe<'a>(obj: &'a Map, key: &str) -> Probe<'a> {
    match obj.get(key) {
        Some(Value::Object(map)) => Probe::Found(map),
        Some(_) => Probe::Invalid,
        None => Probe::Missing,
    }
}

/// Unconditional nested-container creation for the encode direction.
/// An existing non-object value under the key is replaced.
pub fn nested_mut<'a>(obj: &'a mut Map, key: &str) -> &'a mut Map {
    let entry = obj
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !matches!(entry, Value::Object(_)) {
        *entry = Value::Object(Map::new());
    }
    match entry {
        Value::Object(map) => map,
        _ => unreachable!("entry was just made an object"),
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
    fn probe_distinguishes_missing_from_invalid() {
        let map = obj(json!({"present": {}, "scalar": 1}));
        assert!(matches!(probe(&map, "present"), Probe::Found(_)));
        assert!(matches!(probe(&map, "absent"), Probe::Missing));
        assert!(matches!(probe(&map, "scalar"), Probe::Invalid));
    }

    #[test]
    fn nested_errors_carry_the_key() {
        let map = obj(json!({"scalar": 1}));
        let err = nested(&map, "scalar", "Config").unwrap_err();
        assert_eq!(err.key.as_deref(), Some("scalar"));
        let err = nested(&map, "gone", "Config").unwrap_err();
        assert!(matches!(err.kind, crate::ErrorKind::MissingKey));
    }

    #[test]
    fn nested_mut_replaces_non_objects() {
        let mut map = obj(json!({"slot": 7}));
        nested_mut(&mut map, "slot").insert("inner".into(), json!(true));
        assert_eq!(Value::Object(map), json!({"slot": {"inner": true}}));
    }
}
