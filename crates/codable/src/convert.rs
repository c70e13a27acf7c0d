use std::collections::{BTreeMap, HashMap};

use crate::error::CodableError;
use crate::{type_name_of, Decode, Encode, Map, Value};

impl Decode for Value {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        Ok(value.clone())
    }
}

impl Encode for Value {
    fn encode(&self) -> Result<Value, CodableError> {
        Ok(self.clone())
    }
}

impl Decode for String {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => Err(CodableError::type_mismatch("string", type_name_of(other))),
        }
    }
}

impl Encode for String {
    fn encode(&self) -> Result<Value, CodableError> {
        Ok(Value::String(self.clone()))
    }
}

impl Decode for bool {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        match value {
            Value::Bool(b) => Ok(*b),
            other => Err(CodableError::type_mismatch("bool", type_name_of(other))),
        }
    }
}

impl Encode for bool {
    fn encode(&self) -> Result<Value, CodableError> {
        Ok(Value::Bool(*self))
    }
}

impl Decode for i64 {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        match value {
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| CodableError::out_of_range(n.to_string(), "i64")),
            other => Err(CodableError::type_mismatch("i64", type_name_of(other))),
        }
    }
}

impl Encode for i64 {
    fn encode(&self) -> Result<Value, CodableError> {
        Ok(Value::from(*self))
    }
}

impl Decode for u64 {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        match value {
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| CodableError::out_of_range(n.to_string(), "u64")),
            other => Err(CodableError::type_mismatch("u64", type_name_of(other))),
        }
    }
}

impl Encode for u64 {
    fn encode(&self) -> Result<Value, CodableError> {
        Ok(Value::from(*self))
    }
}

macro_rules! narrow_int {
    ($ty:ty, $name:literal, $via:ty) => {
        impl Decode for $ty {
            fn decode(value: &Value) -> Result<Self, CodableError> {
                let wide = <$via as Decode>::decode(value).map_err(|err| {
                    match err.kind {
                        crate::ErrorKind::TypeMismatch { actual, .. } => {
                            CodableError::type_mismatch($name, actual)
                        }
                        _ => err,
                    }
                })?;
                <$ty>::try_from(wide)
                    .map_err(|_| CodableError::out_of_range(wide.to_string(), $name))
            }
        }

        impl Encode for $ty {
            fn encode(&self) -> Result<Value, CodableError> {
                Ok(Value::from(*self as $via))
            }
        }
    };
}

narrow_int!(i32, "i32", i64);
narrow_int!(i16, "i16", i64);
narrow_int!(i8, "i8", i64);
narrow_int!(u32, "u32", u64);
narrow_int!(u16, "u16", u64);
narrow_int!(u8, "u8", u64);
narrow_int!(usize, "usize", u64);

impl Decode for f64 {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| CodableError::out_of_range(n.to_string(), "f64")),
            other => Err(CodableError::type_mismatch("f64", type_name_of(other))),
        }
    }
}

impl Encode for f64 {
    fn encode(&self) -> Result<Value, CodableError> {
        Ok(Value::from(*self))
    }
}

impl Decode for f32 {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        f64::decode(value).map(|f| f as f32)
    }
}

impl Encode for f32 {
    fn encode(&self) -> Result<Value, CodableError> {
        Ok(Value::from(*self as f64))
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        match value {
            Value::Array(items) => {
                let mut result = Vec::with_capacity(items.len());
                for item in items {
                    result.push(T::decode(item)?);
                }
                Ok(result)
            }
            other => Err(CodableError::type_mismatch("array", type_name_of(other))),
        }
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self) -> Result<Value, CodableError> {
        let mut items = Vec::with_capacity(self.len());
        for item in self {
            items.push(item.encode()?);
        }
        Ok(Value::Array(items))
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        match value {
            Value::Null => Ok(None),
            other => T::decode(other).map(Some),
        }
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode(&self) -> Result<Value, CodableError> {
        match self {
            Some(inner) => inner.encode(),
            None => Ok(Value::Null),
        }
    }
}

fn decode_entries<T: Decode>(value: &Value) -> Result<Vec<(String, T)>, CodableError> {
    match value {
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, item) in map {
                entries.push((key.clone(), T::decode(item)?));
            }
            Ok(entries)
        }
        other => Err(CodableError::type_mismatch("object", type_name_of(other))),
    }
}

impl<T: Decode> Decode for HashMap<String, T> {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        decode_entries(value).map(|entries| entries.into_iter().collect())
    }
}

impl<T: Encode> Encode for HashMap<String, T> {
    fn encode(&self) -> Result<Value, CodableError> {
        let mut map = Map::new();
        for (key, item) in self {
            map.insert(key.clone(), item.encode()?);
        }
        Ok(Value::Object(map))
    }
}

impl<T: Decode> Decode for BTreeMap<String, T> {
    fn decode(value: &Value) -> Result<Self, CodableError> {
        decode_entries(value).map(|entries| entries.into_iter().collect())
    }
}

impl<T: Encode> Encode for BTreeMap<String, T> {
    fn encode(&self) -> Result<Value, CodableError> {
        let mut map = Map::new();
        for (key, item) in self {
            map.insert(key.clone(), item.encode()?);
        }
        Ok(Value::Object(map))
    }
}
