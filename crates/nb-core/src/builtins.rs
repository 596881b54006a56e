//! Built-in base types: integer, float, string, boolean

use crate::datum::Datum;
use crate::error::{CoreError, CoreResult};
use crate::types::{BaseTypeOptions, Type};
use crate::value::Value;
use std::sync::{Arc, OnceLock};

/// Name of the built-in integer type
pub const INTEGER: &str = "integer";
/// Name of the built-in float type
pub const FLOAT: &str = "float";
/// Name of the built-in string type
pub const STRING: &str = "string";
/// Name of the built-in boolean type
pub const BOOLEAN: &str = "boolean";

/// Error for a value that fails the predicate of `type_name`
pub fn invalid_value(type_name: &str, value: &Value) -> CoreError {
    CoreError::InvalidValueForType {
        type_name: type_name.to_string(),
        value: value.to_string(),
    }
}

/// 64-bit integers
pub fn integer() -> Type {
    static TYPE: OnceLock<Type> = OnceLock::new();
    TYPE.get_or_init(|| {
        Type::base(
            INTEGER,
            Arc::new(|v: &Value| matches!(v, Value::Integer(_))),
            Arc::new(|v: &Value| match v {
                Value::Integer(i) => Ok(Datum::from(*i)),
                other => Err(invalid_value(INTEGER, other)),
            }),
            Arc::new(|d: &Datum| {
                d.as_i64()
                    .map(Value::Integer)
                    .ok_or_else(|| CoreError::malformed("integer", d))
            }),
            BaseTypeOptions::numeric(),
        )
    })
    .clone()
}

/// Double-precision floats
pub fn float() -> Type {
    static TYPE: OnceLock<Type> = OnceLock::new();
    TYPE.get_or_init(|| {
        Type::base(
            FLOAT,
            Arc::new(|v: &Value| matches!(v, Value::Float(_))),
            Arc::new(|v: &Value| match v {
                Value::Float(x) if x.is_finite() => Ok(Datum::from(*x)),
                other => Err(invalid_value(FLOAT, other)),
            }),
            Arc::new(|d: &Datum| {
                d.as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| CoreError::malformed("float", d))
            }),
            BaseTypeOptions::numeric(),
        )
    })
    .clone()
}

/// Unbounded character strings
pub fn string() -> Type {
    static TYPE: OnceLock<Type> = OnceLock::new();
    TYPE.get_or_init(|| {
        Type::base(
            STRING,
            Arc::new(|v: &Value| matches!(v, Value::String(_))),
            Arc::new(|v: &Value| match v {
                Value::String(s) => Ok(Datum::String(s.clone())),
                other => Err(invalid_value(STRING, other)),
            }),
            Arc::new(|d: &Datum| {
                d.as_str()
                    .map(|s| Value::String(s.to_string()))
                    .ok_or_else(|| CoreError::malformed("string", d))
            }),
            BaseTypeOptions::ordered(),
        )
    })
    .clone()
}

/// Booleans
pub fn boolean() -> Type {
    static TYPE: OnceLock<Type> = OnceLock::new();
    TYPE.get_or_init(|| {
        Type::base(
            BOOLEAN,
            Arc::new(|v: &Value| matches!(v, Value::Boolean(_))),
            Arc::new(|v: &Value| match v {
                Value::Boolean(b) => Ok(Datum::Bool(*b)),
                other => Err(invalid_value(BOOLEAN, other)),
            }),
            Arc::new(|d: &Datum| {
                d.as_bool()
                    .map(Value::Boolean)
                    .ok_or_else(|| CoreError::malformed("boolean", d))
            }),
            BaseTypeOptions::default(),
        )
    })
    .clone()
}

/// All built-in base types
pub fn all() -> Vec<Type> {
    vec![integer(), float(), string(), boolean()]
}

/// Resolve a built-in type by name
pub fn lookup(name: &str) -> Option<Type> {
    match name {
        INTEGER => Some(integer()),
        FLOAT => Some(float()),
        STRING => Some(string()),
        BOOLEAN => Some(boolean()),
        _ => None,
    }
}

/// Returns Ok when `value` satisfies `ty`, otherwise an `InvalidValueForType` error
pub fn ensure_member(ty: &Type, value: &Value) -> CoreResult<()> {
    if ty.is_member(value) {
        Ok(())
    } else {
        Err(invalid_value(&ty.to_string(), value))
    }
}
