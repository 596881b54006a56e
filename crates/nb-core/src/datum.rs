//! Portable datum form of types and constants
//!
//! Datums are JSON values. Base types serialize as their name; composite
//! types and IR nodes serialize as arrays whose first element is a string tag,
//! e.g. `["nullable", "integer"]` or `["product", ["integer", "string"]]`.

use crate::builtins;
use crate::error::{CoreError, CoreResult};
use crate::types::Type;
use crate::value::Value;
use std::collections::HashMap;

/// Serialized form of a type, value, expression or query
pub type Datum = serde_json::Value;

/// Resolves base-type names while decoding datums
pub trait TypeResolver {
    /// Look up a base type by name
    fn resolve_type(&self, name: &str) -> Option<Type>;
}

/// Resolver that only knows the built-in base types
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTypes;

impl TypeResolver for BuiltinTypes {
    fn resolve_type(&self, name: &str) -> Option<Type> {
        builtins::lookup(name)
    }
}

impl TypeResolver for HashMap<String, Type> {
    fn resolve_type(&self, name: &str) -> Option<Type> {
        self.get(name).cloned()
    }
}

/// Build a tagged datum `[tag, parts...]`
pub fn tagged(tag: &str, parts: Vec<Datum>) -> Datum {
    let mut items = Vec::with_capacity(parts.len() + 1);
    items.push(Datum::String(tag.to_string()));
    items.extend(parts);
    Datum::Array(items)
}

/// Split a tagged datum into its tag and payload
pub fn untag(datum: &Datum) -> CoreResult<(&str, &[Datum])> {
    match datum {
        Datum::Array(items) => match items.split_first() {
            Some((Datum::String(tag), rest)) => Ok((tag.as_str(), rest)),
            _ => Err(CoreError::malformed("tagged array", datum)),
        },
        other => Err(CoreError::malformed("tagged array", other)),
    }
}

/// Require exactly `N` payload elements after a tag
pub fn payload<'a, const N: usize>(tag: &str, rest: &'a [Datum]) -> CoreResult<&'a [Datum; N]> {
    rest.try_into().map_err(|_| {
        CoreError::malformed(
            format!("{N} argument(s) for '{tag}'"),
            format!("{} argument(s)", rest.len()),
        )
    })
}

/// Interpret a datum as an array
pub fn as_array<'a>(what: &str, datum: &'a Datum) -> CoreResult<&'a [Datum]> {
    datum
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| CoreError::malformed(format!("array of {what}"), datum))
}

/// Interpret a datum as a string
pub fn as_str<'a>(what: &str, datum: &'a Datum) -> CoreResult<&'a str> {
    datum
        .as_str()
        .ok_or_else(|| CoreError::malformed(what.to_string(), datum))
}

/// Interpret a datum as an unsigned integer
pub fn as_u64(what: &str, datum: &Datum) -> CoreResult<u64> {
    datum
        .as_u64()
        .ok_or_else(|| CoreError::malformed(what.to_string(), datum))
}

/// Serialize a type
pub fn type_to_datum(ty: &Type) -> Datum {
    match ty {
        Type::Base(b) => Datum::String(b.name().to_string()),
        Type::Nullable(inner) => tagged("nullable", vec![type_to_datum(inner)]),
        Type::Product(components) => tagged(
            "product",
            vec![Datum::Array(components.iter().map(type_to_datum).collect())],
        ),
        Type::Set(member) => tagged("set", vec![type_to_datum(member)]),
        Type::BoundedString(n) => tagged("bounded-string", vec![Datum::from(*n)]),
    }
}

/// Deserialize a type, resolving base-type names through `resolver`
pub fn datum_to_type(datum: &Datum, resolver: &dyn TypeResolver) -> CoreResult<Type> {
    if let Datum::String(name) = datum {
        return resolver
            .resolve_type(name)
            .ok_or_else(|| CoreError::UnknownType { name: name.clone() });
    }
    let (tag, rest) = untag(datum)?;
    match tag {
        "nullable" => {
            let [inner] = payload::<1>(tag, rest)?;
            Ok(Type::nullable(datum_to_type(inner, resolver)?))
        }
        "product" => {
            let [components] = payload::<1>(tag, rest)?;
            let components = as_array("types", components)?
                .iter()
                .map(|c| datum_to_type(c, resolver))
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(Type::product(components))
        }
        "set" => {
            let [member] = payload::<1>(tag, rest)?;
            Ok(Type::set(datum_to_type(member, resolver)?))
        }
        "bounded-string" => {
            let [n] = payload::<1>(tag, rest)?;
            let n = u32::try_from(as_u64("string length", n)?)
                .map_err(|_| CoreError::malformed("32-bit string length", n))?;
            Ok(Type::bounded_string(n))
        }
        other => Err(CoreError::malformed("type tag", other)),
    }
}

/// Serialize a value of type `ty`
pub fn const_to_datum(ty: &Type, value: &Value) -> CoreResult<Datum> {
    match (ty, value) {
        (Type::Base(b), v) => {
            if !b.contains(v) {
                return Err(builtins::invalid_value(b.name(), v));
            }
            b.value_to_datum(v)
        }
        (Type::Nullable(_), Value::Null) => Ok(Datum::Null),
        (Type::Nullable(inner), v) => const_to_datum(inner, v),
        (Type::Product(components), Value::Tuple(values)) if components.len() == values.len() => {
            let items = components
                .iter()
                .zip(values)
                .map(|(t, v)| const_to_datum(t, v))
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(Datum::Array(items))
        }
        (Type::Set(member), Value::Set(values)) => {
            let items = values
                .iter()
                .map(|v| const_to_datum(member, v))
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(Datum::Array(items))
        }
        (Type::BoundedString(_), Value::String(s)) if ty.is_member(value) => {
            Ok(Datum::String(s.clone()))
        }
        (ty, v) => Err(builtins::invalid_value(&ty.to_string(), v)),
    }
}

/// Deserialize a value of type `ty`
pub fn datum_to_const(ty: &Type, datum: &Datum) -> CoreResult<Value> {
    match ty {
        Type::Base(b) => b.datum_to_value(datum),
        Type::Nullable(_) if datum.is_null() => Ok(Value::Null),
        Type::Nullable(inner) => datum_to_const(inner, datum),
        Type::Product(components) => {
            let items = as_array("product components", datum)?;
            if items.len() != components.len() {
                return Err(CoreError::InvalidValueForType {
                    type_name: ty.to_string(),
                    value: datum.to_string(),
                });
            }
            let values = components
                .iter()
                .zip(items)
                .map(|(t, d)| datum_to_const(t, d))
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(Value::Tuple(values))
        }
        Type::Set(member) => {
            let values = as_array("set members", datum)?
                .iter()
                .map(|d| datum_to_const(member, d))
                .collect::<CoreResult<Vec<_>>>()?;
            Ok(Value::Set(values))
        }
        Type::BoundedString(_) => {
            let value = Value::String(as_str("string", datum)?.to_string());
            builtins::ensure_member(ty, &value)?;
            Ok(value)
        }
    }
}

#[cfg(test)]
#[path = "datum_test.rs"]
mod tests;
