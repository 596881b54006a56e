//! nb-core - Core library for Nebula
//!
//! This crate provides the value-level type system shared by the query
//! algebra: types and values, their portable datum form, numeric/ordered
//! capabilities, the built-in base types, and compiler configuration.

pub mod builtins;
pub mod capabilities;
pub mod config;
pub mod datum;
pub mod error;
pub mod types;
pub mod value;

pub use capabilities::Capabilities;
pub use config::CompilerConfig;
pub use datum::{
    const_to_datum, datum_to_const, datum_to_type, type_to_datum, Datum, TypeResolver,
};
pub use error::{CoreError, CoreResult};
pub use types::{BaseType, BaseTypeOptions, Extension, Type};
pub use value::Value;
