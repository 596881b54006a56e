//! Core type system for the query IR

use crate::datum::Datum;
use crate::error::CoreResult;
use crate::value::Value;
use std::any::Any;
use std::sync::Arc;

/// Membership predicate of a base type
pub type MemberFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
/// Serializes a member value to its datum
pub type ToDatumFn = Arc<dyn Fn(&Value) -> CoreResult<Datum> + Send + Sync>;
/// Rebuilds a member value from its datum
pub type FromDatumFn = Arc<dyn Fn(&Datum) -> CoreResult<Value> + Send + Sync>;
/// Opaque data attached to a base type by later layers
pub type Extension = Arc<dyn Any + Send + Sync>;

/// Optional settings for [`Type::base`]
#[derive(Clone, Default)]
pub struct BaseTypeOptions {
    /// Default answer of the numeric capability for this type
    pub numeric: bool,
    /// Default answer of the ordered capability; `None` follows `numeric`
    pub ordered: Option<bool>,
    /// Opaque extension data
    pub extension: Option<Extension>,
}

impl BaseTypeOptions {
    /// Options for a numeric (and therefore ordered) type
    pub fn numeric() -> Self {
        Self {
            numeric: true,
            ..Self::default()
        }
    }

    /// Options for an ordered, non-numeric type
    pub fn ordered() -> Self {
        Self {
            ordered: Some(true),
            ..Self::default()
        }
    }

    /// Attach extension data
    pub fn with_extension<T: Any + Send + Sync>(mut self, extension: T) -> Self {
        self.extension = Some(Arc::new(extension));
        self
    }
}

/// A named, user-extensible leaf type
pub struct BaseType {
    name: String,
    member: MemberFn,
    to_datum: ToDatumFn,
    from_datum: FromDatumFn,
    numeric: bool,
    ordered: Option<bool>,
    extension: Option<Extension>,
}

impl BaseType {
    /// Type name, also its identity
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the membership predicate
    pub fn contains(&self, value: &Value) -> bool {
        (self.member)(value)
    }

    /// Serialize a member value
    pub fn value_to_datum(&self, value: &Value) -> CoreResult<Datum> {
        (self.to_datum)(value)
    }

    /// Deserialize a member value
    pub fn datum_to_value(&self, datum: &Datum) -> CoreResult<Value> {
        (self.from_datum)(datum)
    }

    /// Declared numeric default
    pub fn numeric_default(&self) -> bool {
        self.numeric
    }

    /// Declared ordered default, if any
    pub fn ordered_default(&self) -> Option<bool> {
        self.ordered
    }

    /// Extension data attached at construction
    pub fn extension(&self) -> Option<&Extension> {
        self.extension.as_ref()
    }
}

impl std::fmt::Debug for BaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseType")
            .field("name", &self.name)
            .field("numeric", &self.numeric)
            .field("ordered", &self.ordered)
            .field("extension", &self.extension.is_some())
            .finish()
    }
}

/// A value type
#[derive(Debug, Clone)]
pub enum Type {
    /// Named leaf type
    Base(Arc<BaseType>),
    /// The underlying type plus NULL
    Nullable(Box<Type>),
    /// Ordered sequence of component types
    Product(Vec<Type>),
    /// Set of members of the element type
    Set(Box<Type>),
    /// String with a maximum character length
    BoundedString(u32),
}

impl Type {
    /// Build a base type
    pub fn base(
        name: impl Into<String>,
        member: MemberFn,
        to_datum: ToDatumFn,
        from_datum: FromDatumFn,
        opts: BaseTypeOptions,
    ) -> Type {
        Type::Base(Arc::new(BaseType {
            name: name.into(),
            member,
            to_datum,
            from_datum,
            numeric: opts.numeric,
            ordered: opts.ordered,
            extension: opts.extension,
        }))
    }

    /// Wrap in `Nullable`; already-nullable types are returned unchanged
    pub fn nullable(ty: Type) -> Type {
        match ty {
            Type::Nullable(_) => ty,
            other => Type::Nullable(Box::new(other)),
        }
    }

    /// Build a product type
    pub fn product(components: Vec<Type>) -> Type {
        Type::Product(components)
    }

    /// Build a set type
    pub fn set(member: Type) -> Type {
        Type::Set(Box::new(member))
    }

    /// Build a bounded string type
    pub fn bounded_string(max_length: u32) -> Type {
        Type::BoundedString(max_length)
    }

    /// The base type behind this type, if it is one
    pub fn as_base(&self) -> Option<&BaseType> {
        match self {
            Type::Base(b) => Some(b),
            _ => None,
        }
    }

    /// Strip one level of `Nullable`
    pub fn non_null(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Returns true for product types
    pub fn is_product(&self) -> bool {
        matches!(self, Type::Product(_))
    }

    /// Extension data of a base type, downcast to `T`
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.as_base()?.extension()?.downcast_ref::<T>()
    }

    /// Structural membership check
    pub fn is_member(&self, value: &Value) -> bool {
        match (self, value) {
            (Type::Base(b), v) => b.contains(v),
            (Type::Nullable(_), Value::Null) => true,
            (Type::Nullable(inner), v) => inner.is_member(v),
            (Type::Product(components), Value::Tuple(values)) => {
                components.len() == values.len()
                    && components.iter().zip(values).all(|(t, v)| t.is_member(v))
            }
            (Type::Set(member), Value::Set(values)) => values.iter().all(|v| member.is_member(v)),
            (Type::BoundedString(n), Value::String(s)) => s.chars().count() <= *n as usize,
            _ => false,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Base(a), Type::Base(b)) => a.name == b.name,
            (Type::Nullable(a), Type::Nullable(b)) => a == b,
            (Type::Product(a), Type::Product(b)) => a == b,
            (Type::Set(a), Type::Set(b)) => a == b,
            (Type::BoundedString(a), Type::BoundedString(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Base(b) => write!(f, "{}", b.name),
            Type::Nullable(inner) => write!(f, "{inner}?"),
            Type::Product(components) => {
                write!(f, "(")?;
                for (i, c) in components.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, ")")
            }
            Type::Set(member) => write!(f, "{{{member}}}"),
            Type::BoundedString(n) => write!(f, "string({n})"),
        }
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
