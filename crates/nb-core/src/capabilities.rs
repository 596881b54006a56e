//! Numeric / ordered capability queries over types

use crate::types::Type;
use std::collections::HashMap;

/// Per-name overrides for the numeric and ordered capabilities.
///
/// A base type answers with the defaults it was declared with unless an
/// override is registered for its name. The ordered capability falls back to
/// the numeric one when neither an override nor a declared default exists.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    numeric: HashMap<String, bool>,
    ordered: HashMap<String, bool>,
}

impl Capabilities {
    /// Create an empty override table
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the numeric capability of a base type
    pub fn set_numeric(&mut self, type_name: impl Into<String>, numeric: bool) {
        let type_name = type_name.into();
        if let Some(previous) = self.numeric.insert(type_name.clone(), numeric) {
            if previous != numeric {
                log::warn!("Numeric capability of '{type_name}' changed from {previous} to {numeric}");
            }
        }
    }

    /// Override the ordered capability of a base type
    pub fn set_ordered(&mut self, type_name: impl Into<String>, ordered: bool) {
        let type_name = type_name.into();
        if let Some(previous) = self.ordered.insert(type_name.clone(), ordered) {
            if previous != ordered {
                log::warn!("Ordered capability of '{type_name}' changed from {previous} to {ordered}");
            }
        }
    }

    /// Whether arithmetic aggregates (sum, avg, ...) accept this type
    pub fn is_numeric(&self, ty: &Type) -> bool {
        match ty {
            Type::Base(b) => self
                .numeric
                .get(b.name())
                .copied()
                .unwrap_or_else(|| b.numeric_default()),
            Type::Nullable(inner) => self.is_numeric(inner),
            Type::Product(_) | Type::Set(_) | Type::BoundedString(_) => false,
        }
    }

    /// Whether ordering and min/max accept this type
    pub fn is_ordered(&self, ty: &Type) -> bool {
        match ty {
            Type::Base(b) => self
                .ordered
                .get(b.name())
                .copied()
                .or_else(|| b.ordered_default())
                .unwrap_or_else(|| self.is_numeric(ty)),
            Type::Nullable(inner) => self.is_ordered(inner),
            Type::BoundedString(_) => true,
            Type::Product(_) | Type::Set(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;
    use crate::types::BaseTypeOptions;
    use crate::value::Value;
    use std::sync::Arc;

    fn opaque(name: &str, opts: BaseTypeOptions) -> Type {
        Type::base(
            name,
            Arc::new(|_: &Value| true),
            Arc::new(|_: &Value| -> crate::CoreResult<serde_json::Value> {
                Ok(serde_json::Value::Null)
            }),
            Arc::new(|_: &serde_json::Value| -> crate::CoreResult<Value> { Ok(Value::Null) }),
            opts,
        )
    }

    #[test]
    fn test_builtin_defaults() {
        let caps = Capabilities::new();
        assert!(caps.is_numeric(&builtins::integer()));
        assert!(caps.is_ordered(&builtins::integer()));
        assert!(!caps.is_numeric(&builtins::string()));
        assert!(caps.is_ordered(&builtins::string()));
        assert!(!caps.is_numeric(&builtins::boolean()));
        assert!(!caps.is_ordered(&builtins::boolean()));
    }

    #[test]
    fn test_nullable_delegates() {
        let caps = Capabilities::new();
        assert!(caps.is_numeric(&Type::nullable(builtins::float())));
        assert!(!caps.is_ordered(&Type::product(vec![builtins::integer()])));
        assert!(caps.is_ordered(&Type::bounded_string(10)));
    }

    #[test]
    fn test_ordered_follows_numeric_override() {
        let money = opaque("money", BaseTypeOptions::default());
        let mut caps = Capabilities::new();
        assert!(!caps.is_ordered(&money));

        caps.set_numeric("money", true);
        assert!(caps.is_numeric(&money));
        assert!(caps.is_ordered(&money));

        caps.set_ordered("money", false);
        assert!(!caps.is_ordered(&money));
    }
}
