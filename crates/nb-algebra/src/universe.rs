//! Catalog of named types, relations and operators visible to a compilation

use crate::error::{AlgebraError, AlgebraResult};
use crate::ir::operator::Operator;
use crate::ir::query::Query;
use crate::operators;
use nb_core::datum::TypeResolver;
use nb_core::{builtins, Capabilities, Type};
use std::collections::HashMap;
use std::sync::Arc;

/// Extensible registry passed to every name lookup
#[derive(Debug, Clone, Default)]
pub struct Universe {
    types: HashMap<String, Type>,
    relations: HashMap<String, Query>,
    operators: HashMap<String, Arc<Operator>>,
    capabilities: Capabilities,
}

impl Universe {
    /// Empty universe: no types, relations or operators
    pub fn new() -> Self {
        Self::default()
    }

    /// Universe with the built-in base types and the standard operators
    pub fn with_builtins() -> Self {
        let mut universe = Self::new();
        for ty in builtins::all() {
            universe.insert_type(ty.to_string(), ty);
        }
        for op in operators::standard() {
            universe.register_operator(op);
        }
        universe
    }

    /// Register a base type under its name
    pub fn register_type(&mut self, ty: Type) -> AlgebraResult<()> {
        let name = match &ty {
            Type::Base(b) => b.name().to_string(),
            other => {
                return Err(AlgebraError::invalid(format!(
                    "only base types can be registered, got {other}"
                )))
            }
        };
        self.insert_type(name, ty);
        Ok(())
    }

    fn insert_type(&mut self, name: String, ty: Type) {
        if self.types.insert(name.clone(), ty).is_some() {
            log::debug!("Replaced registered type '{name}'");
        }
    }

    /// Register a base relation under its name
    pub fn register_relation(&mut self, relation: Query) -> AlgebraResult<()> {
        let Query::BaseRelation { name, .. } = &relation else {
            return Err(AlgebraError::invalid(
                "only base relations can be registered by name",
            ));
        };
        let name = name.clone();
        if self.relations.insert(name.clone(), relation).is_some() {
            log::debug!("Replaced registered relation '{name}'");
        }
        Ok(())
    }

    /// Register an operator under its name, returning the shared handle
    pub fn register_operator(&mut self, op: Operator) -> Arc<Operator> {
        let op = Arc::new(op);
        self.operators.insert(op.name().to_string(), Arc::clone(&op));
        op
    }

    /// Base type by name
    pub fn type_named(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    /// Base relation by name
    pub fn relation(&self, name: &str) -> Option<&Query> {
        self.relations.get(name)
    }

    /// Operator by name
    pub fn operator(&self, name: &str) -> Option<&Arc<Operator>> {
        self.operators.get(name)
    }

    /// Operator by name, failing with `UnknownOperator`
    pub fn require_operator(&self, name: &str) -> AlgebraResult<Arc<Operator>> {
        self.operator(name)
            .cloned()
            .ok_or_else(|| AlgebraError::UnknownOperator {
                name: name.to_string(),
            })
    }

    /// Numeric/ordered overrides
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Mutable numeric/ordered overrides
    pub fn capabilities_mut(&mut self) -> &mut Capabilities {
        &mut self.capabilities
    }
}

impl TypeResolver for Universe {
    fn resolve_type(&self, name: &str) -> Option<Type> {
        self.types.get(name).cloned()
    }
}
