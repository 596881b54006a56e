//! Operators ("rators") applied by [`Expr::Apply`](super::expr::Expr::Apply)

use super::expr::Expr;
use super::query::Query;
use crate::error::AlgebraResult;
use crate::infer::TypeCheck;
use nb_core::Type;
use std::sync::Arc;

/// Infers the result type from the argument types
pub type RangeFn = Arc<dyn Fn(&[Type], &TypeCheck<'_>) -> AlgebraResult<Type> + Send + Sync>;
/// Renders an application from its rendered arguments
pub type RenderFn = Arc<dyn Fn(&[String]) -> String + Send + Sync>;
/// One step of an operator's flattening rule
pub type FlattenFn = Arc<dyn Fn(&FlattenInput<'_>) -> AlgebraResult<Expr> + Send + Sync>;

/// What a flattening step sees
pub struct FlattenInput<'a> {
    /// The operator being flattened
    pub op: &'a Arc<Operator>,
    /// Arguments after flattening (may be tuples)
    pub args: &'a [Expr],
    /// Argument types before flattening
    pub arg_types: &'a [Type],
    /// References to the renamed columns of the lookup query; empty without one
    pub lookup: &'a [Expr],
}

/// Extension data that tells the dbize pass how to flatten an operator
#[derive(Clone)]
pub struct FlattenRule {
    pub(crate) lookup: Option<(Query, FlattenFn)>,
    pub(crate) transform: FlattenFn,
}

impl FlattenRule {
    /// Structural rule: rebuild the application from the flattened arguments
    pub fn transform(transform: FlattenFn) -> Self {
        Self {
            lookup: None,
            transform,
        }
    }

    /// Lookup rule: join `base` under fresh names, restrict it with
    /// `restrict`, then compute the result with `transform`
    pub fn lookup(base: Query, restrict: FlattenFn, transform: FlattenFn) -> Self {
        Self {
            lookup: Some((base, restrict)),
            transform,
        }
    }

    /// The auxiliary relation this rule correlates against
    pub fn base_query(&self) -> Option<&Query> {
        self.lookup.as_ref().map(|(q, _)| q)
    }
}

/// A named scalar operator
pub struct Operator {
    name: String,
    range: RangeFn,
    render: RenderFn,
    flatten: Option<FlattenRule>,
}

impl Operator {
    /// Create an operator rendered as a function call `name(args...)`
    pub fn new(name: impl Into<String>, range: RangeFn) -> Self {
        let name = name.into();
        let call = name.clone();
        Self {
            name,
            range,
            render: Arc::new(move |args: &[String]| format!("{call}({})", args.join(", "))),
            flatten: None,
        }
    }

    /// Replace the rendering procedure
    pub fn with_render(mut self, render: RenderFn) -> Self {
        self.render = render;
        self
    }

    /// Attach a flattening rule
    pub fn with_flatten(mut self, rule: FlattenRule) -> Self {
        self.flatten = Some(rule);
        self
    }

    /// Operator name, also its identity
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Infer the result type for the given argument types
    pub fn range_type(&self, args: &[Type], check: &TypeCheck<'_>) -> AlgebraResult<Type> {
        (self.range)(args, check)
    }

    /// Render an application
    pub fn render(&self, args: &[String]) -> String {
        (self.render)(args)
    }

    /// Flattening rule, if any
    pub fn flatten_rule(&self) -> Option<&FlattenRule> {
        self.flatten.as_ref()
    }
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl std::fmt::Debug for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operator")
            .field("name", &self.name)
            .field("flatten", &self.flatten.is_some())
            .finish()
    }
}
