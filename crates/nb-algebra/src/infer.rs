//! Schema inference and expression typing
//!
//! [`infer_schema`] trusts its input and only raises structural errors
//! (unknown attributes, non-unary subqueries). [`check_schema`] additionally
//! reports every type violation and schema mismatch.

use crate::error::{AlgebraError, AlgebraResult};
use crate::ir::expr::{AggregateOp, Expr, ExprFold, MultiAggregateOp};
use crate::ir::operator::Operator;
use crate::ir::query::{CombineOp, Query};
use crate::ir::schema::Schema;
use crate::universe::Universe;
use nb_core::builtins;
use nb_core::{Capabilities, Type, Value};
use std::fmt::Display;
use std::sync::Arc;

/// Whether violations are reported or ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckMode {
    /// Skip type violations and schema mismatches
    #[default]
    Permissive,
    /// Report type violations and schema mismatches as errors
    Checked,
}

/// Type-check handle passed to operator range procedures
#[derive(Debug, Clone, Copy)]
pub struct TypeCheck<'a> {
    mode: CheckMode,
    capabilities: &'a Capabilities,
}

impl<'a> TypeCheck<'a> {
    /// Create a handle
    pub fn new(mode: CheckMode, capabilities: &'a Capabilities) -> Self {
        Self { mode, capabilities }
    }

    /// Whether violations are reported
    pub fn is_checked(&self) -> bool {
        self.mode == CheckMode::Checked
    }

    /// Capability table used for numeric/ordered questions
    pub fn capabilities(&self) -> &'a Capabilities {
        self.capabilities
    }

    /// Report a `TypeViolation` when `ok` is false in checked mode
    pub fn require(
        &self,
        ok: bool,
        expected: impl Display,
        actual: impl Display,
    ) -> AlgebraResult<()> {
        if ok || !self.is_checked() {
            return Ok(());
        }
        Err(AlgebraError::TypeViolation {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }

    /// Require `actual` to equal `expected`
    pub fn expect(&self, expected: &Type, actual: &Type) -> AlgebraResult<()> {
        self.require(expected == actual, expected, actual)
    }

    /// Require a numeric type
    pub fn expect_numeric(&self, actual: &Type) -> AlgebraResult<()> {
        self.require(
            self.capabilities.is_numeric(actual),
            "numeric type",
            actual,
        )
    }

    /// Require an ordered type
    pub fn expect_ordered(&self, actual: &Type) -> AlgebraResult<()> {
        self.require(
            self.capabilities.is_ordered(actual),
            "ordered type",
            actual,
        )
    }

    /// Unify two branch types: equal types, or a type with its nullable form
    pub fn unify(&self, left: &Type, right: &Type) -> AlgebraResult<Type> {
        if left == right {
            return Ok(left.clone());
        }
        if left.non_null() == right.non_null() {
            return Ok(Type::nullable(left.non_null().clone()));
        }
        self.require(false, left, right)?;
        Ok(left.clone())
    }
}

/// Infer the output schema of `query`, raising only structural errors
pub fn infer_schema(query: &Query, universe: &Universe) -> AlgebraResult<Schema> {
    schema_of(query, universe, CheckMode::Permissive)
}

/// Infer the output schema of `query`, raising every violation
pub fn check_schema(query: &Query, universe: &Universe) -> AlgebraResult<Schema> {
    schema_of(query, universe, CheckMode::Checked)
}

/// Type of `expr` evaluated against rows of `schema`
pub fn type_of(
    expr: &Expr,
    schema: &Schema,
    universe: &Universe,
    mode: CheckMode,
) -> AlgebraResult<Type> {
    expr.fold(&mut TypeOf {
        schema,
        universe,
        check: TypeCheck::new(mode, universe.capabilities()),
    })
}

pub(crate) fn schema_of(query: &Query, universe: &Universe, mode: CheckMode) -> AlgebraResult<Schema> {
    let check = TypeCheck::new(mode, universe.capabilities());
    match query {
        Query::Empty => Ok(Schema::empty()),

        Query::BaseRelation { schema, .. } => Ok(schema.clone()),

        Query::Project { columns, input } => {
            let input_schema = schema_of(input, universe, mode)?;
            project_schema(columns, &input_schema, universe, mode, false)
        }

        Query::GroupingProject { columns, input } => {
            let input_schema = schema_of(input, universe, mode)?;
            project_schema(columns, &input_schema, universe, mode, true)
        }

        Query::Restrict { predicate, input } => {
            let schema = schema_of(input, universe, mode)?;
            let ty = type_of(predicate, &schema, universe, mode)?;
            check.expect(&builtins::boolean(), &ty)?;
            Ok(schema)
        }

        Query::Combine { op, left, right } => {
            let left = schema_of(left, universe, mode)?;
            let right = schema_of(right, universe, mode)?;
            combine_schema(*op, left, right, &check)
        }

        Query::Order { keys, input } => {
            let schema = schema_of(input, universe, mode)?;
            for key in keys {
                let ty = type_of(&key.expr, &schema, universe, mode)?;
                check.expect_ordered(&ty)?;
            }
            Ok(schema)
        }

        Query::Top { input, .. } => schema_of(input, universe, mode),
    }
}

fn project_schema(
    columns: &[(String, Expr)],
    input: &Schema,
    universe: &Universe,
    mode: CheckMode,
    grouping: bool,
) -> AlgebraResult<Schema> {
    let check = TypeCheck::new(mode, universe.capabilities());
    let mut schema = Schema::empty();
    for (name, expr) in columns {
        if !grouping && check.is_checked() && expr.contains_aggregate() {
            return Err(AlgebraError::MisplacedAggregate {
                column: name.clone(),
            });
        }
        let ty = type_of(expr, input, universe, mode)?;
        check.require(!ty.is_product(), "scalar type", &ty)?;
        schema.push(name.clone(), ty);
    }
    Ok(schema)
}

fn combine_schema(
    op: CombineOp,
    left: Schema,
    right: Schema,
    check: &TypeCheck<'_>,
) -> AlgebraResult<Schema> {
    let mismatch = |left: &Schema, right: &Schema| AlgebraError::SchemaMismatch {
        op,
        left: left.to_string(),
        right: right.to_string(),
    };

    match op {
        CombineOp::Product => {
            let mut schema = left.clone();
            for column in &right.columns {
                if schema.contains(&column.name) {
                    if check.is_checked() {
                        return Err(mismatch(&left, &right));
                    }
                    continue;
                }
                schema.push(column.name.clone(), column.ty.clone());
            }
            Ok(schema)
        }
        CombineOp::Quotient => {
            let mut schema = Schema::empty();
            for column in &left.columns {
                match right.get(&column.name) {
                    Some(ty) => check.expect(&column.ty, ty)?,
                    None => schema.push(column.name.clone(), column.ty.clone()),
                }
            }
            Ok(schema)
        }
        CombineOp::Union | CombineOp::Intersection | CombineOp::Difference => {
            if check.is_checked() && left != right {
                return Err(mismatch(&left, &right));
            }
            Ok(left)
        }
    }
}

/// Single-column schema of a subquery used as a value
fn unary_type(query: &Query, universe: &Universe, mode: CheckMode) -> AlgebraResult<Type> {
    let schema = schema_of(query, universe, mode)?;
    match schema.columns.as_slice() {
        [column] => Ok(column.ty.clone()),
        columns => Err(AlgebraError::NotUnary {
            columns: columns.len(),
        }),
    }
}

struct TypeOf<'a> {
    schema: &'a Schema,
    universe: &'a Universe,
    check: TypeCheck<'a>,
}

impl ExprFold for TypeOf<'_> {
    type Output = Type;
    type Error = AlgebraError;

    fn attr(&mut self, name: &str) -> AlgebraResult<Type> {
        self.schema
            .get(name)
            .cloned()
            .ok_or_else(|| AlgebraError::UnknownAttribute {
                name: name.to_string(),
            })
    }

    fn constant(&mut self, ty: &Type, _: &Value) -> AlgebraResult<Type> {
        Ok(ty.clone())
    }

    fn null(&mut self, ty: &Type) -> AlgebraResult<Type> {
        Ok(ty.clone())
    }

    fn apply(&mut self, op: &Arc<Operator>, args: Vec<Type>) -> AlgebraResult<Type> {
        op.range_type(&args, &self.check)
    }

    fn tuple(&mut self, items: Vec<Type>) -> AlgebraResult<Type> {
        Ok(Type::product(items))
    }

    fn aggregate(&mut self, op: AggregateOp, arg: Type) -> AlgebraResult<Type> {
        if op.needs_numeric() {
            self.check.expect_numeric(&arg)?;
        }
        if op.needs_ordered() {
            self.check.expect_ordered(&arg)?;
        }
        Ok(match op {
            AggregateOp::Count => builtins::integer(),
            AggregateOp::Sum | AggregateOp::Min | AggregateOp::Max => arg,
            AggregateOp::Avg
            | AggregateOp::Stddev
            | AggregateOp::StddevPop
            | AggregateOp::Variance
            | AggregateOp::VariancePop => builtins::float(),
        })
    }

    fn multi_aggregate(&mut self, _: MultiAggregateOp, args: Vec<Type>) -> AlgebraResult<Type> {
        for arg in &args {
            self.check.expect_numeric(arg)?;
        }
        Ok(builtins::float())
    }

    fn case(&mut self, branches: Vec<(Type, Type)>, default: Type) -> AlgebraResult<Type> {
        let boolean = builtins::boolean();
        let mut result = default;
        for (cond, branch) in branches.iter().rev() {
            self.check.expect(&boolean, cond)?;
            result = self.check.unify(branch, &result)?;
        }
        Ok(result)
    }

    fn scalar_subquery(&mut self, query: &Query) -> AlgebraResult<Type> {
        unary_type(query, self.universe, self.check.mode)
    }

    fn set_subquery(&mut self, query: &Query) -> AlgebraResult<Type> {
        Ok(Type::set(unary_type(query, self.universe, self.check.mode)?))
    }
}

#[cfg(test)]
#[path = "infer_test.rs"]
mod tests;
