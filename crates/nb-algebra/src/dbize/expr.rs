//! Expression half of the flattening pass

use super::{Dbize, Environment};
use crate::error::{AlgebraError, AlgebraResult};
use crate::galaxy::db_type_data;
use crate::infer::{infer_schema, type_of, CheckMode};
use crate::ir::expr::{AggregateOp, Expr};
use crate::ir::operator::{FlattenInput, Operator};
use crate::ir::query::Query;
use crate::ir::schema::Schema;
use nb_core::Type;
use std::sync::Arc;

/// A flattened expression plus the auxiliary joins it needs
#[derive(Debug, Clone, PartialEq)]
pub struct Flattened {
    /// Flattened expression; may be a (nested) tuple
    pub expr: Expr,
    /// Queries to join into the enclosing projection or restriction
    pub queries: Vec<Query>,
    /// Predicates over the joined queries
    pub restrictions: Vec<Expr>,
}

impl Flattened {
    fn scalar(expr: Expr) -> Self {
        Self {
            expr,
            queries: Vec::new(),
            restrictions: Vec::new(),
        }
    }

    /// Whether no auxiliary join or restriction is needed
    pub fn is_self_contained(&self) -> bool {
        self.queries.is_empty() && self.restrictions.is_empty()
    }

    fn absorb(&mut self, other: Flattened) -> Expr {
        self.queries.extend(other.queries);
        self.restrictions.extend(other.restrictions);
        other.expr
    }
}

/// Nesting structure of a flattened value
#[derive(Debug, PartialEq)]
enum Shape {
    Leaf,
    Tuple(Vec<Shape>),
}

fn shape(expr: &Expr) -> Shape {
    match expr {
        Expr::Tuple(items) => Shape::Tuple(items.iter().map(shape).collect()),
        _ => Shape::Leaf,
    }
}

/// Split a CASE whose branches are equally shaped tuples into a tuple of
/// CASEs, one per component
fn distribute_case(conditions: &[Expr], results: Vec<Expr>, default: Expr) -> Expr {
    match default {
        Expr::Tuple(defaults) => {
            let mut columns: Vec<Vec<Expr>> = defaults.iter().map(|_| Vec::new()).collect();
            for result in results {
                if let Expr::Tuple(items) = result {
                    for (column, item) in columns.iter_mut().zip(items) {
                        column.push(item);
                    }
                }
            }
            Expr::Tuple(
                columns
                    .into_iter()
                    .zip(defaults)
                    .map(|(results, default)| distribute_case(conditions, results, default))
                    .collect(),
            )
        }
        default => Expr::case(conditions.iter().cloned().zip(results).collect(), default),
    }
}

impl Dbize<'_> {
    /// Flatten `expr`, evaluated against rows of `schema` whose structured
    /// attributes are represented as recorded in `env`
    pub fn flatten_expr(
        &mut self,
        expr: &Expr,
        env: &Environment,
        schema: &Schema,
    ) -> AlgebraResult<Flattened> {
        match expr {
            Expr::Attr(name) => Ok(Flattened::scalar(
                env.get(name).cloned().unwrap_or_else(|| expr.clone()),
            )),

            Expr::Const { ty, value } => match db_type_data(ty) {
                Some(data) if !value.is_null() => Ok(Flattened::scalar((data.encoder)(value)?)),
                Some(data) => Ok(Flattened::scalar(null_tuple(&data.schema))),
                None => Ok(Flattened::scalar(expr.clone())),
            },

            Expr::Null(ty) => match db_type_data(ty) {
                Some(data) => Ok(Flattened::scalar(null_tuple(&data.schema))),
                None => Ok(Flattened::scalar(expr.clone())),
            },

            Expr::Apply { op, args } => self.flatten_apply(op, args, env, schema),

            Expr::Tuple(items) => {
                let mut out = Flattened::scalar(Expr::Tuple(Vec::new()));
                let mut flat_items = Vec::with_capacity(items.len());
                for item in items {
                    let flat = self.flatten_expr(item, env, schema)?;
                    flat_items.push(out.absorb(flat));
                }
                out.expr = Expr::Tuple(flat_items);
                Ok(out)
            }

            Expr::Aggregate { op, arg } => {
                let mut out = self.flatten_expr(arg, env, schema)?;
                let mut flat_arg = std::mem::replace(&mut out.expr, Expr::Tuple(Vec::new()));
                if *op == AggregateOp::Count {
                    while let Expr::Tuple(items) = flat_arg {
                        flat_arg = items.into_iter().next().ok_or_else(|| {
                            AlgebraError::invalid(format!("cannot count the empty tuple in '{expr}'"))
                        })?;
                    }
                } else if flat_arg.is_tuple() {
                    return Err(AlgebraError::not_yet(format!(
                        "{op} over a structured value in '{expr}'"
                    )));
                }
                out.expr = Expr::aggregate(*op, flat_arg);
                Ok(out)
            }

            Expr::MultiAggregate { op, .. } => Err(AlgebraError::not_yet(format!(
                "flattening the multi-argument aggregate '{}'",
                op.name()
            ))),

            Expr::Case { branches, default } => {
                let mut out = Flattened::scalar(Expr::Tuple(Vec::new()));
                let mut conditions = Vec::with_capacity(branches.len());
                let mut results = Vec::with_capacity(branches.len());
                for (cond, result) in branches {
                    let cond = self.flatten_expr(cond, env, schema)?;
                    let cond = out.absorb(cond);
                    if cond.is_tuple() {
                        return Err(AlgebraError::invalid(format!(
                            "CASE condition '{cond}' is not a scalar"
                        )));
                    }
                    conditions.push(cond);
                    let result = self.flatten_expr(result, env, schema)?;
                    results.push(out.absorb(result));
                }
                let default = self.flatten_expr(default, env, schema)?;
                let default = out.absorb(default);

                let default_shape = shape(&default);
                if results.iter().any(|r| shape(r) != default_shape) {
                    return Err(AlgebraError::not_yet(format!(
                        "CASE mixing structured and scalar branches in '{expr}'"
                    )));
                }
                out.expr = distribute_case(&conditions, results, default);
                Ok(out)
            }

            Expr::ScalarSubquery(query) => Ok(Flattened::scalar(Expr::ScalarSubquery(
                Box::new(self.flatten_subquery(query)?),
            ))),

            Expr::SetSubquery(query) => Ok(Flattened::scalar(Expr::SetSubquery(Box::new(
                self.flatten_subquery(query)?,
            )))),
        }
    }

    fn flatten_apply(
        &mut self,
        op: &Arc<Operator>,
        args: &[Expr],
        env: &Environment,
        schema: &Schema,
    ) -> AlgebraResult<Flattened> {
        let mut out = Flattened::scalar(Expr::Tuple(Vec::new()));
        let mut flat_args = Vec::with_capacity(args.len());
        for arg in args {
            let flat = self.flatten_expr(arg, env, schema)?;
            flat_args.push(out.absorb(flat));
        }

        let Some(rule) = op.flatten_rule() else {
            out.expr = Expr::apply(op, flat_args);
            return Ok(out);
        };

        let arg_types = args
            .iter()
            .map(|arg| type_of(arg, schema, self.universe, CheckMode::Permissive))
            .collect::<AlgebraResult<Vec<Type>>>()?;

        out.expr = match &rule.lookup {
            None => (rule.transform)(&FlattenInput {
                op,
                args: &flat_args,
                arg_types: &arg_types,
                lookup: &[],
            })?,
            Some((base, restrict)) => {
                let (flat_base, _) = self.flatten(base)?;
                let (renamed, refs) = self.rename_query(&flat_base)?;
                log::debug!(
                    "Operator '{}' joins a lookup over {} column(s)",
                    op.name(),
                    refs.len()
                );
                let input = FlattenInput {
                    op,
                    args: &flat_args,
                    arg_types: &arg_types,
                    lookup: &refs,
                };
                out.queries.push(renamed);
                out.restrictions.push(restrict(&input)?);
                (rule.transform)(&input)?
            }
        };
        Ok(out)
    }

    /// Flatten a subquery used as a value; its single column must stay scalar
    fn flatten_subquery(&mut self, query: &Query) -> AlgebraResult<Query> {
        let schema = infer_schema(query, self.universe)?;
        let (flat, env) = self.flatten(query)?;
        let structured = schema
            .columns
            .iter()
            .any(|c| env.get(&c.name).is_some_and(Expr::is_tuple));
        if structured {
            return Err(AlgebraError::not_yet(format!(
                "subquery yielding a structured value {schema}"
            )));
        }
        Ok(flat)
    }
}

fn null_tuple(schema: &Schema) -> Expr {
    Expr::Tuple(
        schema
            .columns
            .iter()
            .map(|c| Expr::Null(c.ty.clone()))
            .collect(),
    )
}
