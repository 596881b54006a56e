//! Datum form of expressions and queries
//!
//! Nodes serialize as tagged JSON arrays, e.g.
//! `["restrict", ["application", ">", [["attribute-ref", "a"], ["const", "integer", 0]]], ["base-relation", "T"]]`.
//! Base relations are written by name only; decoding resolves relations,
//! operators and base types through a [`Universe`].

use crate::error::{AlgebraError, AlgebraResult};
use crate::ir::expr::{AggregateOp, Expr, ExprFold, MultiAggregateOp};
use crate::ir::operator::Operator;
use crate::ir::query::{CombineOp, Direction, Query, SortKey};
use crate::universe::Universe;
use nb_core::datum::{as_array, as_str, as_u64, payload, tagged, untag};
use nb_core::{
    const_to_datum, datum_to_const, datum_to_type, type_to_datum, CoreError, Datum, Type, Value,
};
use std::sync::Arc;

/// Serialize an expression
pub fn expr_to_datum(expr: &Expr) -> AlgebraResult<Datum> {
    expr.fold(&mut ToDatum)
}

/// Serialize a query
pub fn query_to_datum(query: &Query) -> AlgebraResult<Datum> {
    Ok(match query {
        Query::Empty => tagged("empty", vec![]),
        Query::BaseRelation { name, .. } => {
            tagged("base-relation", vec![Datum::from(name.as_str())])
        }
        Query::Project { columns, input } => tagged(
            "project",
            vec![columns_to_datum(columns)?, query_to_datum(input)?],
        ),
        Query::GroupingProject { columns, input } => tagged(
            "grouping-project",
            vec![columns_to_datum(columns)?, query_to_datum(input)?],
        ),
        Query::Restrict { predicate, input } => tagged(
            "restrict",
            vec![expr_to_datum(predicate)?, query_to_datum(input)?],
        ),
        Query::Combine { op, left, right } => tagged(
            op.name(),
            vec![query_to_datum(left)?, query_to_datum(right)?],
        ),
        Query::Order { keys, input } => {
            let keys = keys
                .iter()
                .map(|k| -> AlgebraResult<Datum> {
                    Ok(Datum::Array(vec![
                        expr_to_datum(&k.expr)?,
                        Datum::from(k.direction.name()),
                    ]))
                })
                .collect::<AlgebraResult<Vec<_>>>()?;
            tagged("order", vec![Datum::Array(keys), query_to_datum(input)?])
        }
        Query::Top {
            offset,
            count,
            input,
        } => tagged(
            "top",
            vec![
                Datum::from(*offset),
                Datum::from(*count),
                query_to_datum(input)?,
            ],
        ),
    })
}

fn columns_to_datum(columns: &[(String, Expr)]) -> AlgebraResult<Datum> {
    let items = columns
        .iter()
        .map(|(name, expr)| -> AlgebraResult<Datum> {
            Ok(Datum::Array(vec![
                Datum::from(name.as_str()),
                expr_to_datum(expr)?,
            ]))
        })
        .collect::<AlgebraResult<Vec<_>>>()?;
    Ok(Datum::Array(items))
}

struct ToDatum;

impl ExprFold for ToDatum {
    type Output = Datum;
    type Error = AlgebraError;

    fn attr(&mut self, name: &str) -> AlgebraResult<Datum> {
        Ok(tagged("attribute-ref", vec![Datum::from(name)]))
    }

    fn constant(&mut self, ty: &Type, value: &Value) -> AlgebraResult<Datum> {
        Ok(tagged(
            "const",
            vec![type_to_datum(ty), const_to_datum(ty, value)?],
        ))
    }

    fn null(&mut self, ty: &Type) -> AlgebraResult<Datum> {
        Ok(tagged("null-const", vec![type_to_datum(ty)]))
    }

    fn apply(&mut self, op: &Arc<Operator>, args: Vec<Datum>) -> AlgebraResult<Datum> {
        Ok(tagged(
            "application",
            vec![Datum::from(op.name()), Datum::Array(args)],
        ))
    }

    fn tuple(&mut self, items: Vec<Datum>) -> AlgebraResult<Datum> {
        Ok(tagged("tuple", vec![Datum::Array(items)]))
    }

    fn aggregate(&mut self, op: AggregateOp, arg: Datum) -> AlgebraResult<Datum> {
        Ok(tagged("aggregation", vec![Datum::from(op.name()), arg]))
    }

    fn multi_aggregate(&mut self, op: MultiAggregateOp, args: Vec<Datum>) -> AlgebraResult<Datum> {
        Ok(tagged(
            "multi-aggregation",
            vec![Datum::from(op.name()), Datum::Array(args)],
        ))
    }

    fn case(&mut self, branches: Vec<(Datum, Datum)>, default: Datum) -> AlgebraResult<Datum> {
        let branches = branches
            .into_iter()
            .map(|(c, r)| Datum::Array(vec![c, r]))
            .collect();
        Ok(tagged("case-expr", vec![Datum::Array(branches), default]))
    }

    fn scalar_subquery(&mut self, query: &Query) -> AlgebraResult<Datum> {
        Ok(tagged("scalar-subquery", vec![query_to_datum(query)?]))
    }

    fn set_subquery(&mut self, query: &Query) -> AlgebraResult<Datum> {
        Ok(tagged("set-subquery", vec![query_to_datum(query)?]))
    }
}

/// Deserialize an expression
pub fn datum_to_expr(datum: &Datum, universe: &Universe) -> AlgebraResult<Expr> {
    let (tag, rest) = untag(datum)?;
    match tag {
        "attribute-ref" => {
            let [name] = payload::<1>(tag, rest)?;
            Ok(Expr::attr(as_str("attribute name", name)?))
        }
        "const" => {
            let [ty, value] = payload::<2>(tag, rest)?;
            let ty = datum_to_type(ty, universe)?;
            let value = datum_to_const(&ty, value)?;
            Expr::constant(ty, value)
        }
        "null-const" => {
            let [ty] = payload::<1>(tag, rest)?;
            Ok(Expr::null(datum_to_type(ty, universe)?))
        }
        "application" => {
            let [name, args] = payload::<2>(tag, rest)?;
            let op = universe.require_operator(as_str("operator name", name)?)?;
            Ok(Expr::apply(&op, exprs(args, universe)?))
        }
        "tuple" => {
            let [items] = payload::<1>(tag, rest)?;
            Ok(Expr::Tuple(exprs(items, universe)?))
        }
        "aggregation" => {
            let [op, arg] = payload::<2>(tag, rest)?;
            let op: AggregateOp = as_str("aggregate name", op)?.parse()?;
            Ok(Expr::aggregate(op, datum_to_expr(arg, universe)?))
        }
        "multi-aggregation" => {
            let [op, args] = payload::<2>(tag, rest)?;
            Ok(Expr::MultiAggregate {
                op: as_str("aggregate name", op)?.parse()?,
                args: exprs(args, universe)?,
            })
        }
        "case-expr" => {
            let [branches, default] = payload::<2>(tag, rest)?;
            let branches = as_array("case branches", branches)?
                .iter()
                .map(|branch| -> AlgebraResult<(Expr, Expr)> {
                    match as_array("case branch", branch)? {
                        [cond, result] => Ok((
                            datum_to_expr(cond, universe)?,
                            datum_to_expr(result, universe)?,
                        )),
                        _ => Err(CoreError::malformed("[condition, result]", branch).into()),
                    }
                })
                .collect::<AlgebraResult<Vec<_>>>()?;
            Ok(Expr::case(branches, datum_to_expr(default, universe)?))
        }
        "scalar-subquery" => {
            let [query] = payload::<1>(tag, rest)?;
            Ok(Expr::ScalarSubquery(Box::new(datum_to_query(query, universe)?)))
        }
        "set-subquery" => {
            let [query] = payload::<1>(tag, rest)?;
            Ok(Expr::SetSubquery(Box::new(datum_to_query(query, universe)?)))
        }
        other => Err(CoreError::malformed("expression tag", other).into()),
    }
}

fn exprs(datum: &Datum, universe: &Universe) -> AlgebraResult<Vec<Expr>> {
    as_array("expressions", datum)?
        .iter()
        .map(|d| datum_to_expr(d, universe))
        .collect()
}

fn columns(datum: &Datum, universe: &Universe) -> AlgebraResult<Vec<(String, Expr)>> {
    as_array("projection columns", datum)?
        .iter()
        .map(|column| -> AlgebraResult<(String, Expr)> {
            match as_array("projection column", column)? {
                [name, expr] => Ok((
                    as_str("column name", name)?.to_string(),
                    datum_to_expr(expr, universe)?,
                )),
                _ => Err(CoreError::malformed("[name, expression]", column).into()),
            }
        })
        .collect()
}

/// Deserialize a query
pub fn datum_to_query(datum: &Datum, universe: &Universe) -> AlgebraResult<Query> {
    let (tag, rest) = untag(datum)?;
    match tag {
        "empty" => {
            payload::<0>(tag, rest)?;
            Ok(Query::Empty)
        }
        "base-relation" => {
            let [name] = payload::<1>(tag, rest)?;
            let name = as_str("relation name", name)?;
            universe
                .relation(name)
                .cloned()
                .ok_or_else(|| AlgebraError::UnknownBaseRelation {
                    name: name.to_string(),
                })
        }
        "project" => {
            let [cols, input] = payload::<2>(tag, rest)?;
            Query::project(columns(cols, universe)?, datum_to_query(input, universe)?)
        }
        "grouping-project" => {
            let [cols, input] = payload::<2>(tag, rest)?;
            Query::grouping_project(columns(cols, universe)?, datum_to_query(input, universe)?)
        }
        "restrict" => {
            let [predicate, input] = payload::<2>(tag, rest)?;
            Ok(Query::restrict(
                datum_to_expr(predicate, universe)?,
                datum_to_query(input, universe)?,
            ))
        }
        "order" => {
            let [keys, input] = payload::<2>(tag, rest)?;
            let keys = as_array("ordering keys", keys)?
                .iter()
                .map(|key| -> AlgebraResult<SortKey> {
                    match as_array("ordering key", key)? {
                        [expr, direction] => Ok(SortKey {
                            expr: datum_to_expr(expr, universe)?,
                            direction: as_str("sort direction", direction)?.parse::<Direction>()?,
                        }),
                        _ => Err(CoreError::malformed("[expression, direction]", key).into()),
                    }
                })
                .collect::<AlgebraResult<Vec<_>>>()?;
            Ok(Query::order(keys, datum_to_query(input, universe)?))
        }
        "top" => {
            let [offset, count, input] = payload::<3>(tag, rest)?;
            Ok(Query::top(
                as_u64("offset", offset)?,
                as_u64("count", count)?,
                datum_to_query(input, universe)?,
            ))
        }
        other => {
            let op: CombineOp = other.parse()?;
            let [left, right] = payload::<2>(tag, rest)?;
            Ok(Query::combine(
                op,
                datum_to_query(left, universe)?,
                datum_to_query(right, universe)?,
            ))
        }
    }
}

#[cfg(test)]
#[path = "datum_test.rs"]
mod tests;
