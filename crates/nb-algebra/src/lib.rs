//! nb-algebra: relational algebra compiler core
//!
//! This crate provides the query IR (expressions, queries, schemas), schema
//! inference with optional type checking, the galaxy registry of virtual
//! relations, and the dbize pass that flattens galaxies and tuple-valued
//! expressions into a plan a SQL generator can print.

pub mod datum;
pub mod dbize;
pub(crate) mod error;
pub mod galaxy;
pub mod infer;
pub mod ir;
pub mod operators;
pub mod universe;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use datum::{datum_to_expr, datum_to_query, expr_to_datum, query_to_datum};
pub use dbize::reify::{reify_record, reify_row};
pub use dbize::{dbize_query, Dbize, Environment, FreshNames};
pub use error::{AlgebraError, AlgebraResult, BoxError};
pub use galaxy::{db_type, db_type_data, Connection, DbTypeData, Galaxy, GalaxyRegistry};
pub use infer::{check_schema, infer_schema, type_of, CheckMode, TypeCheck};
pub use ir::expr::{AggregateOp, Expr, ExprFold, MultiAggregateOp};
pub use ir::operator::{FlattenInput, FlattenRule, Operator};
pub use ir::query::{CombineOp, Direction, Query, RelationHandle, SortKey};
pub use ir::schema::{Column, Schema};
pub use universe::Universe;
