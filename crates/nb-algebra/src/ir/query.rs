//! Relational query tree

use super::expr::Expr;
use super::schema::Schema;
use crate::error::{AlgebraError, AlgebraResult};
use crate::galaxy::Galaxy;
use std::collections::HashSet;
use std::sync::Arc;

/// Binary relational operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CombineOp {
    /// Cartesian product
    Product,
    /// Set union
    Union,
    /// Set intersection
    Intersection,
    /// Relational division
    Quotient,
    /// Set difference
    Difference,
}

impl CombineOp {
    /// All relational operators
    pub const ALL: [CombineOp; 5] = [
        CombineOp::Product,
        CombineOp::Union,
        CombineOp::Intersection,
        CombineOp::Quotient,
        CombineOp::Difference,
    ];

    /// Datum / display name
    pub fn name(self) -> &'static str {
        match self {
            CombineOp::Product => "product",
            CombineOp::Union => "union",
            CombineOp::Intersection => "intersection",
            CombineOp::Quotient => "quotient",
            CombineOp::Difference => "difference",
        }
    }
}

impl std::str::FromStr for CombineOp {
    type Err = AlgebraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CombineOp::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| AlgebraError::UnknownRelationalOperator {
                name: s.to_string(),
            })
    }
}

impl std::fmt::Display for CombineOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Sort direction of an ordering key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Ascending
    #[default]
    Asc,
    /// Descending
    Desc,
}

impl Direction {
    /// Datum name
    pub fn name(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = AlgebraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(AlgebraError::invalid(format!(
                "sort direction must be 'asc' or 'desc', got '{other}'"
            ))),
        }
    }
}

/// One ordering key
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    /// Key expression
    pub expr: Expr,
    /// Direction
    pub direction: Direction,
}

impl SortKey {
    /// Ascending key
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: Direction::Asc,
        }
    }

    /// Descending key
    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: Direction::Desc,
        }
    }
}

/// What a base relation stands for
#[derive(Debug, Clone)]
pub enum RelationHandle {
    /// Ordinary database table
    Table,
    /// Virtual relation backed by a galaxy
    Galaxy(Arc<Galaxy>),
}

impl PartialEq for RelationHandle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RelationHandle::Table, RelationHandle::Table) => true,
            (RelationHandle::Galaxy(a), RelationHandle::Galaxy(b)) => {
                Arc::ptr_eq(a, b) || a.name() == b.name()
            }
            _ => false,
        }
    }
}

/// Relational query tree
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// The relation with no columns and one row; unit of product
    Empty,

    /// Named relation with a known schema
    BaseRelation {
        /// Relation name
        name: String,
        /// Exposed schema
        schema: Schema,
        /// What the relation stands for
        handle: RelationHandle,
    },

    /// Generalized projection: computes each output column from the input row
    Project {
        /// Output columns in order
        columns: Vec<(String, Expr)>,
        /// Input query
        input: Box<Query>,
    },

    /// Selection
    Restrict {
        /// Boolean predicate
        predicate: Expr,
        /// Input query
        input: Box<Query>,
    },

    /// Binary relational operation
    Combine {
        /// Operator
        op: CombineOp,
        /// Left operand
        left: Box<Query>,
        /// Right operand
        right: Box<Query>,
    },

    /// Projection with aggregation; non-aggregated columns group
    GroupingProject {
        /// Output columns in order
        columns: Vec<(String, Expr)>,
        /// Input query
        input: Box<Query>,
    },

    /// Sort
    Order {
        /// Keys, most significant first
        keys: Vec<SortKey>,
        /// Input query
        input: Box<Query>,
    },

    /// Row window (OFFSET / LIMIT)
    Top {
        /// Rows to skip
        offset: u64,
        /// Rows to keep
        count: u64,
        /// Input query
        input: Box<Query>,
    },
}

fn check_unique(columns: &[(String, Expr)]) -> AlgebraResult<()> {
    let mut seen = HashSet::new();
    for (name, _) in columns {
        if !seen.insert(name.as_str()) {
            return Err(AlgebraError::invalid(format!(
                "projection maps column '{name}' more than once"
            )));
        }
    }
    Ok(())
}

impl Query {
    /// Ordinary table
    pub fn base_relation(name: impl Into<String>, schema: Schema) -> Self {
        Query::BaseRelation {
            name: name.into(),
            schema,
            handle: RelationHandle::Table,
        }
    }

    /// Projection. An empty mapping over a projection re-wraps the
    /// projection's input instead of nesting.
    pub fn project(columns: Vec<(String, Expr)>, input: Query) -> AlgebraResult<Self> {
        check_unique(&columns)?;
        match input {
            Query::Project { input: inner, .. } if columns.is_empty() => {
                Query::project(columns, *inner)
            }
            input => Ok(Query::Project {
                columns,
                input: Box::new(input),
            }),
        }
    }

    /// Projection with aggregation
    pub fn grouping_project(columns: Vec<(String, Expr)>, input: Query) -> AlgebraResult<Self> {
        check_unique(&columns)?;
        Ok(Query::GroupingProject {
            columns,
            input: Box::new(input),
        })
    }

    /// Selection
    pub fn restrict(predicate: Expr, input: Query) -> Self {
        Query::Restrict {
            predicate,
            input: Box::new(input),
        }
    }

    /// Binary operation. `Empty` is the identity of product on both sides.
    pub fn combine(op: CombineOp, left: Query, right: Query) -> Self {
        match (op, left, right) {
            (CombineOp::Product, Query::Empty, q) | (CombineOp::Product, q, Query::Empty) => q,
            (op, left, right) => Query::Combine {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    /// Parse the operator name, then [`Query::combine`]
    pub fn combine_named(op: &str, left: Query, right: Query) -> AlgebraResult<Self> {
        Ok(Query::combine(op.parse()?, left, right))
    }

    /// Product of two queries
    pub fn product(left: Query, right: Query) -> Self {
        Query::combine(CombineOp::Product, left, right)
    }

    /// Product of many queries, left-associated
    pub fn product_all(queries: impl IntoIterator<Item = Query>) -> Self {
        queries.into_iter().fold(Query::Empty, Query::product)
    }

    /// Sort
    pub fn order(keys: Vec<SortKey>, input: Query) -> Self {
        Query::Order {
            keys,
            input: Box::new(input),
        }
    }

    /// Row window
    pub fn top(offset: u64, count: u64, input: Query) -> Self {
        Query::Top {
            offset,
            count,
            input: Box::new(input),
        }
    }

    /// The galaxy behind a base relation, if any
    pub fn galaxy(&self) -> Option<&Arc<Galaxy>> {
        match self {
            Query::BaseRelation {
                handle: RelationHandle::Galaxy(g),
                ..
            } => Some(g),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_product_identity() {
        let t = t_relation();
        assert_eq!(Query::product(Query::Empty, t.clone()), t);
        assert_eq!(Query::product(t.clone(), Query::Empty), t);
        assert!(matches!(
            Query::combine(CombineOp::Union, Query::Empty, t),
            Query::Combine { .. }
        ));
    }

    #[test]
    fn test_empty_project_collapses() {
        let t = t_relation();
        let inner = Query::project(vec![("x".into(), Expr::attr("a"))], t.clone()).unwrap();
        assert_eq!(
            Query::project(vec![], inner).unwrap(),
            Query::project(vec![], t).unwrap()
        );
    }

    #[test]
    fn test_duplicate_project_names() {
        let err = Query::project(
            vec![("x".into(), Expr::attr("a")), ("x".into(), Expr::attr("b"))],
            t_relation(),
        )
        .unwrap_err();
        assert!(matches!(err, AlgebraError::InvalidArgument { .. }));
    }

    #[test]
    fn test_unknown_relational_operator() {
        let err = Query::combine_named("join", t_relation(), t_relation()).unwrap_err();
        assert!(matches!(err, AlgebraError::UnknownRelationalOperator { name } if name == "join"));
        assert!(Query::combine_named("union", t_relation(), t_relation()).is_ok());
    }
}
