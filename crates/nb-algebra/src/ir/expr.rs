//! Expression tree for the query IR and its generic fold

use super::operator::Operator;
use super::query::Query;
use crate::error::{AlgebraError, AlgebraResult};
use nb_core::builtins;
use nb_core::{Type, Value};
use std::collections::{BTreeSet, HashMap};
use std::convert::Infallible;
use std::sync::Arc;

/// Single-argument aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    /// COUNT
    Count,
    /// SUM
    Sum,
    /// AVG
    Avg,
    /// MIN
    Min,
    /// MAX
    Max,
    /// Sample standard deviation
    Stddev,
    /// Population standard deviation
    StddevPop,
    /// Sample variance
    Variance,
    /// Population variance
    VariancePop,
}

impl AggregateOp {
    /// All aggregate functions
    pub const ALL: [AggregateOp; 9] = [
        AggregateOp::Count,
        AggregateOp::Sum,
        AggregateOp::Avg,
        AggregateOp::Min,
        AggregateOp::Max,
        AggregateOp::Stddev,
        AggregateOp::StddevPop,
        AggregateOp::Variance,
        AggregateOp::VariancePop,
    ];

    /// Datum / display name
    pub fn name(self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Stddev => "stddev",
            AggregateOp::StddevPop => "stddev-pop",
            AggregateOp::Variance => "variance",
            AggregateOp::VariancePop => "variance-pop",
        }
    }

    /// Whether the argument must be numeric
    pub fn needs_numeric(self) -> bool {
        matches!(
            self,
            AggregateOp::Sum
                | AggregateOp::Avg
                | AggregateOp::Stddev
                | AggregateOp::StddevPop
                | AggregateOp::Variance
                | AggregateOp::VariancePop
        )
    }

    /// Whether the argument must be ordered
    pub fn needs_ordered(self) -> bool {
        matches!(self, AggregateOp::Min | AggregateOp::Max)
    }
}

impl std::str::FromStr for AggregateOp {
    type Err = AlgebraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregateOp::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| AlgebraError::invalid(format!("unknown aggregate function '{s}'")))
    }
}

impl std::fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Multi-argument aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiAggregateOp {
    /// Sample covariance
    Covariance,
    /// Population covariance
    CovariancePop,
    /// Correlation coefficient
    Correlation,
}

impl MultiAggregateOp {
    /// Datum / display name
    pub fn name(self) -> &'static str {
        match self {
            MultiAggregateOp::Covariance => "covariance",
            MultiAggregateOp::CovariancePop => "covariance-pop",
            MultiAggregateOp::Correlation => "correlation",
        }
    }
}

impl std::str::FromStr for MultiAggregateOp {
    type Err = AlgebraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            MultiAggregateOp::Covariance,
            MultiAggregateOp::CovariancePop,
            MultiAggregateOp::Correlation,
        ]
        .into_iter()
        .find(|op| op.name() == s)
        .ok_or_else(|| AlgebraError::invalid(format!("unknown aggregate function '{s}'")))
    }
}

/// Expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to an attribute of the underlying query
    Attr(String),

    /// Typed constant
    Const {
        /// Type of the constant
        ty: Type,
        /// The value, a member of `ty`
        value: Value,
    },

    /// Typed NULL
    Null(Type),

    /// Operator application
    Apply {
        /// Operator
        op: Arc<Operator>,
        /// Arguments, in order
        args: Vec<Expr>,
    },

    /// Composite value spread over several expressions. Only exists during
    /// flattening; never reaches SQL generation.
    Tuple(Vec<Expr>),

    /// Single-argument aggregation
    Aggregate {
        /// Aggregate function
        op: AggregateOp,
        /// Aggregated expression
        arg: Box<Expr>,
    },

    /// Multi-argument aggregation (covariance, correlation)
    MultiAggregate {
        /// Aggregate function
        op: MultiAggregateOp,
        /// Aggregated expressions
        args: Vec<Expr>,
    },

    /// CASE WHEN ... THEN ... ELSE ... END
    Case {
        /// `(condition, result)` pairs, tested in order
        branches: Vec<(Expr, Expr)>,
        /// ELSE result
        default: Box<Expr>,
    },

    /// Single-column, single-row subquery used as a value
    ScalarSubquery(Box<Query>),

    /// Single-column subquery used as a set value
    SetSubquery(Box<Query>),
}

impl Expr {
    /// Attribute reference
    pub fn attr(name: impl Into<String>) -> Self {
        Expr::Attr(name.into())
    }

    /// Typed constant; fails if `value` is not a member of `ty`
    pub fn constant(ty: Type, value: Value) -> AlgebraResult<Self> {
        builtins::ensure_member(&ty, &value)?;
        Ok(Expr::Const { ty, value })
    }

    /// Integer constant
    pub fn int(i: i64) -> Self {
        Expr::Const {
            ty: builtins::integer(),
            value: Value::Integer(i),
        }
    }

    /// String constant
    pub fn string(s: impl Into<String>) -> Self {
        Expr::Const {
            ty: builtins::string(),
            value: Value::String(s.into()),
        }
    }

    /// Boolean constant
    pub fn boolean(b: bool) -> Self {
        Expr::Const {
            ty: builtins::boolean(),
            value: Value::Boolean(b),
        }
    }

    /// Typed NULL
    pub fn null(ty: Type) -> Self {
        Expr::Null(ty)
    }

    /// Apply `op` to any number of arguments
    pub fn apply(op: &Arc<Operator>, args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Apply {
            op: Arc::clone(op),
            args: args.into_iter().collect(),
        }
    }

    /// Tuple of expressions
    pub fn tuple(items: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Tuple(items.into_iter().collect())
    }

    /// Aggregation
    pub fn aggregate(op: AggregateOp, arg: Expr) -> Self {
        Expr::Aggregate {
            op,
            arg: Box::new(arg),
        }
    }

    /// CASE expression
    pub fn case(branches: Vec<(Expr, Expr)>, default: Expr) -> Self {
        Expr::Case {
            branches,
            default: Box::new(default),
        }
    }

    /// Fold the tree bottom-up, one handler per variant
    pub fn fold<F: ExprFold + ?Sized>(&self, f: &mut F) -> Result<F::Output, F::Error> {
        match self {
            Expr::Attr(name) => f.attr(name),
            Expr::Const { ty, value } => f.constant(ty, value),
            Expr::Null(ty) => f.null(ty),
            Expr::Apply { op, args } => {
                let args = args.iter().map(|a| a.fold(f)).collect::<Result<_, _>>()?;
                f.apply(op, args)
            }
            Expr::Tuple(items) => {
                let items = items.iter().map(|e| e.fold(f)).collect::<Result<_, _>>()?;
                f.tuple(items)
            }
            Expr::Aggregate { op, arg } => {
                let arg = arg.fold(f)?;
                f.aggregate(*op, arg)
            }
            Expr::MultiAggregate { op, args } => {
                let args = args.iter().map(|a| a.fold(f)).collect::<Result<_, _>>()?;
                f.multi_aggregate(*op, args)
            }
            Expr::Case { branches, default } => {
                let branches = branches
                    .iter()
                    .map(|(c, r)| Ok((c.fold(f)?, r.fold(f)?)))
                    .collect::<Result<_, F::Error>>()?;
                let default = default.fold(f)?;
                f.case(branches, default)
            }
            Expr::ScalarSubquery(query) => f.scalar_subquery(query),
            Expr::SetSubquery(query) => f.set_subquery(query),
        }
    }

    /// Names of all attributes referenced outside subqueries
    pub fn attribute_names(&self) -> BTreeSet<String> {
        infallible(self.fold(&mut AttributeNames))
    }

    /// Replace attribute references by the bound expressions
    pub fn substitute(&self, bindings: &HashMap<String, Expr>) -> Expr {
        infallible(self.fold(&mut Substitute { bindings }))
    }

    /// Number of aggregations outside subqueries
    pub fn aggregate_count(&self) -> usize {
        infallible(self.fold(&mut CountAggregates))
    }

    /// Whether the expression aggregates directly (not inside a subquery)
    pub fn contains_aggregate(&self) -> bool {
        self.aggregate_count() > 0
    }

    /// Whether this is a [`Expr::Tuple`]
    pub fn is_tuple(&self) -> bool {
        matches!(self, Expr::Tuple(_))
    }

    /// Leaves of a (possibly nested) tuple, or the expression itself
    pub fn leaves(&self) -> Vec<&Expr> {
        match self {
            Expr::Tuple(items) => items.iter().flat_map(Expr::leaves).collect(),
            other => vec![other],
        }
    }
}

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

/// Catamorphism over [`Expr`]. Children are folded before their parent's
/// handler runs; subqueries are handed over unfolded.
pub trait ExprFold {
    /// Result of folding one node
    type Output;
    /// Error that aborts the fold
    type Error;

    /// [`Expr::Attr`]
    fn attr(&mut self, name: &str) -> Result<Self::Output, Self::Error>;
    /// [`Expr::Const`]
    fn constant(&mut self, ty: &Type, value: &Value) -> Result<Self::Output, Self::Error>;
    /// [`Expr::Null`]
    fn null(&mut self, ty: &Type) -> Result<Self::Output, Self::Error>;
    /// [`Expr::Apply`]
    fn apply(
        &mut self,
        op: &Arc<Operator>,
        args: Vec<Self::Output>,
    ) -> Result<Self::Output, Self::Error>;
    /// [`Expr::Tuple`]
    fn tuple(&mut self, items: Vec<Self::Output>) -> Result<Self::Output, Self::Error>;
    /// [`Expr::Aggregate`]
    fn aggregate(
        &mut self,
        op: AggregateOp,
        arg: Self::Output,
    ) -> Result<Self::Output, Self::Error>;
    /// [`Expr::MultiAggregate`]
    fn multi_aggregate(
        &mut self,
        op: MultiAggregateOp,
        args: Vec<Self::Output>,
    ) -> Result<Self::Output, Self::Error>;
    /// [`Expr::Case`]
    fn case(
        &mut self,
        branches: Vec<(Self::Output, Self::Output)>,
        default: Self::Output,
    ) -> Result<Self::Output, Self::Error>;
    /// [`Expr::ScalarSubquery`]
    fn scalar_subquery(&mut self, query: &Query) -> Result<Self::Output, Self::Error>;
    /// [`Expr::SetSubquery`]
    fn set_subquery(&mut self, query: &Query) -> Result<Self::Output, Self::Error>;
}

struct AttributeNames;

impl ExprFold for AttributeNames {
    type Output = BTreeSet<String>;
    type Error = Infallible;

    fn attr(&mut self, name: &str) -> Result<Self::Output, Infallible> {
        Ok(BTreeSet::from([name.to_string()]))
    }
    fn constant(&mut self, _: &Type, _: &Value) -> Result<Self::Output, Infallible> {
        Ok(BTreeSet::new())
    }
    fn null(&mut self, _: &Type) -> Result<Self::Output, Infallible> {
        Ok(BTreeSet::new())
    }
    fn apply(
        &mut self,
        _: &Arc<Operator>,
        args: Vec<Self::Output>,
    ) -> Result<Self::Output, Infallible> {
        Ok(args.into_iter().flatten().collect())
    }
    fn tuple(&mut self, items: Vec<Self::Output>) -> Result<Self::Output, Infallible> {
        Ok(items.into_iter().flatten().collect())
    }
    fn aggregate(&mut self, _: AggregateOp, arg: Self::Output) -> Result<Self::Output, Infallible> {
        Ok(arg)
    }
    fn multi_aggregate(
        &mut self,
        _: MultiAggregateOp,
        args: Vec<Self::Output>,
    ) -> Result<Self::Output, Infallible> {
        Ok(args.into_iter().flatten().collect())
    }
    fn case(
        &mut self,
        branches: Vec<(Self::Output, Self::Output)>,
        mut default: Self::Output,
    ) -> Result<Self::Output, Infallible> {
        for (c, r) in branches {
            default.extend(c);
            default.extend(r);
        }
        Ok(default)
    }
    fn scalar_subquery(&mut self, _: &Query) -> Result<Self::Output, Infallible> {
        Ok(BTreeSet::new())
    }
    fn set_subquery(&mut self, _: &Query) -> Result<Self::Output, Infallible> {
        Ok(BTreeSet::new())
    }
}

struct Substitute<'a> {
    bindings: &'a HashMap<String, Expr>,
}

impl ExprFold for Substitute<'_> {
    type Output = Expr;
    type Error = Infallible;

    fn attr(&mut self, name: &str) -> Result<Expr, Infallible> {
        Ok(self
            .bindings
            .get(name)
            .cloned()
            .unwrap_or_else(|| Expr::attr(name)))
    }
    fn constant(&mut self, ty: &Type, value: &Value) -> Result<Expr, Infallible> {
        Ok(Expr::Const {
            ty: ty.clone(),
            value: value.clone(),
        })
    }
    fn null(&mut self, ty: &Type) -> Result<Expr, Infallible> {
        Ok(Expr::Null(ty.clone()))
    }
    fn apply(&mut self, op: &Arc<Operator>, args: Vec<Expr>) -> Result<Expr, Infallible> {
        Ok(Expr::apply(op, args))
    }
    fn tuple(&mut self, items: Vec<Expr>) -> Result<Expr, Infallible> {
        Ok(Expr::Tuple(items))
    }
    fn aggregate(&mut self, op: AggregateOp, arg: Expr) -> Result<Expr, Infallible> {
        Ok(Expr::aggregate(op, arg))
    }
    fn multi_aggregate(&mut self, op: MultiAggregateOp, args: Vec<Expr>) -> Result<Expr, Infallible> {
        Ok(Expr::MultiAggregate { op, args })
    }
    fn case(&mut self, branches: Vec<(Expr, Expr)>, default: Expr) -> Result<Expr, Infallible> {
        Ok(Expr::case(branches, default))
    }
    fn scalar_subquery(&mut self, query: &Query) -> Result<Expr, Infallible> {
        Ok(Expr::ScalarSubquery(Box::new(query.clone())))
    }
    fn set_subquery(&mut self, query: &Query) -> Result<Expr, Infallible> {
        Ok(Expr::SetSubquery(Box::new(query.clone())))
    }
}

struct CountAggregates;

impl ExprFold for CountAggregates {
    type Output = usize;
    type Error = Infallible;

    fn attr(&mut self, _: &str) -> Result<usize, Infallible> {
        Ok(0)
    }
    fn constant(&mut self, _: &Type, _: &Value) -> Result<usize, Infallible> {
        Ok(0)
    }
    fn null(&mut self, _: &Type) -> Result<usize, Infallible> {
        Ok(0)
    }
    fn apply(&mut self, _: &Arc<Operator>, args: Vec<usize>) -> Result<usize, Infallible> {
        Ok(args.into_iter().sum())
    }
    fn tuple(&mut self, items: Vec<usize>) -> Result<usize, Infallible> {
        Ok(items.into_iter().sum())
    }
    fn aggregate(&mut self, _: AggregateOp, arg: usize) -> Result<usize, Infallible> {
        Ok(arg + 1)
    }
    fn multi_aggregate(&mut self, _: MultiAggregateOp, args: Vec<usize>) -> Result<usize, Infallible> {
        Ok(args.into_iter().sum::<usize>() + 1)
    }
    fn case(&mut self, branches: Vec<(usize, usize)>, default: usize) -> Result<usize, Infallible> {
        Ok(branches.into_iter().map(|(c, r)| c + r).sum::<usize>() + default)
    }
    fn scalar_subquery(&mut self, _: &Query) -> Result<usize, Infallible> {
        Ok(0)
    }
    fn set_subquery(&mut self, _: &Query) -> Result<usize, Infallible> {
        Ok(0)
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Attr(name) => f.write_str(name),
            Expr::Const { value, .. } => write!(f, "{value}"),
            Expr::Null(ty) => write!(f, "NULL::{ty}"),
            Expr::Apply { op, args } => {
                let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                f.write_str(&op.render(&args))
            }
            Expr::Tuple(items) => write!(f, "TUPLE({})", join(items)),
            Expr::Aggregate { op, arg } => write!(f, "{op}({arg})"),
            Expr::MultiAggregate { op, args } => write!(f, "{}({})", op.name(), join(args)),
            Expr::Case { branches, default } => {
                write!(f, "CASE")?;
                for (cond, result) in branches {
                    write!(f, " WHEN {cond} THEN {result}")?;
                }
                write!(f, " ELSE {default} END")
            }
            Expr::ScalarSubquery(_) => write!(f, "(subquery)"),
            Expr::SetSubquery(_) => write!(f, "SET(subquery)"),
        }
    }
}

fn join(items: &[Expr]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[test]
    fn test_attribute_names_skip_subqueries() {
        let expr = Expr::apply(
            &plus(),
            [
                Expr::attr("a"),
                Expr::ScalarSubquery(Box::new(t_relation())),
            ],
        );
        let names: Vec<String> = expr.attribute_names().into_iter().collect();
        assert_eq!(names, vec!["a".to_string()]);
    }

    #[test]
    fn test_substitute_replaces_attributes() {
        let expr = Expr::apply(&plus(), [Expr::attr("a"), Expr::int(1)]);
        let bindings = HashMap::from([("a".to_string(), Expr::attr("z"))]);
        let replaced = expr.substitute(&bindings);
        assert_eq!(replaced, Expr::apply(&plus(), [Expr::attr("z"), Expr::int(1)]));
    }

    #[test]
    fn test_aggregate_count() {
        let expr = Expr::apply(
            &plus(),
            [
                Expr::aggregate(AggregateOp::Sum, Expr::attr("a")),
                Expr::aggregate(AggregateOp::Count, Expr::attr("b")),
            ],
        );
        assert_eq!(expr.aggregate_count(), 2);
        assert!(!Expr::attr("a").contains_aggregate());
    }

    #[test]
    fn test_constant_checks_membership() {
        assert!(Expr::constant(nb_core::builtins::integer(), Value::from("x")).is_err());
        assert!(Expr::constant(nb_core::builtins::integer(), Value::Integer(2)).is_ok());
    }

    #[test]
    fn test_leaves_of_nested_tuple() {
        let expr = Expr::tuple([
            Expr::attr("a"),
            Expr::tuple([Expr::attr("b"), Expr::attr("c")]),
        ]);
        let leaves: Vec<String> = expr.leaves().iter().map(|e| e.to_string()).collect();
        assert_eq!(leaves, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_aggregate_names_roundtrip() {
        for op in AggregateOp::ALL {
            assert_eq!(op.name().parse::<AggregateOp>().unwrap(), op);
        }
        assert!("median".parse::<AggregateOp>().is_err());
    }

    #[test]
    fn test_display_uses_operator_render() {
        let expr = Expr::apply(&plus(), [Expr::attr("a"), Expr::int(1)]);
        assert_eq!(expr.to_string(), "(a + 1)");
    }
}
