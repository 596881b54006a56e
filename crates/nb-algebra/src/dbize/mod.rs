//! Flattening pass ("dbize")
//!
//! Rewrites a query that references galaxies or tuple-valued expressions
//! into an equivalent query over ordinary base relations whose expressions
//! are all scalar. Alongside the flat query it returns an [`Environment`]
//! recording which flattened columns make up each structured attribute.
//!
//! Every column the pass introduces draws its name from one [`FreshNames`]
//! generator owned by the compilation, so aliases never collide.

mod expr;
pub mod reify;

pub use expr::Flattened;

use crate::error::{AlgebraError, AlgebraResult};
use crate::infer::{check_schema, infer_schema};
use crate::ir::expr::Expr;
use crate::ir::query::{CombineOp, Query, SortKey};
use crate::universe::Universe;
use nb_core::CompilerConfig;
use std::collections::HashMap;

/// Monotonic `<prefix>_<n>` name generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreshNames {
    prefix: String,
    issued: usize,
}

impl FreshNames {
    /// Generator issuing `prefix_1`, `prefix_2`, ...
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            issued: 0,
        }
    }

    /// Next unused name
    pub fn fresh(&mut self) -> String {
        self.issued += 1;
        format!("{}_{}", self.prefix, self.issued)
    }

    /// How many names were handed out
    pub fn issued(&self) -> usize {
        self.issued
    }
}

impl Default for FreshNames {
    fn default() -> Self {
        Self::new(CompilerConfig::default().fresh_prefix)
    }
}

/// Logical attribute name to its flattened representation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    bindings: HashMap<String, Expr>,
}

impl Environment {
    /// Empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, shadowing any previous binding
    pub fn bind(&mut self, name: impl Into<String>, expr: Expr) {
        self.bindings.insert(name.into(), expr);
    }

    /// Flattened representation of `name`
    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.bindings.get(name)
    }

    /// Add all of `other`'s bindings; `other` wins on conflicts
    pub fn extend(&mut self, other: Environment) {
        self.bindings.extend(other.bindings);
    }

    /// Number of bindings
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is bound
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// All bindings, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Flatten `query` in one call: optionally type-check it, then run the
/// pass with a generator using the configured prefix.
pub fn dbize_query(
    universe: &Universe,
    config: &CompilerConfig,
    query: &Query,
) -> AlgebraResult<(Query, Environment)> {
    if config.check_types {
        check_schema(query, universe)?;
    }
    let mut dbize = Dbize::new(universe, FreshNames::new(config.fresh_prefix.clone()));
    let result = dbize.flatten(query)?;
    log::debug!(
        "Flattened query using {} fresh name(s)",
        dbize.names.issued()
    );
    Ok(result)
}

/// State of one flattening run
pub struct Dbize<'u> {
    universe: &'u Universe,
    names: FreshNames,
}

impl<'u> Dbize<'u> {
    /// Start a run against `universe`
    pub fn new(universe: &'u Universe, names: FreshNames) -> Self {
        Self { universe, names }
    }

    /// Hand back the name generator, e.g. to continue numbering
    pub fn into_names(self) -> FreshNames {
        self.names
    }

    /// Project every column of `query` to a fresh name. Returns the renamed
    /// query and references to the new columns in order.
    pub fn rename_query(&mut self, query: &Query) -> AlgebraResult<(Query, Vec<Expr>)> {
        let schema = infer_schema(query, self.universe)?;
        let mut columns = Vec::with_capacity(schema.len());
        let mut refs = Vec::with_capacity(schema.len());
        for column in &schema.columns {
            let fresh = self.names.fresh();
            refs.push(Expr::attr(fresh.clone()));
            columns.push((fresh, Expr::attr(column.name.clone())));
        }
        Ok((Query::project(columns, query.clone())?, refs))
    }

    /// Flatten a query
    pub fn flatten(&mut self, query: &Query) -> AlgebraResult<(Query, Environment)> {
        match query {
            Query::Empty => Ok((Query::Empty, Environment::new())),

            Query::BaseRelation { name, .. } => match query.galaxy() {
                Some(galaxy) => {
                    let (underlying, _) = self.flatten(galaxy.query())?;
                    let (renamed, refs) = self.rename_query(&underlying)?;
                    log::debug!(
                        "Expanded galaxy '{}' into {} column(s)",
                        name,
                        refs.len()
                    );
                    let mut env = Environment::new();
                    env.bind(name.clone(), Expr::Tuple(refs));
                    Ok((renamed, env))
                }
                None => Ok((query.clone(), Environment::new())),
            },

            Query::Project { columns, input } => self.flatten_project(columns, input),

            Query::Restrict { predicate, input } => self.flatten_restrict(predicate, input),

            Query::Combine { op, left, right } => self.flatten_combine(*op, left, right),

            Query::GroupingProject { columns, input } => {
                let (flat_input, env) = self.flatten(input)?;
                let schema = infer_schema(input, self.universe)?;
                let mut flat_columns = Vec::with_capacity(columns.len());
                for (name, expr) in columns {
                    let flat = self.flatten_expr(expr, &env, &schema)?;
                    if flat.expr.is_tuple() || !flat.is_self_contained() {
                        return Err(AlgebraError::not_yet(format!(
                            "grouping column '{name}' over a structured value"
                        )));
                    }
                    flat_columns.push((name.clone(), flat.expr));
                }
                // every grouped column is scalar, so nothing stays structured
                Ok((
                    Query::GroupingProject {
                        columns: flat_columns,
                        input: Box::new(flat_input),
                    },
                    Environment::new(),
                ))
            }

            Query::Order { keys, input } => {
                let (flat_input, env) = self.flatten(input)?;
                let schema = infer_schema(input, self.universe)?;
                let mut flat_keys = Vec::with_capacity(keys.len());
                for key in keys {
                    let flat = self.flatten_expr(&key.expr, &env, &schema)?;
                    if !flat.is_self_contained() {
                        return Err(AlgebraError::UnsupportedOrderingExpression {
                            expr: key.expr.to_string(),
                        });
                    }
                    flat_keys.extend(flat.expr.leaves().into_iter().map(|leaf| SortKey {
                        expr: leaf.clone(),
                        direction: key.direction,
                    }));
                }
                Ok((
                    Query::Order {
                        keys: flat_keys,
                        input: Box::new(flat_input),
                    },
                    env,
                ))
            }

            Query::Top {
                offset,
                count,
                input,
            } => {
                let (flat_input, env) = self.flatten(input)?;
                Ok((Query::top(*offset, *count, flat_input), env))
            }
        }
    }

    fn flatten_project(
        &mut self,
        columns: &[(String, Expr)],
        input: &Query,
    ) -> AlgebraResult<(Query, Environment)> {
        let (flat_input, env) = self.flatten(input)?;
        let schema = infer_schema(input, self.universe)?;

        let mut sources = vec![flat_input];
        let mut restrictions = Vec::new();
        let mut flat_columns = Vec::with_capacity(columns.len());
        let mut bindings = Environment::new();

        for (name, expr) in columns {
            let flat = self.flatten_expr(expr, &env, &schema)?;
            sources.extend(flat.queries);
            restrictions.extend(flat.restrictions);
            if flat.expr.is_tuple() {
                let refs = self.spread(flat.expr, &mut flat_columns);
                bindings.bind(name.clone(), refs);
            } else {
                flat_columns.push((name.clone(), flat.expr));
            }
        }

        let source = restrictions
            .into_iter()
            .fold(Query::product_all(sources), |q, r| Query::restrict(r, q));

        // only the projected columns survive; a structured attribute passed
        // through under a new name stays reachable under its old one
        for (name, expr) in columns {
            let Expr::Attr(source_name) = expr else {
                continue;
            };
            let shadowed = columns.iter().any(|(n, _)| n == source_name);
            if shadowed
                || env.get(source_name).is_none()
                || bindings.get(source_name).is_some()
            {
                continue;
            }
            if let Some(refs) = bindings.get(name).cloned() {
                bindings.bind(source_name.clone(), refs);
            }
        }

        Ok((
            Query::Project {
                columns: flat_columns,
                input: Box::new(source),
            },
            bindings,
        ))
    }

    fn flatten_combine(
        &mut self,
        op: CombineOp,
        left: &Query,
        right: &Query,
    ) -> AlgebraResult<(Query, Environment)> {
        let (flat_left, left_env) = self.flatten(left)?;
        let (flat_right, right_env) = self.flatten(right)?;
        let combine = |right: Query| Query::Combine {
            op,
            left: Box::new(flat_left),
            right: Box::new(right),
        };
        if left_env.is_empty() && right_env.is_empty() {
            return Ok((combine(flat_right), left_env));
        }

        let left_schema = infer_schema(left, self.universe)?;
        let right_schema = infer_schema(right, self.universe)?;
        match op {
            CombineOp::Product => {
                // a colliding name keeps the left column
                let mut env = left_env;
                for (name, rep) in right_env.iter() {
                    if !left_schema.contains(name) {
                        env.bind(name, rep.clone());
                    }
                }
                Ok((combine(flat_right), env))
            }
            CombineOp::Quotient => {
                let pairs: Vec<(&str, &str)> = right_schema
                    .columns
                    .iter()
                    .map(|c| (c.name.as_str(), c.name.as_str()))
                    .collect();
                let aligned = align_operand(&pairs, &left_env, &right_env, flat_right)?;
                let mut env = Environment::new();
                for (name, rep) in left_env.iter() {
                    if !right_schema.contains(name) {
                        env.bind(name, rep.clone());
                    }
                }
                Ok((combine(aligned), env))
            }
            CombineOp::Union | CombineOp::Intersection | CombineOp::Difference => {
                if left_schema.len() != right_schema.len() {
                    return Err(AlgebraError::invalid(format!(
                        "{op} operands have {} and {} column(s)",
                        left_schema.len(),
                        right_schema.len()
                    )));
                }
                let pairs: Vec<(&str, &str)> = left_schema
                    .columns
                    .iter()
                    .zip(&right_schema.columns)
                    .map(|(l, r)| (l.name.as_str(), r.name.as_str()))
                    .collect();
                let aligned = align_operand(&pairs, &left_env, &right_env, flat_right)?;
                Ok((combine(aligned), left_env))
            }
        }
    }

    /// Give every leaf of a tuple its own fresh output column; returns the
    /// tuple of references with the original nesting
    fn spread(&mut self, expr: Expr, columns: &mut Vec<(String, Expr)>) -> Expr {
        match expr {
            Expr::Tuple(items) => Expr::Tuple(
                items
                    .into_iter()
                    .map(|item| self.spread(item, columns))
                    .collect(),
            ),
            leaf => {
                let fresh = self.names.fresh();
                columns.push((fresh.clone(), leaf));
                Expr::attr(fresh)
            }
        }
    }

    fn flatten_restrict(
        &mut self,
        predicate: &Expr,
        input: &Query,
    ) -> AlgebraResult<(Query, Environment)> {
        let (flat_input, env) = self.flatten(input)?;
        let schema = infer_schema(input, self.universe)?;
        let flat = self.flatten_expr(predicate, &env, &schema)?;
        if flat.expr.is_tuple() {
            return Err(AlgebraError::invalid(format!(
                "restriction predicate '{predicate}' is not a scalar"
            )));
        }

        if flat.queries.is_empty() {
            let restricted = flat
                .restrictions
                .into_iter()
                .fold(Query::restrict(flat.expr, flat_input), |q, r| {
                    Query::restrict(r, q)
                });
            return Ok((restricted, env));
        }

        let visible = infer_schema(&flat_input, self.universe)?;
        let mut sources = vec![flat_input];
        sources.extend(flat.queries);
        let restricted = flat.restrictions.into_iter().fold(
            Query::restrict(flat.expr, Query::product_all(sources)),
            |q, r| Query::restrict(r, q),
        );
        let columns = visible
            .columns
            .iter()
            .map(|c| (c.name.clone(), Expr::attr(c.name.clone())))
            .collect();
        Ok((
            Query::Project {
                columns,
                input: Box::new(restricted),
            },
            env,
        ))
    }
}

/// Re-project the flat right operand of a set operation so that each
/// `(left, right)` column pair ends up under the left side's flat names
fn align_operand(
    pairs: &[(&str, &str)],
    left_env: &Environment,
    right_env: &Environment,
    flat_right: Query,
) -> AlgebraResult<Query> {
    let mut columns = Vec::new();
    for (left_name, right_name) in pairs {
        let targets = flat_columns_of(left_env, left_name)?;
        let sources = flat_columns_of(right_env, right_name)?;
        if targets.len() != sources.len() {
            return Err(AlgebraError::invalid(format!(
                "columns '{left_name}' and '{right_name}' flatten to {} and {} column(s)",
                targets.len(),
                sources.len()
            )));
        }
        columns.extend(targets.into_iter().zip(sources.into_iter().map(Expr::attr)));
    }
    Query::project(columns, flat_right)
}

/// Flat column names that carry the logical attribute `name`
fn flat_columns_of(env: &Environment, name: &str) -> AlgebraResult<Vec<String>> {
    match env.get(name) {
        None => Ok(vec![name.to_string()]),
        Some(rep) => rep
            .leaves()
            .into_iter()
            .map(|leaf| match leaf {
                Expr::Attr(column) => Ok(column.clone()),
                other => Err(AlgebraError::invalid(format!(
                    "'{name}' is bound to '{other}', not a column"
                ))),
            })
            .collect(),
    }
}

#[cfg(test)]
#[path = "dbize_test.rs"]
mod tests;
