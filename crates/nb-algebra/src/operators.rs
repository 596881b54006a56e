//! Standard scalar operators registered by [`Universe::with_builtins`](crate::Universe::with_builtins)

use crate::error::{AlgebraError, AlgebraResult};
use crate::infer::TypeCheck;
use crate::ir::expr::Expr;
use crate::ir::operator::{FlattenInput, FlattenRule, Operator, RenderFn};
use nb_core::{builtins, Type};
use std::sync::Arc;

/// Arithmetic operator names
pub const ARITHMETIC: [&str; 4] = ["+", "-", "*", "/"];
/// Comparison operator names
pub const COMPARISON: [&str; 6] = ["=", "<>", "<", "<=", ">", ">="];

fn arity(name: &str, expected: usize, args: &[Type]) -> AlgebraResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(AlgebraError::invalid(format!(
            "operator '{name}' takes {expected} argument(s), got {}",
            args.len()
        )))
    }
}

fn infix(symbol: &str) -> RenderFn {
    let symbol = symbol.to_string();
    Arc::new(move |args: &[String]| format!("({})", args.join(&format!(" {symbol} "))))
}

/// Binary arithmetic over numeric arguments; the result has the left type
pub fn arithmetic(name: &str) -> Operator {
    let op_name = name.to_string();
    Operator::new(
        name,
        Arc::new(move |args: &[Type], check: &TypeCheck<'_>| -> AlgebraResult<Type> {
            arity(&op_name, 2, args)?;
            check.expect_numeric(&args[0])?;
            check.expect_numeric(&args[1])?;
            check.require(
                args[0].non_null() == args[1].non_null(),
                &args[0],
                &args[1],
            )?;
            Ok(args[0].clone())
        }),
    )
    .with_render(infix(name))
}

/// Binary comparison yielding a boolean. Equality and inequality also
/// compare tuples component-wise after flattening.
pub fn comparison(name: &str) -> Operator {
    let op_name = name.to_string();
    let ordering = !matches!(name, "=" | "<>");
    let op = Operator::new(
        name,
        Arc::new(move |args: &[Type], check: &TypeCheck<'_>| -> AlgebraResult<Type> {
            arity(&op_name, 2, args)?;
            check.require(
                args[0].non_null() == args[1].non_null(),
                &args[0],
                &args[1],
            )?;
            if ordering {
                check.expect_ordered(&args[0])?;
            }
            Ok(builtins::boolean())
        }),
    )
    .with_render(infix(name));

    match name {
        "=" => op.with_flatten(component_wise(Arc::new(logical("and")))),
        "<>" => op.with_flatten(component_wise(Arc::new(logical("or")))),
        _ => op,
    }
}

/// Rule that splits a comparison of two tuples into per-component
/// comparisons joined by `joiner`
fn component_wise(joiner: Arc<Operator>) -> FlattenRule {
    FlattenRule::transform(Arc::new(move |input: &FlattenInput<'_>| {
        match input.args {
            [left, right] => compare_tuples(input.op, &joiner, left, right),
            args => Ok(Expr::apply(input.op, args.iter().cloned())),
        }
    }))
}

fn compare_tuples(
    op: &Arc<Operator>,
    joiner: &Arc<Operator>,
    left: &Expr,
    right: &Expr,
) -> AlgebraResult<Expr> {
    match (left, right) {
        (Expr::Tuple(ls), Expr::Tuple(rs)) if ls.len() == rs.len() => {
            let mut parts = ls
                .iter()
                .zip(rs)
                .map(|(l, r)| compare_tuples(op, joiner, l, r));
            let first = parts.next().ok_or_else(|| {
                AlgebraError::invalid(format!("cannot compare empty tuples with '{}'", op.name()))
            })??;
            parts.try_fold(first, |acc, part: AlgebraResult<Expr>| -> AlgebraResult<Expr> {
                Ok(Expr::apply(joiner, [acc, part?]))
            })
        }
        (Expr::Tuple(_), _) | (_, Expr::Tuple(_)) => Err(AlgebraError::invalid(format!(
            "'{}' compares values of different shapes: {left} and {right}",
            op.name()
        ))),
        _ => Ok(Expr::apply(op, [left.clone(), right.clone()])),
    }
}

/// Binary boolean connective (`and`, `or`)
pub fn logical(name: &str) -> Operator {
    let op_name = name.to_string();
    Operator::new(
        name,
        Arc::new(move |args: &[Type], check: &TypeCheck<'_>| -> AlgebraResult<Type> {
            arity(&op_name, 2, args)?;
            let boolean = builtins::boolean();
            check.expect(&boolean, &args[0])?;
            check.expect(&boolean, &args[1])?;
            Ok(boolean)
        }),
    )
    .with_render(infix(&name.to_uppercase()))
}

/// Boolean negation
pub fn not() -> Operator {
    Operator::new(
        "not",
        Arc::new(|args: &[Type], check: &TypeCheck<'_>| -> AlgebraResult<Type> {
            arity("not", 1, args)?;
            let boolean = builtins::boolean();
            check.expect(&boolean, &args[0])?;
            Ok(boolean)
        }),
    )
    .with_render(Arc::new(|args: &[String]| format!("NOT {}", args.join(", "))))
}

/// Every standard operator
pub fn standard() -> Vec<Operator> {
    let mut ops: Vec<Operator> = ARITHMETIC.into_iter().map(arithmetic).collect();
    ops.extend(COMPARISON.into_iter().map(comparison));
    ops.push(logical("and"));
    ops.push(logical("or"));
    ops.push(not());
    ops
}
