//! Shared test fixtures for nb-algebra

use crate::error::{AlgebraError, AlgebraResult, BoxError};
use crate::galaxy::{db_type, Connection, DbTypeData, GalaxyRegistry, SetupFn};
use crate::infer::TypeCheck;
use crate::ir::expr::Expr;
use crate::ir::operator::{FlattenInput, FlattenRule, Operator};
use crate::ir::query::Query;
use crate::ir::schema::Schema;
use crate::operators;
use crate::universe::Universe;
use nb_core::builtins::{self, integer, string};
use nb_core::{CoreError, Datum, Type, Value};
use std::sync::Arc;

/// Name of the person type
pub const PERSON: &str = "person";

/// A person record value
pub fn person(first: &str, last: &str) -> Value {
    Value::Record(vec![
        ("first".to_string(), Value::from(first)),
        ("last".to_string(), Value::from(last)),
    ])
}

fn person_fields(value: &Value) -> Option<(&str, &str)> {
    match (value.field("first"), value.field("last")) {
        (Some(Value::String(first)), Some(Value::String(last))) => Some((first, last)),
        _ => None,
    }
}

/// Structured type stored as two string columns `first`, `last`
pub fn person_type() -> Type {
    db_type(
        PERSON,
        Arc::new(|v: &Value| person_fields(v).is_some()),
        Arc::new(|v: &Value| match person_fields(v) {
            Some((first, last)) => Ok(Datum::from(vec![first, last])),
            None => Err(builtins::invalid_value(PERSON, v)),
        }),
        Arc::new(|d: &Datum| match d.as_array().map(Vec::as_slice) {
            Some([Datum::String(first), Datum::String(last)]) => Ok(person(first, last)),
            _ => Err(CoreError::malformed("person", d)),
        }),
        DbTypeData {
            schema: Schema::from_pairs([("first", string()), ("last", string())]),
            reifier: Arc::new(|values: &[Value]| match values {
                [Value::String(first), Value::String(last)] => Ok(person(first, last)),
                other => Err(AlgebraError::invalid(format!(
                    "cannot build a person from {other:?}"
                ))),
            }),
            encoder: Arc::new(|v: &Value| -> AlgebraResult<Expr> {
                match person_fields(v) {
                    Some((first, last)) => {
                        Ok(Expr::tuple([Expr::string(first), Expr::string(last)]))
                    }
                    None => Err(builtins::invalid_value(PERSON, v).into()),
                }
            }),
        },
    )
}

/// `T(a: integer, b: string)`
pub fn t_relation() -> Query {
    Query::base_relation("T", Schema::from_pairs([("a", integer()), ("b", string())]))
}

/// `U(first: string, last: string)`
pub fn u_relation() -> Query {
    Query::base_relation(
        "U",
        Schema::from_pairs([("first", string()), ("last", string())]),
    )
}

/// `N(name: string, nick: string)`, the lookup table of [`nickname_operator`]
pub fn n_relation() -> Query {
    Query::base_relation(
        "N",
        Schema::from_pairs([("name", string()), ("nick", string())]),
    )
}

/// Setup procedure that does nothing
pub fn noop_setup() -> SetupFn {
    Arc::new(|_: &mut dyn Connection| -> Result<(), BoxError> { Ok(()) })
}

/// Registry with galaxy `G: person` over `U`; returns the registry and `G`
pub fn people_galaxy() -> (GalaxyRegistry, Query) {
    let mut registry = GalaxyRegistry::new();
    let g = registry.install("G", person_type(), noop_setup(), u_relation());
    (registry, g)
}

/// Built-in universe plus `person`, `T`, `U` and `N`
pub fn universe() -> Universe {
    let mut universe = Universe::with_builtins();
    universe
        .register_type(person_type())
        .expect("person is a base type");
    for relation in [t_relation(), u_relation(), n_relation()] {
        universe
            .register_relation(relation)
            .expect("fixtures are base relations");
    }
    universe
}

/// `+`
pub fn plus() -> Arc<Operator> {
    Arc::new(operators::arithmetic("+"))
}

/// `>`
pub fn gt() -> Arc<Operator> {
    Arc::new(operators::comparison(">"))
}

/// `=`
pub fn eq() -> Arc<Operator> {
    Arc::new(operators::comparison("="))
}

/// `nickname(name)`: looks the name up in `N` and yields the nick
pub fn nickname_operator() -> Operator {
    let eq = eq();
    Operator::new(
        "nickname",
        Arc::new(|args: &[Type], check: &TypeCheck<'_>| -> AlgebraResult<Type> {
            if let [arg] = args {
                check.expect(&string(), arg)?;
            }
            Ok(string())
        }),
    )
    .with_flatten(FlattenRule::lookup(
        n_relation(),
        Arc::new(move |input: &FlattenInput<'_>| -> AlgebraResult<Expr> {
            Ok(Expr::apply(&eq, [input.lookup[0].clone(), input.args[0].clone()]))
        }),
        Arc::new(|input: &FlattenInput<'_>| -> AlgebraResult<Expr> {
            Ok(input.lookup[1].clone())
        }),
    ))
}

/// `a + 1`
pub fn a_plus_one() -> Expr {
    Expr::apply(&plus(), [Expr::attr("a"), Expr::int(1)])
}

/// `a > 0`
pub fn a_positive() -> Expr {
    Expr::apply(&gt(), [Expr::attr("a"), Expr::int(0)])
}
