//! End-to-end scenarios: build, check, flatten, serialize and reify

use nb_algebra::test_utils::{
    a_plus_one, a_positive, nickname_operator, person, person_type, people_galaxy, t_relation,
    u_relation, universe,
};
use nb_algebra::{
    check_schema, datum_to_query, dbize_query, infer_schema, query_to_datum, reify_record,
    reify_row, AlgebraError, CombineOp, Expr, Query, Schema,
};
use nb_core::builtins::{integer, string};
use nb_core::{CompilerConfig, Type, Value};

fn named(columns: Vec<(&str, Expr)>) -> Vec<(String, Expr)> {
    columns
        .into_iter()
        .map(|(name, expr)| (name.to_string(), expr))
        .collect()
}

// ── Plain relations ─────────────────────────────────────────────────────

#[test]
fn test_increment_positive_rows() {
    let u = universe();
    let q = Query::project(
        named(vec![("x", a_plus_one())]),
        Query::restrict(a_positive(), t_relation()),
    )
    .unwrap();

    assert_eq!(check_schema(&q, &u).unwrap(), Schema::single("x", integer()));

    let config = CompilerConfig {
        check_types: true,
        ..CompilerConfig::default()
    };
    let (flat, env) = dbize_query(&u, &config, &q).unwrap();
    assert_eq!(flat, q);
    assert!(env.is_empty());
}

#[test]
fn test_algebraic_laws() {
    let q = t_relation();
    assert_eq!(Query::product(Query::Empty, q.clone()), q);
    assert_eq!(Query::product(q.clone(), Query::Empty), q);

    let projected = Query::project(named(vec![("x", Expr::attr("a"))]), q.clone()).unwrap();
    assert_eq!(
        Query::project(vec![], projected).unwrap(),
        Query::project(vec![], q).unwrap()
    );

    assert_eq!(
        Type::nullable(Type::nullable(integer())),
        Type::nullable(integer())
    );
}

#[test]
fn test_union_schema_check() {
    let u = universe();
    let ok = Query::combine(CombineOp::Union, t_relation(), t_relation());
    assert!(check_schema(&ok, &u).is_ok());

    let bad = Query::combine(CombineOp::Union, t_relation(), u_relation());
    assert!(matches!(
        check_schema(&bad, &u),
        Err(AlgebraError::SchemaMismatch { .. })
    ));
}

#[test]
fn test_datum_roundtrip_through_universe() {
    let u = universe();
    let q = Query::project(
        named(vec![("x", a_plus_one())]),
        Query::restrict(a_positive(), t_relation()),
    )
    .unwrap();
    let datum = query_to_datum(&q).unwrap();
    assert_eq!(datum_to_query(&datum, &u).unwrap(), q);
}

// ── Galaxies ────────────────────────────────────────────────────────────

#[test]
fn test_galaxy_projection_flattens_and_reifies() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let q = Query::project(named(vec![("p", Expr::attr("G"))]), g).unwrap();

    let logical = check_schema(&q, &u).unwrap();
    assert_eq!(logical, Schema::single("p", person_type()));

    let (flat, env) = dbize_query(&u, &CompilerConfig::default(), &q).unwrap();
    let physical = infer_schema(&flat, &u).unwrap();
    assert_eq!(physical.len(), 2);
    assert!(physical.columns.iter().all(|c| c.name.starts_with("gx_")));
    assert!(physical.columns.iter().all(|c| c.ty == string()));

    let Some(Expr::Tuple(parts)) = env.get("p") else {
        panic!("p should be bound to a tuple");
    };
    let bound: Vec<String> = parts.iter().map(|e| e.to_string()).collect();
    assert_eq!(bound, physical.column_names());
    assert!(matches!(env.get("G"), Some(Expr::Tuple(items)) if items.len() == 2));

    // a row as the database would return it
    let row = vec![Value::from("Grace"), Value::from("Hopper")];
    assert_eq!(
        reify_row(&row, &logical).unwrap(),
        vec![person("Grace", "Hopper")]
    );
    assert_eq!(
        reify_record(&row, &logical).unwrap(),
        vec![("p".to_string(), person("Grace", "Hopper"))]
    );
    assert!(matches!(
        reify_row(&row[..1], &logical),
        Err(AlgebraError::RowShapeMismatch { expected: 2, actual: 1 })
    ));
}

#[test]
fn test_lookup_operator_joins_once() {
    let mut u = universe();
    let nickname = u.register_operator(nickname_operator());
    let predicate = Expr::apply(
        &u.require_operator("=").unwrap(),
        [
            Expr::apply(&nickname, [Expr::attr("first")]),
            Expr::string("Al"),
        ],
    );
    let q = Query::restrict(predicate, u_relation());
    check_schema(&q, &u).unwrap();

    let (flat, _) = dbize_query(&u, &CompilerConfig::default(), &q).unwrap();
    assert_eq!(
        infer_schema(&flat, &u).unwrap(),
        infer_schema(&u_relation(), &u).unwrap()
    );

    let datum = query_to_datum(&flat).unwrap().to_string();
    assert_eq!(datum.matches("\"product\"").count(), 1);
    assert_eq!(datum.matches("\"restrict\"").count(), 2);
}
