use super::*;
use crate::ir::expr::{AggregateOp, MultiAggregateOp};
use crate::ir::schema::Schema;
use crate::test_utils::*;
use nb_core::builtins::string;

fn flatten(universe: &Universe, query: &Query) -> AlgebraResult<(Query, Environment)> {
    Dbize::new(universe, FreshNames::default()).flatten(query)
}

fn project(columns: Vec<(&str, Expr)>, input: Query) -> Query {
    Query::project(
        columns
            .into_iter()
            .map(|(name, expr)| (name.to_string(), expr))
            .collect(),
        input,
    )
    .unwrap()
}

fn refs(names: &[&str]) -> Expr {
    Expr::tuple(names.iter().map(|n| Expr::attr(*n)))
}

/// The flat query type-checks and every binding points at its columns
fn assert_env_resolves(universe: &Universe, flat: &Query, env: &Environment) {
    let schema = infer_schema(flat, universe).unwrap();
    for (name, rep) in env.iter() {
        for leaf in rep.leaves() {
            let Expr::Attr(column) = leaf else {
                panic!("'{name}' is bound to non-column {leaf}");
            };
            assert!(
                schema.contains(column),
                "'{name}' refers to {column}, not in {:?}",
                schema.column_names()
            );
        }
    }
}

#[test]
fn test_fresh_names_are_sequential() {
    let mut names = FreshNames::new("tmp");
    assert_eq!(names.fresh(), "tmp_1");
    assert_eq!(names.fresh(), "tmp_2");
    assert_eq!(names.issued(), 2);
    assert_eq!(FreshNames::default().fresh(), "gx_1");
}

#[test]
fn test_environment_extend_is_right_biased() {
    let mut outer = Environment::new();
    outer.bind("x", Expr::attr("old"));
    outer.bind("y", Expr::attr("y"));
    let mut inner = Environment::new();
    inner.bind("x", Expr::attr("new"));
    outer.extend(inner);
    assert_eq!(outer.get("x"), Some(&Expr::attr("new")));
    assert_eq!(outer.len(), 2);
}

#[test]
fn test_flat_query_is_unchanged() {
    let u = universe();
    let q = project(
        vec![("x", a_plus_one())],
        Query::restrict(a_positive(), t_relation()),
    );
    let (flat, env) = flatten(&u, &q).unwrap();
    assert_eq!(flat, q);
    assert!(env.is_empty());

    let combined = Query::top(
        0,
        3,
        Query::order(
            vec![SortKey::asc(Expr::attr("a"))],
            Query::combine(crate::CombineOp::Union, t_relation(), t_relation()),
        ),
    );
    assert_eq!(flatten(&u, &combined).unwrap().0, combined);
}

#[test]
fn test_galaxy_relation_expands_to_fresh_columns() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let (flat, env) = flatten(&u, &g).unwrap();

    let expected = project(
        vec![("gx_1", Expr::attr("first")), ("gx_2", Expr::attr("last"))],
        u_relation(),
    );
    assert_eq!(flat, expected);
    assert_eq!(env.get("G"), Some(&refs(&["gx_1", "gx_2"])));
}

#[test]
fn test_project_galaxy_attribute() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let q = project(vec![("p", Expr::attr("G"))], g);
    let (flat, env) = flatten(&u, &q).unwrap();

    let schema = infer_schema(&flat, &u).unwrap();
    assert_eq!(schema.column_names(), vec!["gx_3", "gx_4"]);
    assert_eq!(env.get("p"), Some(&refs(&["gx_3", "gx_4"])));
    assert_eq!(env.get("G"), Some(&refs(&["gx_3", "gx_4"])));
    assert_env_resolves(&u, &flat, &env);

    let Query::Project { columns, input } = &flat else {
        panic!("expected a projection, got {flat:?}");
    };
    assert_eq!(columns[0], ("gx_3".to_string(), Expr::attr("gx_1")));
    assert_eq!(input.as_ref(), &flatten(&u, &people_galaxy().1).unwrap().0);
}

#[test]
fn test_galaxy_equality_compares_components() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let ada = Expr::constant(person_type(), person("Ada", "Lovelace")).unwrap();
    let q = Query::restrict(Expr::apply(&eq(), [Expr::attr("G"), ada]), g);
    let (flat, _) = flatten(&u, &q).unwrap();

    let Query::Restrict { predicate, .. } = &flat else {
        panic!("expected a restriction, got {flat:?}");
    };
    assert_eq!(
        predicate.to_string(),
        "((gx_1 = 'Ada') AND (gx_2 = 'Lovelace'))"
    );
}

#[test]
fn test_lookup_operator_in_restrict() {
    let mut u = universe();
    let nickname = u.register_operator(nickname_operator());
    let predicate = Expr::apply(
        &eq(),
        [Expr::apply(&nickname, [Expr::attr("first")]), Expr::string("Al")],
    );
    let q = Query::restrict(predicate, u_relation());
    let (flat, env) = flatten(&u, &q).unwrap();
    assert!(env.is_empty());

    // re-projected to the columns of U
    assert_eq!(
        infer_schema(&flat, &u).unwrap(),
        infer_schema(&u_relation(), &u).unwrap()
    );
    let Query::Project { input, .. } = &flat else {
        panic!("expected a projection, got {flat:?}");
    };
    let Query::Restrict { predicate, input } = input.as_ref() else {
        panic!("expected the lookup restriction, got {input:?}");
    };
    assert_eq!(predicate.to_string(), "(gx_1 = first)");
    let Query::Restrict { predicate, input } = input.as_ref() else {
        panic!("expected the original restriction, got {input:?}");
    };
    assert_eq!(predicate.to_string(), "(gx_2 = 'Al')");
    let renamed_n = project(
        vec![("gx_1", Expr::attr("name")), ("gx_2", Expr::attr("nick"))],
        n_relation(),
    );
    assert_eq!(
        input.as_ref(),
        &Query::product(u_relation(), renamed_n)
    );
}

#[test]
fn test_lookup_operator_in_project() {
    let mut u = universe();
    let nickname = u.register_operator(nickname_operator());
    let q = project(
        vec![("nick", Expr::apply(&nickname, [Expr::attr("first")]))],
        u_relation(),
    );
    let (flat, _) = flatten(&u, &q).unwrap();
    let Query::Project { columns, input } = &flat else {
        panic!("expected a projection, got {flat:?}");
    };
    assert_eq!(columns, &vec![("nick".to_string(), Expr::attr("gx_2"))]);
    assert!(matches!(input.as_ref(), Query::Restrict { .. }));
    assert_eq!(
        infer_schema(&flat, &u).unwrap(),
        Schema::single("nick", string())
    );
}

#[test]
fn test_order_by_galaxy_expands_keys() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let q = Query::order(vec![SortKey::desc(Expr::attr("G"))], g);
    let (flat, _) = flatten(&u, &q).unwrap();
    let Query::Order { keys, .. } = &flat else {
        panic!("expected an ordering, got {flat:?}");
    };
    assert_eq!(
        keys,
        &vec![
            SortKey::desc(Expr::attr("gx_1")),
            SortKey::desc(Expr::attr("gx_2"))
        ]
    );
}

#[test]
fn test_order_by_lookup_is_rejected() {
    let mut u = universe();
    let nickname = u.register_operator(nickname_operator());
    let q = Query::order(
        vec![SortKey::asc(Expr::apply(&nickname, [Expr::attr("first")]))],
        u_relation(),
    );
    assert!(matches!(
        flatten(&u, &q),
        Err(AlgebraError::UnsupportedOrderingExpression { .. })
    ));
}

#[test]
fn test_count_galaxy_counts_first_component() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let q = Query::grouping_project(
        vec![(
            "n".into(),
            Expr::aggregate(AggregateOp::Count, Expr::attr("G")),
        )],
        g,
    )
    .unwrap();
    let (flat, _) = flatten(&u, &q).unwrap();
    let Query::GroupingProject { columns, .. } = &flat else {
        panic!("expected a grouping projection, got {flat:?}");
    };
    assert_eq!(
        columns[0].1,
        Expr::aggregate(AggregateOp::Count, Expr::attr("gx_1"))
    );
}

#[test]
fn test_count_empty_tuple_is_invalid() {
    let u = universe();
    let q = Query::grouping_project(
        vec![(
            "n".into(),
            Expr::aggregate(AggregateOp::Count, Expr::tuple([])),
        )],
        t_relation(),
    )
    .unwrap();
    assert!(matches!(
        flatten(&u, &q),
        Err(AlgebraError::InvalidArgument { .. })
    ));
}

#[test]
fn test_unsupported_aggregates() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let max = Query::grouping_project(
        vec![("m".into(), Expr::aggregate(AggregateOp::Max, Expr::attr("G")))],
        g,
    )
    .unwrap();
    assert!(matches!(
        flatten(&u, &max),
        Err(AlgebraError::NotYetImplemented { .. })
    ));

    let corr = Query::grouping_project(
        vec![(
            "c".into(),
            Expr::MultiAggregate {
                op: MultiAggregateOp::Correlation,
                args: vec![Expr::attr("a"), Expr::attr("a")],
            },
        )],
        t_relation(),
    )
    .unwrap();
    assert!(matches!(
        flatten(&u, &corr),
        Err(AlgebraError::NotYetImplemented { .. })
    ));
}

#[test]
fn test_case_over_galaxy_is_distributed() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let case = Expr::case(
        vec![(Expr::boolean(true), Expr::attr("G"))],
        Expr::null(person_type()),
    );
    let q = project(vec![("p", case)], g.clone());
    let (flat, env) = flatten(&u, &q).unwrap();
    assert_eq!(env.get("p"), Some(&refs(&["gx_3", "gx_4"])));
    let Query::Project { columns, .. } = &flat else {
        panic!("expected a projection, got {flat:?}");
    };
    assert_eq!(
        columns[0].1,
        Expr::case(
            vec![(Expr::boolean(true), Expr::attr("gx_1"))],
            Expr::null(string())
        )
    );

    let mixed = Expr::case(
        vec![(Expr::boolean(true), Expr::attr("G"))],
        Expr::string("nobody"),
    );
    assert!(matches!(
        flatten(&u, &project(vec![("p", mixed)], g)),
        Err(AlgebraError::NotYetImplemented { .. })
    ));
}

#[test]
fn test_subquery_over_galaxy_is_rejected() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let q = project(
        vec![("s", Expr::ScalarSubquery(Box::new(g)))],
        Query::Empty,
    );
    assert!(matches!(
        flatten(&u, &q),
        Err(AlgebraError::NotYetImplemented { .. })
    ));
}

#[test]
fn test_tuple_predicate_is_invalid() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let q = Query::restrict(Expr::attr("G"), g);
    assert!(matches!(
        flatten(&u, &q),
        Err(AlgebraError::InvalidArgument { .. })
    ));
}

#[test]
fn test_dbize_query_uses_config() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let config = CompilerConfig {
        fresh_prefix: "col".to_string(),
        check_types: true,
    };
    let (_, env) = dbize_query(&u, &config, &g).unwrap();
    assert_eq!(env.get("G"), Some(&refs(&["col_1", "col_2"])));

    let ill_typed = Query::restrict(Expr::attr("a"), t_relation());
    assert!(matches!(
        dbize_query(&u, &config, &ill_typed),
        Err(AlgebraError::TypeViolation { .. })
    ));
    assert!(dbize_query(&u, &CompilerConfig::default(), &ill_typed).is_ok());
}

#[test]
fn test_names_continue_across_runs() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let mut first = Dbize::new(&u, FreshNames::default());
    first.flatten(&g).unwrap();
    let names = first.into_names();
    assert_eq!(names.issued(), 2);

    let (_, env) = Dbize::new(&u, names).flatten(&g).unwrap();
    assert_eq!(env.get("G"), Some(&refs(&["gx_3", "gx_4"])));
}

#[test]
fn test_scalar_column_shadows_galaxy() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let inner = project(vec![("G", Expr::int(1))], g);
    let q = project(vec![("x", Expr::attr("G"))], inner);
    let (flat, env) = flatten(&u, &q).unwrap();

    assert_eq!(
        infer_schema(&flat, &u).unwrap(),
        infer_schema(&q, &u).unwrap()
    );
    assert!(env.is_empty());
    assert_env_resolves(&u, &flat, &env);
}

#[test]
fn test_project_over_projected_galaxy() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let inner = project(vec![("p", Expr::attr("G"))], g);
    let q = project(vec![("q", Expr::attr("p"))], inner);
    let (flat, env) = flatten(&u, &q).unwrap();

    assert_eq!(
        infer_schema(&flat, &u).unwrap().column_names(),
        vec!["gx_5", "gx_6"]
    );
    assert_eq!(env.get("q"), Some(&refs(&["gx_5", "gx_6"])));
    assert_eq!(env.get("p"), Some(&refs(&["gx_5", "gx_6"])));
    assert_eq!(env.get("G"), None);
    assert_env_resolves(&u, &flat, &env);
}

#[test]
fn test_union_of_galaxies_aligns_columns() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let union = Query::combine(crate::CombineOp::Union, g.clone(), g);
    let (flat_union, union_env) = flatten(&u, &union).unwrap();
    assert_eq!(union_env.get("G"), Some(&refs(&["gx_1", "gx_2"])));
    assert_env_resolves(&u, &flat_union, &union_env);

    let Query::Combine { right, .. } = &flat_union else {
        panic!("expected a combination, got {flat_union:?}");
    };
    assert_eq!(
        infer_schema(right, &u).unwrap().column_names(),
        vec!["gx_1", "gx_2"]
    );

    let q = project(vec![("p", Expr::attr("G"))], union);
    let (flat, env) = flatten(&u, &q).unwrap();
    let Some(Expr::Tuple(parts)) = env.get("p") else {
        panic!("expected a tuple binding for p, got {env:?}");
    };
    assert_eq!(parts.len(), 2);
    assert_env_resolves(&u, &flat, &env);
}

#[test]
fn test_mismatched_galaxy_union_is_invalid() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let scalar = project(vec![("G", Expr::int(1))], t_relation());
    let q = Query::combine(crate::CombineOp::Union, g, scalar);
    assert!(matches!(
        flatten(&u, &q),
        Err(AlgebraError::InvalidArgument { .. })
    ));
}

#[test]
fn test_product_with_galaxy_keeps_bindings() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let q = project(
        vec![("p", Expr::attr("G")), ("b", a_plus_one())],
        Query::product(g, t_relation()),
    );
    let (flat, env) = flatten(&u, &q).unwrap();
    assert_eq!(env.get("p"), Some(&refs(&["gx_3", "gx_4"])));
    assert!(env.get("b").is_none());
    assert_env_resolves(&u, &flat, &env);
}

#[test]
fn test_top_over_restricted_projection() {
    let u = universe();
    let (_registry, g) = people_galaxy();
    let ada = Expr::constant(person_type(), person("Ada", "Lovelace")).unwrap();
    let projected = project(vec![("p", Expr::attr("G"))], g);
    let q = Query::top(
        0,
        1,
        Query::restrict(Expr::apply(&eq(), [Expr::attr("p"), ada]), projected),
    );
    let (flat, env) = flatten(&u, &q).unwrap();
    assert_eq!(env.get("p"), Some(&refs(&["gx_3", "gx_4"])));
    assert_env_resolves(&u, &flat, &env);

    let Query::Top { input, .. } = &flat else {
        panic!("expected a top, got {flat:?}");
    };
    let Query::Restrict { predicate, .. } = input.as_ref() else {
        panic!("expected a restriction, got {input:?}");
    };
    assert_eq!(
        predicate.to_string(),
        "((gx_3 = 'Ada') AND (gx_4 = 'Lovelace'))"
    );
}
