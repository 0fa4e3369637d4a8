//! ORDER BY, slice, bounded top-k, DISTINCT and REDUCED

mod common;

use common::*;
use tern_query::algebra::{Algebra, Projection, SortKey};
use tern_query::eval;
use tern_query::term::Term;
use tern_query::var_registry::{VarId, VarRegistry};

fn int_values(x: VarId, values: &[i64]) -> Algebra {
    Algebra::Values {
        vars: vec![x],
        rows: values.iter().map(|n| vec![Some(Term::integer(*n))]).collect(),
    }
}

fn ints(results: &[tern_query::BindingSet], x: VarId) -> Vec<i64> {
    results
        .iter()
        .map(|b| match b.value(x) {
            Some(Term::Literal { lexical, .. }) => lexical.parse().unwrap(),
            other => panic!("expected integer, got {other:?}"),
        })
        .collect()
}

#[tokio::test]
async fn test_order_by_ascending() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    let algebra = Algebra::OrderBy {
        input: Box::new(int_values(x, &[3, 1, 2])),
        keys: vec![SortKey::by_var(x)],
    };
    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(ints(&results, x), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_order_by_descending() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    let algebra = Algebra::OrderBy {
        input: Box::new(int_values(x, &[3, 1, 2])),
        keys: vec![SortKey::desc(std::sync::Arc::new(
            tern_query::expr::VarExpr(x),
        ))],
    };
    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(ints(&results, x), vec![3, 2, 1]);
}

#[tokio::test]
async fn test_unbound_sorts_before_any_value() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    let algebra = Algebra::OrderBy {
        input: Box::new(Algebra::Values {
            vars: vec![x],
            rows: vec![
                vec![Some(Term::integer(5))],
                vec![None],
                vec![Some(Term::integer(1))],
            ],
        }),
        keys: vec![SortKey::by_var(x)],
    };
    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(results[0].get(x), Some(None));
    assert_eq!(ints(&results[1..], x), vec![1, 5]);
}

#[tokio::test]
async fn test_slice_offset_limit() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    let algebra = Algebra::Slice {
        input: Box::new(Algebra::OrderBy {
            input: Box::new(int_values(x, &[5, 3, 1, 4, 2])),
            keys: vec![SortKey::by_var(x)],
        }),
        offset: 1,
        limit: Some(2),
    };
    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(ints(&results, x), vec![2, 3]);
}

#[tokio::test]
async fn test_limit_zero_never_touches_source() {
    let mut vars = VarRegistry::new();
    let s = var(&mut vars, "?s");
    let o = var(&mut vars, "?o");

    let mut source = MemorySource::new();
    source.insert(iri("a"), iri("p"), Term::integer(1));

    let algebra = Algebra::Slice {
        input: Box::new(Algebra::Pattern(pattern(
            tern_query::pattern::PatternTerm::Var(s),
            node(iri("p")),
            tern_query::pattern::PatternTerm::Var(o),
        ))),
        offset: 0,
        limit: Some(0),
    };

    let counter = std::sync::Arc::new(source);
    let ctx = tern_query::EvalContext::new(counter.clone(), std::sync::Arc::new(vars));
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(counter.scan_count(), 0);
}

#[tokio::test]
async fn test_bounded_top_k_matches_full_sort_prefix() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    let y = var(&mut vars, "?y");

    // Duplicate sort keys with distinct payloads exercise tie stability
    let rows: Vec<Vec<Option<Term>>> = [(3, "a"), (1, "b"), (2, "c"), (1, "d"), (2, "e"), (1, "f")]
        .iter()
        .map(|(n, tag)| vec![Some(Term::integer(*n)), Some(Term::string(*tag))])
        .collect();
    let values = Algebra::Values {
        vars: vec![x, y],
        rows,
    };

    let sorted = |limit: Option<usize>| Algebra::Slice {
        input: Box::new(Algebra::OrderBy {
            input: Box::new(values.clone()),
            keys: vec![SortKey::by_var(x)],
        }),
        offset: 0,
        limit,
    };

    // limit Some(k) installs the top-k bound; None sorts everything
    let ctx_a = ctx_for(MemorySource::new(), VarRegistry::new());
    let ctx_b = ctx_for(MemorySource::new(), VarRegistry::new());
    let bounded = eval::execute(&sorted(Some(4)), &ctx_a).await.unwrap();
    let full = eval::execute(&sorted(None), &ctx_b).await.unwrap();

    assert_eq!(bounded.len(), 4);
    assert_eq!(bounded.as_slice(), &full[..4]);
}

#[tokio::test]
async fn test_order_by_ties_keep_both_rows() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    let y = var(&mut vars, "?y");
    let algebra = Algebra::OrderBy {
        input: Box::new(Algebra::Values {
            vars: vec![x, y],
            rows: vec![
                vec![Some(Term::integer(1)), Some(Term::string("first"))],
                vec![Some(Term::integer(1)), Some(Term::string("second"))],
            ],
        }),
        keys: vec![SortKey::by_var(x)],
    };
    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    // Equal keys never collapse, and stable sort preserves arrival order
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].value(y), Some(&Term::string("first")));
    assert_eq!(results[1].value(y), Some(&Term::string("second")));
}

#[tokio::test]
async fn test_distinct_removes_all_duplicates() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    let algebra = Algebra::Distinct(Box::new(int_values(x, &[1, 2, 1, 3, 2, 1])));
    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(ints(&results, x), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_reduced_drops_only_adjacent_duplicates() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    let algebra = Algebra::Reduced(Box::new(int_values(x, &[1, 1, 2, 2, 1])));
    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    // The trailing 1 is not adjacent to the leading run and survives
    assert_eq!(ints(&results, x), vec![1, 2, 1]);
}

#[tokio::test]
async fn test_sort_bound_blocked_by_distinct() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    // Slice over Distinct over OrderBy: the bound must not truncate the
    // sort buffer, or Distinct would see too few rows
    let algebra = Algebra::Slice {
        input: Box::new(Algebra::Distinct(Box::new(Algebra::OrderBy {
            input: Box::new(int_values(x, &[1, 1, 2, 2, 3])),
            keys: vec![SortKey::by_var(x)],
        }))),
        offset: 0,
        limit: Some(3),
    };
    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(ints(&results, x), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_outer_limit_never_truncates_nested_sort() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    // The sub-select sorts descending for its own purposes; the outer
    // LIMIT 2 belongs to the outer ascending sort only. If the bound
    // leaked inward, the inner sort would keep {3, 2} and drop row 1.
    let algebra = Algebra::Slice {
        input: Box::new(Algebra::OrderBy {
            input: Box::new(Algebra::SubSelect {
                input: Box::new(Algebra::OrderBy {
                    input: Box::new(int_values(x, &[1, 2, 3])),
                    keys: vec![SortKey::desc(std::sync::Arc::new(
                        tern_query::expr::VarExpr(x),
                    ))],
                }),
                vars: vec![x],
            }),
            keys: vec![SortKey::by_var(x)],
        }),
        offset: 0,
        limit: Some(2),
    };
    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(ints(&results, x), vec![1, 2]);
}

#[tokio::test]
async fn test_sort_bound_passes_through_projection() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    let algebra = Algebra::Slice {
        input: Box::new(Algebra::Project {
            input: Box::new(Algebra::OrderBy {
                input: Box::new(int_values(x, &[4, 2, 3, 1])),
                keys: vec![SortKey::by_var(x)],
            }),
            projection: Projection::All,
        }),
        offset: 0,
        limit: Some(2),
    };
    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(ints(&results, x), vec![1, 2]);
}
