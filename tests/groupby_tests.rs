//! GROUP BY and aggregation through the full pipeline

mod common;

use common::*;
use std::sync::Arc;
use tern_query::aggregate::{AggregateFn, AggregateSpec};
use tern_query::algebra::{Algebra, GroupKey};
use tern_query::binding::BindingSet;
use tern_query::eval;
use tern_query::expr::{EvalValue, VarExpr};
use tern_query::term::Term;
use tern_query::var_registry::VarRegistry;

fn dept_rows(dept: tern_query::VarId, salary: tern_query::VarId) -> Algebra {
    let rows = [
        ("eng", 100),
        ("eng", 120),
        ("sales", 80),
        ("sales", 80),
        ("sales", 90),
    ];
    Algebra::Values {
        vars: vec![dept, salary],
        rows: rows
            .iter()
            .map(|(d, s)| vec![Some(Term::string(*d)), Some(Term::integer(*s))])
            .collect(),
    }
}

#[tokio::test]
async fn test_group_count_and_sum() {
    let mut vars = VarRegistry::new();
    let dept = var(&mut vars, "?dept");
    let salary = var(&mut vars, "?salary");
    let count = var(&mut vars, "?count");
    let total = var(&mut vars, "?total");

    let algebra = Algebra::Group {
        input: Box::new(dept_rows(dept, salary)),
        keys: vec![GroupKey {
            var: dept,
            expr: None,
        }],
        aggregates: vec![
            AggregateSpec {
                function: AggregateFn::CountAll,
                expr: None,
                output_var: count,
                distinct: false,
            },
            AggregateSpec {
                function: AggregateFn::Sum,
                expr: Some(Arc::new(VarExpr(salary))),
                output_var: total,
                distinct: false,
            },
        ],
    };

    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(results.len(), 2);

    let eng = results
        .iter()
        .find(|b| b.value(dept) == Some(&Term::string("eng")))
        .unwrap();
    assert_eq!(eng.value(count), Some(&Term::integer(2)));
    assert_eq!(eng.value(total), Some(&Term::integer(220)));

    let sales = results
        .iter()
        .find(|b| b.value(dept) == Some(&Term::string("sales")))
        .unwrap();
    assert_eq!(sales.value(count), Some(&Term::integer(3)));
    assert_eq!(sales.value(total), Some(&Term::integer(250)));
}

#[tokio::test]
async fn test_ungrouped_count_over_empty_input_is_zero() {
    let mut vars = VarRegistry::new();
    let x = var(&mut vars, "?x");
    let count = var(&mut vars, "?count");

    let algebra = Algebra::Group {
        input: Box::new(Algebra::Values {
            vars: vec![x],
            rows: vec![],
        }),
        keys: vec![],
        aggregates: vec![AggregateSpec {
            function: AggregateFn::CountAll,
            expr: None,
            output_var: count,
            distinct: false,
        }],
    };

    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    // The one-row rule: ungrouped aggregation always yields a result row
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].value(count), Some(&Term::integer(0)));
}

#[tokio::test]
async fn test_grouped_aggregation_over_empty_input_yields_nothing() {
    let mut vars = VarRegistry::new();
    let dept = var(&mut vars, "?dept");
    let count = var(&mut vars, "?count");

    let algebra = Algebra::Group {
        input: Box::new(Algebra::Values {
            vars: vec![dept],
            rows: vec![],
        }),
        keys: vec![GroupKey {
            var: dept,
            expr: None,
        }],
        aggregates: vec![AggregateSpec {
            function: AggregateFn::CountAll,
            expr: None,
            output_var: count,
            distinct: false,
        }],
    };

    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_avg_promotes_to_double() {
    let mut vars = VarRegistry::new();
    let dept = var(&mut vars, "?dept");
    let salary = var(&mut vars, "?salary");
    let avg = var(&mut vars, "?avg");

    let algebra = Algebra::Group {
        input: Box::new(dept_rows(dept, salary)),
        keys: vec![GroupKey {
            var: dept,
            expr: None,
        }],
        aggregates: vec![AggregateSpec {
            function: AggregateFn::Avg,
            expr: Some(Arc::new(VarExpr(salary))),
            output_var: avg,
            distinct: false,
        }],
    };

    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    let eng = results
        .iter()
        .find(|b| b.value(dept) == Some(&Term::string("eng")))
        .unwrap();
    assert_eq!(eng.value(avg), Some(&Term::double(110.0)));
}

#[tokio::test]
async fn test_count_distinct() {
    let mut vars = VarRegistry::new();
    let dept = var(&mut vars, "?dept");
    let salary = var(&mut vars, "?salary");
    let distinct_salaries = var(&mut vars, "?n");

    let algebra = Algebra::Group {
        input: Box::new(dept_rows(dept, salary)),
        keys: vec![GroupKey {
            var: dept,
            expr: None,
        }],
        aggregates: vec![AggregateSpec {
            function: AggregateFn::Count,
            expr: Some(Arc::new(VarExpr(salary))),
            output_var: distinct_salaries,
            distinct: true,
        }],
    };

    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    let sales = results
        .iter()
        .find(|b| b.value(dept) == Some(&Term::string("sales")))
        .unwrap();
    // 80, 80, 90 -> two distinct values
    assert_eq!(sales.value(distinct_salaries), Some(&Term::integer(2)));
}

#[tokio::test]
async fn test_having_is_filter_above_group() {
    let mut vars = VarRegistry::new();
    let dept = var(&mut vars, "?dept");
    let salary = var(&mut vars, "?salary");
    let count = var(&mut vars, "?count");

    let group = Algebra::Group {
        input: Box::new(dept_rows(dept, salary)),
        keys: vec![GroupKey {
            var: dept,
            expr: None,
        }],
        aggregates: vec![AggregateSpec {
            function: AggregateFn::CountAll,
            expr: None,
            output_var: count,
            distinct: false,
        }],
    };
    // HAVING COUNT(*) > 2
    let algebra = Algebra::Filter {
        input: Box::new(group),
        expr: Arc::new(move |b: &BindingSet, _: &tern_query::EvalContext| {
            match b.value(count).and_then(|t| t.numeric()) {
                Some(n) => EvalValue::Term(Term::boolean(n.as_f64() > 2.0)),
                None => EvalValue::Unbound,
            }
        }),
    };

    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].value(dept), Some(&Term::string("sales")));
}

#[tokio::test]
async fn test_group_key_expression() {
    let mut vars = VarRegistry::new();
    let salary = var(&mut vars, "?salary");
    let dept = var(&mut vars, "?dept");
    let band = var(&mut vars, "?band");
    let count = var(&mut vars, "?count");

    // GROUP BY a computed band: salary >= 100 -> "high", else "low"
    let algebra = Algebra::Group {
        input: Box::new(dept_rows(dept, salary)),
        keys: vec![GroupKey {
            var: band,
            expr: Some(Arc::new(move |b: &BindingSet, _: &tern_query::EvalContext| {
                match b.value(salary).and_then(|t| t.numeric()) {
                    Some(n) if n.as_f64() >= 100.0 => EvalValue::Term(Term::string("high")),
                    Some(_) => EvalValue::Term(Term::string("low")),
                    None => EvalValue::Unbound,
                }
            })),
        }],
        aggregates: vec![AggregateSpec {
            function: AggregateFn::CountAll,
            expr: None,
            output_var: count,
            distinct: false,
        }],
    };

    let ctx = ctx_for(MemorySource::new(), vars);
    let results = eval::execute(&algebra, &ctx).await.unwrap();
    assert_eq!(results.len(), 2);
    let high = results
        .iter()
        .find(|b| b.value(band) == Some(&Term::string("high")))
        .unwrap();
    assert_eq!(high.value(count), Some(&Term::integer(2)));
}
