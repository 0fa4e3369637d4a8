//! Aggregate functions for GROUP BY queries
//!
//! Each aggregate runs as an [`Accumulator`] with a `start / accept / end`
//! lifecycle: [`AggregateSpec::start`] creates the accumulator, the group
//! operator feeds it every row of its group, and `end` finalizes the
//! `(variable, value)` result.
//!
//! # Type handling
//!
//! - Numeric aggregates (SUM, AVG) skip non-numeric values
//! - Empty input → unbound, except COUNT → 0
//! - Mixed integer/double input promotes to double
//! - Unbound values and row-level expression errors are skipped, never
//!   propagated

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::expr::{BoxedExpression, EvalValue};
use crate::term::{Numeric, Term};
use crate::var_registry::VarId;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Aggregate function types
#[derive(Clone, Debug, PartialEq)]
pub enum AggregateFn {
    /// COUNT(expr) - count rows where the expression yields a value
    Count,
    /// COUNT(*) - count all rows in the group
    CountAll,
    /// SUM - numeric sum
    Sum,
    /// AVG - numeric average
    Avg,
    /// MIN - minimum value under the context's term ordering
    Min,
    /// MAX - maximum value under the context's term ordering
    Max,
    /// SAMPLE - an arbitrary value from the group (first seen)
    Sample,
    /// GROUP_CONCAT - concatenate lexical forms with a separator
    GroupConcat { separator: Arc<str> },
}

/// Specification of one aggregate within a Group node
#[derive(Clone)]
pub struct AggregateSpec {
    /// The aggregate function to apply
    pub function: AggregateFn,
    /// Input expression; None only for COUNT(*)
    pub expr: Option<BoxedExpression>,
    /// Output variable for the aggregate result
    pub output_var: VarId,
    /// Whether DISTINCT was specified (e.g., SUM(DISTINCT ?x))
    pub distinct: bool,
}

impl AggregateSpec {
    /// Start a fresh accumulator for one group
    pub fn start(&self) -> Box<dyn Accumulator> {
        Box::new(RunningAccumulator {
            function: self.function.clone(),
            expr: self.expr.clone(),
            seen: if self.distinct {
                Some(FxHashSet::default())
            } else {
                None
            },
            state: State::default(),
        })
    }
}

/// Per-group running aggregate state
pub trait Accumulator: Send {
    /// Feed one row of the group
    fn accept(&mut self, binding: &BindingSet, ctx: &EvalContext);

    /// Finalize: the aggregate's value, or `None` (unbound) when undefined
    fn end(self: Box<Self>) -> Option<Term>;
}

#[derive(Default)]
struct State {
    count: u64,
    sum: Option<Numeric>,
    best: Option<Term>,
    sample: Option<Term>,
    parts: Vec<String>,
}

struct RunningAccumulator {
    function: AggregateFn,
    expr: Option<BoxedExpression>,
    /// DISTINCT guard; when present, a value already seen is skipped
    seen: Option<FxHashSet<Term>>,
    state: State,
}

impl RunningAccumulator {
    fn admit(&mut self, value: &Term) -> bool {
        match &mut self.seen {
            Some(seen) => seen.insert(value.clone()),
            None => true,
        }
    }
}

impl Accumulator for RunningAccumulator {
    fn accept(&mut self, binding: &BindingSet, ctx: &EvalContext) {
        if matches!(self.function, AggregateFn::CountAll) {
            self.state.count += 1;
            return;
        }

        let value = match &self.expr {
            Some(expr) => expr.evaluate(binding, ctx),
            None => EvalValue::Unbound,
        };
        // Errors and unbound operands never abort the group; the row simply
        // does not contribute to this aggregate.
        let Some(term) = value.term() else { return };
        if !self.admit(&term) {
            return;
        }

        match &self.function {
            AggregateFn::CountAll => unreachable!("handled above"),
            AggregateFn::Count => self.state.count += 1,
            AggregateFn::Sum | AggregateFn::Avg => {
                if let Some(n) = term.numeric() {
                    self.state.sum = Some(match self.state.sum {
                        Some(acc) => acc.add(n),
                        None => n,
                    });
                    self.state.count += 1;
                }
            }
            AggregateFn::Min => {
                let replace = match &self.state.best {
                    Some(best) => ctx.term_order.cmp_terms(&term, best).is_lt(),
                    None => true,
                };
                if replace {
                    self.state.best = Some(term);
                }
            }
            AggregateFn::Max => {
                let replace = match &self.state.best {
                    Some(best) => ctx.term_order.cmp_terms(&term, best).is_gt(),
                    None => true,
                };
                if replace {
                    self.state.best = Some(term);
                }
            }
            AggregateFn::Sample => {
                if self.state.sample.is_none() {
                    self.state.sample = Some(term);
                }
            }
            AggregateFn::GroupConcat { .. } => {
                let part = match &term {
                    Term::Literal { lexical, .. } => lexical.to_string(),
                    Term::Iri(iri) => iri.to_string(),
                    Term::BlankNode(label) => label.to_string(),
                };
                self.state.parts.push(part);
            }
        }
    }

    fn end(self: Box<Self>) -> Option<Term> {
        match self.function {
            AggregateFn::Count | AggregateFn::CountAll => {
                Some(Term::integer(self.state.count as i64))
            }
            AggregateFn::Sum => self.state.sum.map(Numeric::into_term),
            AggregateFn::Avg => self
                .state
                .sum
                .map(|sum| Term::double(sum.as_f64() / self.state.count as f64)),
            AggregateFn::Min | AggregateFn::Max => self.state.best,
            AggregateFn::Sample => self.state.sample,
            AggregateFn::GroupConcat { separator } => {
                if self.state.parts.is_empty() {
                    None
                } else {
                    Some(Term::string(self.state.parts.join(separator.as_ref())))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EvalContext;
    use crate::expr::VarExpr;
    use crate::pattern::{ActiveGraph, PatternCursor, PatternSource, TriplePattern};
    use crate::var_registry::VarRegistry;
    use async_trait::async_trait;

    struct NoSource;

    #[async_trait]
    impl PatternSource for NoSource {
        async fn scan(
            &self,
            _pattern: &TriplePattern,
            _graph: &ActiveGraph,
        ) -> crate::error::Result<Box<dyn PatternCursor>> {
            unreachable!("aggregate tests never scan")
        }
    }

    fn ctx() -> EvalContext {
        EvalContext::new(Arc::new(NoSource), Arc::new(VarRegistry::new()))
    }

    fn spec(function: AggregateFn, distinct: bool) -> AggregateSpec {
        AggregateSpec {
            function,
            expr: Some(Arc::new(VarExpr(VarId(0)))),
            output_var: VarId(1),
            distinct,
        }
    }

    fn row(n: i64) -> BindingSet {
        [(VarId(0), Some(Term::integer(n)))].into_iter().collect()
    }

    #[test]
    fn test_count_skips_unbound() {
        let ctx = ctx();
        let mut acc = spec(AggregateFn::Count, false).start();
        acc.accept(&row(1), &ctx);
        acc.accept(&BindingSet::new(), &ctx); // var absent: not counted
        acc.accept(&row(2), &ctx);
        assert_eq!(acc.end(), Some(Term::integer(2)));
    }

    #[test]
    fn test_count_all_counts_every_row() {
        let ctx = ctx();
        let mut acc = AggregateSpec {
            function: AggregateFn::CountAll,
            expr: None,
            output_var: VarId(1),
            distinct: false,
        }
        .start();
        acc.accept(&BindingSet::new(), &ctx);
        acc.accept(&row(1), &ctx);
        assert_eq!(acc.end(), Some(Term::integer(2)));
    }

    #[test]
    fn test_sum_distinct() {
        let ctx = ctx();
        let mut acc = spec(AggregateFn::Sum, true).start();
        acc.accept(&row(3), &ctx);
        acc.accept(&row(3), &ctx);
        acc.accept(&row(4), &ctx);
        assert_eq!(acc.end(), Some(Term::integer(7)));
    }

    #[test]
    fn test_sum_empty_is_unbound_count_zero() {
        let ctx = ctx();
        let sum = spec(AggregateFn::Sum, false).start();
        assert_eq!(sum.end(), None);
        let count = spec(AggregateFn::Count, false).start();
        assert_eq!(count.end(), Some(Term::integer(0)));
        let _ = ctx;
    }

    #[test]
    fn test_min_max() {
        let ctx = ctx();
        let mut min = spec(AggregateFn::Min, false).start();
        let mut max = spec(AggregateFn::Max, false).start();
        for n in [3, 1, 2] {
            min.accept(&row(n), &ctx);
            max.accept(&row(n), &ctx);
        }
        assert_eq!(min.end(), Some(Term::integer(1)));
        assert_eq!(max.end(), Some(Term::integer(3)));
    }

    #[test]
    fn test_group_concat() {
        let ctx = ctx();
        let mut acc = AggregateSpec {
            function: AggregateFn::GroupConcat {
                separator: Arc::from(", "),
            },
            expr: Some(Arc::new(VarExpr(VarId(0)))),
            output_var: VarId(1),
            distinct: false,
        }
        .start();
        for s in ["a", "b"] {
            let b: BindingSet = [(VarId(0), Some(Term::string(s)))].into_iter().collect();
            acc.accept(&b, &ctx);
        }
        assert_eq!(acc.end(), Some(Term::string("a, b")));
    }
}
