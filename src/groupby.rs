//! GROUP BY operator with streaming aggregation
//!
//! Single pass: each input binding is routed to its group's accumulator set
//! by grouping key, then every group is finalized after input exhaustion.
//! Groups are emitted in first-seen order.
//!
//! Ungrouped aggregation over zero rows still yields exactly one result
//! row, so `COUNT(*)` over an empty input is 0.

use crate::aggregate::{Accumulator, AggregateSpec};
use crate::algebra::GroupKey;
use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::term::Term;
use crate::var_registry::VarId;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use tracing::debug;

struct Group {
    /// Output slots for the grouping-key variables
    key_binding: BindingSet,
    accumulators: Vec<Box<dyn Accumulator>>,
}

pub struct GroupByOperator {
    input: BoxedOperator,
    keys: Vec<GroupKey>,
    aggregates: Vec<AggregateSpec>,
    schema: Vec<VarId>,
    /// Finalized output rows, populated on the first pull
    results: Option<VecDeque<BindingSet>>,
    state: OperatorState,
}

impl GroupByOperator {
    pub fn new(input: BoxedOperator, keys: Vec<GroupKey>, aggregates: Vec<AggregateSpec>) -> Self {
        let mut schema: Vec<VarId> = keys.iter().map(|k| k.var).collect();
        for agg in &aggregates {
            if !schema.contains(&agg.output_var) {
                schema.push(agg.output_var);
            }
        }
        Self {
            input,
            keys,
            aggregates,
            schema,
            results: None,
            state: OperatorState::Created,
        }
    }

    /// The grouping-key value for one binding: the evaluated key expression
    /// per level where one exists, else the raw variable value. A key
    /// expression error contributes an unbound cell, it never drops the row.
    fn key_of(&self, binding: &BindingSet, ctx: &EvalContext) -> Vec<Option<Term>> {
        self.keys
            .iter()
            .map(|key| match &key.expr {
                Some(expr) => expr.evaluate(binding, ctx).term(),
                None => binding.value(key.var).cloned(),
            })
            .collect()
    }

    /// Drain the input into the group table and finalize every group
    async fn build(&mut self, ctx: &EvalContext) -> Result<VecDeque<BindingSet>> {
        let mut table: FxHashMap<Vec<Option<Term>>, usize> = FxHashMap::default();
        let mut groups: Vec<Group> = Vec::new();

        while let Some(binding) = self.input.next(ctx).await? {
            if ctx.is_cancelled() {
                return Ok(VecDeque::new());
            }
            let key = self.key_of(&binding, ctx);
            let idx = match table.get(&key) {
                Some(&idx) => idx,
                None => {
                    let key_binding = self
                        .keys
                        .iter()
                        .zip(key.iter())
                        .map(|(k, v)| (k.var, v.clone()))
                        .collect();
                    groups.push(Group {
                        key_binding,
                        accumulators: self.aggregates.iter().map(AggregateSpec::start).collect(),
                    });
                    table.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            for acc in &mut groups[idx].accumulators {
                acc.accept(&binding, ctx);
            }
        }
        debug!(groups = groups.len(), "group table complete");

        // Ungrouped aggregation over zero rows yields one empty group
        if groups.is_empty() && self.keys.is_empty() {
            groups.push(Group {
                key_binding: BindingSet::new(),
                accumulators: self.aggregates.iter().map(AggregateSpec::start).collect(),
            });
        }

        let mut results = VecDeque::with_capacity(groups.len());
        for group in groups {
            let mut row = group.key_binding;
            for (spec, acc) in self.aggregates.iter().zip(group.accumulators) {
                row.set(spec.output_var, acc.end());
            }
            results.push_back(row);
        }
        Ok(results)
    }
}

#[async_trait]
impl Operator for GroupByOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        if !self.state.can_open() {
            return Err(QueryError::OperatorAlreadyOpened);
        }
        self.input.open(ctx).await?;
        self.state = OperatorState::Open;
        Ok(())
    }

    async fn next(&mut self, ctx: &EvalContext) -> Result<Option<BindingSet>> {
        if !self.state.can_next() {
            if self.state.is_closed() {
                return Err(QueryError::OperatorClosed);
            }
            return Ok(None);
        }
        if ctx.is_cancelled() {
            return Ok(None);
        }
        if self.results.is_none() {
            let results = self.build(ctx).await?;
            self.results = Some(results);
        }
        match self.results.as_mut().and_then(VecDeque::pop_front) {
            Some(row) => Ok(Some(row)),
            None => {
                self.state = OperatorState::Exhausted;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.input.close();
        self.results = None;
        self.state = OperatorState::Closed;
    }
}
