//! Duplicate elimination: DISTINCT and REDUCED
//!
//! DISTINCT keeps a hash set of every emitted solution. REDUCED only drops
//! consecutive exact repeats, bounding state to a single retained row, and
//! is the cheap choice when the input is already sorted or duplicates
//! cluster.

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;
use rustc_hash::FxHashSet;

pub struct DistinctOperator {
    input: BoxedOperator,
    seen: FxHashSet<BindingSet>,
    state: OperatorState,
}

impl DistinctOperator {
    pub fn new(input: BoxedOperator) -> Self {
        Self {
            input,
            seen: FxHashSet::default(),
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for DistinctOperator {
    fn schema(&self) -> &[VarId] {
        self.input.schema()
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
        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            let Some(binding) = self.input.next(ctx).await? else {
                self.state = OperatorState::Exhausted;
                self.seen.clear();
                return Ok(None);
            };
            if self.seen.insert(binding.clone()) {
                return Ok(Some(binding));
            }
        }
    }

    fn close(&mut self) {
        self.input.close();
        self.seen.clear();
        self.state = OperatorState::Closed;
    }
}

/// REDUCED: adjacent-duplicate elimination only
pub struct ReducedOperator {
    input: BoxedOperator,
    last: Option<BindingSet>,
    state: OperatorState,
}

impl ReducedOperator {
    pub fn new(input: BoxedOperator) -> Self {
        Self {
            input,
            last: None,
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for ReducedOperator {
    fn schema(&self) -> &[VarId] {
        self.input.schema()
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
        loop {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            let Some(binding) = self.input.next(ctx).await? else {
                self.state = OperatorState::Exhausted;
                self.last = None;
                return Ok(None);
            };
            if self.last.as_ref() != Some(&binding) {
                self.last = Some(binding.clone());
                return Ok(Some(binding));
            }
        }
    }

    fn close(&mut self) {
        self.input.close();
        self.last = None;
        self.state = OperatorState::Closed;
    }
}
