//! Correlated nested-loop join
//!
//! Used when the right side depends on values in each left binding (a
//! nested pattern or sub-evaluation whose lookups are driven by the left
//! row). For each left element a fresh right operator is built from the
//! right algebra seeded with that element's values, drained fully, and its
//! rows merged back onto the left row. With `optional` set, an empty right
//! evaluation emits the left row padded with nulls instead of dropping it.
//!
//! Left elements are pulled in fixed-size batches so a slow left child is
//! not re-polled per emitted row.

use crate::algebra::Algebra;
use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::collections::VecDeque;
use tracing::debug;

/// Left rows pulled per batch before right-side evaluation starts
pub const LOOP_JOIN_BATCH: usize = 100;

/// The in-flight right evaluation for one left row
struct Probe {
    left: BindingSet,
    right: BoxedOperator,
    matched: bool,
}

pub struct LoopJoinOperator {
    schema: Vec<VarId>,
    left: BoxedOperator,
    right_algebra: Algebra,
    /// Variables only the right side can bind, padded to null when
    /// `optional` and the right evaluation is empty
    right_only_vars: Vec<VarId>,
    optional: bool,
    batch: VecDeque<BindingSet>,
    current: Option<Probe>,
    left_exhausted: bool,
    state: OperatorState,
}

impl LoopJoinOperator {
    pub fn new(
        schema: Vec<VarId>,
        left: BoxedOperator,
        right_algebra: Algebra,
        right_only_vars: Vec<VarId>,
        optional: bool,
    ) -> Self {
        Self {
            schema,
            left,
            right_algebra,
            right_only_vars,
            optional,
            batch: VecDeque::new(),
            current: None,
            left_exhausted: false,
            state: OperatorState::Created,
        }
    }

    async fn fill_batch(&mut self, ctx: &EvalContext) -> Result<()> {
        while self.batch.len() < LOOP_JOIN_BATCH {
            match self.left.next(ctx).await? {
                Some(binding) => self.batch.push_back(binding),
                None => {
                    self.left_exhausted = true;
                    break;
                }
            }
        }
        debug!(batch = self.batch.len(), "loop join batch filled");
        Ok(())
    }

    /// Start the right evaluation for the next buffered left row
    async fn start_probe(&mut self, left: BindingSet, ctx: &EvalContext) -> Result<()> {
        let mut right = crate::eval::build_operator(&self.right_algebra.seed(&left), &ctx.vars)?;
        right.open(ctx).await?;
        self.current = Some(Probe {
            left,
            right,
            matched: false,
        });
        Ok(())
    }

    fn pad_unmatched(&self, left: &BindingSet) -> BindingSet {
        let mut out = left.clone();
        for &var in &self.right_only_vars {
            if !out.contains(var) {
                out.set(var, None);
            }
        }
        out
    }
}

#[async_trait]
impl Operator for LoopJoinOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        if !self.state.can_open() {
            return Err(QueryError::OperatorAlreadyOpened);
        }
        self.left.open(ctx).await?;
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
            if let Some(probe) = self.current.as_mut() {
                match probe.right.next(ctx).await? {
                    Some(row) => {
                        // Seeding makes disagreement impossible for pattern
                        // vars, but expression-bound vars can still clash;
                        // an incompatible row is not a match.
                        if let Some(joined) = probe.left.join(&row) {
                            probe.matched = true;
                            return Ok(Some(joined));
                        }
                    }
                    None => {
                        if let Some(mut done) = self.current.take() {
                            done.right.close();
                            if self.optional && !done.matched {
                                return Ok(Some(self.pad_unmatched(&done.left)));
                            }
                        }
                    }
                }
                continue;
            }
            if let Some(left) = self.batch.pop_front() {
                self.start_probe(left, ctx).await?;
                continue;
            }
            if self.left_exhausted {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            }
            self.fill_batch(ctx).await?;
            if self.batch.is_empty() && self.left_exhausted {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut probe) = self.current.take() {
            probe.right.close();
        }
        self.left.close();
        self.batch.clear();
        self.state = OperatorState::Closed;
    }
}
