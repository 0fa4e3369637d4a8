//! Binary join operators over a shared bidirectional-pull loop
//!
//! All hash-based join variants (inner, left/OPTIONAL, MINUS) run the same
//! driving loop: one pending advance per child, raced with
//! [`futures::future::select`] whenever both sides still have elements, so
//! whichever side produces first is processed first and results stream out
//! before either side is exhausted. The variants differ only in a
//! [`JoinSink`] implementation.
//!
//! The correlated loop join lives in [`nested`]; it re-evaluates its right
//! side per left element and does not fit the race shape.

pub mod index;
mod left;
mod minus;
mod nested;

pub use left::LeftJoinSink;
pub use minus::MinusSink;
pub use nested::{LoopJoinOperator, LOOP_JOIN_BATCH};

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{advance, AdvanceFuture, BoxedOperator, Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;
use futures::future::{select, Either};
use index::JoinIndex;
use std::collections::VecDeque;
use tracing::debug;

/// Variant-specific half of a bidirectional join.
///
/// The driver owns the loop and the children; the sink owns the retained
/// state (indexes, flags, buffers) and decides what each arriving element
/// produces. Hooks push ready output rows onto `out` in emission order.
pub trait JoinSink: Send {
    fn process_left(&mut self, binding: BindingSet, ctx: &EvalContext, out: &mut VecDeque<BindingSet>);

    fn process_right(&mut self, binding: BindingSet, ctx: &EvalContext, out: &mut VecDeque<BindingSet>);

    fn on_left_done(&mut self, ctx: &EvalContext, out: &mut VecDeque<BindingSet>);

    fn on_right_done(&mut self, ctx: &EvalContext, out: &mut VecDeque<BindingSet>);
}

/// Which child a raced advance came from
enum Side {
    Left,
    Right,
}

/// Driver for the bidirectional-pull join protocol.
///
/// Each child is either resting in its slot or moved into a pending advance
/// future; a raced future that loses stays pending and is polled again on
/// the following pull, so a child is never dropped mid-`next`.
pub struct BidirectionalJoin<S: JoinSink> {
    name: &'static str,
    schema: Vec<VarId>,
    sink: S,
    left: Option<BoxedOperator>,
    right: Option<BoxedOperator>,
    pending_left: Option<AdvanceFuture>,
    pending_right: Option<AdvanceFuture>,
    left_more: bool,
    right_more: bool,
    out: VecDeque<BindingSet>,
    state: OperatorState,
}

impl<S: JoinSink> BidirectionalJoin<S> {
    pub fn new(
        name: &'static str,
        schema: Vec<VarId>,
        left: BoxedOperator,
        right: BoxedOperator,
        sink: S,
    ) -> Self {
        Self {
            name,
            schema,
            sink,
            left: Some(left),
            right: Some(right),
            pending_left: None,
            pending_right: None,
            left_more: true,
            right_more: true,
            out: VecDeque::new(),
            state: OperatorState::Created,
        }
    }

    fn take_pending_left(&mut self, ctx: &EvalContext) -> Result<AdvanceFuture> {
        match self.pending_left.take() {
            Some(fut) => Ok(fut),
            None => {
                let op = self
                    .left
                    .take()
                    .ok_or_else(|| QueryError::Internal("join left child missing".into()))?;
                Ok(advance(op, ctx.clone()))
            }
        }
    }

    fn take_pending_right(&mut self, ctx: &EvalContext) -> Result<AdvanceFuture> {
        match self.pending_right.take() {
            Some(fut) => Ok(fut),
            None => {
                let op = self
                    .right
                    .take()
                    .ok_or_else(|| QueryError::Internal("join right child missing".into()))?;
                Ok(advance(op, ctx.clone()))
            }
        }
    }

    /// React to one resolved advance: feed the sink or flip the side's
    /// has-more flag and run its done hook.
    fn settle(
        &mut self,
        side: Side,
        op: BoxedOperator,
        item: Result<Option<BindingSet>>,
        ctx: &EvalContext,
    ) -> Result<()> {
        match side {
            Side::Left => {
                self.left = Some(op);
                match item? {
                    Some(binding) => self.sink.process_left(binding, ctx, &mut self.out),
                    None => {
                        debug!(operator = self.name, side = "left", "join side exhausted");
                        self.left_more = false;
                        self.sink.on_left_done(ctx, &mut self.out);
                    }
                }
            }
            Side::Right => {
                self.right = Some(op);
                match item? {
                    Some(binding) => self.sink.process_right(binding, ctx, &mut self.out),
                    None => {
                        debug!(operator = self.name, side = "right", "join side exhausted");
                        self.right_more = false;
                        self.sink.on_right_done(ctx, &mut self.out);
                    }
                }
            }
        }
        Ok(())
    }

    /// Advance the protocol by one resolved pull
    async fn step(&mut self, ctx: &EvalContext) -> Result<()> {
        if self.left_more && self.right_more {
            let left_fut = self.take_pending_left(ctx)?;
            let right_fut = self.take_pending_right(ctx)?;
            match select(left_fut, right_fut).await {
                Either::Left(((op, item), loser)) => {
                    // The right pull stays pending; it resumes on a later
                    // step without having been dropped mid-flight.
                    self.pending_right = Some(loser);
                    self.settle(Side::Left, op, item, ctx)?;
                }
                Either::Right(((op, item), loser)) => {
                    self.pending_left = Some(loser);
                    self.settle(Side::Right, op, item, ctx)?;
                }
            }
        } else if self.left_more {
            let (op, item) = self.take_pending_left(ctx)?.await;
            self.settle(Side::Left, op, item, ctx)?;
        } else {
            let (op, item) = self.take_pending_right(ctx)?.await;
            self.settle(Side::Right, op, item, ctx)?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S: JoinSink> Operator for BidirectionalJoin<S> {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        if !self.state.can_open() {
            return Err(QueryError::OperatorAlreadyOpened);
        }
        if let Some(left) = self.left.as_mut() {
            left.open(ctx).await?;
        }
        if let Some(right) = self.right.as_mut() {
            right.open(ctx).await?;
        }
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
            if let Some(binding) = self.out.pop_front() {
                return Ok(Some(binding));
            }
            if ctx.is_cancelled() {
                return Ok(None);
            }
            if !self.left_more && !self.right_more {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            }
            self.step(ctx).await?;
        }
    }

    fn close(&mut self) {
        // A child inside a pending future is dropped with the future
        self.pending_left = None;
        self.pending_right = None;
        if let Some(mut left) = self.left.take() {
            left.close();
        }
        if let Some(mut right) = self.right.take() {
            right.close();
        }
        self.out.clear();
        self.state = OperatorState::Closed;
    }
}

/// Sink for the inner hash join.
///
/// Both sides are indexed under the shared variables; each arriving element
/// probes the opposite index and emits the merges. With no shared variables
/// the indexes degenerate to plain buffers and every probe matches
/// everything, which is exactly the cross product.
pub struct HashJoinSink {
    left_index: JoinIndex,
    right_index: JoinIndex,
    left_done: bool,
    right_done: bool,
}

impl HashJoinSink {
    pub fn new(join_vars: Vec<VarId>) -> Self {
        Self {
            left_index: JoinIndex::new(join_vars.clone()),
            right_index: JoinIndex::new(join_vars),
            left_done: false,
            right_done: false,
        }
    }
}

impl JoinSink for HashJoinSink {
    fn process_left(&mut self, binding: BindingSet, _ctx: &EvalContext, out: &mut VecDeque<BindingSet>) {
        for candidate in self.right_index.matches(&binding) {
            if let Some(joined) = binding.join(candidate) {
                out.push_back(joined);
            }
        }
        // Nothing will probe the left index once the right is done
        if !self.right_done {
            self.left_index.add(binding);
        }
    }

    fn process_right(&mut self, binding: BindingSet, _ctx: &EvalContext, out: &mut VecDeque<BindingSet>) {
        for candidate in self.left_index.matches(&binding) {
            if let Some(joined) = candidate.join(&binding) {
                out.push_back(joined);
            }
        }
        if !self.left_done {
            self.right_index.add(binding);
        }
    }

    fn on_left_done(&mut self, _ctx: &EvalContext, _out: &mut VecDeque<BindingSet>) {
        self.left_done = true;
        debug!(retained = self.right_index.len(), "releasing right join index");
        self.right_index.release();
    }

    fn on_right_done(&mut self, _ctx: &EvalContext, _out: &mut VecDeque<BindingSet>) {
        self.right_done = true;
        debug!(retained = self.left_index.len(), "releasing left join index");
        self.left_index.release();
    }
}

/// Shared variables of two child schemas, in left-schema order
pub fn shared_vars(left: &[VarId], right: &[VarId]) -> Vec<VarId> {
    left.iter()
        .copied()
        .filter(|v| right.contains(v))
        .collect()
}

/// Union of two child schemas, left first
pub fn merged_schema(left: &[VarId], right: &[VarId]) -> Vec<VarId> {
    let mut schema = left.to_vec();
    for &v in right {
        if !schema.contains(&v) {
            schema.push(v);
        }
    }
    schema
}
