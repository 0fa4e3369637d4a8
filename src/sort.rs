//! ORDER BY operator with bounded top-k
//!
//! Buffers the whole input on the first pull, sorted under a comparator
//! chain mirroring the ORDER BY levels; each level defers ties to the next
//! and the terminal tie-break keeps both rows (stable, never deduplicating).
//!
//! When built with a result-size bound (the offset + limit of the slice
//! directly above this sort), the buffer is capped at that size: once full,
//! a new row that sorts at or after the current worst is dropped without
//! insertion, giving O(n log k) work and O(k) memory. With ties, the kept
//! prefix equals the first k rows of a full stable sort. The bound belongs
//! to this one operator; sorts in nested scopes are never truncated by an
//! outer slice.

use crate::algebra::SortKey;
use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::term::Term;
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::debug;

/// One row plus its precomputed sort-key values. An evaluation error or
/// unbound key is `None` and ranks before any value at its level.
struct Keyed {
    keys: Vec<Option<Term>>,
    row: BindingSet,
}

pub struct OrderByOperator {
    input: BoxedOperator,
    keys: Vec<SortKey>,
    /// Top-k cap from the enclosing slice, if one applies to this sort
    bound: Option<usize>,
    sorted: Option<VecDeque<BindingSet>>,
    state: OperatorState,
}

impl OrderByOperator {
    pub fn new(input: BoxedOperator, keys: Vec<SortKey>, bound: Option<usize>) -> Self {
        Self {
            input,
            keys,
            bound,
            sorted: None,
            state: OperatorState::Created,
        }
    }

    fn key_of(&self, row: &BindingSet, ctx: &EvalContext) -> Vec<Option<Term>> {
        self.keys
            .iter()
            .map(|key| key.expr.evaluate(row, ctx).term())
            .collect()
    }

    /// Comparator chain: each level defers ties to the next. Per level, an
    /// absent value sorts before any present value; the descending flag
    /// reverses the whole level, absent handling included.
    fn cmp(&self, a: &Keyed, b: &Keyed, ctx: &EvalContext) -> Ordering {
        for (level, key) in self.keys.iter().enumerate() {
            let ord = match (&a.keys[level], &b.keys[level]) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(x), Some(y)) => ctx.term_order.cmp_terms(x, y),
            };
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        // Ties fall through all levels; stable buffering keeps both rows
        Ordering::Equal
    }

    async fn build(&mut self, ctx: &EvalContext) -> Result<VecDeque<BindingSet>> {
        let cap = self.bound;
        let mut buffer: Vec<Keyed> = Vec::new();
        let mut drained = 0usize;

        while let Some(row) = self.input.next(ctx).await? {
            if ctx.is_cancelled() {
                return Ok(VecDeque::new());
            }
            drained += 1;
            let keyed = Keyed {
                keys: self.key_of(&row, ctx),
                row,
            };
            match cap {
                Some(k) => {
                    if k == 0 {
                        continue;
                    }
                    if buffer.len() == k
                        && self.cmp(&keyed, &buffer[k - 1], ctx) != Ordering::Less
                    {
                        // At or after the current worst: cannot make the cut
                        continue;
                    }
                    // Insert after any equal rows to preserve arrival order
                    let pos = buffer
                        .partition_point(|e| self.cmp(e, &keyed, ctx) != Ordering::Greater);
                    buffer.insert(pos, keyed);
                    buffer.truncate(k);
                }
                None => buffer.push(keyed),
            }
        }
        if cap.is_none() {
            buffer.sort_by(|a, b| self.cmp(a, b, ctx));
        }
        debug!(drained, kept = buffer.len(), bounded = cap.is_some(), "sort buffer flushed");
        Ok(buffer.into_iter().map(|k| k.row).collect())
    }
}

#[async_trait]
impl Operator for OrderByOperator {
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
        if ctx.is_cancelled() {
            return Ok(None);
        }
        if self.sorted.is_none() {
            let sorted = self.build(ctx).await?;
            self.sorted = Some(sorted);
        }
        match self.sorted.as_mut().and_then(VecDeque::pop_front) {
            Some(row) => Ok(Some(row)),
            None => {
                self.state = OperatorState::Exhausted;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.input.close();
        self.sorted = None;
        self.state = OperatorState::Closed;
    }
}
