//! UNION operator
//!
//! Interleaves two operands round-robin, draining the survivor once one
//! side is exhausted. No ordering guarantee beyond that.

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;

pub struct UnionOperator {
    left: BoxedOperator,
    right: BoxedOperator,
    schema: Vec<VarId>,
    left_more: bool,
    right_more: bool,
    /// Which side to pull first on the next call
    pull_left: bool,
    state: OperatorState,
}

impl UnionOperator {
    pub fn new(left: BoxedOperator, right: BoxedOperator) -> Self {
        let schema = crate::join::merged_schema(left.schema(), right.schema());
        Self {
            left,
            right,
            schema,
            left_more: true,
            right_more: true,
            pull_left: true,
            state: OperatorState::Created,
        }
    }

    async fn pull(
        &mut self,
        from_left: bool,
        ctx: &EvalContext,
    ) -> Result<Option<BindingSet>> {
        let item = if from_left {
            self.left.next(ctx).await?
        } else {
            self.right.next(ctx).await?
        };
        if item.is_none() {
            if from_left {
                self.left_more = false;
            } else {
                self.right_more = false;
            }
        }
        Ok(item)
    }
}

#[async_trait]
impl Operator for UnionOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        if !self.state.can_open() {
            return Err(QueryError::OperatorAlreadyOpened);
        }
        self.left.open(ctx).await?;
        self.right.open(ctx).await?;
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
        let first_left = match (self.left_more, self.right_more) {
            (true, true) => self.pull_left,
            (true, false) => true,
            (false, true) => false,
            (false, false) => {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            }
        };
        self.pull_left = !first_left;
        if let Some(binding) = self.pull(first_left, ctx).await? {
            return Ok(Some(binding));
        }
        // First choice exhausted just now; try the other side
        if self.left_more || self.right_more {
            if let Some(binding) = self.pull(self.left_more, ctx).await? {
                return Ok(Some(binding));
            }
        }
        self.state = OperatorState::Exhausted;
        Ok(None)
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.state = OperatorState::Closed;
    }
}
