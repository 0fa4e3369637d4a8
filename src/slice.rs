//! OFFSET/LIMIT operator

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;

/// Skips `offset` solutions, then passes through at most `limit`.
///
/// LIMIT 0 short-circuits without ever pulling from the input, so the
/// source is never touched.
pub struct SliceOperator {
    input: BoxedOperator,
    offset: usize,
    limit: Option<usize>,
    skipped: usize,
    emitted: usize,
    state: OperatorState,
}

impl SliceOperator {
    pub fn new(input: BoxedOperator, offset: usize, limit: Option<usize>) -> Self {
        Self {
            input,
            offset,
            limit,
            skipped: 0,
            emitted: 0,
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for SliceOperator {
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
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            }
        }
        while self.skipped < self.offset {
            if ctx.is_cancelled() {
                return Ok(None);
            }
            if self.input.next(ctx).await?.is_none() {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            }
            self.skipped += 1;
        }
        if ctx.is_cancelled() {
            return Ok(None);
        }
        match self.input.next(ctx).await? {
            Some(binding) => {
                self.emitted += 1;
                Ok(Some(binding))
            }
            None => {
                self.state = OperatorState::Exhausted;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.input.close();
        self.state = OperatorState::Closed;
    }
}
