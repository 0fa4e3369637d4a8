//! Sub-select scope operator
//!
//! The inner pipeline evaluates in its own variable scope; this wrapper
//! restricts its rows to the declared projection variables, so inner-only
//! helper variables never leak into the outer query.

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;

pub struct SubSelectOperator {
    input: BoxedOperator,
    vars: Vec<VarId>,
    state: OperatorState,
}

impl SubSelectOperator {
    pub fn new(input: BoxedOperator, vars: Vec<VarId>) -> Self {
        Self {
            input,
            vars,
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for SubSelectOperator {
    fn schema(&self) -> &[VarId] {
        &self.vars
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
        match self.input.next(ctx).await? {
            Some(binding) => Ok(Some(binding.project(&self.vars))),
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
