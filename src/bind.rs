//! Extend/BIND operator: add one computed variable per binding
//!
//! BIND and plain algebra Extend deliberately differ in strictness:
//! assigning to an already-present variable is a query error under BIND,
//! while non-strict Extend catches the evaluation failure and leaves the
//! variable unbound.

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::expr::{BoxedExpression, EvalValue};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;

pub struct ExtendOperator {
    input: BoxedOperator,
    var: VarId,
    expr: BoxedExpression,
    strict: bool,
    schema: Vec<VarId>,
    state: OperatorState,
}

impl ExtendOperator {
    pub fn new(input: BoxedOperator, var: VarId, expr: BoxedExpression, strict: bool) -> Self {
        let mut schema = input.schema().to_vec();
        if !schema.contains(&var) {
            schema.push(var);
        }
        Self {
            input,
            var,
            expr,
            strict,
            schema,
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for ExtendOperator {
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
        let Some(mut binding) = self.input.next(ctx).await? else {
            self.state = OperatorState::Exhausted;
            return Ok(None);
        };
        let value = match self.expr.evaluate(&binding, ctx) {
            EvalValue::Term(t) => Some(t),
            // Evaluation failure leaves the variable unbound; the row
            // itself is never dropped here.
            EvalValue::Unbound | EvalValue::Err(_) => None,
        };
        if self.strict {
            // Double assignment is a query error under BIND
            binding.add(self.var, value)?;
        } else {
            binding.set(self.var, value);
        }
        Ok(Some(binding))
    }

    fn close(&mut self) {
        self.input.close();
        self.state = OperatorState::Closed;
    }
}
