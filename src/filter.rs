//! FILTER operator (also used for HAVING above a group)

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::expr::BoxedExpression;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;

/// Gates each binding on the effective boolean value of an expression.
///
/// An evaluation error counts as filter-false and the row is dropped,
/// unless the context opts into strict errors, in which case an error on a
/// non-empty binding is promoted to a query error.
pub struct FilterOperator {
    input: BoxedOperator,
    expr: BoxedExpression,
    state: OperatorState,
}

impl FilterOperator {
    pub fn new(input: BoxedOperator, expr: BoxedExpression) -> Self {
        Self {
            input,
            expr,
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for FilterOperator {
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
                return Ok(None);
            };
            match self.expr.evaluate(&binding, ctx).effective_boolean() {
                Ok(true) => return Ok(Some(binding)),
                Ok(false) => {}
                Err(kind) => {
                    if ctx.strict_errors && !binding.is_empty() {
                        return Err(QueryError::Expression(kind));
                    }
                    // Error counts as filter-false
                }
            }
        }
    }

    fn close(&mut self) {
        self.input.close();
        self.state = OperatorState::Closed;
    }
}
