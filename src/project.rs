//! SELECT projection operator
//!
//! Two modes mirror the algebra: pass everything through minus synthesized
//! helper variables, or rewrite to exactly the declared variables. A
//! projection expression that errors leaves its variable unbound rather
//! than dropping the row.

use crate::algebra::Projection;
use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::expr::EvalValue;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::var_registry::VarId;
use async_trait::async_trait;

pub struct ProjectOperator {
    input: BoxedOperator,
    projection: Projection,
    schema: Vec<VarId>,
    state: OperatorState,
}

impl ProjectOperator {
    pub fn new(input: BoxedOperator, projection: Projection, ctx_vars: &crate::var_registry::VarRegistry) -> Self {
        let schema = match &projection {
            Projection::All => input
                .schema()
                .iter()
                .copied()
                .filter(|&v| !ctx_vars.is_synthetic(v))
                .collect(),
            Projection::Vars(entries) => entries.iter().map(|(v, _)| *v).collect(),
        };
        Self {
            input,
            projection,
            schema,
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for ProjectOperator {
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
        let Some(binding) = self.input.next(ctx).await? else {
            self.state = OperatorState::Exhausted;
            return Ok(None);
        };
        let out = match &self.projection {
            Projection::All => binding.project(&self.schema),
            Projection::Vars(entries) => {
                let mut out = BindingSet::new();
                for (var, expr) in entries {
                    let value = match expr {
                        Some(expr) => match expr.evaluate(&binding, ctx) {
                            EvalValue::Term(t) => Some(t),
                            // Errors become unbound, never dropped rows
                            EvalValue::Unbound | EvalValue::Err(_) => None,
                        },
                        None => binding.value(*var).cloned(),
                    };
                    out.set(*var, value);
                }
                out
            }
        };
        Ok(Some(out))
    }

    fn close(&mut self) {
        self.input.close();
        self.state = OperatorState::Closed;
    }
}
