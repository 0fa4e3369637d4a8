//! Leaf operator: inline VALUES rows

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{Operator, OperatorState};
use crate::term::Term;
use crate::var_registry::VarId;
use async_trait::async_trait;

/// Emits a fixed solution sequence. An `UNDEF` cell is a present but
/// unbound slot, so it joins with anything downstream.
pub struct ValuesOperator {
    vars: Vec<VarId>,
    rows: Vec<Vec<Option<Term>>>,
    pos: usize,
    state: OperatorState,
}

impl ValuesOperator {
    pub fn new(vars: Vec<VarId>, rows: Vec<Vec<Option<Term>>>) -> Self {
        Self {
            vars,
            rows,
            pos: 0,
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for ValuesOperator {
    fn schema(&self) -> &[VarId] {
        &self.vars
    }

    async fn open(&mut self, _ctx: &EvalContext) -> Result<()> {
        if !self.state.can_open() {
            return Err(QueryError::OperatorAlreadyOpened);
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
        if ctx.is_cancelled() {
            return Ok(None);
        }
        let Some(row) = self.rows.get(self.pos) else {
            self.state = OperatorState::Exhausted;
            return Ok(None);
        };
        self.pos += 1;
        let binding = self
            .vars
            .iter()
            .zip(row.iter())
            .map(|(&var, cell)| (var, cell.clone()))
            .collect();
        Ok(Some(binding))
    }

    fn close(&mut self) {
        self.rows.clear();
        self.state = OperatorState::Closed;
    }
}
