//! Leaf operator: triple pattern scan against the pattern source

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{Operator, OperatorState};
use crate::pattern::{PatternCursor, TriplePattern};
use crate::var_registry::VarId;
use async_trait::async_trait;
use tracing::debug;

/// Streams bindings for one triple pattern from the active graph.
///
/// The cursor is opened lazily on the first pull so that operators above a
/// LIMIT 0 never touch the source at all.
pub struct PatternScanOperator {
    pattern: TriplePattern,
    schema: Vec<VarId>,
    cursor: Option<Box<dyn PatternCursor>>,
    state: OperatorState,
}

impl PatternScanOperator {
    pub fn new(pattern: TriplePattern) -> Self {
        let schema = pattern.variables().into_iter().collect();
        Self {
            pattern,
            schema,
            cursor: None,
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for PatternScanOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
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
        if self.cursor.is_none() {
            debug!(graph = ?ctx.active_graph, "opening pattern cursor");
            self.cursor = Some(ctx.source.scan(&self.pattern, &ctx.active_graph).await?);
        }
        let cursor = match self.cursor.as_mut() {
            Some(c) => c,
            None => return Ok(None),
        };
        match cursor.next().await? {
            Some(binding) => Ok(Some(binding)),
            None => {
                self.state = OperatorState::Exhausted;
                self.cursor = None;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.cursor = None;
        self.state = OperatorState::Closed;
    }
}
