//! Operator trait and base types for query evaluation
//!
//! Operators form a tree mirroring the algebra tree and produce solutions
//! through the `open/next/close` lifecycle pattern.

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::Result;
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;

/// Query evaluation operator
///
/// Operators follow a lifecycle pattern for resource control:
/// 1. `open()` - Initialize state, open child operators
/// 2. `next()` - Pull solutions until exhausted (returns None)
/// 3. `close()` - Release resources
///
/// # Contract
///
/// - `schema()` returns the output variables, fixed at construction, with
///   no duplicates.
/// - The produced sequence is pull-driven and not restartable; a second
///   pass requires a freshly built operator.
/// - Cancellation is cooperative: each `next()` checks the context's token
///   at least once per produced element and stops promptly (returning
///   `Ok(None)`) rather than draining to completion.
#[async_trait]
pub trait Operator: Send {
    /// Output schema - which variables this operator produces
    fn schema(&self) -> &[VarId];

    /// Initialize operator state. Called once before `next()`.
    async fn open(&mut self, ctx: &EvalContext) -> Result<()>;

    /// Pull the next solution, or `Ok(None)` when exhausted (or cancelled)
    async fn next(&mut self, ctx: &EvalContext) -> Result<Option<BindingSet>>;

    /// Release resources
    fn close(&mut self);
}

/// Boxed operator for dynamic dispatch
pub type BoxedOperator = Box<dyn Operator + Send>;

/// Operator state for lifecycle tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// Not yet opened
    Created,
    /// Opened and ready to produce solutions
    Open,
    /// Exhausted (next returned None)
    Exhausted,
    /// Closed
    Closed,
}

impl OperatorState {
    /// Check if operator can be opened
    pub fn can_open(&self) -> bool {
        matches!(self, OperatorState::Created)
    }

    /// Check if operator can produce solutions
    pub fn can_next(&self) -> bool {
        matches!(self, OperatorState::Open)
    }

    /// Check if operator is closed
    pub fn is_closed(&self) -> bool {
        matches!(self, OperatorState::Closed)
    }
}

/// A pending advance of one side of a binary join: owns the child operator
/// for the duration of the pull and hands it back with the pulled item.
pub(crate) type AdvanceFuture =
    Pin<Box<dyn Future<Output = (BoxedOperator, Result<Option<BindingSet>>)> + Send>>;

/// Package a child operator and an owned context into an advance future.
///
/// The bidirectional join protocol keeps at most one of these pending per
/// side and races the two with `futures::future::select`; the loser stays
/// pending (it is never dropped mid-pull), which is what makes the race
/// safe for stateful children.
pub(crate) fn advance(mut op: BoxedOperator, ctx: EvalContext) -> AdvanceFuture {
    Box::pin(async move {
        let item = op.next(&ctx).await;
        (op, item)
    })
}
