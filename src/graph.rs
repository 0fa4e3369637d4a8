//! GRAPH scope operator
//!
//! Fixes the active graph for everything beneath it, or iterates the
//! dataset's named graphs when the GRAPH term is an undetermined variable,
//! re-evaluating the body once per graph with the variable rebound.

use crate::algebra::Algebra;
use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::pattern::ActiveGraph;
use crate::term::Term;
use crate::var_registry::VarId;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

enum Mode {
    /// Fixed graph name: one body evaluation under a scoped context
    Named {
        graph: Arc<str>,
        input: BoxedOperator,
    },
    /// Graph variable: the body algebra is rebuilt and drained once per
    /// named graph, with the variable bound to that graph's name
    Var {
        var: VarId,
        body: Algebra,
        graph_idx: usize,
        current: Option<(Arc<str>, BoxedOperator)>,
    },
}

pub struct GraphOperator {
    mode: Mode,
    schema: Vec<VarId>,
    /// Root context captured at open, rescoped per graph
    open_ctx: Option<EvalContext>,
    state: OperatorState,
}

impl GraphOperator {
    pub fn named(graph: Arc<str>, input: BoxedOperator) -> Self {
        let schema = input.schema().to_vec();
        Self {
            mode: Mode::Named { graph, input },
            schema,
            open_ctx: None,
            state: OperatorState::Created,
        }
    }

    pub fn var(var: VarId, body: Algebra, schema: Vec<VarId>) -> Self {
        Self {
            mode: Mode::Var {
                var,
                body,
                graph_idx: 0,
                current: None,
            },
            schema,
            open_ctx: None,
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for GraphOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    async fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        if !self.state.can_open() {
            return Err(QueryError::OperatorAlreadyOpened);
        }
        if let Mode::Named { graph, input } = &mut self.mode {
            let scoped = ctx.with_active_graph(ActiveGraph::Named(graph.clone()));
            input.open(&scoped).await?;
            self.open_ctx = Some(scoped);
        } else {
            self.open_ctx = Some(ctx.clone());
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
        let root = match self.open_ctx.clone() {
            Some(root) => root,
            None => return Err(QueryError::OperatorNotOpened),
        };
        match &mut self.mode {
            Mode::Named { input, .. } => match input.next(&root).await? {
                Some(binding) => Ok(Some(binding)),
                None => {
                    self.state = OperatorState::Exhausted;
                    Ok(None)
                }
            },
            Mode::Var {
                var,
                body,
                graph_idx,
                current,
            } => loop {
                if root.is_cancelled() {
                    return Ok(None);
                }
                if let Some((graph, op)) = current.as_mut() {
                    let scoped = root.with_active_graph(ActiveGraph::Named(graph.clone()));
                    match op.next(&scoped).await? {
                        Some(mut binding) => {
                            let name = Term::iri(graph.as_ref());
                            // The body may have bound the graph variable to
                            // a different graph: not a solution here
                            let clash =
                                matches!(binding.get(*var), Some(Some(bound)) if *bound != name);
                            if clash {
                                continue;
                            }
                            binding.set(*var, Some(name));
                            return Ok(Some(binding));
                        }
                        None => {
                            if let Some((_, mut op)) = current.take() {
                                op.close();
                            }
                        }
                    }
                    continue;
                }
                let Some(graph) = root.named_graphs.get(*graph_idx).cloned() else {
                    self.state = OperatorState::Exhausted;
                    return Ok(None);
                };
                *graph_idx += 1;
                debug!(graph = graph.as_ref(), "entering named graph");
                let scoped = root.with_active_graph(ActiveGraph::Named(graph.clone()));
                let mut op = crate::eval::build_operator(body, &root.vars)?;
                op.open(&scoped).await?;
                *current = Some((graph, op));
            },
        }
    }

    fn close(&mut self) {
        match &mut self.mode {
            Mode::Named { input, .. } => input.close(),
            Mode::Var { current, .. } => {
                if let Some((_, mut op)) = current.take() {
                    op.close();
                }
            }
        }
        self.open_ctx = None;
        self.state = OperatorState::Closed;
    }
}
