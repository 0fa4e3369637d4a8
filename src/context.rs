//! Evaluation context threaded through every operator call
//!
//! The [`EvalContext`] carries the pattern source, the dataset's named-graph
//! list, the active graph, the cancellation token, the term-ordering hook
//! used by ORDER BY, and the variable registry. It is cheap to clone (all
//! `Arc`-backed), which is what lets the join race package a child operator
//! together with an owned context into a pending advance future.

use crate::pattern::{ActiveGraph, PatternSource};
use crate::term::{compare_terms, Term};
use crate::var_registry::VarRegistry;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Cooperative cancellation token
///
/// Shared flag checked by every operator at each element boundary. On
/// cancellation pulls stop (operators return `Ok(None)`); cancellation is a
/// signal, not an error. Timeouts are the caller's concern: cancel the token
/// from a timer.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(AtomicOrdering::Relaxed)
    }
}

/// Ordering over RDF terms used by ORDER BY
///
/// The dataset may supply a collation-aware implementation; the default is
/// the structural ordering from [`crate::term::compare_terms`].
pub trait TermOrdering: Send + Sync {
    fn cmp_terms(&self, a: &Term, b: &Term) -> Ordering;
}

/// Default structural term ordering
#[derive(Debug, Default)]
pub struct DefaultTermOrdering;

impl TermOrdering for DefaultTermOrdering {
    fn cmp_terms(&self, a: &Term, b: &Term) -> Ordering {
        compare_terms(a, b)
    }
}

/// Evaluation context for one query
#[derive(Clone)]
pub struct EvalContext {
    /// External triple-pattern matching (read-only dataset snapshot)
    pub source: Arc<dyn PatternSource>,
    /// Variable registry for this query (frozen during evaluation)
    pub vars: Arc<VarRegistry>,
    /// Named graphs of the dataset, for GRAPH-variable iteration
    pub named_graphs: Arc<[Arc<str>]>,
    /// Currently active graph for pattern matching
    pub active_graph: ActiveGraph,
    /// Cooperative cancellation
    pub cancel: CancelToken,
    /// Term ordering used by ORDER BY
    pub term_order: Arc<dyn TermOrdering>,
    /// When true, row-level expression errors on non-empty bindings are
    /// promoted to query errors instead of being swallowed per policy
    pub strict_errors: bool,
}

impl EvalContext {
    pub fn new(source: Arc<dyn PatternSource>, vars: Arc<VarRegistry>) -> Self {
        Self {
            source,
            vars,
            named_graphs: Arc::from(Vec::new().into_boxed_slice()),
            active_graph: ActiveGraph::Default,
            cancel: CancelToken::new(),
            term_order: Arc::new(DefaultTermOrdering),
            strict_errors: false,
        }
    }

    pub fn with_named_graphs(mut self, graphs: Vec<Arc<str>>) -> Self {
        self.named_graphs = Arc::from(graphs.into_boxed_slice());
        self
    }

    /// A context scoped to a specific active graph
    pub fn with_active_graph(&self, graph: ActiveGraph) -> Self {
        let mut ctx = self.clone();
        ctx.active_graph = graph;
        ctx
    }

    pub fn with_strict_errors(mut self) -> Self {
        self.strict_errors = true;
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
