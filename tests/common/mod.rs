//! Shared fixtures for the integration tests: an in-memory pattern source
//! and a scripted operator for exercising pull timing.

#![allow(dead_code)]

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tern_query::binding::BindingSet;
use tern_query::context::EvalContext;
use tern_query::operator::{Operator, OperatorState};
use tern_query::pattern::{ActiveGraph, PatternCursor, PatternSource, PatternTerm, TriplePattern};
use tern_query::term::Term;
use tern_query::var_registry::{VarId, VarRegistry};
use tern_query::{QueryError, Result};

/// In-memory triple store with a default graph and named graphs
#[derive(Default)]
pub struct MemorySource {
    default_graph: Vec<[Term; 3]>,
    named: FxHashMap<Arc<str>, Vec<[Term; 3]>>,
    scans: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, s: Term, p: Term, o: Term) {
        self.default_graph.push([s, p, o]);
    }

    pub fn insert_named(&mut self, graph: &str, s: Term, p: Term, o: Term) {
        self.named
            .entry(Arc::from(graph))
            .or_default()
            .push([s, p, o]);
    }

    pub fn graph_names(&self) -> Vec<Arc<str>> {
        let mut names: Vec<Arc<str>> = self.named.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of scans issued so far; lets tests assert the source was
    /// never touched (e.g., under LIMIT 0)
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    fn match_triple(pattern: &TriplePattern, triple: &[Term; 3]) -> Option<BindingSet> {
        let mut binding = BindingSet::new();
        for (term, value) in [&pattern.s, &pattern.p, &pattern.o].into_iter().zip(triple) {
            match term {
                PatternTerm::Node(t) => {
                    if t != value {
                        return None;
                    }
                }
                // add() rejects a repeated variable matching two different
                // values, which is exactly the repeated-var semantics
                PatternTerm::Var(v) => {
                    if binding.add(*v, Some(value.clone())).is_err() {
                        return None;
                    }
                }
            }
        }
        Some(binding)
    }
}

struct MemoryCursor {
    matches: VecDeque<BindingSet>,
}

#[async_trait]
impl PatternCursor for MemoryCursor {
    async fn next(&mut self) -> Result<Option<BindingSet>> {
        Ok(self.matches.pop_front())
    }
}

#[async_trait]
impl PatternSource for MemorySource {
    async fn scan(
        &self,
        pattern: &TriplePattern,
        graph: &ActiveGraph,
    ) -> Result<Box<dyn PatternCursor>> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        let triples = match graph {
            ActiveGraph::Default => Some(&self.default_graph),
            ActiveGraph::Named(name) => self.named.get(name),
        };
        let matches = triples
            .into_iter()
            .flatten()
            .filter_map(|triple| Self::match_triple(pattern, triple))
            .collect();
        Ok(Box::new(MemoryCursor { matches }))
    }
}

/// An operator producing a fixed script of rows and delays; delays let
/// tests control which join side wins the pull race.
pub enum Step {
    Row(BindingSet),
    Delay(Duration),
}

pub struct ScriptedOperator {
    schema: Vec<VarId>,
    steps: VecDeque<Step>,
    state: OperatorState,
}

impl ScriptedOperator {
    pub fn new(schema: Vec<VarId>, steps: Vec<Step>) -> Self {
        Self {
            schema,
            steps: steps.into(),
            state: OperatorState::Created,
        }
    }
}

#[async_trait]
impl Operator for ScriptedOperator {
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
        if !self.state.can_next() || ctx.is_cancelled() {
            return Ok(None);
        }
        loop {
            match self.steps.pop_front() {
                Some(Step::Delay(d)) => tokio::time::sleep(d).await,
                Some(Step::Row(row)) => return Ok(Some(row)),
                None => {
                    self.state = OperatorState::Exhausted;
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self) {
        self.steps.clear();
        self.state = OperatorState::Closed;
    }
}

pub fn iri(suffix: &str) -> Term {
    Term::iri(format!("http://example.org/{suffix}"))
}

pub fn var(p: &mut VarRegistry, name: &str) -> VarId {
    p.get_or_insert(name)
}

pub fn node(t: Term) -> PatternTerm {
    PatternTerm::Node(t)
}

pub fn pattern(s: PatternTerm, p: PatternTerm, o: PatternTerm) -> TriplePattern {
    TriplePattern::new(s, p, o)
}

/// Binding from (var, term) pairs
pub fn row(pairs: &[(VarId, Term)]) -> BindingSet {
    pairs
        .iter()
        .map(|(v, t)| (*v, Some(t.clone())))
        .collect()
}

/// Context over a source with its named graphs registered
pub fn ctx_for(source: MemorySource, vars: VarRegistry) -> EvalContext {
    let graphs = source.graph_names();
    EvalContext::new(Arc::new(source), Arc::new(vars)).with_named_graphs(graphs)
}
