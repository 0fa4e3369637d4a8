//! Triple patterns and the external pattern-source boundary
//!
//! The engine never touches storage directly: leaf operators hand a
//! [`TriplePattern`] (with already-known variables substituted) plus the
//! active graph to a [`PatternSource`] and pull candidate solution
//! fragments from the returned [`PatternCursor`].

use crate::binding::BindingSet;
use crate::error::Result;
use crate::term::Term;
use crate::var_registry::VarId;
use async_trait::async_trait;
use smallvec::SmallVec;
use std::sync::Arc;

/// A position in a triple pattern: a variable or a fixed term
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatternTerm {
    Var(VarId),
    Node(Term),
}

impl PatternTerm {
    pub fn as_var(&self) -> Option<VarId> {
        match self {
            PatternTerm::Var(v) => Some(*v),
            PatternTerm::Node(_) => None,
        }
    }
}

/// A subject/predicate/object triple pattern
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriplePattern {
    pub s: PatternTerm,
    pub p: PatternTerm,
    pub o: PatternTerm,
}

impl TriplePattern {
    pub fn new(s: PatternTerm, p: PatternTerm, o: PatternTerm) -> Self {
        Self { s, p, o }
    }

    /// Distinct variables of this pattern, in first-occurrence order
    pub fn variables(&self) -> SmallVec<[VarId; 3]> {
        let mut vars = SmallVec::new();
        for term in [&self.s, &self.p, &self.o] {
            if let Some(v) = term.as_var() {
                if !vars.contains(&v) {
                    vars.push(v);
                }
            }
        }
        vars
    }

    /// Substitute variables bound in `input` with their values.
    ///
    /// Present-but-unbound variables stay variables: a null never
    /// constrains pattern matching.
    pub fn bind(&self, input: &BindingSet) -> TriplePattern {
        let subst = |term: &PatternTerm| match term {
            PatternTerm::Var(v) => match input.value(*v) {
                Some(t) => PatternTerm::Node(t.clone()),
                None => term.clone(),
            },
            PatternTerm::Node(_) => term.clone(),
        };
        TriplePattern {
            s: subst(&self.s),
            p: subst(&self.p),
            o: subst(&self.o),
        }
    }
}

/// The currently selected graph for pattern matching
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ActiveGraph {
    /// The dataset's default graph
    #[default]
    Default,
    /// A named graph
    Named(Arc<str>),
}

/// Pull handle over the candidates for one pattern scan
///
/// Yields solution fragments binding (a subset of) the pattern's variables.
/// Not restartable; a fresh scan requires a new cursor.
#[async_trait]
pub trait PatternCursor: Send {
    async fn next(&mut self) -> Result<Option<BindingSet>>;
}

/// External triple-pattern matching over the dataset snapshot
///
/// Read-only for the duration of a query and shared by all leaf operators
/// without locking; the snapshot is assumed immutable while any cursor from
/// it is live.
#[async_trait]
pub trait PatternSource: Send + Sync {
    /// Start a scan for `pattern` against `graph`.
    ///
    /// Fixed terms in the pattern constrain matching; each yielded fragment
    /// binds the pattern's remaining variables.
    async fn scan(
        &self,
        pattern: &TriplePattern,
        graph: &ActiveGraph,
    ) -> Result<Box<dyn PatternCursor>>;
}
