//! Streaming evaluation of SPARQL algebra trees
//!
//! An [`algebra::Algebra`] tree (produced by a parser/translator outside
//! this crate) is compiled into a pipeline of pull-driven async operators
//! over an external [`pattern::PatternSource`]. Binary joins advance both
//! children concurrently through a raced bidirectional-pull protocol, so
//! results stream out before either side is exhausted.
//!
//! Entry points live in [`eval`]: [`eval::execute`] for SELECT-style
//! evaluation, [`eval::ask`] for existence checks, [`eval::open_pipeline`]
//! for streaming pulls under caller control.

pub mod aggregate;
pub mod algebra;
pub mod bind;
pub mod binding;
pub mod context;
pub mod distinct;
pub mod error;
pub mod eval;
pub mod expr;
pub mod filter;
pub mod graph;
pub mod groupby;
pub mod join;
pub mod operator;
pub mod pattern;
pub mod project;
pub mod scan;
pub mod slice;
pub mod sort;
pub mod subquery;
pub mod term;
pub mod union;
pub mod values;
pub mod var_registry;

pub use algebra::Algebra;
pub use binding::BindingSet;
pub use context::{CancelToken, EvalContext};
pub use error::{QueryError, Result};
pub use operator::{BoxedOperator, Operator};
pub use pattern::{ActiveGraph, PatternCursor, PatternSource, TriplePattern};
pub use term::Term;
pub use var_registry::{VarId, VarRegistry};
