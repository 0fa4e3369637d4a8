//! Error types for query evaluation

use crate::expr::ExprErrorKind;
use thiserror::Error;

/// Query evaluation errors
///
/// Row-level expression failures are *not* represented here: they travel as
/// [`crate::expr::EvalValue::Err`] and each operator decides whether to drop
/// the row, null the value, or (under the strict flag) promote the failure to
/// [`QueryError::Expression`]. Everything in this enum fails the whole query.
#[derive(Error, Debug)]
pub enum QueryError {
    /// Operator not opened
    #[error("Operator not opened - call open() before next()")]
    OperatorNotOpened,

    /// Operator already opened
    #[error("Operator already opened")]
    OperatorAlreadyOpened,

    /// Operator is closed
    #[error("Operator is closed")]
    OperatorClosed,

    /// A variable was assigned twice within one pipeline stage (BIND)
    #[error("Variable already bound: {0}")]
    VariableAlreadyBound(String),

    /// Variable not found
    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    /// Invalid query plan (structural error caught before evaluation)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Construct the translation layer cannot express as an [`crate::Algebra`]
    /// tree (e.g. inverse-composed negated property sets). Constructed by the
    /// caller while building the tree, never by this crate mid-stream; part
    /// of the public error surface so callers fail fast with one error type.
    #[error("Unsupported algebra: {0}")]
    Unsupported(String),

    /// Row-level expression error promoted under strict evaluation
    #[error("Expression error: {0}")]
    Expression(ExprErrorKind),

    /// Error reported by the pattern source
    #[error("Pattern source error: {0}")]
    Source(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
