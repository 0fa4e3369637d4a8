//! Expression-evaluation boundary
//!
//! The SPARQL expression language is an external collaborator: the algebra
//! tree carries opaque callables and this crate only defines the calling
//! convention. Evaluation is *total*: a per-row failure is data
//! ([`EvalValue::Err`]), never an exception path, so each call site's policy
//! (drop row, null the value, propagate under strict mode) is a visible
//! match arm.

use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::term::Term;
use std::sync::Arc;

/// Kind of a row-level expression failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExprErrorKind {
    /// Operand type mismatch (e.g., arithmetic on an IRI)
    Type,
    /// A required operand was unbound
    UnboundOperand,
    /// Any other evaluator-reported failure
    Other,
}

impl std::fmt::Display for ExprErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExprErrorKind::Type => write!(f, "type error"),
            ExprErrorKind::UnboundOperand => write!(f, "unbound operand"),
            ExprErrorKind::Other => write!(f, "evaluation error"),
        }
    }
}

/// Total result of evaluating an expression against one binding
#[derive(Clone, Debug, PartialEq)]
pub enum EvalValue {
    /// Evaluation produced a term
    Term(Term),
    /// Evaluation produced no value (e.g., plain variable reference to an
    /// absent or null variable)
    Unbound,
    /// Evaluation failed for this row
    Err(ExprErrorKind),
}

impl EvalValue {
    pub fn term(self) -> Option<Term> {
        match self {
            EvalValue::Term(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_err(&self) -> bool {
        matches!(self, EvalValue::Err(_))
    }

    /// Effective boolean value for filter gating.
    ///
    /// Unbound and terms without an EBV become `Err(Type)`, matching the
    /// SPARQL rule that EBV of a non-boolean-able operand is a type error.
    pub fn effective_boolean(&self) -> Result<bool, ExprErrorKind> {
        match self {
            EvalValue::Term(t) => t.effective_boolean().ok_or(ExprErrorKind::Type),
            EvalValue::Unbound => Err(ExprErrorKind::UnboundOperand),
            EvalValue::Err(kind) => Err(*kind),
        }
    }
}

/// An opaque, externally built expression
pub trait Expression: Send + Sync {
    fn evaluate(&self, binding: &BindingSet, ctx: &EvalContext) -> EvalValue;
}

/// Shared expression handle carried by algebra nodes
pub type BoxedExpression = Arc<dyn Expression>;

/// Closures are expressions; this is how the external evaluator (and the
/// tests) hand callables to the algebra.
impl<F> Expression for F
where
    F: Fn(&BindingSet, &EvalContext) -> EvalValue + Send + Sync,
{
    fn evaluate(&self, binding: &BindingSet, ctx: &EvalContext) -> EvalValue {
        self(binding, ctx)
    }
}

/// Variable reference: the variable's value, or `Unbound`
pub struct VarExpr(pub crate::var_registry::VarId);

impl Expression for VarExpr {
    fn evaluate(&self, binding: &BindingSet, _ctx: &EvalContext) -> EvalValue {
        match binding.value(self.0) {
            Some(t) => EvalValue::Term(t.clone()),
            None => EvalValue::Unbound,
        }
    }
}

/// Constant term
pub struct ConstExpr(pub Term);

impl Expression for ConstExpr {
    fn evaluate(&self, _binding: &BindingSet, _ctx: &EvalContext) -> EvalValue {
        EvalValue::Term(self.0.clone())
    }
}
