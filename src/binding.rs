//! Solution bindings flowing through the pipeline
//!
//! A [`BindingSet`] is a partial mapping from query variables to RDF terms.
//! A variable can be *present but unbound* (`None` value) - distinct from
//! "not present" - which is how failed OPTIONAL sides and projection
//! expression errors are represented.
//!
//! # Ownership
//!
//! A binding set is owned exclusively by the operator that produced it until
//! handed downstream; operators that retain rows (join indexes, group
//! tables, sort buffers) clone before retention. Clones are cheap: terms are
//! `Arc`-backed.

use crate::error::{QueryError, Result};
use crate::term::Term;
use crate::var_registry::VarId;
use smallvec::SmallVec;

/// A partial mapping from variables to (nullable) terms.
///
/// # Invariants
///
/// - Variable ids are unique within a set.
/// - Slots are kept sorted by `VarId`, so equality and hashing are
///   order-independent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BindingSet {
    slots: SmallVec<[(VarId, Option<Term>); 8]>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn position(&self, var: VarId) -> std::result::Result<usize, usize> {
        self.slots.binary_search_by_key(&var, |(v, _)| *v)
    }

    /// Whether the variable is present (bound or not)
    pub fn contains(&self, var: VarId) -> bool {
        self.position(var).is_ok()
    }

    /// The variable's slot: `None` if absent, `Some(None)` if present but
    /// unbound, `Some(Some(term))` if bound.
    pub fn get(&self, var: VarId) -> Option<Option<&Term>> {
        self.position(var)
            .ok()
            .map(|idx| self.slots[idx].1.as_ref())
    }

    /// The variable's bound value, if present and non-null
    pub fn value(&self, var: VarId) -> Option<&Term> {
        self.get(var).flatten()
    }

    /// Add a variable to the set.
    ///
    /// Fails if the variable is already present with a different value -
    /// assigning twice to the same variable within one pipeline stage is a
    /// query error. Re-adding an identical value is a no-op.
    pub fn add(&mut self, var: VarId, value: Option<Term>) -> Result<()> {
        match self.position(var) {
            Ok(idx) => {
                if self.slots[idx].1 == value {
                    Ok(())
                } else {
                    Err(QueryError::VariableAlreadyBound(format!("?#{}", var.0)))
                }
            }
            Err(idx) => {
                self.slots.insert(idx, (var, value));
                Ok(())
            }
        }
    }

    /// Add or overwrite a slot. Used where a stage is entitled to rewrite
    /// its own output shape (projection, graph rebinding), never to mutate a
    /// row received from upstream.
    pub fn set(&mut self, var: VarId, value: Option<Term>) {
        match self.position(var) {
            Ok(idx) => self.slots[idx].1 = value,
            Err(idx) => self.slots.insert(idx, (var, value)),
        }
    }

    /// Remove a variable entirely
    pub fn remove(&mut self, var: VarId) -> Option<Option<Term>> {
        match self.position(var) {
            Ok(idx) => Some(self.slots.remove(idx).1),
            Err(_) => None,
        }
    }

    /// Iterate over (var, value) slots in `VarId` order
    pub fn iter(&self) -> impl Iterator<Item = (VarId, Option<&Term>)> {
        self.slots.iter().map(|(v, t)| (*v, t.as_ref()))
    }

    /// The variables present in this set, in `VarId` order
    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.slots.iter().map(|(v, _)| *v)
    }

    /// Restrict to the given variables, keeping presence/unboundness
    pub fn project(&self, vars: &[VarId]) -> BindingSet {
        let mut out = BindingSet::new();
        for &var in vars {
            if let Some(value) = self.get(var) {
                out.set(var, value.cloned());
            }
        }
        out
    }

    /// Join compatibility: both sets agree on every variable they share.
    ///
    /// A null (present-but-unbound) slot is compatible with anything.
    pub fn is_compatible_with(&self, other: &BindingSet) -> bool {
        self.iter().all(|(var, value)| match (value, other.get(var)) {
            (Some(a), Some(Some(b))) => a == b,
            _ => true,
        })
    }

    /// Minus (anti-join) compatibility: the looser predicate used by MINUS.
    ///
    /// True iff at least one variable is bound on both sides and every
    /// variable bound on both sides agrees. Sets sharing no bound variable
    /// are *not* minus-compatible, so variable-disjoint sides never exclude
    /// anything.
    pub fn is_minus_compatible_with(&self, other: &BindingSet) -> bool {
        let mut shared_bound = false;
        for (var, value) in self.iter() {
            if let (Some(a), Some(Some(b))) = (value, other.get(var)) {
                if a != b {
                    return false;
                }
                shared_bound = true;
            }
        }
        shared_bound
    }

    /// Merge two compatible sets into a new set containing the union of
    /// both mappings. Returns `None` when the sets are incompatible.
    ///
    /// Where one side is null and the other bound, the bound value wins.
    pub fn join(&self, other: &BindingSet) -> Option<BindingSet> {
        if !self.is_compatible_with(other) {
            return None;
        }
        let mut out = self.clone();
        for (var, value) in other.iter() {
            match out.position(var) {
                Ok(idx) => {
                    if out.slots[idx].1.is_none() {
                        out.slots[idx].1 = value.cloned();
                    }
                }
                Err(idx) => out.slots.insert(idx, (var, value.cloned())),
            }
        }
        Some(out)
    }
}

impl FromIterator<(VarId, Option<Term>)> for BindingSet {
    fn from_iter<I: IntoIterator<Item = (VarId, Option<Term>)>>(iter: I) -> Self {
        let mut out = BindingSet::new();
        for (var, value) in iter {
            out.set(var, value);
        }
        out
    }
}
