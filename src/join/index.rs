//! Incremental hash index over streamed join-side bindings
//!
//! One index instance lives per join side. A binding inserted is recorded
//! under each join variable's value bucket, or under that variable's null
//! bucket when it leaves the variable unbound, so a probe that is itself
//! unbound on a variable still finds the rows it could join with.
//!
//! Key equality is RDF-term *structural* equality, never SPARQL value
//! equality: `"2"^^xsd:integer` and `"2.0"^^xsd:double` do not collide.

use crate::binding::BindingSet;
use crate::term::Term;
use crate::var_registry::VarId;
use rustc_hash::FxHashMap;

/// Hash index over previously seen bindings, keyed by the join variables
pub struct JoinIndex {
    /// Join variables, fixed at construction
    join_vars: Vec<VarId>,
    /// Per join variable: term value → indices of bindings carrying it
    by_value: Vec<FxHashMap<Term, Vec<usize>>>,
    /// Per join variable: indices of bindings that left it unbound.
    /// A null is potentially compatible with everything, so these join the
    /// candidate set of every probe on that variable.
    null_bucket: Vec<Vec<usize>>,
    /// The indexed bindings themselves, in insertion order
    bindings: Vec<BindingSet>,
}

impl JoinIndex {
    pub fn new(join_vars: Vec<VarId>) -> Self {
        let n = join_vars.len();
        Self {
            join_vars,
            by_value: (0..n).map(|_| FxHashMap::default()).collect(),
            null_bucket: vec![Vec::new(); n],
            bindings: Vec::new(),
        }
    }

    pub fn join_vars(&self) -> &[VarId] {
        &self.join_vars
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, idx: usize) -> &BindingSet {
        &self.bindings[idx]
    }

    /// Insert a binding and return its assigned index
    pub fn add(&mut self, binding: BindingSet) -> usize {
        let idx = self.bindings.len();
        for (slot, var) in self.join_vars.iter().enumerate() {
            match binding.value(*var) {
                Some(term) => self.by_value[slot]
                    .entry(term.clone())
                    .or_default()
                    .push(idx),
                None => self.null_bucket[slot].push(idx),
            }
        }
        self.bindings.push(binding);
        idx
    }

    /// Indices of indexed bindings that could join with `probe`.
    ///
    /// Intersects, across every join variable bound in the probe, that
    /// variable's value bucket unioned with its null bucket. A join
    /// variable unbound in the probe contributes no constraint; a probe
    /// with every join variable unbound matches all indexed bindings.
    pub fn match_indexes(&self, probe: &BindingSet) -> Vec<usize> {
        let mut result: Option<Vec<usize>> = None;

        for (slot, var) in self.join_vars.iter().enumerate() {
            let Some(term) = probe.value(*var) else {
                continue;
            };
            let value_hits = self.by_value[slot].get(term).map(Vec::as_slice).unwrap_or(&[]);
            let candidates = sorted_union(value_hits, &self.null_bucket[slot]);
            result = Some(match result {
                None => candidates,
                Some(prev) => sorted_intersect(&prev, &candidates),
            });
            if matches!(&result, Some(r) if r.is_empty()) {
                return Vec::new();
            }
        }

        match result {
            Some(indexes) => indexes,
            // No constrained variable: every indexed binding is a candidate
            None => (0..self.bindings.len()).collect(),
        }
    }

    /// Candidate bindings for `probe`, in insertion order
    pub fn matches<'a>(&'a self, probe: &BindingSet) -> impl Iterator<Item = &'a BindingSet> {
        self.match_indexes(probe)
            .into_iter()
            .map(move |idx| &self.bindings[idx])
    }

    /// Release the bucket storage and retained bindings.
    ///
    /// Called when the opposite side is exhausted and no further probes of
    /// this index are possible.
    pub fn release(&mut self) {
        self.by_value = Vec::new();
        self.null_bucket = Vec::new();
        self.bindings = Vec::new();
    }
}

/// Union of two ascending index lists. Value buckets and null buckets are
/// disjoint (a binding is in exactly one per variable) and each is built in
/// insertion order, so a merge keeps the result sorted and duplicate-free.
fn sorted_union(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] < b[j] {
            out.push(a[i]);
            i += 1;
        } else {
            out.push(b[j]);
            j += 1;
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

fn sorted_intersect(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}
