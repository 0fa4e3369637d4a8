//! Left (OPTIONAL) join sink
//!
//! Runs under the shared bidirectional loop. Every left element is tracked
//! with a joined flag; when the right side finishes, lefts that never
//! matched are emitted padded with a null slot per right-only variable.
//! An optional post-join filter expression gates each candidate pair; a
//! failed or erroring filter counts as "no match" for that candidate, not
//! as a dropped left row.

use super::index::JoinIndex;
use super::JoinSink;
use crate::binding::BindingSet;
use crate::context::EvalContext;
use crate::expr::BoxedExpression;
use crate::var_registry::VarId;
use std::collections::VecDeque;
use tracing::debug;

pub struct LeftJoinSink {
    /// Left elements awaiting right-side matches, with per-entry joined flag
    left_index: JoinIndex,
    joined: Vec<bool>,
    right_index: JoinIndex,
    /// Variables only the right side can bind, padded to null for
    /// unmatched lefts
    right_only_vars: Vec<VarId>,
    filter: Option<BoxedExpression>,
    left_done: bool,
    right_done: bool,
}

impl LeftJoinSink {
    pub fn new(
        join_vars: Vec<VarId>,
        right_only_vars: Vec<VarId>,
        filter: Option<BoxedExpression>,
    ) -> Self {
        Self {
            left_index: JoinIndex::new(join_vars.clone()),
            joined: Vec::new(),
            right_index: JoinIndex::new(join_vars),
            right_only_vars,
            filter,
            left_done: false,
            right_done: false,
        }
    }

    /// Join one candidate pair, applying the post-join filter.
    ///
    /// `None` means the pair does not count as a match.
    fn try_pair(
        &self,
        left: &BindingSet,
        right: &BindingSet,
        ctx: &EvalContext,
    ) -> Option<BindingSet> {
        let joined = left.join(right)?;
        if let Some(filter) = &self.filter {
            match filter.evaluate(&joined, ctx).effective_boolean() {
                Ok(true) => {}
                // Filter false or erroring: candidate rejected
                Ok(false) | Err(_) => return None,
            }
        }
        Some(joined)
    }

    /// The left row padded with a null slot for every right-only variable
    fn pad_unmatched(&self, left: &BindingSet) -> BindingSet {
        let mut out = left.clone();
        for &var in &self.right_only_vars {
            if !out.contains(var) {
                out.set(var, None);
            }
        }
        out
    }
}

impl JoinSink for LeftJoinSink {
    fn process_left(&mut self, binding: BindingSet, ctx: &EvalContext, out: &mut VecDeque<BindingSet>) {
        let mut matched = false;
        for candidate in self.right_index.matches(&binding) {
            if let Some(joined) = self.try_pair(&binding, candidate, ctx) {
                matched = true;
                out.push_back(joined);
            }
        }
        if self.right_done {
            // The right index is complete; unmatched lefts need no deferral
            if !matched {
                out.push_back(self.pad_unmatched(&binding));
            }
        } else {
            self.left_index.add(binding);
            self.joined.push(matched);
        }
    }

    fn process_right(&mut self, binding: BindingSet, ctx: &EvalContext, out: &mut VecDeque<BindingSet>) {
        for idx in self.left_index.match_indexes(&binding) {
            if let Some(joined) = self.try_pair(self.left_index.get(idx), &binding, ctx) {
                self.joined[idx] = true;
                out.push_back(joined);
            }
        }
        if !self.left_done {
            self.right_index.add(binding);
        }
    }

    fn on_left_done(&mut self, _ctx: &EvalContext, _out: &mut VecDeque<BindingSet>) {
        self.left_done = true;
        // Retained lefts still need their flags settled by incoming rights;
        // the right index is only ever probed by lefts, so it can go now.
        self.right_index.release();
    }

    fn on_right_done(&mut self, _ctx: &EvalContext, out: &mut VecDeque<BindingSet>) {
        self.right_done = true;
        let unmatched = self.joined.iter().filter(|j| !**j).count();
        debug!(
            retained = self.left_index.len(),
            unmatched, "right side done, emitting unmatched lefts"
        );
        for idx in 0..self.left_index.len() {
            if !self.joined[idx] {
                out.push_back(self.pad_unmatched(self.left_index.get(idx)));
            }
        }
        self.left_index.release();
        self.joined.clear();
    }
}
