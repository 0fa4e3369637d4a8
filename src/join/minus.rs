//! MINUS (anti-join) sink
//!
//! A left element survives unless some right element is minus-compatible
//! with it: they share at least one bound variable and agree on every
//! variable both bind. Variable-disjoint sides therefore never exclude
//! anything.
//!
//! The exclusion test needs the complete right side, so left elements
//! arriving before right exhaustion are buffered and flushed from
//! `on_right_done`; the shared loop still drains both children
//! concurrently.

use super::JoinSink;
use crate::binding::BindingSet;
use crate::context::EvalContext;
use std::collections::VecDeque;
use tracing::debug;

#[derive(Default)]
pub struct MinusSink {
    right_rows: Vec<BindingSet>,
    pending_lefts: Vec<BindingSet>,
    right_done: bool,
}

impl MinusSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn excluded(&self, left: &BindingSet) -> bool {
        self.right_rows
            .iter()
            .any(|right| left.is_minus_compatible_with(right))
    }
}

impl JoinSink for MinusSink {
    fn process_left(&mut self, binding: BindingSet, _ctx: &EvalContext, out: &mut VecDeque<BindingSet>) {
        if self.right_done {
            if !self.excluded(&binding) {
                out.push_back(binding);
            }
        } else {
            self.pending_lefts.push(binding);
        }
    }

    fn process_right(&mut self, binding: BindingSet, _ctx: &EvalContext, _out: &mut VecDeque<BindingSet>) {
        self.right_rows.push(binding);
    }

    fn on_left_done(&mut self, _ctx: &EvalContext, _out: &mut VecDeque<BindingSet>) {}

    fn on_right_done(&mut self, _ctx: &EvalContext, out: &mut VecDeque<BindingSet>) {
        self.right_done = true;
        debug!(
            right_rows = self.right_rows.len(),
            buffered_lefts = self.pending_lefts.len(),
            "right side done, flushing buffered lefts"
        );
        for left in std::mem::take(&mut self.pending_lefts) {
            if !self.excluded(&left) {
                out.push_back(left);
            }
        }
    }
}
