//! Variable registry for query execution
//!
//! Maps variable names (e.g., "?s", "?name") to compact `VarId` indices
//! used throughout the evaluation pipeline. Also hands out synthetic
//! variable names for planner-introduced helpers; these carry a fixed
//! prefix so projection can strip them from final results.

use std::collections::HashMap;
use std::sync::Arc;

/// Name prefix for planner-synthesized helper variables.
///
/// `Project` in pass-through mode drops any variable whose name starts
/// with this prefix.
pub const SYNTHETIC_PREFIX: &str = "?__tq";

/// Compact variable identifier - index into binding slots
///
/// u16 supports up to 65K variables per query (sufficient for any realistic query).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u16);

impl VarId {
    /// Get the underlying index value
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Registry mapping variable names to compact VarId indices
///
/// Uses `Arc<str>` for cheap cloning and deduplication.
#[derive(Debug, Default)]
pub struct VarRegistry {
    name_to_id: HashMap<Arc<str>, VarId>,
    id_to_name: Vec<Arc<str>>,
    synthetic_count: u32,
}

impl VarRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Get existing VarId or insert a new one
    pub fn get_or_insert(&mut self, name: &str) -> VarId {
        if let Some(&id) = self.name_to_id.get(name) {
            return id;
        }

        // Guardrail: VarId is u16; exceeding this would silently wrap and
        // corrupt bindings. Runs only when introducing a *new* name
        // (planning time), not in the evaluation loop.
        if self.id_to_name.len() >= (u16::MAX as usize) {
            panic!(
                "VarRegistry capacity exceeded ({}). VarId is u16; refusing to wrap.",
                self.id_to_name.len()
            );
        }

        let id = VarId(self.id_to_name.len() as u16);
        let arc_name: Arc<str> = Arc::from(name);
        self.name_to_id.insert(arc_name.clone(), id);
        self.id_to_name.push(arc_name);
        id
    }

    /// Mint a fresh synthetic helper variable.
    ///
    /// The returned variable's name starts with [`SYNTHETIC_PREFIX`], which
    /// pass-through projection recognizes and strips.
    pub fn fresh_synthetic(&mut self) -> VarId {
        let name = format!("{}{}", SYNTHETIC_PREFIX, self.synthetic_count);
        self.synthetic_count += 1;
        self.get_or_insert(&name)
    }

    /// Whether the variable was synthesized by the planner
    pub fn is_synthetic(&self, id: VarId) -> bool {
        self.try_name(id)
            .map(|n| n.starts_with(SYNTHETIC_PREFIX))
            .unwrap_or(false)
    }

    /// Get the VarId for a name, if it exists
    pub fn get(&self, name: &str) -> Option<VarId> {
        self.name_to_id.get(name).copied()
    }

    /// Get the name for a VarId
    ///
    /// # Panics
    ///
    /// Panics if the VarId is not in the registry (indicates a bug).
    pub fn name(&self, id: VarId) -> &str {
        &self.id_to_name[id.index()]
    }

    /// Get the name for a VarId, returning None if invalid
    pub fn try_name(&self, id: VarId) -> Option<&str> {
        self.id_to_name.get(id.index()).map(|s| s.as_ref())
    }

    /// Get the number of registered variables
    pub fn len(&self) -> usize {
        self.id_to_name.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.id_to_name.is_empty()
    }

    /// Iterate over all (name, VarId) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.id_to_name
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_ref(), VarId(i as u16)))
    }
}
