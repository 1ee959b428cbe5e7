//! # Logical Properties
//!
//! Logical properties describe *what* a plan subtree produces, independent of how it
//! is executed. Every expression in a memo group shares them, which is what makes the
//! group a set of interchangeable alternatives.
//!
//! Today the only logical property is the output schema: the ordered slots a node
//! exposes to its parent. It is always a pure function of the node's kind, its payload
//! and its children's logical properties (see `Plan::logical_properties`).
//!
//! The slot list sits behind an `Arc` so that handing properties from a node to a memo
//! group, or from a logical node to the physical nodes implementing it, never copies
//! the schema.

use crate::expr::{ExprId, Slot};
use serde::Serialize;
use std::sync::Arc;

/// Derived metadata about a plan subtree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LogicalProperties {
    output: Arc<[Slot]>,
}

impl LogicalProperties {
    pub fn new(output: Vec<Slot>) -> Self {
        Self {
            output: output.into(),
        }
    }

    /// Output slots, in order.
    pub fn output(&self) -> &[Slot] {
        &self.output
    }

    pub fn output_ids(&self) -> Vec<ExprId> {
        self.output.iter().map(|s| s.id).collect()
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.output.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn width(&self) -> usize {
        self.output.len()
    }

    /// Look up an output slot by identity.
    pub fn slot(&self, id: ExprId) -> Option<&Slot> {
        self.output.iter().find(|s| s.id == id)
    }

    /// Whether every slot in `slots` is produced by this subtree.
    pub fn contains_all<'a>(&self, slots: impl IntoIterator<Item = &'a Slot>) -> bool {
        slots.into_iter().all(|s| self.slot(s.id).is_some())
    }

    /// Whether both share one schema allocation, i.e. one was cloned from the other.
    pub fn shares_output_with(&self, other: &LogicalProperties) -> bool {
        Arc::ptr_eq(&self.output, &other.output)
    }
}
