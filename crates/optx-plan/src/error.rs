//! Errors raised by plan-node transformations.
//!
//! Both variants are contract violations at the call site (a rule built the wrong
//! number of children, or dropped the properties of a physical node). They are never
//! transient, so callers propagate them and report an internal optimizer error.

use crate::plan::PlanType;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// `with_children` received a child list whose length does not match the arity
    /// of the node kind.
    #[error("{plan_type} expects {expected} child(ren), got {actual}")]
    Arity {
        plan_type: PlanType,
        expected: usize,
        actual: usize,
    },
    /// A physical node was asked to drop the logical properties it must carry.
    #[error("{plan_type} requires logical properties, none were supplied")]
    MissingProperties { plan_type: PlanType },
}
