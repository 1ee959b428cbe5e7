//! # optx-plan: Plan-Node Algebra
//!
//! This crate defines the immutable plan nodes that every phase of the optimizer works
//! on: the rewrite phase produces logical trees, the memo stores them as groups of
//! equivalent alternatives, and physical planning produces physical trees from them.
//!
//! ## Module Overview
//!
//! - **`plan`**: The [`Plan`] node, its operator kinds, and the transformation contract
//!   (`with_children`, `with_group_expression`, `with_logical_properties`, `accept`).
//! - **`plan::operators`**: Kind-specific payloads (Scan, Filter, Project, Join, ...).
//! - **`visitor`**: The [`PlanVisitor`] trait and the built-in visitors behind output
//!   derivation, expression collection and `describe`.
//! - **`properties`**: [`LogicalProperties`], the derived output schema of a subtree.
//! - **`expr`**: Scalar expressions, slots and the ids that give them identity.
//! - **`group`**: Non-owning memo handles ([`GroupId`], [`GroupExpressionRef`]).
//! - **`explain`**: Text and JSON rendering of plan trees.
//! - **`error`**: [`PlanError`].
//!
//! The memo itself lives in `optx-memo`; this crate only carries the handles.

pub mod error;
pub mod explain;
pub mod expr;
pub mod group;
pub mod plan;
pub mod properties;
pub mod visitor;

pub use error::PlanError;
pub use group::{GroupExpressionRef, GroupId};
pub use plan::{LogicalOpKind, PhysicalOpKind, Plan, PlanRef, PlanType};
pub use properties::LogicalProperties;
pub use visitor::PlanVisitor;
