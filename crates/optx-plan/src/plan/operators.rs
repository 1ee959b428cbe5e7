//! # Operator Payloads
//!
//! Each struct here is the kind-specific payload of one or more plan kinds. A logical
//! operator and the physical operator that implements it usually share a payload (a
//! `LogicalProject` and a `PhysicalProject` both carry a [`Project`]); the kind tag on
//! the [`Operator`](super::Operator) tells them apart.
//!
//! Payloads own the kind-specific logic the node contract needs:
//!
//! - `compute_output`: the output schema, from the payload and the children's
//!   already-derived outputs. Pure; never touches the children's caches except to read.
//! - `expressions`: every scalar expression the node owns directly, so expression
//!   rewrites can find them without knowing the kind.
//! - `Display`: the parenthesised body of `Plan::describe`.
//!
//! Equality and hashing are derived: two payloads are equal iff their fields are.

use super::PlanRef;
use crate::expr::{BuildSide, Expr, JoinType, NamedExpr, ScalarValue, Slot, SortKey, TableRef};
use crate::group::GroupId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output of the `index`-th child, or nothing if the caller built the node without it.
fn child_output(children: &[PlanRef], index: usize) -> Vec<Slot> {
    children
        .get(index)
        .map(|c| c.output().to_vec())
        .unwrap_or_default()
}

fn nullable(slots: Vec<Slot>) -> impl Iterator<Item = Slot> {
    slots.into_iter().map(|s| s.with_nullable(true))
}

/// Output schema of a join over `left` and `right`.
pub(crate) fn join_output(join_type: JoinType, left: Vec<Slot>, right: Vec<Slot>) -> Vec<Slot> {
    match join_type {
        JoinType::Inner | JoinType::Cross => left.into_iter().chain(right).collect(),
        JoinType::Left => left.into_iter().chain(nullable(right)).collect(),
        JoinType::Right => nullable(left).chain(right).collect(),
        JoinType::Full => nullable(left).chain(nullable(right)).collect(),
        JoinType::Semi | JoinType::Anti => left,
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

/// Table scan. Leaf; its output slots were bound by the binder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scan {
    pub table: TableRef,
    pub output: Vec<Slot>,
}

impl Scan {
    pub fn new(table: TableRef, output: Vec<Slot>) -> Self {
        Self { table, output }
    }

    pub fn compute_output(&self) -> Vec<Slot> {
        self.output.clone()
    }

    pub fn expressions(&self) -> Vec<Expr> {
        Vec::new()
    }
}

impl fmt::Display for Scan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.table)
    }
}

/// Row filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    pub predicate: Expr,
}

impl Filter {
    pub fn new(predicate: Expr) -> Self {
        Self { predicate }
    }

    pub fn compute_output(&self, children: &[PlanRef]) -> Vec<Slot> {
        child_output(children, 0)
    }

    pub fn expressions(&self) -> Vec<Expr> {
        vec![self.predicate.clone()]
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.predicate)
    }
}

/// Projection. Defines its own schema: one slot per projected expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    pub projects: Vec<NamedExpr>,
}

impl Project {
    pub fn new(projects: Vec<NamedExpr>) -> Self {
        Self { projects }
    }

    /// Independent of the child's schema.
    pub fn compute_output(&self) -> Vec<Slot> {
        self.projects.iter().map(NamedExpr::to_slot).collect()
    }

    pub fn expressions(&self) -> Vec<Expr> {
        self.projects.iter().map(NamedExpr::to_expr).collect()
    }
}

/// Lists the output names only; the aliased expressions are in the explain JSON.
impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.projects.iter().map(NamedExpr::name).collect();
        write!(f, "({})", names.join(", "))
    }
}

/// Logical join, also the payload of a physical nested loop join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Join {
    pub join_type: JoinType,
    /// `None` for cross joins.
    pub condition: Option<Expr>,
}

impl Join {
    pub fn new(join_type: JoinType, condition: Option<Expr>) -> Self {
        Self {
            join_type,
            condition,
        }
    }

    pub fn compute_output(&self, children: &[PlanRef]) -> Vec<Slot> {
        join_output(
            self.join_type,
            child_output(children, 0),
            child_output(children, 1),
        )
    }

    pub fn expressions(&self) -> Vec<Expr> {
        self.condition.iter().cloned().collect()
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.condition {
            Some(ref c) => write!(f, "(type={:?}, condition={})", self.join_type, c),
            None => write!(f, "(type={:?})", self.join_type),
        }
    }
}

/// Hash join. Requires an equi-join condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashJoin {
    pub join_type: JoinType,
    pub build_side: BuildSide,
    pub condition: Expr,
}

impl HashJoin {
    pub fn new(join_type: JoinType, build_side: BuildSide, condition: Expr) -> Self {
        Self {
            join_type,
            build_side,
            condition,
        }
    }

    pub fn compute_output(&self, children: &[PlanRef]) -> Vec<Slot> {
        join_output(
            self.join_type,
            child_output(children, 0),
            child_output(children, 1),
        )
    }

    pub fn expressions(&self) -> Vec<Expr> {
        vec![self.condition.clone()]
    }
}

impl fmt::Display for HashJoin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(type={:?}, build={:?}, condition={})",
            self.join_type, self.build_side, self.condition
        )
    }
}

/// Grouped aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Aggregate {
    pub group_by: Vec<Expr>,
    /// Group keys and aggregate calls, each bound to an output slot.
    pub outputs: Vec<NamedExpr>,
}

impl Aggregate {
    pub fn new(group_by: Vec<Expr>, outputs: Vec<NamedExpr>) -> Self {
        Self { group_by, outputs }
    }

    pub fn compute_output(&self) -> Vec<Slot> {
        self.outputs.iter().map(NamedExpr::to_slot).collect()
    }

    pub fn expressions(&self) -> Vec<Expr> {
        self.group_by
            .iter()
            .cloned()
            .chain(self.outputs.iter().map(NamedExpr::to_expr))
            .collect()
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(group_by=[")?;
        write_list(f, &self.group_by)?;
        f.write_str("], outputs=[")?;
        write_list(f, &self.outputs)?;
        f.write_str("])")
    }
}

/// Sort.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    pub order: Vec<SortKey>,
}

impl Sort {
    pub fn new(order: Vec<SortKey>) -> Self {
        Self { order }
    }

    pub fn compute_output(&self, children: &[PlanRef]) -> Vec<Slot> {
        child_output(children, 0)
    }

    pub fn expressions(&self) -> Vec<Expr> {
        self.order.iter().map(|k| k.expr.clone()).collect()
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        write_list(f, &self.order)?;
        f.write_str(")")
    }
}

/// `LIMIT <limit> OFFSET <offset>`: skip `offset` rows, then return at most `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Limit {
    pub limit: u64,
    pub offset: u64,
}

impl Limit {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }

    /// Limit never changes the shape of its input.
    pub fn compute_output(&self, children: &[PlanRef]) -> Vec<Slot> {
        child_output(children, 0)
    }

    /// `[limit, offset]` as literals, so generic expression passes can see them.
    /// Values beyond `i64::MAX` saturate.
    pub fn expressions(&self) -> Vec<Expr> {
        let lit = |v: u64| Expr::Literal(ScalarValue::Int64(i64::try_from(v).unwrap_or(i64::MAX)));
        vec![lit(self.limit), lit(self.offset)]
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "( offset={}, limit={})", self.offset, self.limit)
    }
}

/// Leaf standing in for a whole memo group. Memo-resident nodes use these as their
/// children; the group's logical properties travel on the plan node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupPlan {
    pub group: GroupId,
}

impl GroupPlan {
    pub fn new(group: GroupId) -> Self {
        Self { group }
    }

    pub fn expressions(&self) -> Vec<Expr> {
        Vec::new()
    }
}

impl fmt::Display for GroupPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.group)
    }
}
