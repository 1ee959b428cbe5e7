//! # Plan Nodes
//!
//! [`Plan`] is the immutable node both the rewrite phase and the physical planning
//! phase work on. Every operator kind is a variant of the closed [`Operator`] sum type;
//! kind-specific behaviour is reached through [`Plan::accept`] and the
//! [`PlanVisitor`](crate::visitor::PlanVisitor) trait, never by callers matching on
//! the operator themselves.
//!
//! ## Immutability and Sharing
//!
//! Nothing on a `Plan` is mutated after construction. The `with_*` methods build a new
//! node that shares the payload (`Arc<Operator>`) and any unchanged children
//! (`Arc<Plan>`) with the original, so a rewrite costs a handful of reference-count
//! bumps rather than a deep copy.
//!
//! ## Logical Properties
//!
//! A node's logical properties (its output schema) live in a once-initialised cell.
//! [`Plan::logical_properties`] derives them on first use from the payload and the
//! children's properties and returns the cached value afterwards. The rule for when
//! the cell starts out filled is uniform per kind class:
//!
//! - **Logical kinds** treat properties as a derivation cache. `with_children` and
//!   `with_group_expression` produce nodes with an empty cache; `with_logical_properties`
//!   installs the given value (or leaves the cache empty for `None`).
//! - **Physical kinds and group plans** take properties as a construction input: they
//!   implement a memo group whose schema is already known. They keep them across
//!   `with_children` and `with_group_expression`, and reject `with_logical_properties(None)`
//!   with [`PlanError::MissingProperties`].
//!
//! ## Equality
//!
//! `PartialEq`/`Hash` compare the kind and payload and ignore memo linkage and cached
//! properties. Whether children take part is decided per kind by
//! [`PlanType::identity_includes_children`]: unary and leaf kinds exclude them (the memo
//! resolves child identity through group ids), join kinds compare full child trees
//! since two joins over different inputs are different operations.

pub mod operators;

use crate::error::PlanError;
use crate::expr::{Expr, JoinType, NamedExpr, Slot, SortKey, TableRef};
use crate::group::{GroupExpressionRef, GroupId};
use crate::properties::LogicalProperties;
use crate::visitor::{Describer, ExpressionCollector, OutputDeriver, PlanVisitor};
use operators::{Aggregate, Filter, GroupPlan, HashJoin, Join, Limit, Project, Scan, Sort};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// Shared reference to a plan node. Children are held this way.
pub type PlanRef = Arc<Plan>;

/// Logical operators: *what* to compute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    Scan(Scan),
    Filter(Filter),
    Project(Project),
    Join(Join),
    Aggregate(Aggregate),
    Sort(Sort),
    Limit(Limit),
}

/// Physical operators: *how* to compute it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalOp {
    SeqScan(Scan),
    Filter(Filter),
    Project(Project),
    HashJoin(HashJoin),
    NestedLoopJoin(Join),
    HashAggregate(Aggregate),
    Sort(Sort),
    Limit(Limit),
}

/// Unified operator enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Logical(LogicalOp),
    Physical(PhysicalOp),
    Group(GroupPlan),
}

macro_rules! impl_from_payload {
    ($target:ident, $($payload:ident => $variant:ident),+ $(,)?) => {
        $(
            impl From<$payload> for $target {
                fn from(p: $payload) -> Self {
                    $target::$variant(p)
                }
            }
        )+
    };
}

impl_from_payload!(LogicalOp,
    Scan => Scan,
    Filter => Filter,
    Project => Project,
    Join => Join,
    Aggregate => Aggregate,
    Sort => Sort,
    Limit => Limit,
);

impl_from_payload!(PhysicalOp,
    Scan => SeqScan,
    Filter => Filter,
    Project => Project,
    HashJoin => HashJoin,
    Join => NestedLoopJoin,
    Aggregate => HashAggregate,
    Sort => Sort,
    Limit => Limit,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOpKind {
    Scan,
    Filter,
    Project,
    Join,
    Aggregate,
    Sort,
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalOpKind {
    SeqScan,
    Filter,
    Project,
    HashJoin,
    NestedLoopJoin,
    HashAggregate,
    Sort,
    Limit,
}

/// Kind tag of a plan node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanType {
    Logical(LogicalOpKind),
    Physical(PhysicalOpKind),
    Group,
}

impl LogicalOp {
    pub fn kind(&self) -> LogicalOpKind {
        match self {
            LogicalOp::Scan(_) => LogicalOpKind::Scan,
            LogicalOp::Filter(_) => LogicalOpKind::Filter,
            LogicalOp::Project(_) => LogicalOpKind::Project,
            LogicalOp::Join(_) => LogicalOpKind::Join,
            LogicalOp::Aggregate(_) => LogicalOpKind::Aggregate,
            LogicalOp::Sort(_) => LogicalOpKind::Sort,
            LogicalOp::Limit(_) => LogicalOpKind::Limit,
        }
    }
}

impl PhysicalOp {
    pub fn kind(&self) -> PhysicalOpKind {
        match self {
            PhysicalOp::SeqScan(_) => PhysicalOpKind::SeqScan,
            PhysicalOp::Filter(_) => PhysicalOpKind::Filter,
            PhysicalOp::Project(_) => PhysicalOpKind::Project,
            PhysicalOp::HashJoin(_) => PhysicalOpKind::HashJoin,
            PhysicalOp::NestedLoopJoin(_) => PhysicalOpKind::NestedLoopJoin,
            PhysicalOp::HashAggregate(_) => PhysicalOpKind::HashAggregate,
            PhysicalOp::Sort(_) => PhysicalOpKind::Sort,
            PhysicalOp::Limit(_) => PhysicalOpKind::Limit,
        }
    }
}

impl Operator {
    pub fn plan_type(&self) -> PlanType {
        match self {
            Operator::Logical(l) => PlanType::Logical(l.kind()),
            Operator::Physical(p) => PlanType::Physical(p.kind()),
            Operator::Group(_) => PlanType::Group,
        }
    }
}

impl PlanType {
    pub fn is_logical(self) -> bool {
        matches!(self, PlanType::Logical(_))
    }

    pub fn is_physical(self) -> bool {
        matches!(self, PlanType::Physical(_))
    }

    /// Exact number of children a node of this kind has.
    pub fn arity(self) -> usize {
        match self {
            PlanType::Logical(LogicalOpKind::Scan)
            | PlanType::Physical(PhysicalOpKind::SeqScan)
            | PlanType::Group => 0,
            PlanType::Logical(LogicalOpKind::Join)
            | PlanType::Physical(PhysicalOpKind::HashJoin)
            | PlanType::Physical(PhysicalOpKind::NestedLoopJoin) => 2,
            _ => 1,
        }
    }

    /// Whether node equality and hashing cover the children.
    pub fn identity_includes_children(self) -> bool {
        matches!(
            self,
            PlanType::Logical(LogicalOpKind::Join)
                | PlanType::Physical(PhysicalOpKind::HashJoin)
                | PlanType::Physical(PhysicalOpKind::NestedLoopJoin)
        )
    }

    /// Whether logical properties are a construction input rather than a cache.
    pub fn requires_properties(self) -> bool {
        !self.is_logical()
    }

    pub fn name(self) -> &'static str {
        match self {
            PlanType::Logical(k) => match k {
                LogicalOpKind::Scan => "LogicalScan",
                LogicalOpKind::Filter => "LogicalFilter",
                LogicalOpKind::Project => "LogicalProject",
                LogicalOpKind::Join => "LogicalJoin",
                LogicalOpKind::Aggregate => "LogicalAggregate",
                LogicalOpKind::Sort => "LogicalSort",
                LogicalOpKind::Limit => "LogicalLimit",
            },
            PlanType::Physical(k) => match k {
                PhysicalOpKind::SeqScan => "PhysicalSeqScan",
                PhysicalOpKind::Filter => "PhysicalFilter",
                PhysicalOpKind::Project => "PhysicalProject",
                PhysicalOpKind::HashJoin => "PhysicalHashJoin",
                PhysicalOpKind::NestedLoopJoin => "PhysicalNestedLoopJoin",
                PhysicalOpKind::HashAggregate => "PhysicalHashAggregate",
                PhysicalOpKind::Sort => "PhysicalSort",
                PhysicalOpKind::Limit => "PhysicalLimit",
            },
            PlanType::Group => "GroupPlan",
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable plan node.
#[derive(Debug, Clone)]
pub struct Plan {
    op: Arc<Operator>,
    children: Vec<PlanRef>,
    group_expression: Option<GroupExpressionRef>,
    logical_properties: OnceLock<LogicalProperties>,
}

fn cell(props: Option<LogicalProperties>) -> OnceLock<LogicalProperties> {
    match props {
        Some(p) => OnceLock::from(p),
        None => OnceLock::new(),
    }
}

impl Plan {
    /// Raw constructor. Trusts the caller on arity and on physical kinds having
    /// properties; the public constructors below uphold the latter.
    fn from_parts(
        op: Arc<Operator>,
        group_expression: Option<GroupExpressionRef>,
        logical_properties: Option<LogicalProperties>,
        children: Vec<PlanRef>,
    ) -> Self {
        Self {
            op,
            children,
            group_expression,
            logical_properties: cell(logical_properties),
        }
    }

    /// A logical node with no memo linkage; properties are derived on demand.
    pub fn logical(op: impl Into<LogicalOp>, children: Vec<PlanRef>) -> Self {
        Self::logical_with(op, None, None, children)
    }

    pub fn logical_with(
        op: impl Into<LogicalOp>,
        group_expression: Option<GroupExpressionRef>,
        logical_properties: Option<LogicalProperties>,
        children: Vec<PlanRef>,
    ) -> Self {
        Self::from_parts(
            Arc::new(Operator::Logical(op.into())),
            group_expression,
            logical_properties,
            children,
        )
    }

    /// A physical node. Physical nodes implement a group whose properties are known,
    /// so they must be supplied.
    pub fn physical(
        op: impl Into<PhysicalOp>,
        logical_properties: LogicalProperties,
        children: Vec<PlanRef>,
    ) -> Self {
        Self::physical_with(op, None, logical_properties, children)
    }

    pub fn physical_with(
        op: impl Into<PhysicalOp>,
        group_expression: Option<GroupExpressionRef>,
        logical_properties: LogicalProperties,
        children: Vec<PlanRef>,
    ) -> Self {
        Self::from_parts(
            Arc::new(Operator::Physical(op.into())),
            group_expression,
            Some(logical_properties),
            children,
        )
    }

    /// Leaf standing for memo group `group`, exposing that group's properties.
    pub fn group(group: GroupId, logical_properties: LogicalProperties) -> Self {
        Self::from_parts(
            Arc::new(Operator::Group(GroupPlan::new(group))),
            None,
            Some(logical_properties),
            Vec::new(),
        )
    }

    pub fn logical_scan(table: TableRef, output: Vec<Slot>) -> Self {
        Self::logical(Scan::new(table, output), Vec::new())
    }

    pub fn logical_filter(predicate: Expr, child: PlanRef) -> Self {
        Self::logical(Filter::new(predicate), vec![child])
    }

    pub fn logical_project(projects: Vec<NamedExpr>, child: PlanRef) -> Self {
        Self::logical(Project::new(projects), vec![child])
    }

    pub fn logical_join(
        join_type: JoinType,
        condition: Option<Expr>,
        left: PlanRef,
        right: PlanRef,
    ) -> Self {
        Self::logical(Join::new(join_type, condition), vec![left, right])
    }

    pub fn logical_aggregate(group_by: Vec<Expr>, outputs: Vec<NamedExpr>, child: PlanRef) -> Self {
        Self::logical(Aggregate::new(group_by, outputs), vec![child])
    }

    pub fn logical_sort(order: Vec<SortKey>, child: PlanRef) -> Self {
        Self::logical(Sort::new(order), vec![child])
    }

    pub fn logical_limit(limit: u64, offset: u64, child: PlanRef) -> Self {
        Self::logical(Limit::new(limit, offset), vec![child])
    }

    pub fn physical_project(
        projects: Vec<NamedExpr>,
        logical_properties: LogicalProperties,
        child: PlanRef,
    ) -> Self {
        Self::physical(Project::new(projects), logical_properties, vec![child])
    }

    pub fn physical_limit(
        limit: u64,
        offset: u64,
        logical_properties: LogicalProperties,
        child: PlanRef,
    ) -> Self {
        Self::physical(Limit::new(limit, offset), logical_properties, vec![child])
    }

    pub fn into_ref(self) -> PlanRef {
        Arc::new(self)
    }

    pub fn plan_type(&self) -> PlanType {
        self.op.plan_type()
    }

    pub fn arity(&self) -> usize {
        self.plan_type().arity()
    }

    pub fn children(&self) -> &[PlanRef] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&PlanRef> {
        self.children.get(index)
    }

    pub fn group_expression(&self) -> Option<GroupExpressionRef> {
        self.group_expression
    }

    /// The group a [`GroupPlan`] leaf stands for.
    pub fn group_plan_id(&self) -> Option<GroupId> {
        match &*self.op {
            Operator::Group(g) => Some(g.group),
            _ => None,
        }
    }

    pub(crate) fn operator(&self) -> &Operator {
        &self.op
    }

    /// Derive-or-fetch. Returns the cached properties if present; otherwise derives
    /// them from the payload and the children's properties and caches the result.
    pub fn logical_properties(&self) -> &LogicalProperties {
        self.logical_properties.get_or_init(|| {
            trace!(plan = %self.plan_type(), "deriving logical properties");
            LogicalProperties::new(self.compute_output())
        })
    }

    /// The cached properties, without deriving.
    pub fn cached_logical_properties(&self) -> Option<&LogicalProperties> {
        self.logical_properties.get()
    }

    pub fn output(&self) -> &[Slot] {
        self.logical_properties().output()
    }

    /// Kind-specific output schema. Pure: reads the children's (derived) outputs and
    /// never consults this node's own cache.
    pub fn compute_output(&self) -> Vec<Slot> {
        self.accept(&mut OutputDeriver, &mut ())
    }

    /// Every scalar expression this node owns directly, in payload order.
    pub fn expressions(&self) -> Vec<Expr> {
        self.accept(&mut ExpressionCollector, &mut ())
    }

    /// Same kind and payload over `children`. The result is not linked to the memo.
    pub fn with_children(&self, children: Vec<PlanRef>) -> Result<Plan, PlanError> {
        let plan_type = self.plan_type();
        if children.len() != plan_type.arity() {
            return Err(PlanError::Arity {
                plan_type,
                expected: plan_type.arity(),
                actual: children.len(),
            });
        }
        Ok(Self::from_parts(
            Arc::clone(&self.op),
            None,
            self.carried_properties(),
            children,
        ))
    }

    /// Same kind, payload and children, linked to `group_expression`.
    pub fn with_group_expression(&self, group_expression: Option<GroupExpressionRef>) -> Plan {
        trace!(
            plan = %self.plan_type(),
            from = ?self.group_expression,
            to = ?group_expression,
            "relinking plan"
        );
        Self::from_parts(
            Arc::clone(&self.op),
            group_expression,
            self.carried_properties(),
            self.children.clone(),
        )
    }

    /// Same kind, payload and children, unlinked, with `logical_properties` installed.
    pub fn with_logical_properties(
        &self,
        logical_properties: Option<LogicalProperties>,
    ) -> Result<Plan, PlanError> {
        let plan_type = self.plan_type();
        if logical_properties.is_none() && plan_type.requires_properties() {
            return Err(PlanError::MissingProperties { plan_type });
        }
        Ok(Self::from_parts(
            Arc::clone(&self.op),
            None,
            logical_properties,
            self.children.clone(),
        ))
    }

    /// Properties that survive a `with_children`/`with_group_expression`.
    fn carried_properties(&self) -> Option<LogicalProperties> {
        if self.plan_type().requires_properties() {
            self.logical_properties.get().cloned()
        } else {
            None
        }
    }

    /// Dispatch to the visitor entry for this node's kind. Calls exactly one handler
    /// and does not recurse into children.
    pub fn accept<V, R, C>(&self, visitor: &mut V, ctx: &mut C) -> R
    where
        V: PlanVisitor<R, C> + ?Sized,
    {
        match &*self.op {
            Operator::Logical(op) => match op {
                LogicalOp::Scan(p) => visitor.visit_logical_scan(p, self, ctx),
                LogicalOp::Filter(p) => visitor.visit_logical_filter(p, self, ctx),
                LogicalOp::Project(p) => visitor.visit_logical_project(p, self, ctx),
                LogicalOp::Join(p) => visitor.visit_logical_join(p, self, ctx),
                LogicalOp::Aggregate(p) => visitor.visit_logical_aggregate(p, self, ctx),
                LogicalOp::Sort(p) => visitor.visit_logical_sort(p, self, ctx),
                LogicalOp::Limit(p) => visitor.visit_logical_limit(p, self, ctx),
            },
            Operator::Physical(op) => match op {
                PhysicalOp::SeqScan(p) => visitor.visit_physical_seq_scan(p, self, ctx),
                PhysicalOp::Filter(p) => visitor.visit_physical_filter(p, self, ctx),
                PhysicalOp::Project(p) => visitor.visit_physical_project(p, self, ctx),
                PhysicalOp::HashJoin(p) => visitor.visit_physical_hash_join(p, self, ctx),
                PhysicalOp::NestedLoopJoin(p) => {
                    visitor.visit_physical_nested_loop_join(p, self, ctx)
                }
                PhysicalOp::HashAggregate(p) => visitor.visit_physical_hash_aggregate(p, self, ctx),
                PhysicalOp::Sort(p) => visitor.visit_physical_sort(p, self, ctx),
                PhysicalOp::Limit(p) => visitor.visit_physical_limit(p, self, ctx),
            },
            Operator::Group(p) => visitor.visit_group_plan(p, self, ctx),
        }
    }

    /// Deterministic one-line rendering, e.g. `LogicalProject (a, b)`.
    pub fn describe(&self) -> String {
        let body: String = self.accept(&mut Describer, &mut ());
        format!("{} {}", self.plan_type(), body)
    }

    /// Structural equality over the whole tree: kind, payload and every descendant.
    /// Ignores memo linkage and cached properties.
    pub fn tree_eq(&self, other: &Plan) -> bool {
        self.op == other.op
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|(a, b)| a.tree_eq(b))
    }

    fn hash_tree<H: Hasher>(&self, state: &mut H) {
        self.op.hash(state);
        self.children.len().hash(state);
        for child in &self.children {
            child.hash_tree(state);
        }
    }
}

impl PartialEq for Plan {
    fn eq(&self, other: &Self) -> bool {
        if self.op != other.op {
            return false;
        }
        if !self.plan_type().identity_includes_children() {
            return true;
        }
        self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(other.children.iter())
                .all(|(a, b)| a.tree_eq(b))
    }
}

impl Eq for Plan {}

impl Hash for Plan {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.op.hash(state);
        if self.plan_type().identity_includes_children() {
            for child in &self.children {
                child.hash_tree(state);
            }
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
