//! Contract tests for plan nodes.
//!
//! These build small trees over a `tpch.orders` / `tpch.customer` scan, run them
//! through the `with_*` transformations, and check the behaviour every optimizer phase
//! relies on: arity checking, memo linkage threading, the logical-property rule per
//! kind class, equality and hashing, expression collection and `describe`.

use optx_plan::expr::*;
use optx_plan::plan::operators::*;
use optx_plan::{
    GroupExpressionRef, GroupId, LogicalProperties, Plan, PlanError, PlanRef, PlanType,
    PlanVisitor,
};
use optx_plan::{LogicalOpKind, PhysicalOpKind};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn col(id: u32, name: &str) -> Slot {
    Slot::new(ExprId::new(id), name, DataType::Int64)
}

fn scan(name: &str, first_id: u32) -> PlanRef {
    Plan::logical_scan(
        TableRef::new("tpch", name),
        vec![col(first_id, "c1"), col(first_id + 1, "c2")],
    )
    .into_ref()
}

fn orders() -> PlanRef {
    scan("orders", 1)
}

fn customer() -> PlanRef {
    scan("customer", 10)
}

fn hash_of(plan: &Plan) -> u64 {
    let mut h = DefaultHasher::new();
    plan.hash(&mut h);
    h.finish()
}

fn link(group: u32, index: u32) -> Option<GroupExpressionRef> {
    Some(GroupExpressionRef::new(GroupId::new(group), index))
}

// ---------------------------------------------------------------------------
// with_children
// ---------------------------------------------------------------------------

#[test]
fn test_with_children_replaces_child() {
    let limit = Plan::logical_limit(10, 0, orders());
    let c = customer();
    let moved = limit.with_children(vec![Arc::clone(&c)]).unwrap();
    assert_eq!(moved.children().len(), 1);
    assert!(Arc::ptr_eq(&moved.children()[0], &c));
    assert!(moved.group_expression().is_none());
}

#[test]
fn test_with_children_rejects_wrong_arity() {
    let limit = Plan::logical_limit(10, 0, orders());
    assert_eq!(
        limit.with_children(vec![]).unwrap_err(),
        PlanError::Arity {
            plan_type: PlanType::Logical(LogicalOpKind::Limit),
            expected: 1,
            actual: 0,
        }
    );
    assert!(limit.with_children(vec![orders(), customer()]).is_err());

    let join = Plan::logical_join(JoinType::Cross, None, orders(), customer());
    let err = join.with_children(vec![orders()]).unwrap_err();
    assert_eq!(err.to_string(), "LogicalJoin expects 2 child(ren), got 1");
}

#[test]
fn test_with_children_strips_linkage() {
    let linked = Plan::logical_limit(1, 0, orders()).with_group_expression(link(3, 4));
    let rebuilt = linked.with_children(vec![customer()]).unwrap();
    assert!(rebuilt.group_expression().is_none());
}

// ---------------------------------------------------------------------------
// Equality and hashing
// ---------------------------------------------------------------------------

#[test]
fn test_equality_is_kind_discriminating() {
    let props = orders().logical_properties().clone();
    let logical = Plan::logical_limit(20, 0, orders());
    let physical = Plan::physical_limit(20, 0, props, orders());
    assert_ne!(logical, physical);
    assert_ne!(
        Plan::logical_limit(20, 0, orders()),
        Plan::logical_limit(20, 1, orders())
    );
}

#[test]
fn test_equality_ignores_linkage_and_cache() {
    let a = Plan::logical_limit(20, 0, orders());
    let b = a.with_group_expression(link(1, 2));
    assert_eq!(a.logical_properties().width(), 2);
    assert_eq!(a, b);
    assert_eq!(b, a);
    assert_eq!(hash_of(&a), hash_of(&b));

    // Linking then unlinking gives back an equal node.
    let unlinked = b.with_group_expression(None);
    assert!(unlinked.group_expression().is_none());
    assert_eq!(unlinked, a);
}

#[test]
fn test_equality_is_order_sensitive() {
    let a = col(1, "a");
    let b = col(2, "b");
    let ab = Plan::logical_project(vec![a.clone().into(), b.clone().into()], orders());
    let ba = Plan::logical_project(vec![b.into(), a.into()], orders());
    assert_ne!(ab, ba);
}

#[test]
fn test_equality_is_transitive() {
    let x = Plan::logical_limit(5, 5, orders());
    let y = x.with_group_expression(link(0, 0));
    let z = y.with_children(vec![orders()]).unwrap();
    assert_eq!(x, y);
    assert_eq!(y, z);
    assert_eq!(x, z);
}

#[test]
fn test_unary_equality_excludes_children() {
    let props = orders().logical_properties().clone();
    let over_orders = Plan::physical_limit(20, 0, props.clone(), orders());
    let over_customer = Plan::physical_limit(20, 0, props, customer());
    assert_eq!(over_orders, over_customer);
    assert_eq!(hash_of(&over_orders), hash_of(&over_customer));
    assert!(!over_orders.tree_eq(&over_customer));
}

#[test]
fn test_join_equality_includes_children() {
    let cond = Expr::equal(Expr::slot(&col(1, "c1")), Expr::slot(&col(10, "c1")));
    let j1 = Plan::logical_join(JoinType::Inner, Some(cond.clone()), orders(), customer());
    let j2 = Plan::logical_join(JoinType::Inner, Some(cond.clone()), orders(), customer());
    let swapped = Plan::logical_join(JoinType::Inner, Some(cond), customer(), orders());
    assert_eq!(j1, j2);
    assert_eq!(hash_of(&j1), hash_of(&j2));
    assert_ne!(j1, swapped);
}

// ---------------------------------------------------------------------------
// Logical properties
// ---------------------------------------------------------------------------

#[test]
fn test_project_output_uses_alias_slots() {
    init_tracing();
    let x = col(1, "x");
    let y = col(2, "y");
    let project = Plan::logical_project(
        vec![
            Alias::with_id(ExprId::new(100), Expr::slot(&x), "a").into(),
            Alias::with_id(ExprId::new(101), Expr::slot(&y), "b").into(),
        ],
        orders(),
    );
    let names: Vec<&str> = project.output().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
    assert_eq!(project.output()[0].id, ExprId::new(100));
}

#[test]
fn test_limit_passes_through_child_output() {
    let limit = Plan::logical_limit(10, 5, orders());
    assert_eq!(limit.output(), orders().output());
}

#[test]
fn test_properties_derived_once_and_cached() {
    let limit = Plan::logical_limit(10, 5, orders());
    assert!(limit.cached_logical_properties().is_none());
    let first = limit.logical_properties() as *const LogicalProperties;
    let second = limit.logical_properties() as *const LogicalProperties;
    assert_eq!(first, second);
    assert!(limit.cached_logical_properties().is_some());
}

#[test]
fn test_with_logical_properties_installs_and_clears_linkage() {
    let props = LogicalProperties::new(vec![col(50, "only")]);
    let linked = Plan::logical_limit(1, 0, orders()).with_group_expression(link(2, 9));
    let replaced = linked.with_logical_properties(Some(props.clone())).unwrap();
    assert!(replaced.group_expression().is_none());
    assert_eq!(replaced.logical_properties(), &props);

    let lazy = linked.with_logical_properties(None).unwrap();
    assert!(lazy.group_expression().is_none());
    assert_eq!(lazy.output(), orders().output());
}

#[test]
fn test_physical_requires_properties() {
    let props = orders().logical_properties().clone();
    let limit = Plan::physical_limit(20, 0, props, orders());
    assert_eq!(
        limit.with_logical_properties(None).unwrap_err(),
        PlanError::MissingProperties {
            plan_type: PlanType::Physical(PhysicalOpKind::Limit)
        }
    );
}

#[test]
fn test_physical_properties_survive_relink() {
    let props = LogicalProperties::new(vec![col(1, "c1")]);
    let project = Plan::physical_project(vec![col(1, "c1").into()], props.clone(), orders());
    let linked = project.with_group_expression(link(0, 1));
    assert_eq!(linked.cached_logical_properties(), Some(&props));
    assert_eq!(linked.group_expression(), link(0, 1));
}

#[test]
fn test_logical_cache_reset_on_relink() {
    let limit = Plan::logical_limit(1, 0, orders());
    assert!(limit.logical_properties().contains_all(orders().output()));
    let linked = limit.with_group_expression(link(0, 1));
    assert!(linked.cached_logical_properties().is_none());
}

// ---------------------------------------------------------------------------
// Expressions and describe
// ---------------------------------------------------------------------------

#[test]
fn test_limit_expressions_are_literals_in_order() {
    let limit = Plan::logical_limit(10, 5, orders());
    assert_eq!(limit.expressions(), vec![Expr::int(10), Expr::int(5)]);
}

#[test]
fn test_project_expressions_are_projection_list() {
    let a = col(1, "a");
    let project = Plan::logical_project(vec![a.clone().into()], orders());
    assert_eq!(project.expressions(), vec![Expr::Slot(a)]);
}

#[test]
fn test_describe() {
    let ids = ExprIdGenerator::starting_at(100);
    let project = Plan::logical_project(
        vec![
            Alias::new(&ids, Expr::slot(&col(1, "colA")), "a").into(),
            Alias::new(&ids, Expr::slot(&col(2, "colB")), "b").into(),
        ],
        orders(),
    );
    assert_eq!(project.describe(), "LogicalProject (a, b)");
    assert_eq!(project.to_string(), "LogicalProject (a, b)");

    let pass_through = Plan::logical_project(vec![col(1, "c1").into()], orders());
    assert_eq!(pass_through.describe(), "LogicalProject (c1)");

    let props = orders().logical_properties().clone();
    let limit = Plan::physical_limit(20, 0, props, orders());
    assert_eq!(limit.describe(), "PhysicalLimit ( offset=0, limit=20)");

    let leaf = Plan::group(GroupId::new(3), LogicalProperties::new(vec![]));
    assert_eq!(leaf.describe(), "GroupPlan (@3)");
    assert_eq!(orders().describe(), "LogicalScan (tpch.orders)");
}

// ---------------------------------------------------------------------------
// Visitor dispatch
// ---------------------------------------------------------------------------

/// Counts nodes per class, recursing into children itself.
#[derive(Default)]
struct KindCounter {
    logical: usize,
    physical: usize,
    groups: usize,
}

impl KindCounter {
    fn logical(&mut self, plan: &Plan, depth: &mut usize) {
        self.logical += 1;
        self.recurse(plan, depth);
    }

    fn physical(&mut self, plan: &Plan, depth: &mut usize) {
        self.physical += 1;
        self.recurse(plan, depth);
    }

    fn recurse(&mut self, plan: &Plan, depth: &mut usize) {
        *depth += 1;
        for child in plan.children() {
            child.accept(self, depth);
        }
    }
}

impl PlanVisitor<(), usize> for KindCounter {
    fn visit_logical_scan(&mut self, _: &Scan, p: &Plan, d: &mut usize) {
        self.logical(p, d)
    }
    fn visit_logical_filter(&mut self, _: &Filter, p: &Plan, d: &mut usize) {
        self.logical(p, d)
    }
    fn visit_logical_project(&mut self, _: &Project, p: &Plan, d: &mut usize) {
        self.logical(p, d)
    }
    fn visit_logical_join(&mut self, _: &Join, p: &Plan, d: &mut usize) {
        self.logical(p, d)
    }
    fn visit_logical_aggregate(&mut self, _: &Aggregate, p: &Plan, d: &mut usize) {
        self.logical(p, d)
    }
    fn visit_logical_sort(&mut self, _: &Sort, p: &Plan, d: &mut usize) {
        self.logical(p, d)
    }
    fn visit_logical_limit(&mut self, _: &Limit, p: &Plan, d: &mut usize) {
        self.logical(p, d)
    }
    fn visit_physical_seq_scan(&mut self, _: &Scan, p: &Plan, d: &mut usize) {
        self.physical(p, d)
    }
    fn visit_physical_filter(&mut self, _: &Filter, p: &Plan, d: &mut usize) {
        self.physical(p, d)
    }
    fn visit_physical_project(&mut self, _: &Project, p: &Plan, d: &mut usize) {
        self.physical(p, d)
    }
    fn visit_physical_hash_join(&mut self, _: &HashJoin, p: &Plan, d: &mut usize) {
        self.physical(p, d)
    }
    fn visit_physical_nested_loop_join(&mut self, _: &Join, p: &Plan, d: &mut usize) {
        self.physical(p, d)
    }
    fn visit_physical_hash_aggregate(&mut self, _: &Aggregate, p: &Plan, d: &mut usize) {
        self.physical(p, d)
    }
    fn visit_physical_sort(&mut self, _: &Sort, p: &Plan, d: &mut usize) {
        self.physical(p, d)
    }
    fn visit_physical_limit(&mut self, _: &Limit, p: &Plan, d: &mut usize) {
        self.physical(p, d)
    }
    fn visit_group_plan(&mut self, _: &GroupPlan, _: &Plan, _: &mut usize) {
        self.groups += 1;
    }
}

/// Records the single handler `accept` calls, without recursing.
struct LimitProbe;

impl LimitProbe {
    fn other(&mut self) -> Option<Limit> {
        None
    }
}

impl PlanVisitor<Option<Limit>, Vec<&'static str>> for LimitProbe {
    fn visit_logical_scan(&mut self, _: &Scan, _: &Plan, c: &mut Vec<&'static str>) -> Option<Limit> {
        c.push("scan");
        self.other()
    }
    fn visit_logical_filter(&mut self, _: &Filter, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_logical_project(&mut self, _: &Project, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_logical_join(&mut self, _: &Join, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_logical_aggregate(&mut self, _: &Aggregate, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_logical_sort(&mut self, _: &Sort, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_logical_limit(&mut self, l: &Limit, _: &Plan, c: &mut Vec<&'static str>) -> Option<Limit> {
        c.push("logical_limit");
        Some(*l)
    }
    fn visit_physical_seq_scan(&mut self, _: &Scan, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_physical_filter(&mut self, _: &Filter, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_physical_project(&mut self, _: &Project, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_physical_hash_join(&mut self, _: &HashJoin, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_physical_nested_loop_join(&mut self, _: &Join, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_physical_hash_aggregate(&mut self, _: &Aggregate, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_physical_sort(&mut self, _: &Sort, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
    fn visit_physical_limit(&mut self, l: &Limit, _: &Plan, c: &mut Vec<&'static str>) -> Option<Limit> {
        c.push("physical_limit");
        Some(*l)
    }
    fn visit_group_plan(&mut self, _: &GroupPlan, _: &Plan, _: &mut Vec<&'static str>) -> Option<Limit> {
        self.other()
    }
}

#[test]
fn test_accept_calls_one_handler_without_recursion() {
    let limit = Plan::logical_limit(10, 5, orders());
    let mut calls = Vec::new();
    let got = limit.accept(&mut LimitProbe, &mut calls);
    assert_eq!(got, Some(Limit::new(10, 5)));
    assert_eq!(calls, vec!["logical_limit"]);
}

#[test]
fn test_visitor_walks_tree() {
    let props = orders().logical_properties().clone();
    let leaf = Plan::group(GroupId::new(0), props.clone()).into_ref();
    let join = Plan::logical_join(JoinType::Cross, None, orders(), leaf).into_ref();
    let top = Plan::physical_limit(1, 0, props, join);

    let mut counter = KindCounter::default();
    top.accept(&mut counter, &mut 0usize);
    assert_eq!(counter.physical, 1);
    assert_eq!(counter.logical, 2);
    assert_eq!(counter.groups, 1);
}
