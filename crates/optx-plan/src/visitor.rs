//! # Plan Visitors
//!
//! [`PlanVisitor`] is the one place where operator kinds are enumerated. Every
//! tree-walking algorithm (property derivation, explain, cost estimation, rule
//! matching) is written as a visitor instead of matching on operators itself, so adding
//! a kind means adding one method here and the compiler points at every visitor that
//! has to handle it.
//!
//! ## Dispatch
//!
//! [`Plan::accept`] calls exactly one handler and returns its result. It never recurses:
//! a visitor that needs the children walks `plan.children()` itself, before or after
//! handling the node, which gives bottom-up and top-down traversals from the same
//! contract.
//!
//! Handlers receive the typed payload, the node (for children, linkage and properties)
//! and a caller-supplied context `C` for state that outlives one call.
//!
//! ## Built-in Visitors
//!
//! - [`OutputDeriver`] backs `Plan::compute_output`.
//! - [`ExpressionCollector`] backs `Plan::expressions`.
//! - [`Describer`] renders the payload half of `Plan::describe`.
//! - The explain tree printer lives in [`crate::explain`].

use crate::expr::{Expr, Slot};
use crate::plan::operators::{Aggregate, Filter, GroupPlan, HashJoin, Join, Limit, Project, Scan, Sort};
use crate::plan::Plan;

/// One required handler per concrete plan kind. There are no default bodies.
pub trait PlanVisitor<R, C> {
    fn visit_logical_scan(&mut self, scan: &Scan, plan: &Plan, ctx: &mut C) -> R;
    fn visit_logical_filter(&mut self, filter: &Filter, plan: &Plan, ctx: &mut C) -> R;
    fn visit_logical_project(&mut self, project: &Project, plan: &Plan, ctx: &mut C) -> R;
    fn visit_logical_join(&mut self, join: &Join, plan: &Plan, ctx: &mut C) -> R;
    fn visit_logical_aggregate(&mut self, aggregate: &Aggregate, plan: &Plan, ctx: &mut C) -> R;
    fn visit_logical_sort(&mut self, sort: &Sort, plan: &Plan, ctx: &mut C) -> R;
    fn visit_logical_limit(&mut self, limit: &Limit, plan: &Plan, ctx: &mut C) -> R;

    fn visit_physical_seq_scan(&mut self, scan: &Scan, plan: &Plan, ctx: &mut C) -> R;
    fn visit_physical_filter(&mut self, filter: &Filter, plan: &Plan, ctx: &mut C) -> R;
    fn visit_physical_project(&mut self, project: &Project, plan: &Plan, ctx: &mut C) -> R;
    fn visit_physical_hash_join(&mut self, join: &HashJoin, plan: &Plan, ctx: &mut C) -> R;
    fn visit_physical_nested_loop_join(&mut self, join: &Join, plan: &Plan, ctx: &mut C) -> R;
    fn visit_physical_hash_aggregate(
        &mut self,
        aggregate: &Aggregate,
        plan: &Plan,
        ctx: &mut C,
    ) -> R;
    fn visit_physical_sort(&mut self, sort: &Sort, plan: &Plan, ctx: &mut C) -> R;
    fn visit_physical_limit(&mut self, limit: &Limit, plan: &Plan, ctx: &mut C) -> R;

    fn visit_group_plan(&mut self, group: &GroupPlan, plan: &Plan, ctx: &mut C) -> R;
}

/// Computes a node's output schema from its payload and its children's outputs.
pub struct OutputDeriver;

impl PlanVisitor<Vec<Slot>, ()> for OutputDeriver {
    fn visit_logical_scan(&mut self, scan: &Scan, _: &Plan, _: &mut ()) -> Vec<Slot> {
        scan.compute_output()
    }

    fn visit_logical_filter(&mut self, filter: &Filter, plan: &Plan, _: &mut ()) -> Vec<Slot> {
        filter.compute_output(plan.children())
    }

    fn visit_logical_project(&mut self, project: &Project, _: &Plan, _: &mut ()) -> Vec<Slot> {
        project.compute_output()
    }

    fn visit_logical_join(&mut self, join: &Join, plan: &Plan, _: &mut ()) -> Vec<Slot> {
        join.compute_output(plan.children())
    }

    fn visit_logical_aggregate(&mut self, agg: &Aggregate, _: &Plan, _: &mut ()) -> Vec<Slot> {
        agg.compute_output()
    }

    fn visit_logical_sort(&mut self, sort: &Sort, plan: &Plan, _: &mut ()) -> Vec<Slot> {
        sort.compute_output(plan.children())
    }

    fn visit_logical_limit(&mut self, limit: &Limit, plan: &Plan, _: &mut ()) -> Vec<Slot> {
        limit.compute_output(plan.children())
    }

    fn visit_physical_seq_scan(&mut self, scan: &Scan, _: &Plan, _: &mut ()) -> Vec<Slot> {
        scan.compute_output()
    }

    fn visit_physical_filter(&mut self, filter: &Filter, plan: &Plan, _: &mut ()) -> Vec<Slot> {
        filter.compute_output(plan.children())
    }

    fn visit_physical_project(&mut self, project: &Project, _: &Plan, _: &mut ()) -> Vec<Slot> {
        project.compute_output()
    }

    fn visit_physical_hash_join(&mut self, join: &HashJoin, plan: &Plan, _: &mut ()) -> Vec<Slot> {
        join.compute_output(plan.children())
    }

    fn visit_physical_nested_loop_join(
        &mut self,
        join: &Join,
        plan: &Plan,
        _: &mut (),
    ) -> Vec<Slot> {
        join.compute_output(plan.children())
    }

    fn visit_physical_hash_aggregate(
        &mut self,
        agg: &Aggregate,
        _: &Plan,
        _: &mut (),
    ) -> Vec<Slot> {
        agg.compute_output()
    }

    fn visit_physical_sort(&mut self, sort: &Sort, plan: &Plan, _: &mut ()) -> Vec<Slot> {
        sort.compute_output(plan.children())
    }

    fn visit_physical_limit(&mut self, limit: &Limit, plan: &Plan, _: &mut ()) -> Vec<Slot> {
        limit.compute_output(plan.children())
    }

    /// A group leaf has no payload to derive from; its schema is the group's, which
    /// it was constructed with.
    fn visit_group_plan(&mut self, _: &GroupPlan, plan: &Plan, _: &mut ()) -> Vec<Slot> {
        plan.cached_logical_properties()
            .map(|p| p.output().to_vec())
            .unwrap_or_default()
    }
}

/// Collects the scalar expressions a node owns directly.
pub struct ExpressionCollector;

impl PlanVisitor<Vec<Expr>, ()> for ExpressionCollector {
    fn visit_logical_scan(&mut self, scan: &Scan, _: &Plan, _: &mut ()) -> Vec<Expr> {
        scan.expressions()
    }

    fn visit_logical_filter(&mut self, filter: &Filter, _: &Plan, _: &mut ()) -> Vec<Expr> {
        filter.expressions()
    }

    fn visit_logical_project(&mut self, project: &Project, _: &Plan, _: &mut ()) -> Vec<Expr> {
        project.expressions()
    }

    fn visit_logical_join(&mut self, join: &Join, _: &Plan, _: &mut ()) -> Vec<Expr> {
        join.expressions()
    }

    fn visit_logical_aggregate(&mut self, agg: &Aggregate, _: &Plan, _: &mut ()) -> Vec<Expr> {
        agg.expressions()
    }

    fn visit_logical_sort(&mut self, sort: &Sort, _: &Plan, _: &mut ()) -> Vec<Expr> {
        sort.expressions()
    }

    fn visit_logical_limit(&mut self, limit: &Limit, _: &Plan, _: &mut ()) -> Vec<Expr> {
        limit.expressions()
    }

    fn visit_physical_seq_scan(&mut self, scan: &Scan, _: &Plan, _: &mut ()) -> Vec<Expr> {
        scan.expressions()
    }

    fn visit_physical_filter(&mut self, filter: &Filter, _: &Plan, _: &mut ()) -> Vec<Expr> {
        filter.expressions()
    }

    fn visit_physical_project(&mut self, project: &Project, _: &Plan, _: &mut ()) -> Vec<Expr> {
        project.expressions()
    }

    fn visit_physical_hash_join(&mut self, join: &HashJoin, _: &Plan, _: &mut ()) -> Vec<Expr> {
        join.expressions()
    }

    fn visit_physical_nested_loop_join(&mut self, join: &Join, _: &Plan, _: &mut ()) -> Vec<Expr> {
        join.expressions()
    }

    fn visit_physical_hash_aggregate(
        &mut self,
        agg: &Aggregate,
        _: &Plan,
        _: &mut (),
    ) -> Vec<Expr> {
        agg.expressions()
    }

    fn visit_physical_sort(&mut self, sort: &Sort, _: &Plan, _: &mut ()) -> Vec<Expr> {
        sort.expressions()
    }

    fn visit_physical_limit(&mut self, limit: &Limit, _: &Plan, _: &mut ()) -> Vec<Expr> {
        limit.expressions()
    }

    fn visit_group_plan(&mut self, group: &GroupPlan, _: &Plan, _: &mut ()) -> Vec<Expr> {
        group.expressions()
    }
}

/// Renders the parenthesised payload body, e.g. `(a, b)` for a projection.
pub struct Describer;

impl PlanVisitor<String, ()> for Describer {
    fn visit_logical_scan(&mut self, scan: &Scan, _: &Plan, _: &mut ()) -> String {
        scan.to_string()
    }

    fn visit_logical_filter(&mut self, filter: &Filter, _: &Plan, _: &mut ()) -> String {
        filter.to_string()
    }

    fn visit_logical_project(&mut self, project: &Project, _: &Plan, _: &mut ()) -> String {
        project.to_string()
    }

    fn visit_logical_join(&mut self, join: &Join, _: &Plan, _: &mut ()) -> String {
        join.to_string()
    }

    fn visit_logical_aggregate(&mut self, agg: &Aggregate, _: &Plan, _: &mut ()) -> String {
        agg.to_string()
    }

    fn visit_logical_sort(&mut self, sort: &Sort, _: &Plan, _: &mut ()) -> String {
        sort.to_string()
    }

    fn visit_logical_limit(&mut self, limit: &Limit, _: &Plan, _: &mut ()) -> String {
        limit.to_string()
    }

    fn visit_physical_seq_scan(&mut self, scan: &Scan, _: &Plan, _: &mut ()) -> String {
        scan.to_string()
    }

    fn visit_physical_filter(&mut self, filter: &Filter, _: &Plan, _: &mut ()) -> String {
        filter.to_string()
    }

    fn visit_physical_project(&mut self, project: &Project, _: &Plan, _: &mut ()) -> String {
        project.to_string()
    }

    fn visit_physical_hash_join(&mut self, join: &HashJoin, _: &Plan, _: &mut ()) -> String {
        join.to_string()
    }

    fn visit_physical_nested_loop_join(&mut self, join: &Join, _: &Plan, _: &mut ()) -> String {
        join.to_string()
    }

    fn visit_physical_hash_aggregate(&mut self, agg: &Aggregate, _: &Plan, _: &mut ()) -> String {
        agg.to_string()
    }

    fn visit_physical_sort(&mut self, sort: &Sort, _: &Plan, _: &mut ()) -> String {
        sort.to_string()
    }

    fn visit_physical_limit(&mut self, limit: &Limit, _: &Plan, _: &mut ()) -> String {
        limit.to_string()
    }

    fn visit_group_plan(&mut self, group: &GroupPlan, _: &Plan, _: &mut ()) -> String {
        group.to_string()
    }
}
