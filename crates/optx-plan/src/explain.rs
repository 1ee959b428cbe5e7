//! # Explain Output
//!
//! Renders a plan tree for humans ([`explain_tree`]) or tools ([`explain_json`]).
//!
//! The text form prints one [`Plan::describe`] line per node, indented two spaces per
//! level, followed by the node's memo linkage when it has one:
//!
//! ```text
//! LogicalLimit ( offset=0, limit=10)
//!   LogicalProject (a, b)
//!     LogicalScan (tpch.orders)
//! ```

use crate::expr::Slot;
use crate::plan::operators::{Aggregate, Filter, GroupPlan, HashJoin, Join, Limit, Project, Scan, Sort};
use crate::plan::{Operator, Plan};
use crate::visitor::PlanVisitor;
use serde::Serialize;
use std::fmt::Write;

/// Indented tree printer. The context is the current depth; children are visited
/// after their parent.
#[derive(Default)]
struct TreePrinter {
    out: String,
}

impl TreePrinter {
    fn node(&mut self, plan: &Plan, depth: &mut usize) {
        let _ = write!(self.out, "{:indent$}{}", "", plan.describe(), indent = *depth * 2);
        if let Some(g) = plan.group_expression() {
            let _ = write!(self.out, " [{}]", g);
        }
        self.out.push('\n');
        *depth += 1;
        for child in plan.children() {
            child.accept(self, depth);
        }
        *depth -= 1;
    }

    /// Scans also list their bound columns, which `describe` leaves out.
    fn scan(&mut self, scan: &Scan, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
        let columns: Vec<String> = scan.output.iter().map(Slot::to_string).collect();
        let _ = writeln!(
            self.out,
            "{:indent$}columns: [{}]",
            "",
            columns.join(", "),
            indent = *depth * 2 + 2
        );
    }
}

impl PlanVisitor<(), usize> for TreePrinter {
    fn visit_logical_scan(&mut self, scan: &Scan, plan: &Plan, depth: &mut usize) {
        self.scan(scan, plan, depth);
    }

    fn visit_logical_filter(&mut self, _: &Filter, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_logical_project(&mut self, _: &Project, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_logical_join(&mut self, _: &Join, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_logical_aggregate(&mut self, _: &Aggregate, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_logical_sort(&mut self, _: &Sort, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_logical_limit(&mut self, _: &Limit, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_physical_seq_scan(&mut self, scan: &Scan, plan: &Plan, depth: &mut usize) {
        self.scan(scan, plan, depth);
    }

    fn visit_physical_filter(&mut self, _: &Filter, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_physical_project(&mut self, _: &Project, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_physical_hash_join(&mut self, _: &HashJoin, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_physical_nested_loop_join(&mut self, _: &Join, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_physical_hash_aggregate(&mut self, _: &Aggregate, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_physical_sort(&mut self, _: &Sort, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_physical_limit(&mut self, _: &Limit, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }

    fn visit_group_plan(&mut self, _: &GroupPlan, plan: &Plan, depth: &mut usize) {
        self.node(plan, depth);
    }
}

/// Indented text rendering of `plan` and all its descendants.
pub fn explain_tree(plan: &Plan) -> String {
    let mut printer = TreePrinter::default();
    plan.accept(&mut printer, &mut 0usize);
    printer.out
}

#[derive(Serialize)]
struct ExplainNode<'a> {
    kind: String,
    describe: String,
    operator: &'a Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_expression: Option<String>,
    output: Vec<String>,
    children: Vec<ExplainNode<'a>>,
}

impl<'a> ExplainNode<'a> {
    fn build(plan: &'a Plan) -> Self {
        Self {
            kind: plan.plan_type().to_string(),
            describe: plan.describe(),
            operator: plan.operator(),
            group_expression: plan.group_expression().map(|g| g.to_string()),
            output: plan.output().iter().map(Slot::to_string).collect(),
            children: plan.children().iter().map(|c| Self::build(c)).collect(),
        }
    }
}

/// Pretty-printed JSON rendering of `plan`, including each node's payload and output.
pub fn explain_json(plan: &Plan) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ExplainNode::build(plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{DataType, ExprId, NamedExpr, TableRef};
    use crate::group::{GroupExpressionRef, GroupId};

    fn orders() -> Plan {
        Plan::logical_scan(
            TableRef::new("tpch", "orders"),
            vec![
                Slot::new(ExprId::new(1), "o_orderkey", DataType::Int64),
                Slot::new(ExprId::new(2), "o_totalprice", DataType::Float64),
            ],
        )
    }

    #[test]
    fn test_tree_indents_children() {
        let scan = orders().into_ref();
        let project = Plan::logical_project(
            vec![NamedExpr::Slot(scan.output()[0].clone())],
            scan,
        )
        .into_ref();
        let limit = Plan::logical_limit(10, 0, project);

        let text = explain_tree(&limit);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "LogicalLimit ( offset=0, limit=10)");
        assert_eq!(lines[1], "  LogicalProject (o_orderkey)");
        assert_eq!(lines[2], "    LogicalScan (tpch.orders)");
        assert_eq!(lines[3], "      columns: [o_orderkey, o_totalprice]");
    }

    #[test]
    fn test_tree_shows_linkage() {
        let linked = orders().with_group_expression(Some(GroupExpressionRef::new(GroupId::new(2), 7)));
        assert!(explain_tree(&linked).starts_with("LogicalScan (tpch.orders) [@2.7]"));
    }

    #[test]
    fn test_json_has_kind_and_output() {
        let json = explain_json(&orders()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "LogicalScan");
        assert_eq!(value["output"][1], "o_totalprice");
        assert!(value.get("group_expression").is_none());
        assert_eq!(value["children"].as_array().map(Vec::len), Some(0));
    }
}
