//! # Pattern Matching over Memo Expressions
//!
//! Rules declare the shape of the expressions they apply to as a [`Pattern`]; the
//! search checks the pattern before calling the rule.
//!
//! ## Pattern Language
//!
//! - `Pattern::Node(matcher, children)`: the expression's kind satisfies `matcher` and
//!   each child group matches the corresponding child pattern.
//! - `Pattern::Any`: matches any expression or group.
//! - `Pattern::Leaf`: matches expressions without children.
//!
//! ## Group-Level Matching
//!
//! A child pattern other than `Any` is checked against every expression in the child
//! group, logical and physical, and matches if *any* of them does. All expressions of
//! a group are equivalent, so one matching alternative is enough.

use crate::memo::{Memo, MemoExprId};
use optx_plan::{LogicalOpKind, PlanType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Match a node kind with child patterns.
    Node(OpMatcher, Vec<Pattern>),
    /// Match any subtree.
    Any,
    /// Match a node with no children.
    Leaf,
}

/// Matches a node kind, ignoring the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpMatcher {
    Kind(PlanType),
    AnyLogical,
    AnyPhysical,
}

impl OpMatcher {
    pub fn accepts(self, plan_type: PlanType) -> bool {
        match self {
            OpMatcher::Kind(kind) => kind == plan_type,
            OpMatcher::AnyLogical => plan_type.is_logical(),
            OpMatcher::AnyPhysical => plan_type.is_physical(),
        }
    }
}

impl Pattern {
    fn logical(kind: LogicalOpKind, children: Vec<Pattern>) -> Self {
        Pattern::Node(OpMatcher::Kind(PlanType::Logical(kind)), children)
    }

    /// A logical join over any two inputs.
    pub fn join() -> Self {
        Self::logical(LogicalOpKind::Join, vec![Pattern::Any, Pattern::Any])
    }

    /// A logical join whose left input is also a join.
    pub fn join_join_left() -> Self {
        Self::logical(LogicalOpKind::Join, vec![Self::join(), Pattern::Any])
    }

    pub fn scan() -> Self {
        Self::logical(LogicalOpKind::Scan, vec![])
    }

    pub fn filter() -> Self {
        Self::logical(LogicalOpKind::Filter, vec![Pattern::Any])
    }

    /// A filter directly on top of a join.
    pub fn filter_join() -> Self {
        Self::logical(LogicalOpKind::Filter, vec![Self::join()])
    }

    pub fn project() -> Self {
        Self::logical(LogicalOpKind::Project, vec![Pattern::Any])
    }

    pub fn limit() -> Self {
        Self::logical(LogicalOpKind::Limit, vec![Pattern::Any])
    }

    /// A limit over a sort, the shape a top-N rewrite looks for.
    pub fn limit_sort() -> Self {
        Self::logical(
            LogicalOpKind::Limit,
            vec![Self::logical(LogicalOpKind::Sort, vec![Pattern::Any])],
        )
    }
}

/// Check whether memo expression `expr` matches `pattern`. Unknown ids never match.
pub fn matches(memo: &Memo, expr: MemoExprId, pattern: &Pattern) -> bool {
    let Ok(e) = memo.expr(expr) else {
        return false;
    };
    match pattern {
        Pattern::Any => true,
        Pattern::Leaf => e.children.is_empty(),
        Pattern::Node(matcher, child_patterns) => {
            if !matcher.accepts(e.plan.plan_type()) {
                return false;
            }
            if e.children.len() != child_patterns.len() {
                return false;
            }
            e.children
                .iter()
                .zip(child_patterns)
                .all(|(&child, child_pattern)| match child_pattern {
                    Pattern::Any => true,
                    _ => memo.group(child).map_or(false, |g| {
                        g.expressions().any(|id| matches(memo, id, child_pattern))
                    }),
                })
        }
    }
}
