use crate::memo::MemoExprId;
use optx_plan::expr::ExprId;
use optx_plan::{GroupId, PlanError};

/// Errors raised while inserting into or extracting from the memo.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoError {
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),

    /// An id or a plan's group linkage does not name an expression in this memo.
    #[error("unknown memo expression {0}")]
    UnknownExpr(MemoExprId),

    /// The expression already lives in another group. Groups are never merged.
    #[error("expression {expr} already lives in group {existing}, cannot add it to {requested}")]
    GroupConflict {
        expr: MemoExprId,
        existing: GroupId,
        requested: GroupId,
    },

    /// The expression's output slots differ from the group's, by id or by order.
    #[error("group {group} outputs {expected:?}, expression produces {actual:?}")]
    SchemaMismatch {
        group: GroupId,
        expected: Vec<ExprId>,
        actual: Vec<ExprId>,
    },

    #[error("memo group limit of {limit} reached")]
    GroupLimitExceeded { limit: usize },

    /// Inserting into `group` would make it one of its own descendants.
    #[error("inserting into group {group} would create a cycle")]
    Cycle { group: GroupId },

    #[error(transparent)]
    Plan(#[from] PlanError),
}
