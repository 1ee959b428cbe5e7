//! # optx-memo: Memo Integration for Plan Nodes
//!
//! Stores [`optx_plan::Plan`] trees as groups of equivalent expressions and gets them
//! back out again.
//!
//! ## Module Overview
//!
//! - **`memo`**: The [`Memo`] table, [`Memo::copy_in`] / [`Memo::copy_out`], and
//!   [`MemoConfig`].
//! - **`pattern`**: Declarative shape matching over memo expressions.
//! - **`error`**: [`MemoError`].

pub mod error;
pub mod memo;
pub mod pattern;

pub use error::MemoError;
pub use memo::{CopyInResult, Group, Memo, MemoConfig, MemoExpr, MemoExprId};
pub use pattern::{matches, OpMatcher, Pattern};
