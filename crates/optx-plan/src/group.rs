//! Memo linkage handles.
//!
//! A plan node that has been registered in the memo carries a [`GroupExpressionRef`]
//! naming the group (and the expression within it) that holds it. The handle is a plain
//! id pair: it is resolved through the memo's own lookup and never owns anything, so
//! this crate does not depend on how the memo stores groups.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a memo group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(u32);

impl GroupId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Non-owning reference to one expression inside a memo group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupExpressionRef {
    group: GroupId,
    index: u32,
}

impl GroupExpressionRef {
    /// `index` is the memo-wide expression index.
    pub const fn new(group: GroupId, index: u32) -> Self {
        Self { group, index }
    }

    pub fn group(self) -> GroupId {
        self.group
    }

    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Display for GroupExpressionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.index)
    }
}
