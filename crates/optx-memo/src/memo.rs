//! # The Memo
//!
//! The memo stores a search space of plans compactly. A **group** is a set of
//! logically equivalent expressions that all produce the same logical properties; an
//! **expression** is one plan node whose children are groups rather than subtrees.
//!
//! ## Representation
//!
//! Each stored expression is an ordinary [`Plan`] whose children are `GroupPlan`
//! leaves, one per child group, and whose group linkage names the expression itself.
//! Storing real plan nodes means rules and visitors see memo expressions through the
//! same contract as free-standing trees.
//!
//! ## Deduplication
//!
//! Expressions are keyed by (node, child group ids). Node equality ignores linkage and
//! cached properties, so a node copied in twice, or copied out and back in, lands on
//! the expression it already has. A duplicate found in a group other than the one the
//! caller asked for is a [`MemoError::GroupConflict`]: groups are never merged.
//!
//! ## Copy-out
//!
//! [`Memo::copy_out`] rebuilds a free-standing tree from a group by picking the first
//! logical expression of each group (or the first physical one when the group has no
//! logical expression) and rebuilding it over its copied-out children with
//! `with_children`, which drops the memo linkage.

use crate::error::MemoError;
use optx_plan::{GroupExpressionRef, GroupId, LogicalProperties, Plan, PlanRef};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Memo-wide index of an expression. It is also the index carried by the expression's
/// [`GroupExpressionRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemoExprId(u32);

impl MemoExprId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<GroupExpressionRef> for MemoExprId {
    fn from(r: GroupExpressionRef) -> Self {
        Self(r.index())
    }
}

impl fmt::Display for MemoExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Memo limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MemoConfig {
    /// Maximum number of groups; copy-in fails once it is reached.
    pub max_groups: usize,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            max_groups: 100_000,
        }
    }
}

impl MemoConfig {
    /// Parse a config such as `{"max_groups": 500}`. Missing fields take their default.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A set of logically equivalent expressions.
#[derive(Debug)]
pub struct Group {
    pub id: GroupId,
    pub logical_exprs: Vec<MemoExprId>,
    pub physical_exprs: Vec<MemoExprId>,
    /// Shared by every expression in the group.
    pub logical_properties: LogicalProperties,
    /// The `GroupPlan` leaf parents use to refer to this group.
    placeholder: PlanRef,
}

impl Group {
    /// Logical expressions first, then physical ones, each in insertion order.
    pub fn expressions(&self) -> impl Iterator<Item = MemoExprId> + '_ {
        self.logical_exprs.iter().chain(self.physical_exprs.iter()).copied()
    }
}

/// One stored expression.
#[derive(Debug)]
pub struct MemoExpr {
    pub id: MemoExprId,
    pub group: GroupId,
    /// The node, with `GroupPlan` children and linkage to this expression.
    pub plan: PlanRef,
    pub children: Vec<GroupId>,
}

/// Outcome of [`Memo::copy_in`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyInResult {
    pub group: GroupId,
    pub expr: MemoExprId,
    /// `false` when an equal expression was already present.
    pub inserted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    node: PlanRef,
    children: Vec<GroupId>,
}

/// The memo table.
#[derive(Debug, Default)]
pub struct Memo {
    groups: Vec<Group>,
    exprs: Vec<MemoExpr>,
    index: HashMap<MemoKey, MemoExprId>,
    config: MemoConfig,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MemoConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &MemoConfig {
        &self.config
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }

    pub fn group(&self, id: GroupId) -> Result<&Group, MemoError> {
        self.groups.get(id.index()).ok_or(MemoError::UnknownGroup(id))
    }

    pub fn expr(&self, id: MemoExprId) -> Result<&MemoExpr, MemoError> {
        self.exprs.get(id.index()).ok_or(MemoError::UnknownExpr(id))
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }

    /// The `GroupPlan` leaf standing for `id`, carrying the group's properties.
    pub fn group_plan(&self, id: GroupId) -> Result<PlanRef, MemoError> {
        Ok(Arc::clone(&self.group(id)?.placeholder))
    }

    /// Insert `plan` and, recursively, its children.
    ///
    /// With `target` set, the root expression goes into that existing group;
    /// otherwise a new group is created for it unless an equal expression is already
    /// stored. Children always go to their own groups.
    ///
    /// A failed call leaves the memo as it was: groups and expressions created for
    /// the children before the root was rejected are removed again.
    pub fn copy_in(
        &mut self,
        plan: &Plan,
        target: Option<GroupId>,
    ) -> Result<CopyInResult, MemoError> {
        let (num_groups, num_exprs) = (self.groups.len(), self.exprs.len());
        let result = self.insert_tree(plan, target);
        if let Err(ref e) = result {
            debug!("Copy-in failed, rolling back: {}", e);
            self.rollback(num_groups, num_exprs);
        }
        result
    }

    fn insert_tree(
        &mut self,
        plan: &Plan,
        target: Option<GroupId>,
    ) -> Result<CopyInResult, MemoError> {
        if let Some(target) = target {
            self.group(target)?;
        }

        // A bare group leaf is already in the memo.
        if let Some(group) = plan.group_plan_id() {
            let expr = self.first_expr(group)?;
            return match target {
                Some(t) if t != group => Err(MemoError::GroupConflict {
                    expr,
                    existing: group,
                    requested: t,
                }),
                _ => Ok(CopyInResult {
                    group,
                    expr,
                    inserted: false,
                }),
            };
        }

        let children = plan
            .children()
            .iter()
            .map(|c| self.resolve_child(c))
            .collect::<Result<Vec<_>, _>>()?;
        let node = self.rebase(plan, &children)?;

        let key = MemoKey {
            node: Arc::new(node),
            children,
        };
        if let Some(&expr) = self.index.get(&key) {
            let existing = self.exprs[expr.index()].group;
            if let Some(requested) = target {
                if requested != existing {
                    debug!(
                        "Copy-in conflict: {} already in group {}, requested {}",
                        key.node, existing, requested
                    );
                    return Err(MemoError::GroupConflict {
                        expr,
                        existing,
                        requested,
                    });
                }
            }
            debug!("Copy-in dedup hit: {} -> {} in group {}", key.node, expr, existing);
            return Ok(CopyInResult {
                group: existing,
                expr,
                inserted: false,
            });
        }

        let group = match target {
            Some(t) => {
                let expected = self.group(t)?.logical_properties.output_ids();
                let actual = key.node.logical_properties().output_ids();
                if expected != actual {
                    return Err(MemoError::SchemaMismatch {
                        group: t,
                        expected,
                        actual,
                    });
                }
                if self.reaches(&key.children, t) {
                    return Err(MemoError::Cycle { group: t });
                }
                t
            }
            None => self.new_group(key.node.logical_properties().clone())?,
        };

        let expr = self.insert_expr(group, key);
        Ok(CopyInResult {
            group,
            expr,
            inserted: true,
        })
    }

    /// Find the stored expression equal to `plan`, without inserting anything.
    /// Children must themselves be group leaves, linked nodes or already stored.
    pub fn lookup(&self, plan: &Plan) -> Option<MemoExprId> {
        if let Some(group) = plan.group_plan_id() {
            return self.first_expr(group).ok();
        }
        let children = plan
            .children()
            .iter()
            .map(|c| self.lookup_group(c))
            .collect::<Option<Vec<_>>>()?;
        let node = self.rebase(plan, &children).ok()?;
        self.index
            .get(&MemoKey {
                node: Arc::new(node),
                children,
            })
            .copied()
    }

    /// Rebuild a free-standing tree for `group`.
    pub fn copy_out(&self, group: GroupId) -> Result<PlanRef, MemoError> {
        let g = self.group(group)?;
        let expr = g
            .logical_exprs
            .first()
            .or_else(|| g.physical_exprs.first())
            .copied()
            .ok_or(MemoError::UnknownGroup(group))?;
        debug!("Copy-out: group {} via {}", group, expr);
        self.copy_out_expr(expr)
    }

    /// Rebuild a free-standing tree rooted at one specific expression.
    pub fn copy_out_expr(&self, expr: MemoExprId) -> Result<PlanRef, MemoError> {
        let e = self.expr(expr)?;
        let children = e
            .children
            .iter()
            .map(|&c| self.copy_out(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Arc::new(e.plan.with_children(children)?))
    }

    /// Group a child of a plan being copied in belongs to, inserting it if needed.
    fn resolve_child(&mut self, child: &Plan) -> Result<GroupId, MemoError> {
        if let Some(group) = child.group_plan_id() {
            self.group(group)?;
            return Ok(group);
        }
        if let Some(linked) = child.group_expression() {
            return self.linked_group(linked);
        }
        Ok(self.insert_tree(child, None)?.group)
    }

    fn lookup_group(&self, child: &Plan) -> Option<GroupId> {
        if let Some(group) = child.group_plan_id() {
            return self.group(group).ok().map(|g| g.id);
        }
        if let Some(linked) = child.group_expression() {
            return self.linked_group(linked).ok();
        }
        let expr = self.lookup(child)?;
        Some(self.exprs[expr.index()].group)
    }

    /// Validate a node's linkage against this memo.
    fn linked_group(&self, linked: GroupExpressionRef) -> Result<GroupId, MemoError> {
        let id = MemoExprId::from(linked);
        let expr = self.expr(id)?;
        if expr.group != linked.group() {
            return Err(MemoError::UnknownExpr(id));
        }
        Ok(expr.group)
    }

    /// `plan` over the `GroupPlan` leaves of `children`, unlinked.
    fn rebase(&self, plan: &Plan, children: &[GroupId]) -> Result<Plan, MemoError> {
        let leaves = children
            .iter()
            .map(|&c| self.group_plan(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(plan.with_children(leaves)?)
    }

    fn first_expr(&self, group: GroupId) -> Result<MemoExprId, MemoError> {
        self.group(group)?
            .expressions()
            .next()
            .ok_or(MemoError::UnknownGroup(group))
    }

    /// Whether `to` is one of `from` or their descendants. Visits each group once.
    fn reaches(&self, from: &[GroupId], to: GroupId) -> bool {
        let mut seen: HashSet<GroupId> = HashSet::new();
        let mut stack: Vec<GroupId> = from.to_vec();
        while let Some(g) = stack.pop() {
            if g == to {
                return true;
            }
            if !seen.insert(g) {
                continue;
            }
            let Ok(group) = self.group(g) else {
                continue;
            };
            for e in group.expressions() {
                stack.extend(
                    self.exprs[e.index()]
                        .children
                        .iter()
                        .filter(|c| !seen.contains(*c)),
                );
            }
        }
        false
    }

    /// Drop every group and expression created after the memo had `num_groups`
    /// groups and `num_exprs` expressions.
    fn rollback(&mut self, num_groups: usize, num_exprs: usize) {
        if self.groups.len() == num_groups && self.exprs.len() == num_exprs {
            return;
        }
        for e in self.exprs.drain(num_exprs..) {
            self.index.remove(&MemoKey {
                node: e.plan,
                children: e.children,
            });
        }
        self.groups.truncate(num_groups);
        for g in &mut self.groups {
            g.logical_exprs.retain(|id| id.index() < num_exprs);
            g.physical_exprs.retain(|id| id.index() < num_exprs);
        }
    }

    fn new_group(&mut self, logical_properties: LogicalProperties) -> Result<GroupId, MemoError> {
        if self.groups.len() >= self.config.max_groups {
            debug!("Memo group limit reached: {}", self.config.max_groups);
            return Err(MemoError::GroupLimitExceeded {
                limit: self.config.max_groups,
            });
        }
        let id = GroupId::new(self.groups.len() as u32);
        let placeholder = Plan::group(id, logical_properties.clone()).into_ref();
        debug!(
            "Created group {} with output [{}]",
            id,
            logical_properties.output_names().join(", ")
        );
        self.groups.push(Group {
            id,
            logical_exprs: Vec::new(),
            physical_exprs: Vec::new(),
            logical_properties,
            placeholder,
        });
        Ok(id)
    }

    fn insert_expr(&mut self, group: GroupId, key: MemoKey) -> MemoExprId {
        let id = MemoExprId::new(self.exprs.len() as u32);
        let linked = Arc::new(
            key.node
                .with_group_expression(Some(GroupExpressionRef::new(group, id.0))),
        );
        trace!("Inserted {} as {} into group {}", linked, id, group);

        let g = &mut self.groups[group.index()];
        if linked.plan_type().is_physical() {
            g.physical_exprs.push(id);
        } else {
            g.logical_exprs.push(id);
        }
        self.exprs.push(MemoExpr {
            id,
            group,
            plan: Arc::clone(&linked),
            children: key.children.clone(),
        });
        self.index.insert(
            MemoKey {
                node: linked,
                children: key.children,
            },
            id,
        );
        id
    }
}

impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Memo: {} groups, {} exprs", self.groups.len(), self.exprs.len())?;
        for group in &self.groups {
            writeln!(
                f,
                "Group {} [{}]",
                group.id,
                group.logical_properties.output_names().join(", ")
            )?;
            for id in group.expressions() {
                let expr = &self.exprs[id.index()];
                write!(f, "  {} {}", id, expr.plan)?;
                if !expr.children.is_empty() {
                    let children: Vec<String> =
                        expr.children.iter().map(GroupId::to_string).collect();
                    write!(f, " <- [{}]", children.join(", "))?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert_eq!(MemoConfig::default().max_groups, 100_000);
    }

    #[test]
    fn test_config_from_json() {
        assert_eq!(MemoConfig::from_json(r#"{"max_groups": 3}"#).unwrap().max_groups, 3);
        assert_eq!(MemoConfig::from_json("{}").unwrap(), MemoConfig::default());
        assert!(MemoConfig::from_json(r#"{"max_groups": "many"}"#).is_err());
    }

    #[test]
    fn test_empty_memo() {
        let memo = Memo::new();
        assert_eq!(memo.num_groups(), 0);
        assert_eq!(
            memo.group(GroupId::new(0)).unwrap_err(),
            MemoError::UnknownGroup(GroupId::new(0))
        );
        assert!(memo.copy_out(GroupId::new(0)).is_err());
    }
}
