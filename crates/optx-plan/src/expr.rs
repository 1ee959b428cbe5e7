//! # Scalar Expressions and Slots
//!
//! This module defines the scalar side of the plan representation: the values that
//! plan nodes carry in their payloads (projection lists, predicates, join conditions,
//! sort keys, aggregate calls) and the slots that make up a node's output schema.
//!
//! ## Slots
//!
//! A [`Slot`] is a typed, named reference to one column produced by a plan node. Its
//! identity is the [`ExprId`] assigned by the binder, not its display name: two slots
//! both called `id` from different tables are different columns. Parent nodes refer to
//! their input through slots, so slot ids must stay stable across equivalent rewrites.
//!
//! ## Named Expressions
//!
//! Projections and aggregate outputs are lists of [`NamedExpr`]: either a slot passed
//! through unchanged, or an [`Alias`] that gives a computed expression a fresh id and a
//! name. `NamedExpr::to_slot` turns either form into the slot the node outputs.
//!
//! ## Fresh Identities
//!
//! New ids are minted by an [`ExprIdGenerator`] owned by whoever is building or
//! rewriting the plan (typically one per statement). There is no global counter, so
//! derivation stays free of hidden state.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};

/// Stable identity of a slot or alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExprId(u32);

impl ExprId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mints fresh [`ExprId`]s for one statement.
///
/// Shareable across threads; ids are unique per generator, not globally.
#[derive(Debug, Default)]
pub struct ExprIdGenerator {
    next: AtomicU32,
}

impl ExprIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start numbering at `first`, e.g. after the ids the binder already handed out.
    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    pub fn next_id(&self) -> ExprId {
        ExprId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// SQL data types known to the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Boolean,
    Int32,
    Int64,
    Float64,
    Varchar,
    Date,
}

impl DataType {
    /// Common type of two numeric operands (`INT + BIGINT -> BIGINT`, anything with a
    /// DOUBLE -> DOUBLE). Non-numeric operands keep the left type.
    fn wider(self, other: DataType) -> DataType {
        match (self, other) {
            (DataType::Float64, _) | (_, DataType::Float64) => DataType::Float64,
            (DataType::Int64, _) | (_, DataType::Int64) => DataType::Int64,
            (DataType::Null, t) => t,
            (t, _) => t,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Null => "NULL",
            DataType::Boolean => "BOOLEAN",
            DataType::Int32 => "INT",
            DataType::Int64 => "BIGINT",
            DataType::Float64 => "DOUBLE",
            DataType::Varchar => "VARCHAR",
            DataType::Date => "DATE",
        };
        f.write_str(name)
    }
}

/// Reference to a table in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// An output column of a plan node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub id: ExprId,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    /// Table alias the column was bound through, if any. Display only.
    pub qualifier: Option<String>,
}

impl Slot {
    pub fn new(id: ExprId, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
            nullable: true,
            qualifier: None,
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref q) = self.qualifier {
            write!(f, "{}.{}", q, self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Scalar value for literals.
///
/// Uses `OrderedFloat` for `f64` so that literals can take part in Eq/Hash, which plan
/// deduplication relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    Utf8(String),
    /// Days since 1970-01-01.
    Date(i32),
}

impl ScalarValue {
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Bool(_) => DataType::Boolean,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Varchar,
            ScalarValue::Date(_) => DataType::Date,
        }
    }
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.hash(state),
            Self::Utf8(v) => v.hash(state),
            Self::Date(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Bool(v) => write!(f, "{}", v),
            ScalarValue::Int64(v) => write!(f, "{}", v),
            ScalarValue::Float64(v) => write!(f, "{}", v),
            ScalarValue::Utf8(v) => write!(f, "'{}'", v),
            ScalarValue::Date(v) => write!(f, "DATE {}", v),
        }
    }
}

/// A computed expression bound to a fresh id and an output name (`expr AS name`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alias {
    pub id: ExprId,
    pub name: String,
    pub child: Box<Expr>,
}

impl Alias {
    /// Alias `child` under a freshly minted id.
    pub fn new(ids: &ExprIdGenerator, child: Expr, name: impl Into<String>) -> Self {
        Self::with_id(ids.next_id(), child, name)
    }

    pub fn with_id(id: ExprId, child: Expr, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            child: Box::new(child),
        }
    }

    pub fn to_slot(&self) -> Slot {
        Slot {
            id: self.id,
            name: self.name.clone(),
            data_type: self.child.data_type(),
            nullable: self.child.nullable(),
            qualifier: None,
        }
    }
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} AS {}", self.child, self.name)
    }
}

/// An expression that defines an output column: a pass-through slot or an alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedExpr {
    Slot(Slot),
    Alias(Alias),
}

impl NamedExpr {
    pub fn id(&self) -> ExprId {
        match self {
            NamedExpr::Slot(s) => s.id,
            NamedExpr::Alias(a) => a.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            NamedExpr::Slot(s) => &s.name,
            NamedExpr::Alias(a) => &a.name,
        }
    }

    /// The column reference a parent uses to read this expression's value.
    pub fn to_slot(&self) -> Slot {
        match self {
            NamedExpr::Slot(s) => s.clone(),
            NamedExpr::Alias(a) => a.to_slot(),
        }
    }

    pub fn to_expr(&self) -> Expr {
        match self {
            NamedExpr::Slot(s) => Expr::Slot(s.clone()),
            NamedExpr::Alias(a) => Expr::Alias(a.clone()),
        }
    }
}

impl From<Slot> for NamedExpr {
    fn from(slot: Slot) -> Self {
        NamedExpr::Slot(slot)
    }
}

impl From<Alias> for NamedExpr {
    fn from(alias: Alias) -> Self {
        NamedExpr::Alias(alias)
    }
}

impl fmt::Display for NamedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamedExpr::Slot(s) => write!(f, "{}", s),
            NamedExpr::Alias(a) => write!(f, "{}", a),
        }
    }
}

/// Scalar expressions used in predicates, projections, join conditions, etc.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to an input column.
    Slot(Slot),
    /// Constant literal value.
    Literal(ScalarValue),
    /// `expr AS name`.
    Alias(Alias),
    /// Binary operation (e.g., `a + b`, `x = y`, `price > 100`).
    BinaryOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation (e.g., `NOT flag`, `-value`, `IS NULL`).
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Named scalar function call with its resolved return type.
    Function {
        name: String,
        args: Vec<Expr>,
        return_type: DataType,
    },
    /// Aggregate function call. Only valid inside aggregate outputs.
    Aggregate(AggExpr),
    /// Conjunction, stored flat to simplify predicate decomposition.
    And(Vec<Expr>),
    /// Disjunction.
    Or(Vec<Expr>),
}

impl Expr {
    pub fn slot(slot: &Slot) -> Self {
        Expr::Slot(slot.clone())
    }

    pub fn int(v: i64) -> Self {
        Expr::Literal(ScalarValue::Int64(v))
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equal(left: Expr, right: Expr) -> Self {
        Self::binary(BinaryOp::Eq, left, right)
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Expr::Slot(s) => s.data_type,
            Expr::Literal(v) => v.data_type(),
            Expr::Alias(a) => a.child.data_type(),
            Expr::BinaryOp { op, left, right } => {
                if op.is_comparison() {
                    DataType::Boolean
                } else {
                    left.data_type().wider(right.data_type())
                }
            }
            Expr::UnaryOp { op, operand } => match op {
                UnaryOp::Neg => operand.data_type(),
                UnaryOp::Not | UnaryOp::IsNull | UnaryOp::IsNotNull => DataType::Boolean,
            },
            Expr::Function { return_type, .. } => *return_type,
            Expr::Aggregate(agg) => agg.data_type(),
            Expr::And(_) | Expr::Or(_) => DataType::Boolean,
        }
    }

    pub fn nullable(&self) -> bool {
        match self {
            Expr::Slot(s) => s.nullable,
            Expr::Literal(v) => matches!(v, ScalarValue::Null),
            Expr::Alias(a) => a.child.nullable(),
            Expr::BinaryOp { left, right, .. } => left.nullable() || right.nullable(),
            Expr::UnaryOp { op, operand } => match op {
                UnaryOp::IsNull | UnaryOp::IsNotNull => false,
                UnaryOp::Not | UnaryOp::Neg => operand.nullable(),
            },
            Expr::Function { .. } => true,
            Expr::Aggregate(agg) => agg.func != AggFunc::Count,
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().any(Expr::nullable),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, exprs: &[Expr], sep: &str) -> fmt::Result {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", e)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Slot(s) => write!(f, "{}", s),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Alias(a) => write!(f, "{}", a),
            Expr::BinaryOp { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::UnaryOp { op, operand } => match op {
                UnaryOp::Not => write!(f, "NOT {}", operand),
                UnaryOp::Neg => write!(f, "-{}", operand),
                UnaryOp::IsNull => write!(f, "{} IS NULL", operand),
                UnaryOp::IsNotNull => write!(f, "{} IS NOT NULL", operand),
            },
            Expr::Function { name, args, .. } => {
                write!(f, "{}(", name)?;
                write_joined(f, args, ", ")?;
                f.write_str(")")
            }
            Expr::Aggregate(agg) => write!(f, "{}", agg),
            Expr::And(exprs) => {
                f.write_str("(")?;
                write_joined(f, exprs, " AND ")?;
                f.write_str(")")
            }
            Expr::Or(exprs) => {
                f.write_str("(")?;
                write_joined(f, exprs, " OR ")?;
                f.write_str(")")
            }
        }
    }
}

/// Binary operators for comparison and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        };
        f.write_str(s)
    }
}

/// Unary operators for boolean logic and null checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
}

/// Aggregate function call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggExpr {
    pub func: AggFunc,
    /// `None` for `COUNT(*)`.
    pub arg: Option<Box<Expr>>,
    pub distinct: bool,
}

impl AggExpr {
    pub fn new(func: AggFunc, arg: Expr) -> Self {
        Self {
            func,
            arg: Some(Box::new(arg)),
            distinct: false,
        }
    }

    pub fn count_star() -> Self {
        Self {
            func: AggFunc::Count,
            arg: None,
            distinct: false,
        }
    }

    pub fn data_type(&self) -> DataType {
        let arg_type = self.arg.as_ref().map(|a| a.data_type());
        match self.func {
            AggFunc::Count => DataType::Int64,
            AggFunc::Avg => DataType::Float64,
            AggFunc::Sum => match arg_type {
                Some(DataType::Float64) => DataType::Float64,
                _ => DataType::Int64,
            },
            AggFunc::Min | AggFunc::Max => arg_type.unwrap_or(DataType::Null),
        }
    }
}

impl fmt::Display for AggExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.func {
            AggFunc::Count => "count",
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
        };
        match (&self.arg, self.distinct) {
            (None, _) => write!(f, "{}(*)", name),
            (Some(arg), true) => write!(f, "{}(DISTINCT {})", name, arg),
            (Some(arg), false) => write!(f, "{}({})", name, arg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// Sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
    pub nulls_first: bool,
}

impl SortKey {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: true,
            nulls_first: false,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            ascending: false,
            nulls_first: true,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} NULLS {}",
            self.expr,
            if self.ascending { "ASC" } else { "DESC" },
            if self.nulls_first { "FIRST" } else { "LAST" }
        )
    }
}

/// SQL join types.
///
/// The join type decides which side's columns reach the output and which become
/// nullable: outer joins pad the non-preserved side with NULLs, semi and anti joins
/// only emit the left side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
    Cross,
}

/// Build side for hash joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildSide {
    Left,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(id: u32, name: &str, data_type: DataType) -> Slot {
        Slot::new(ExprId::new(id), name, data_type)
    }

    #[test]
    fn test_alias_to_slot_takes_alias_identity() {
        let ids = ExprIdGenerator::starting_at(10);
        let x = col(1, "x", DataType::Int32);
        let alias = Alias::new(&ids, Expr::slot(&x), "a");

        let slot = NamedExpr::from(alias).to_slot();
        assert_eq!(slot.id, ExprId::new(10));
        assert_eq!(slot.name, "a");
        assert_eq!(slot.data_type, DataType::Int32);
    }

    #[test]
    fn test_generator_is_monotonic() {
        let ids = ExprIdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(a < b);
    }

    #[test]
    fn test_arithmetic_widens_and_comparison_is_boolean() {
        let i = col(1, "i", DataType::Int32);
        let d = col(2, "d", DataType::Float64);
        let sum = Expr::binary(BinaryOp::Add, Expr::slot(&i), Expr::slot(&d));
        assert_eq!(sum.data_type(), DataType::Float64);

        let cmp = Expr::binary(BinaryOp::Lt, Expr::slot(&i), Expr::int(3));
        assert_eq!(cmp.data_type(), DataType::Boolean);
    }

    #[test]
    fn test_display_forms() {
        let x = col(1, "x", DataType::Int64).with_qualifier("t");
        let pred = Expr::And(vec![
            Expr::equal(Expr::slot(&x), Expr::int(1)),
            Expr::UnaryOp {
                op: UnaryOp::IsNotNull,
                operand: Box::new(Expr::slot(&x)),
            },
        ]);
        assert_eq!(pred.to_string(), "((t.x = 1) AND t.x IS NOT NULL)");
        assert_eq!(Expr::Aggregate(AggExpr::count_star()).to_string(), "count(*)");
    }

    #[test]
    fn test_count_is_never_null() {
        let x = col(1, "x", DataType::Int64);
        let count = Expr::Aggregate(AggExpr::new(AggFunc::Count, Expr::slot(&x)));
        let max = Expr::Aggregate(AggExpr::new(AggFunc::Max, Expr::slot(&x)));
        assert!(!count.nullable());
        assert!(max.nullable());
        assert_eq!(max.data_type(), DataType::Int64);
    }

    #[test]
    fn test_float_literals_hash_equal() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ScalarValue::Float64(OrderedFloat(1.5)));
        assert!(set.contains(&ScalarValue::Float64(OrderedFloat(1.5))));
    }
}
