//! Host-engine shaped expression nodes.
//!
//! The scan layer never evaluates these expressions itself; it only pattern
//! matches a handful of shapes (column/constant comparisons, BETWEEN, and
//! two-child AND conjunctions) when deciding which filters it can use to
//! prune I/O. Everything else is left for the host engine to apply after the
//! scan.

use crate::literal::Literal;

/// Reference to a column of a bound table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnBinding {
    /// Identifies the table instance within the host plan.
    pub table_index: usize,
    /// Index into the plan's projected column list (not the bind-time schema).
    pub column_index: usize,
}

/// Comparison operators appearing in bound comparison nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl CompareOp {
    /// Mirror the operator for a constant-on-left comparison, so that
    /// `10 < col` can be normalized to `col > 10`.
    #[inline]
    pub fn flip(self) -> CompareOp {
        match self {
            CompareOp::LessThan => CompareOp::GreaterThan,
            CompareOp::LessThanOrEqual => CompareOp::GreaterThanOrEqual,
            CompareOp::GreaterThan => CompareOp::LessThan,
            CompareOp::GreaterThanOrEqual => CompareOp::LessThanOrEqual,
            other => other,
        }
    }
}

/// Logical connective of a conjunction node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConjunctionOp {
    And,
    Or,
}

/// A bound expression as handed over by the host engine's optimizer.
///
/// Conjunctions carry exactly two children; n-ary conjunctions arrive as
/// nested pairs, which is the shape the pushdown walk recurses into.
#[derive(Clone, Debug)]
pub enum Expr {
    Comparison {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Between {
        input: Box<Expr>,
        lower: Box<Expr>,
        upper: Box<Expr>,
    },
    Conjunction {
        op: ConjunctionOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    ColumnRef(ColumnBinding),
    Constant(Literal),
}

impl Expr {
    /// Reference column `column_index` of table `table_index`.
    #[inline]
    pub fn column(table_index: usize, column_index: usize) -> Expr {
        Expr::ColumnRef(ColumnBinding {
            table_index,
            column_index,
        })
    }

    /// Wrap a literal value.
    #[inline]
    pub fn constant(value: impl Into<Literal>) -> Expr {
        Expr::Constant(value.into())
    }

    /// Build a comparison node.
    #[inline]
    pub fn compare(op: CompareOp, left: Expr, right: Expr) -> Expr {
        Expr::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build `input BETWEEN lower AND upper`.
    #[inline]
    pub fn between(input: Expr, lower: Expr, upper: Expr) -> Expr {
        Expr::Between {
            input: Box::new(input),
            lower: Box::new(lower),
            upper: Box::new(upper),
        }
    }

    /// Build a two-child AND conjunction.
    #[inline]
    pub fn and(left: Expr, right: Expr) -> Expr {
        Expr::Conjunction {
            op: ConjunctionOp::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build a two-child OR conjunction.
    #[inline]
    pub fn or(left: Expr, right: Expr) -> Expr {
        Expr::Conjunction {
            op: ConjunctionOp::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}
