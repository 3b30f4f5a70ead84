//! Condition trees for conditional modifiers.
//!
//! An `Atom` tree is extracted from the `If` branch of an expression pair
//! and evaluated at calculation time against live attribute values. Trees
//! produced from an `else` path are logically negated via [`Atom::inverted`],
//! which flips operator polarity (`And`/`Or`, `>=`/`<`, `==`/`!=`) without
//! touching the arithmetic below comparison level.

use crate::error::CalcError;
use crate::expression::AttrId;
use crate::modifier::Location;
use serde::{Deserialize, Serialize};

/// Logic operator of an [`Atom::Logic`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    /// Polarity-flipped operator (De Morgan).
    pub fn inverted(self) -> Self {
        match self {
            LogicOp::And => LogicOp::Or,
            LogicOp::Or => LogicOp::And,
        }
    }
}

/// Comparison operator of an [`Atom::Comparison`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompOp {
    Eq,
    NotEq,
    Greater,
    GreaterEq,
    Less,
    LessEq,
}

impl CompOp {
    /// Polarity-flipped operator.
    pub fn inverted(self) -> Self {
        match self {
            CompOp::Eq => CompOp::NotEq,
            CompOp::NotEq => CompOp::Eq,
            CompOp::Greater => CompOp::LessEq,
            CompOp::GreaterEq => CompOp::Less,
            CompOp::Less => CompOp::GreaterEq,
            CompOp::LessEq => CompOp::Greater,
        }
    }

    fn evaluate(self, left: f64, right: f64) -> bool {
        match self {
            CompOp::Eq => left == right,
            CompOp::NotEq => left != right,
            CompOp::Greater => left > right,
            CompOp::GreaterEq => left >= right,
            CompOp::Less => left < right,
            CompOp::LessEq => left <= right,
        }
    }
}

/// Arithmetic operator of an [`Atom::Math`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
}

impl MathOp {
    fn evaluate(self, left: f64, right: f64) -> f64 {
        match self {
            MathOp::Add => left + right,
            MathOp::Sub => left - right,
            MathOp::Mul => left * right,
        }
    }
}

/// Node of a condition tree.
///
/// Leaves are literal values or `(location, attribute)` references that
/// resolve relative to the modifier's carrier holder at evaluation time.
///
/// # Examples
///
/// ```rust
/// use fitcalc::condition::{Atom, CompOp, LogicOp};
///
/// // skillLevel >= 5
/// let cond = Atom::comparison(
///     CompOp::GreaterEq,
///     Atom::Value(3.0),
///     Atom::Value(5.0),
/// );
/// let inverted = cond.inverted();
/// assert_eq!(
///     inverted,
///     Atom::comparison(CompOp::Less, Atom::Value(3.0), Atom::Value(5.0)),
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Atom {
    /// Boolean combination of two sub-conditions.
    Logic {
        op: LogicOp,
        left: Box<Atom>,
        right: Box<Atom>,
    },
    /// Numeric comparison.
    Comparison {
        op: CompOp,
        left: Box<Atom>,
        right: Box<Atom>,
    },
    /// Arithmetic over numeric sub-atoms.
    Math {
        op: MathOp,
        left: Box<Atom>,
        right: Box<Atom>,
    },
    /// Literal value.
    Value(f64),
    /// Live attribute reference, resolved relative to the modifier carrier.
    ValueRef { location: Location, attr: AttrId },
}

impl Atom {
    /// Construct a logic node.
    pub fn logic(op: LogicOp, left: Atom, right: Atom) -> Atom {
        Atom::Logic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Construct a comparison node.
    pub fn comparison(op: CompOp, left: Atom, right: Atom) -> Atom {
        Atom::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Construct an arithmetic node.
    pub fn math(op: MathOp, left: Atom, right: Atom) -> Atom {
        Atom::Math {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Logical negation of this tree.
    ///
    /// Logic operators flip and the negation recurses into their children;
    /// comparisons flip their operator and stop — the arithmetic below a
    /// comparison is value-level and stays untouched.
    pub fn inverted(&self) -> Atom {
        match self {
            Atom::Logic { op, left, right } => Atom::Logic {
                op: op.inverted(),
                left: Box::new(left.inverted()),
                right: Box::new(right.inverted()),
            },
            Atom::Comparison { op, left, right } => Atom::Comparison {
                op: op.inverted(),
                left: left.clone(),
                right: right.clone(),
            },
            // Numeric atoms have no boolean polarity.
            other => other.clone(),
        }
    }

    /// Evaluate this tree as a boolean.
    ///
    /// `lookup` resolves `(location, attribute)` references to live values;
    /// it is expected to go through the regular attribute computation path,
    /// so cycle detection and dependency tracking cover condition reads.
    /// A bare numeric root is truthy when non-zero.
    pub fn evaluate(
        &self,
        lookup: &mut dyn FnMut(Location, AttrId) -> Result<f64, CalcError>,
    ) -> Result<bool, CalcError> {
        match self {
            Atom::Logic { op, left, right } => {
                let l = left.evaluate(lookup)?;
                let r = right.evaluate(lookup)?;
                Ok(match op {
                    LogicOp::And => l && r,
                    LogicOp::Or => l || r,
                })
            }
            Atom::Comparison { op, left, right } => {
                let l = left.evaluate_number(lookup)?;
                let r = right.evaluate_number(lookup)?;
                Ok(op.evaluate(l, r))
            }
            other => Ok(other.evaluate_number(lookup)? != 0.0),
        }
    }

    fn evaluate_number(
        &self,
        lookup: &mut dyn FnMut(Location, AttrId) -> Result<f64, CalcError>,
    ) -> Result<f64, CalcError> {
        match self {
            Atom::Math { op, left, right } => {
                let l = left.evaluate_number(lookup)?;
                let r = right.evaluate_number(lookup)?;
                Ok(op.evaluate(l, r))
            }
            Atom::Value(v) => Ok(*v),
            Atom::ValueRef { location, attr } => lookup(*location, *attr),
            Atom::Logic { .. } | Atom::Comparison { .. } => {
                // Boolean sub-tree in numeric position: 1.0 / 0.0.
                Ok(if self.evaluate(lookup)? { 1.0 } else { 0.0 })
            }
        }
    }
}
