//! Error types for modifier building and attribute calculation.

use crate::expression::AttrId;
use crate::holder::HolderId;
use thiserror::Error;

/// Format a cycle path as a readable string.
fn format_cycle_path(path: &[(HolderId, AttrId)]) -> String {
    if path.is_empty() {
        return String::from("(empty cycle)");
    }
    path.iter()
        .map(|(holder, attr)| format!("{}/{}", holder, attr))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors that can occur while reading attribute values from a fit.
///
/// # Examples
///
/// ```rust
/// use fitcalc::{CalcError, AttrId};
/// use fitcalc::holder::HolderId;
///
/// let err = CalcError::AttributeUndefined(HolderId::new(1), AttrId(37));
/// assert!(err.to_string().contains("37"));
/// ```
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalcError {
    /// Attribute computation revisited an attribute already being computed.
    ///
    /// Contains the chain of `(holder, attribute)` entries involved in the
    /// cycle. This is a data-integrity bug in the loaded modifiers, surfaced
    /// distinctly so the caller never receives a stale or guessed value.
    #[error("cycle detected: {}", format_cycle_path(.path))]
    Cycle { path: Vec<(HolderId, AttrId)> },

    /// The requested attribute has neither a base value nor any modifier
    /// defining it. Callers treat this as an absent value, not a failure.
    #[error("attribute {1} is not defined for holder {0}")]
    AttributeUndefined(HolderId, AttrId),

    /// No holder with this id exists in the fit.
    #[error("no holder {0} in this fit")]
    HolderNotFound(HolderId),

    /// An item type id could not be resolved in the active data source.
    #[error("type {0} is not present in the data source")]
    TypeNotFound(crate::expression::TypeId),
}

/// Errors raised by the modifier builder.
///
/// Build errors are local to one effect: the caller logs them with the
/// effect id and keeps building the remaining effects.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The add and remove forms of a modifier action structurally disagree.
    ///
    /// Distinct from an unrecognized tree shape, which is reported as a
    /// partial build status rather than an error.
    #[error("add/remove modifier pair mismatch: {0}")]
    Mismatch(String),
}
