//! Structured modifiers.
//!
//! A `Modifier` is the validated, immutable rule the builder produces from
//! an effect's raw expressions or modifier-info records: one dependency edge
//! from a source attribute to a target attribute, under a location and
//! filter, with an operation and an optional activation condition. Modifiers
//! are built once per effect and `Arc`-shared between fits.

use crate::condition::Atom;
use crate::expression::{AttrId, GroupId, TypeId};
use serde::{Deserialize, Serialize};

/// Canonical modifier operation.
///
/// Normalized from the raw operator literals carried by `DefOperator`
/// expression nodes. Buckets are applied in declaration order during
/// calculation; see the calculation module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    PreAssign,
    PreMul,
    PreDiv,
    ModAdd,
    ModSub,
    PostMul,
    PostDiv,
    PostPercent,
    PostAssign,
}

impl Operation {
    /// Bucket application order.
    pub const ORDER: [Operation; 9] = [
        Operation::PreAssign,
        Operation::PreMul,
        Operation::PreDiv,
        Operation::ModAdd,
        Operation::ModSub,
        Operation::PostMul,
        Operation::PostDiv,
        Operation::PostPercent,
        Operation::PostAssign,
    ];

    /// Normalize a raw operator literal.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fitcalc::modifier::Operation;
    ///
    /// assert_eq!(Operation::from_literal("PostPercent"), Some(Operation::PostPercent));
    /// assert_eq!(Operation::from_literal("PreAssignment"), Some(Operation::PreAssign));
    /// assert_eq!(Operation::from_literal("Frobnicate"), None);
    /// ```
    pub fn from_literal(raw: &str) -> Option<Operation> {
        match raw {
            "PreAssignment" | "PreAssign" => Some(Operation::PreAssign),
            "PreMul" => Some(Operation::PreMul),
            "PreDiv" => Some(Operation::PreDiv),
            "ModAdd" => Some(Operation::ModAdd),
            "ModSub" => Some(Operation::ModSub),
            "PostMul" => Some(Operation::PostMul),
            "PostDiv" => Some(Operation::PostDiv),
            "PostPercent" => Some(Operation::PostPercent),
            "PostAssignment" | "PostAssign" => Some(Operation::PostAssign),
            _ => None,
        }
    }

    /// Whether this operation multiplies the running value (and is therefore
    /// subject to stacking penalties on non-stackable attributes).
    pub fn is_multiplicative(self) -> bool {
        matches!(
            self,
            Operation::PreMul
                | Operation::PreDiv
                | Operation::PostMul
                | Operation::PostDiv
                | Operation::PostPercent
        )
    }

    /// Whether this operation overwrites the running value.
    pub fn is_assignment(self) -> bool {
        matches!(self, Operation::PreAssign | Operation::PostAssign)
    }
}

/// Modifier location: which holder, relative to the modifier's carrier, the
/// rule targets (directly, or as the scope of a filter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    /// The carrier itself.
    SelfRef,
    /// The fit's ship (direct), or ship scope (filtered).
    Ship,
    /// The fit's character (direct), or character scope (filtered).
    Character,
    /// The carrier's current target. Projection onto other fits is resolved
    /// by a fleet/targeting layer outside this crate.
    Target,
    /// Items in space (probes, deployables).
    Area,
    /// The holder paired with the carrier (module <-> charge).
    Other,
}

impl Location {
    /// Normalize a raw location literal.
    pub fn from_literal(raw: &str) -> Option<Location> {
        match raw {
            "Self" => Some(Location::SelfRef),
            "Ship" => Some(Location::Ship),
            "Char" | "Character" => Some(Location::Character),
            "Target" => Some(Location::Target),
            "Area" => Some(Location::Area),
            "Other" => Some(Location::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Location::SelfRef => "Self",
            Location::Ship => "Ship",
            Location::Character => "Char",
            Location::Target => "Target",
            Location::Area => "Area",
            Location::Other => "Other",
        };
        write!(f, "{}", name)
    }
}

/// How the set of affected holders is narrowed within the location scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterType {
    /// Exactly the holder occupying the location role.
    Direct,
    /// Every holder tagged with the location.
    All,
    /// Holders in the location whose type belongs to the group.
    Group(GroupId),
    /// Holders in the location whose type requires the skill.
    SkillRequired(TypeId),
    /// Holders owned by the character whose type requires the skill,
    /// regardless of location.
    OwnerSkillRequired(TypeId),
}

/// One structured attribute dependency edge.
///
/// Immutable once built. Two modifiers are structurally equal when every
/// field but the condition tree matches; the builder uses this to pair add
/// and remove actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    /// Operation applied to the target attribute.
    pub operation: Operation,
    /// Location scope, relative to the carrier.
    pub location: Location,
    /// Filter within the location scope.
    pub filter: FilterType,
    /// Gang-flagged modifiers apply across gang participants rather than
    /// only within the carrier's fit.
    pub gang: bool,
    /// Attribute read from the carrier as the modification value.
    pub src_attr: AttrId,
    /// Attribute modified on each affected holder.
    pub tgt_attr: AttrId,
    /// Optional activation condition, evaluated at calculation time.
    pub conditions: Option<Atom>,
}

impl Modifier {
    /// Create an unconditional modifier.
    pub fn new(
        operation: Operation,
        location: Location,
        filter: FilterType,
        src_attr: AttrId,
        tgt_attr: AttrId,
    ) -> Self {
        Self {
            operation,
            location,
            filter,
            gang: false,
            src_attr,
            tgt_attr,
            conditions: None,
        }
    }

    /// Mark this modifier as gang-scoped.
    pub fn gang(mut self) -> Self {
        self.gang = true;
        self
    }

    /// Attach an activation condition.
    pub fn with_conditions(mut self, conditions: Atom) -> Self {
        self.conditions = Some(conditions);
        self
    }

    /// Structural identity ignoring conditions, used for add/remove pairing.
    pub(crate) fn same_shape(&self, other: &Modifier) -> bool {
        self.operation == other.operation
            && self.location == other.location
            && self.filter == other.filter
            && self.gang == other.gang
            && self.src_attr == other.src_attr
            && self.tgt_attr == other.tgt_attr
    }
}

/// Function name of a flat modifier-info record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierFunc {
    ItemModifier,
    LocationModifier,
    LocationGroupModifier,
    LocationRequiredSkillModifier,
    OwnerRequiredSkillModifier,
    GangItemModifier,
    GangGroupModifier,
    GangRequiredSkillModifier,
}

/// Flat modifier record used by newer game-data formats instead of
/// expression trees. The builder converts it into the same [`Modifier`]
/// output as the expression path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierInfo {
    pub func: ModifierFunc,
    /// Location scope of the modification.
    pub domain: Location,
    /// Group filter value, for the group-filtered functions.
    pub group: Option<GroupId>,
    /// Skill filter value, for the skill-filtered functions.
    pub skill: Option<TypeId>,
    pub operation: Operation,
    pub src_attr: AttrId,
    pub tgt_attr: AttrId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_literals() {
        assert_eq!(Operation::from_literal("PreMul"), Some(Operation::PreMul));
        assert_eq!(
            Operation::from_literal("PostAssignment"),
            Some(Operation::PostAssign)
        );
        assert_eq!(Operation::from_literal("bogus"), None);
    }

    #[test]
    fn test_operation_classes() {
        assert!(Operation::PostPercent.is_multiplicative());
        assert!(Operation::PreDiv.is_multiplicative());
        assert!(!Operation::ModAdd.is_multiplicative());
        assert!(Operation::PreAssign.is_assignment());
        assert!(!Operation::PostMul.is_assignment());
    }

    #[test]
    fn test_location_literals() {
        assert_eq!(Location::from_literal("Self"), Some(Location::SelfRef));
        assert_eq!(Location::from_literal("Char"), Some(Location::Character));
        assert_eq!(Location::from_literal("nowhere"), None);
    }

    #[test]
    fn test_same_shape_ignores_conditions() {
        use crate::condition::{Atom, CompOp};

        let base = Modifier::new(
            Operation::PostPercent,
            Location::Ship,
            FilterType::Direct,
            AttrId(1),
            AttrId(2),
        );
        let conditional = base.clone().with_conditions(Atom::comparison(
            CompOp::Eq,
            Atom::Value(1.0),
            Atom::Value(1.0),
        ));
        assert!(base.same_shape(&conditional));

        let different = Modifier::new(
            Operation::PostMul,
            Location::Ship,
            FilterType::Direct,
            AttrId(1),
            AttrId(2),
        );
        assert!(!base.same_shape(&different));
    }
}
