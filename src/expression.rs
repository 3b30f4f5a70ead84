//! Expression tree model.
//!
//! Provides the `Expression` type, a node in the binary expression trees
//! that game data uses to describe effects declaratively, together with the
//! `Operand` enum classifying each node and the typed id newtypes shared
//! across the crate. Expressions are immutable and `Arc`-shared, since many
//! effects reference the same sub-trees.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

id_newtype!(
    /// Numeric attribute identifier, as used by game data.
    AttrId
);
id_newtype!(
    /// Numeric item type identifier.
    TypeId
);
id_newtype!(
    /// Numeric item group identifier.
    GroupId
);
id_newtype!(
    /// Numeric effect identifier.
    EffectId
);
id_newtype!(
    /// Numeric expression identifier. Expressions are interned by id, so two
    /// effects referencing the same id share one tree.
    ExprId
);

/// Operator code of an expression node.
///
/// A closed classification of every node shape the modifier builder
/// understands. Codes outside this set never reach the core: the data layer
/// decodes raw operand ids into this enum (or drops the node, which the
/// builder reports as a partial build).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operand {
    // Literal stubs and definitions.
    /// Integer literal; `0`/`1` at a tree root is an intentionally inert stub.
    DefInt,
    /// Boolean literal; `True` at a tree root is an intentionally inert stub.
    DefBool,
    /// Floating point literal, used inside condition trees.
    DefFloat,
    /// Attribute id literal (`attribute_id` field).
    DefAttribute,
    /// Group id literal (`group_id` field).
    DefGroup,
    /// Type id literal (`type_id` field).
    DefType,
    /// Location literal (`value` field: `"Self"`, `"Ship"`, ...).
    DefLocation,
    /// Operator literal (`value` field: `"PostPercent"`, `"PreDiv"`, ...).
    DefOperator,

    // Structural nodes.
    /// Combines two action sub-trees into one tree.
    Splice,
    /// `(location spec, attribute)` reference.
    ItemAttribute,
    /// Target specification: `(operator, item attribute)`.
    GenericAttribute,
    /// `(location, group)` filter spec.
    LocationGroup,
    /// `(location, skill type)` filter spec.
    LocationSkillRequired,

    // Modifier actions. Add forms appear in pre-expressions, remove forms in
    // post-expressions, paired by identical structure.
    AddItemModifier,
    RemoveItemModifier,
    AddLocationModifier,
    RemoveLocationModifier,
    AddLocationGroupModifier,
    RemoveLocationGroupModifier,
    AddLocationSkillModifier,
    RemoveLocationSkillModifier,
    AddOwnerSkillModifier,
    RemoveOwnerSkillModifier,
    AddGangItemModifier,
    RemoveGangItemModifier,
    AddGangGroupModifier,
    RemoveGangGroupModifier,
    AddGangSkillModifier,
    RemoveGangSkillModifier,

    // Condition nodes.
    /// `arg1` = `If`, `arg2` = else branch.
    IfThenElse,
    /// `arg1` = condition tree, `arg2` = then branch.
    If,
    And,
    Or,
    Eq,
    NotEq,
    GreaterThan,
    GreaterEq,
    /// Arithmetic inside condition trees.
    Add,
    Sub,
    Mul,
}

/// Node in a binary expression tree.
///
/// Built once by the data layer and handed to the core fully decoded; the
/// core never parses raw files. Construction uses consuming setters so test
/// and demo code can assemble trees inline:
///
/// ```rust
/// use fitcalc::expression::{Expression, Operand, ExprId};
///
/// let stub = Expression::new(ExprId(1), Operand::DefInt).value("1").build();
/// assert!(stub.int_value() == Some(1));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expression {
    /// Expression id; trees are interned and shared by id.
    pub id: ExprId,
    /// Operator code classifying this node.
    pub operand: Operand,
    /// Literal payload for `DefInt`/`DefBool`/`DefFloat`/`DefLocation`/`DefOperator`.
    pub value: Option<String>,
    /// First child.
    pub arg1: Option<Arc<Expression>>,
    /// Second child.
    pub arg2: Option<Arc<Expression>>,
    /// Attribute reference for `DefAttribute`.
    pub attribute_id: Option<AttrId>,
    /// Group reference for `DefGroup`.
    pub group_id: Option<GroupId>,
    /// Type reference for `DefType`.
    pub type_id: Option<TypeId>,
}

impl Expression {
    /// Create a bare node with the given id and operand.
    pub fn new(id: ExprId, operand: Operand) -> Self {
        Self {
            id,
            operand,
            value: None,
            arg1: None,
            arg2: None,
            attribute_id: None,
            group_id: None,
            type_id: None,
        }
    }

    /// Set the literal payload.
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the first child.
    pub fn arg1(mut self, child: Arc<Expression>) -> Self {
        self.arg1 = Some(child);
        self
    }

    /// Set the second child.
    pub fn arg2(mut self, child: Arc<Expression>) -> Self {
        self.arg2 = Some(child);
        self
    }

    /// Set the attribute reference.
    pub fn attribute(mut self, attr: AttrId) -> Self {
        self.attribute_id = Some(attr);
        self
    }

    /// Set the group reference.
    pub fn group(mut self, group: GroupId) -> Self {
        self.group_id = Some(group);
        self
    }

    /// Set the type reference.
    pub fn item_type(mut self, type_id: TypeId) -> Self {
        self.type_id = Some(type_id);
        self
    }

    /// Finish construction, wrapping the node for sharing.
    pub fn build(self) -> Arc<Expression> {
        Arc::new(self)
    }

    /// Parse the literal payload as an integer.
    pub fn int_value(&self) -> Option<i64> {
        self.value.as_deref()?.parse().ok()
    }

    /// Parse the literal payload as a float.
    pub fn float_value(&self) -> Option<f64> {
        self.value.as_deref()?.parse().ok()
    }

    /// Parse the literal payload as a boolean (`"True"`/`"False"`/`"1"`/`"0"`).
    pub fn bool_value(&self) -> Option<bool> {
        match self.value.as_deref()? {
            "True" | "true" | "1" => Some(true),
            "False" | "false" | "0" => Some(false),
            _ => None,
        }
    }
}
