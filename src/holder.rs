//! Holders: fit-specific item instances.
//!
//! A `Holder` wraps an immutable `ItemType` with the mutable, fit-local
//! pieces: state, location tag, the optional module/charge pairing and the
//! per-holder attribute cache. Holder kind is a closed tagged-variant set
//! resolved by a factory keyed on the item's category, not a class
//! hierarchy.

use crate::data::{Category, ItemType};
use crate::expression::TypeId;
use crate::map::AttributeMap;
use crate::modifier::Location;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque, fit-scoped holder handle.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HolderId(u32);

impl HolderId {
    /// Create a handle from a raw index. Normally only the fit allocates
    /// these; the constructor is public for tests and error reporting.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Holder activation state, ordered from least to most active.
///
/// An effect with a required state runs whenever the holder's state is at
/// least that state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum State {
    #[default]
    Offline,
    Online,
    Active,
    Overloaded,
}

/// Closed set of holder kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HolderKind {
    Ship,
    Character,
    Module,
    Drone,
    Skill,
    Charge,
    Implant,
}

impl HolderKind {
    /// Holder kinds whose modifiers are exempt from stacking penalties.
    pub fn penalty_immune(self) -> bool {
        matches!(
            self,
            HolderKind::Ship
                | HolderKind::Character
                | HolderKind::Charge
                | HolderKind::Skill
                | HolderKind::Implant
        )
    }

    /// Location tag holders of this kind carry.
    pub fn location(self) -> Location {
        match self {
            HolderKind::Ship | HolderKind::Module | HolderKind::Drone | HolderKind::Charge => {
                Location::Ship
            }
            HolderKind::Character | HolderKind::Skill | HolderKind::Implant => Location::Character,
        }
    }
}

/// A fit-specific instance of an item type.
///
/// Created when added to a fit and destroyed on removal; removal undoes
/// every modifier the holder contributed. The attribute cache lives here,
/// but computation goes through the fit, which owns the affection register
/// and dependency tracker.
#[derive(Debug)]
pub struct Holder {
    id: HolderId,
    pub(crate) item: Arc<ItemType>,
    pub kind: HolderKind,
    pub(crate) state: State,
    /// Location tag within the fit (ship scope or character scope).
    pub location: Location,
    /// Paired holder for `Location::Other` modifiers (module <-> charge).
    pub(crate) other: Option<HolderId>,
    pub(crate) attrs: AttributeMap,
}

impl Holder {
    /// Factory: resolve kind and location from the item's category.
    pub(crate) fn from_item(id: HolderId, item: Arc<ItemType>) -> Self {
        let kind = match item.category {
            Category::Ship => HolderKind::Ship,
            Category::Character => HolderKind::Character,
            Category::Charge => HolderKind::Charge,
            Category::Skill => HolderKind::Skill,
            Category::Drone => HolderKind::Drone,
            Category::Implant => HolderKind::Implant,
            Category::Module | Category::Other => HolderKind::Module,
        };
        Self {
            id,
            kind,
            location: kind.location(),
            item,
            state: State::default(),
            other: None,
            attrs: AttributeMap::new(),
        }
    }

    pub fn id(&self) -> HolderId {
        self.id
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// The immutable item type behind this holder.
    pub fn item(&self) -> &Arc<ItemType> {
        &self.item
    }

    /// The paired holder, if any.
    pub fn other(&self) -> Option<HolderId> {
        self.other
    }

    /// Whether this holder's type requires the given skill.
    pub fn requires_skill(&self, skill: TypeId) -> bool {
        self.item.required_skills.contains(&skill)
    }

    /// The per-holder attribute cache, for inspection.
    pub fn attributes(&self) -> &AttributeMap {
        &self.attrs
    }
}
