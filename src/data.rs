//! Inbound data model.
//!
//! Immutable type, effect and attribute definitions as supplied by the data
//! layer, plus the `DataSource` generation that groups them. The core never
//! parses raw files; it consumes these already-decoded graphs. Everything in
//! this module is `Arc`-shared and safe to hand to any number of fits.

use crate::builder::BuildStatus;
use crate::expression::{AttrId, EffectId, GroupId, TypeId};
use crate::holder::State;
use crate::modifier::Modifier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Conventional stacking-penalty decay constant.
///
/// The weight of the i-th ranked penalized factor is
/// `exp(-(i / decay)^2)`. The constant is carried per data source rather
/// than baked into calculation logic.
pub const DEFAULT_PENALTY_DECAY: f64 = 2.67;

/// Item category, keyed off game data. Drives the holder factory and
/// stacking-penalty immunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Ship,
    Module,
    Charge,
    Skill,
    Drone,
    Implant,
    Character,
    Other,
}

/// Rounding rule applied after all modifier buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rounding {
    #[default]
    None,
    /// Integer-only attributes truncate toward zero.
    Integer,
}

/// Per-attribute calculation metadata.
///
/// Rounding, clamping and penalty exemption are configuration data, not
/// hard-coded logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub id: AttrId,
    /// Base value for holders whose type does not define the attribute.
    pub default: Option<f64>,
    /// Winner of competing assignments: max when high is good, else min.
    pub high_is_good: bool,
    /// Stackable attributes are never stacking-penalized.
    pub stackable: bool,
    pub rounding: Rounding,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AttributeDef {
    /// Create a definition with neutral metadata.
    pub fn new(id: AttrId) -> Self {
        Self {
            id,
            default: None,
            high_is_good: true,
            stackable: false,
            rounding: Rounding::None,
            min: None,
            max: None,
        }
    }

    /// Set the default base value.
    pub fn default_value(mut self, value: f64) -> Self {
        self.default = Some(value);
        self
    }

    /// Mark lower values as better (assignment winner becomes min).
    pub fn low_is_good(mut self) -> Self {
        self.high_is_good = false;
        self
    }

    /// Exempt the attribute from stacking penalties.
    pub fn stackable(mut self) -> Self {
        self.stackable = true;
        self
    }

    /// Truncate the final value toward zero.
    pub fn integer(mut self) -> Self {
        self.rounding = Rounding::Integer;
        self
    }

    /// Clamp the final value.
    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Metadata used when an attribute has no definition in the source:
    /// no default, no rounding, no clamping, no penalty.
    pub(crate) fn fallback(id: AttrId) -> Self {
        let mut def = Self::new(id);
        def.stackable = true;
        def
    }
}

/// A single effect with its built modifiers attached.
///
/// The build status is carried alongside so a partial build is never
/// mistaken for an intentionally inert effect.
#[derive(Debug)]
pub struct Effect {
    pub id: EffectId,
    pub modifiers: Vec<Arc<Modifier>>,
    pub build_status: BuildStatus,
    /// Minimum holder state at which this effect runs.
    pub state: State,
    pub is_offensive: bool,
    pub is_assistance: bool,
}

impl Effect {
    /// Create an effect running from `Offline` up.
    pub fn new(id: EffectId, modifiers: Vec<Arc<Modifier>>, build_status: BuildStatus) -> Self {
        Self {
            id,
            modifiers,
            build_status,
            state: State::Offline,
            is_offensive: false,
            is_assistance: false,
        }
    }

    /// Set the minimum holder state.
    pub fn at_state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    /// Mark as offensive (cannot target fleet mates).
    pub fn offensive(mut self) -> Self {
        self.is_offensive = true;
        self
    }

    /// Mark as assistance (cannot target hostiles).
    pub fn assistance(mut self) -> Self {
        self.is_assistance = true;
        self
    }

    /// Whether the effect runs at the given holder state.
    pub fn active_at(&self, state: State) -> bool {
        state >= self.state
    }
}

/// An immutable item type as loaded from game data.
#[derive(Debug)]
pub struct ItemType {
    pub id: TypeId,
    pub group_id: GroupId,
    pub category: Category,
    pub attrs: HashMap<AttrId, f64>,
    pub effects: Vec<Arc<Effect>>,
    /// Skills this type requires; drives skill-requirement filters.
    pub required_skills: Vec<TypeId>,
}

impl ItemType {
    /// Create a type with no attributes, effects or skill requirements.
    pub fn new(id: TypeId, group_id: GroupId, category: Category) -> Self {
        Self {
            id,
            group_id,
            category,
            attrs: HashMap::new(),
            effects: Vec::new(),
            required_skills: Vec::new(),
        }
    }

    /// Set a base attribute value.
    pub fn attr(mut self, attr: AttrId, value: f64) -> Self {
        self.attrs.insert(attr, value);
        self
    }

    /// Attach an effect.
    pub fn effect(mut self, effect: Effect) -> Self {
        self.effects.push(Arc::new(effect));
        self
    }

    /// Declare a required skill.
    pub fn requires_skill(mut self, skill: TypeId) -> Self {
        self.required_skills.push(skill);
        self
    }

    /// Finish construction, wrapping for sharing.
    pub fn build(self) -> Arc<ItemType> {
        Arc::new(self)
    }
}

/// One immutable generation of game data.
///
/// Shared between fits via `Arc`; switching a fit to a new generation goes
/// through `Fit::switch_source`, which re-resolves every holder's type.
///
/// # Examples
///
/// ```rust
/// use fitcalc::data::{AttributeDef, Category, DataSource, ItemType};
/// use fitcalc::expression::{AttrId, GroupId, TypeId};
///
/// let mut source = DataSource::new();
/// source.add_attribute(AttributeDef::new(AttrId(37)));
/// source.add_type(ItemType::new(TypeId(1), GroupId(25), Category::Ship).attr(AttrId(37), 100.0));
///
/// let ship = source.type_by_id(TypeId(1)).unwrap();
/// assert_eq!(ship.attrs[&AttrId(37)], 100.0);
/// ```
#[derive(Debug, Default)]
pub struct DataSource {
    types: HashMap<TypeId, Arc<ItemType>>,
    attributes: HashMap<AttrId, AttributeDef>,
    penalty_decay: f64,
}

impl DataSource {
    /// Create an empty source with the conventional penalty decay.
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
            attributes: HashMap::new(),
            penalty_decay: DEFAULT_PENALTY_DECAY,
        }
    }

    /// Register an item type.
    pub fn add_type(&mut self, item: ItemType) {
        self.types.insert(item.id, Arc::new(item));
    }

    /// Register attribute metadata.
    pub fn add_attribute(&mut self, def: AttributeDef) {
        self.attributes.insert(def.id, def);
    }

    /// Override the stacking-penalty decay constant.
    pub fn set_penalty_decay(&mut self, decay: f64) {
        self.penalty_decay = decay;
    }

    /// Look up an item type.
    pub fn type_by_id(&self, id: TypeId) -> Option<&Arc<ItemType>> {
        self.types.get(&id)
    }

    /// Look up attribute metadata.
    pub fn attribute(&self, id: AttrId) -> Option<&AttributeDef> {
        self.attributes.get(&id)
    }

    /// The stacking-penalty decay constant for this generation.
    pub fn penalty_decay(&self) -> f64 {
        if self.penalty_decay > 0.0 {
            self.penalty_decay
        } else {
            DEFAULT_PENALTY_DECAY
        }
    }
}
