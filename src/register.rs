//! Affection register: the bidirectional holder/modifier index.
//!
//! The register answers the two queries calculation and invalidation need
//! without scanning the whole fit: given a holder, which active modifiers
//! affect it (`affectors_for`), and given a carrier and one of its
//! modifiers, which holders does it affect (`affectees_for`). Both sides
//! are indexed by the same keys, derived from a modifier's location and
//! filter on one side and from a holder's location tag, group and skill
//! requirements on the other.

use crate::expression::{GroupId, TypeId};
use crate::holder::{Holder, HolderId, HolderKind};
use crate::modifier::{FilterType, Location, Modifier};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::{debug, warn};

/// A registered (carrier, modifier) pair.
///
/// Identity is the carrier plus the modifier allocation, so the same
/// `Arc<Modifier>` registered twice for one holder dedupes while two
/// structurally equal modifiers from different effects stay distinct.
#[derive(Debug, Clone)]
pub struct AffectorSpec {
    pub holder: HolderId,
    pub modifier: Arc<Modifier>,
}

impl PartialEq for AffectorSpec {
    fn eq(&self, other: &Self) -> bool {
        self.holder == other.holder && Arc::ptr_eq(&self.modifier, &other.modifier)
    }
}

impl Eq for AffectorSpec {}

impl Hash for AffectorSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.holder.hash(state);
        (Arc::as_ptr(&self.modifier) as usize).hash(state);
    }
}

/// Index key shared by both sides of the register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AffecteeKey {
    /// The single holder occupying a location role (ship or character).
    Direct(Location),
    /// Every holder tagged with the location.
    Scope(Location),
    /// Holders in the location whose type belongs to the group.
    ScopeGroup(Location, GroupId),
    /// Holders in the location whose type requires the skill.
    ScopeSkill(Location, TypeId),
    /// Holders whose type requires the skill, regardless of location.
    OwnerSkill(TypeId),
}

/// Where a carrier's modifier is stored.
enum Slot {
    /// Targets the carrier itself.
    Carrier,
    /// Targets the carrier's paired holder.
    Paired,
    /// Indexed under a key.
    Keyed(AffecteeKey),
    /// Target or area scoped; nothing within this fit matches.
    Unmatched,
}

fn classify(carrier: &Holder, modifier: &Modifier) -> Slot {
    match (modifier.location, modifier.filter) {
        (Location::SelfRef, FilterType::Direct) => Slot::Carrier,
        (Location::Other, FilterType::Direct) => Slot::Paired,
        (Location::Target | Location::Area, _) => Slot::Unmatched,
        (loc @ (Location::Ship | Location::Character), FilterType::Direct) => {
            Slot::Keyed(AffecteeKey::Direct(loc))
        }
        (_, FilterType::OwnerSkillRequired(skill)) => Slot::Keyed(AffecteeKey::OwnerSkill(skill)),
        (loc, filter) => {
            // Filtered modifiers with a Self location scope over the
            // carrier's own side of the fit.
            let scope = match loc {
                Location::SelfRef | Location::Other => carrier.location,
                other => other,
            };
            match filter {
                FilterType::All => Slot::Keyed(AffecteeKey::Scope(scope)),
                FilterType::Group(group) => Slot::Keyed(AffecteeKey::ScopeGroup(scope, group)),
                FilterType::SkillRequired(skill) => {
                    Slot::Keyed(AffecteeKey::ScopeSkill(scope, skill))
                }
                // Direct is handled above; unreachable shapes fall out here.
                FilterType::Direct | FilterType::OwnerSkillRequired(_) => Slot::Unmatched,
            }
        }
    }
}

/// Keys a holder answers to on the affectee side.
fn affectee_keys(holder: &Holder) -> Vec<AffecteeKey> {
    let mut keys = vec![
        AffecteeKey::Scope(holder.location),
        AffecteeKey::ScopeGroup(holder.location, holder.item.group_id),
    ];
    for &skill in &holder.item.required_skills {
        keys.push(AffecteeKey::ScopeSkill(holder.location, skill));
        keys.push(AffecteeKey::OwnerSkill(skill));
    }
    match holder.kind {
        HolderKind::Ship => keys.push(AffecteeKey::Direct(Location::Ship)),
        HolderKind::Character => keys.push(AffecteeKey::Direct(Location::Character)),
        _ => {}
    }
    keys
}

/// Bidirectional index of active modifiers and registered holders.
#[derive(Debug, Default)]
pub struct AffectionRegister {
    /// Key -> holders currently matching it.
    affectees: HashMap<AffecteeKey, HashSet<HolderId>>,
    /// Key -> active modifiers filed under it.
    affectors: HashMap<AffecteeKey, HashSet<AffectorSpec>>,
    /// Self-targeting modifiers, keyed by carrier.
    carrier_affectors: HashMap<HolderId, HashSet<AffectorSpec>>,
    /// Other-location modifiers, keyed by the paired target holder.
    paired_affectors: HashMap<HolderId, HashSet<AffectorSpec>>,
    /// Gang-flagged modifiers, for a fleet layer to project onto other
    /// fits. They also apply locally, through the maps above.
    gang_affectors: HashSet<AffectorSpec>,
}

impl AffectionRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a holder on the affectee side.
    pub fn register_affectee(&mut self, holder: &Holder) {
        for key in affectee_keys(holder) {
            self.affectees.entry(key).or_default().insert(holder.id());
        }
    }

    /// Remove a holder from the affectee side. Unknown holders are a no-op.
    pub fn unregister_affectee(&mut self, holder: &Holder) {
        let mut found = false;
        for key in affectee_keys(holder) {
            if let Some(set) = self.affectees.get_mut(&key) {
                found |= set.remove(&holder.id());
                if set.is_empty() {
                    self.affectees.remove(&key);
                }
            }
        }
        if !found {
            warn!(holder = %holder.id(), "unregistering holder that was never registered");
        }
    }

    /// Register one of a carrier's modifiers on the affector side.
    pub fn register_affector(&mut self, carrier: &Holder, modifier: Arc<Modifier>) {
        let spec = AffectorSpec {
            holder: carrier.id(),
            modifier: Arc::clone(&modifier),
        };
        if modifier.gang {
            self.gang_affectors.insert(spec.clone());
        }
        match classify(carrier, &modifier) {
            Slot::Carrier => {
                self.carrier_affectors
                    .entry(carrier.id())
                    .or_default()
                    .insert(spec);
            }
            Slot::Paired => {
                if let Some(target) = carrier.other() {
                    self.paired_affectors.entry(target).or_default().insert(spec);
                } else {
                    debug!(
                        holder = %carrier.id(),
                        "other-scoped modifier registered with no paired holder"
                    );
                }
            }
            Slot::Keyed(key) => {
                self.affectors.entry(key).or_default().insert(spec);
            }
            Slot::Unmatched => {
                debug!(
                    holder = %carrier.id(),
                    location = %modifier.location,
                    "modifier scope not resolvable within this fit"
                );
            }
        }
    }

    /// Remove one of a carrier's modifiers. Unknown modifiers are a no-op.
    pub fn unregister_affector(&mut self, carrier: &Holder, modifier: &Arc<Modifier>) {
        let spec = AffectorSpec {
            holder: carrier.id(),
            modifier: Arc::clone(modifier),
        };
        self.gang_affectors.remove(&spec);
        let removed = match classify(carrier, modifier) {
            Slot::Carrier => remove_spec(&mut self.carrier_affectors, &carrier.id(), &spec),
            Slot::Paired => match carrier.other() {
                Some(target) => remove_spec(&mut self.paired_affectors, &target, &spec),
                // Nothing was filed while the carrier was unpaired.
                None => true,
            },
            Slot::Keyed(key) => remove_spec(&mut self.affectors, &key, &spec),
            Slot::Unmatched => true,
        };
        if !removed {
            warn!(
                holder = %carrier.id(),
                "unregistering modifier that was never registered"
            );
        }
    }

    /// All registered modifiers that affect the given holder.
    pub fn affectors_for(&self, holder: &Holder) -> Vec<AffectorSpec> {
        let mut out = Vec::new();
        if let Some(set) = self.carrier_affectors.get(&holder.id()) {
            out.extend(set.iter().cloned());
        }
        if let Some(set) = self.paired_affectors.get(&holder.id()) {
            out.extend(set.iter().cloned());
        }
        for key in affectee_keys(holder) {
            if let Some(set) = self.affectors.get(&key) {
                out.extend(set.iter().cloned());
            }
        }
        out
    }

    /// All registered holders a carrier's modifier affects.
    pub fn affectees_for(&self, carrier: &Holder, modifier: &Modifier) -> Vec<HolderId> {
        match classify(carrier, modifier) {
            Slot::Carrier => vec![carrier.id()],
            Slot::Paired => carrier.other().into_iter().collect(),
            Slot::Keyed(key) => self
                .affectees
                .get(&key)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default(),
            Slot::Unmatched => Vec::new(),
        }
    }

    /// Gang-flagged modifiers currently active, for projection onto other
    /// gang participants by a fleet layer.
    pub fn gang_affectors(&self) -> impl Iterator<Item = &AffectorSpec> {
        self.gang_affectors.iter()
    }
}

fn remove_spec<K: Eq + Hash>(
    map: &mut HashMap<K, HashSet<AffectorSpec>>,
    key: &K,
    spec: &AffectorSpec,
) -> bool {
    if let Some(set) = map.get_mut(key) {
        let removed = set.remove(spec);
        if set.is_empty() {
            map.remove(key);
        }
        removed
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Category, ItemType};
    use crate::expression::{AttrId, GroupId, TypeId};
    use crate::modifier::Operation;

    fn holder(id: u32, category: Category, group: GroupId) -> Holder {
        let item = ItemType::new(TypeId(id), group, category).build();
        Holder::from_item(HolderId::new(id), item)
    }

    fn modifier(location: Location, filter: FilterType) -> Arc<Modifier> {
        Arc::new(Modifier::new(
            Operation::PostPercent,
            location,
            filter,
            AttrId(10),
            AttrId(20),
        ))
    }

    #[test]
    fn test_direct_ship_modifier_reaches_ship_holder() {
        let mut register = AffectionRegister::new();
        let ship = holder(1, Category::Ship, GroupId(1));
        let module = holder(2, Category::Module, GroupId(2));
        register.register_affectee(&ship);
        register.register_affectee(&module);

        let m = modifier(Location::Ship, FilterType::Direct);
        register.register_affector(&module, Arc::clone(&m));

        assert_eq!(register.affectees_for(&module, &m), vec![ship.id()]);
        assert_eq!(register.affectors_for(&ship).len(), 1);
        assert!(register.affectors_for(&module).is_empty());
    }

    #[test]
    fn test_scope_filter_matches_all_in_location() {
        let mut register = AffectionRegister::new();
        let ship = holder(1, Category::Ship, GroupId(1));
        let module = holder(2, Category::Module, GroupId(2));
        let skill = holder(3, Category::Skill, GroupId(3));
        register.register_affectee(&ship);
        register.register_affectee(&module);
        register.register_affectee(&skill);

        let m = modifier(Location::Ship, FilterType::All);
        register.register_affector(&skill, Arc::clone(&m));

        let mut affected = register.affectees_for(&skill, &m);
        affected.sort();
        // Ship-location holders only; the skill itself is character scoped.
        assert_eq!(affected, vec![ship.id(), module.id()]);
    }

    #[test]
    fn test_group_and_skill_filters() {
        let mut register = AffectionRegister::new();
        let in_group = holder(1, Category::Module, GroupId(7));
        let out_group = holder(2, Category::Module, GroupId(8));
        let skilled = Holder::from_item(
            HolderId::new(3),
            ItemType::new(TypeId(3), GroupId(9), Category::Module)
                .requires_skill(TypeId(42))
                .build(),
        );
        register.register_affectee(&in_group);
        register.register_affectee(&out_group);
        register.register_affectee(&skilled);

        let carrier = holder(4, Category::Skill, GroupId(1));
        register.register_affectee(&carrier);

        let by_group = modifier(Location::Ship, FilterType::Group(GroupId(7)));
        let by_skill = modifier(Location::Ship, FilterType::SkillRequired(TypeId(42)));
        register.register_affector(&carrier, Arc::clone(&by_group));
        register.register_affector(&carrier, Arc::clone(&by_skill));

        assert_eq!(register.affectees_for(&carrier, &by_group), vec![in_group.id()]);
        assert_eq!(register.affectees_for(&carrier, &by_skill), vec![skilled.id()]);
        assert!(register.affectors_for(&out_group).is_empty());
    }

    #[test]
    fn test_self_and_paired_modifiers() {
        let mut register = AffectionRegister::new();
        let mut module = holder(1, Category::Module, GroupId(1));
        let charge = holder(2, Category::Charge, GroupId(2));
        module.other = Some(charge.id());
        register.register_affectee(&module);
        register.register_affectee(&charge);

        let on_self = modifier(Location::SelfRef, FilterType::Direct);
        let on_other = modifier(Location::Other, FilterType::Direct);
        register.register_affector(&module, Arc::clone(&on_self));
        register.register_affector(&module, Arc::clone(&on_other));

        assert_eq!(register.affectees_for(&module, &on_self), vec![module.id()]);
        assert_eq!(register.affectees_for(&module, &on_other), vec![charge.id()]);
        assert_eq!(register.affectors_for(&module).len(), 1);
        assert_eq!(register.affectors_for(&charge).len(), 1);
    }

    #[test]
    fn test_unregister_is_symmetric() {
        let mut register = AffectionRegister::new();
        let ship = holder(1, Category::Ship, GroupId(1));
        let module = holder(2, Category::Module, GroupId(2));
        register.register_affectee(&ship);
        register.register_affectee(&module);

        let m = modifier(Location::Ship, FilterType::Direct);
        register.register_affector(&module, Arc::clone(&m));
        register.unregister_affector(&module, &m);

        assert!(register.affectors_for(&ship).is_empty());
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let mut register = AffectionRegister::new();
        let module = holder(1, Category::Module, GroupId(1));
        // Never registered; both calls must leave the register untouched.
        register.unregister_affectee(&module);
        let m = modifier(Location::Ship, FilterType::Direct);
        register.unregister_affector(&module, &m);
        assert!(register.affectors_for(&module).is_empty());
    }

    #[test]
    fn test_gang_modifiers_exposed_and_applied_locally() {
        let mut register = AffectionRegister::new();
        let ship = holder(1, Category::Ship, GroupId(1));
        let booster = holder(2, Category::Module, GroupId(2));
        register.register_affectee(&ship);
        register.register_affectee(&booster);

        let m = Arc::new(
            Modifier::new(
                Operation::PostPercent,
                Location::Ship,
                FilterType::Direct,
                AttrId(10),
                AttrId(20),
            )
            .gang(),
        );
        register.register_affector(&booster, Arc::clone(&m));

        assert_eq!(register.gang_affectors().count(), 1);
        assert_eq!(register.affectees_for(&booster, &m), vec![ship.id()]);

        register.unregister_affector(&booster, &m);
        assert_eq!(register.gang_affectors().count(), 0);
    }
}
