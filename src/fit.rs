//! Fits and the calculation service.
//!
//! A `Fit` owns a set of holders plus the calculation machinery that makes
//! their attributes queryable: the affection register (who modifies whom),
//! the dependency tracker (what was computed from what) and an optional
//! invalidation callback for stat trackers layered on top.
//!
//! Attribute reads are lazy and cached per holder. Structural changes
//! (adding or removing holders, state flips, pairing, data-source switches)
//! invalidate exactly the cache entries whose inputs changed, found by
//! walking the dependency tracker downstream.

use crate::calc::{apply_modifiers, ModifierValue};
use crate::data::{AttributeDef, DataSource, Effect};
use crate::error::CalcError;
use crate::expression::{AttrId, TypeId};
use crate::graph::{AttrNode, DependencyTracker};
use crate::holder::{Holder, HolderId, HolderKind, State};
use crate::modifier::Location;
use crate::register::{AffectionRegister, AffectorSpec};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

// Pseudo-nodes recording reads that failed because the fit had no ship or
// character yet. Filling the role invalidates their dependents, so cached
// results never depend on holder insertion order. Real holder ids count up
// from zero and never reach these.
const SHIP_ROLE: AttrNode = (HolderId::new(u32::MAX), AttrId(0));
const CHARACTER_ROLE: AttrNode = (HolderId::new(u32::MAX - 1), AttrId(0));

fn role_node(location: Location) -> Option<AttrNode> {
    match location {
        Location::Ship => Some(SHIP_ROLE),
        Location::Character => Some(CHARACTER_ROLE),
        _ => None,
    }
}

/// Calculation-side state of a fit: the modifier index, the dependency
/// graph, and the invalidation hook.
#[derive(Default)]
pub struct CalculationService {
    register: AffectionRegister,
    tracker: DependencyTracker,
    on_invalidate: Option<Box<dyn FnMut(HolderId, AttrId)>>,
}

impl CalculationService {
    /// Gang-flagged modifiers currently active in this fit, for a fleet
    /// layer to project onto other participants.
    pub fn gang_affectors(&self) -> impl Iterator<Item = &AffectorSpec> {
        self.register.gang_affectors()
    }
}

/// A ship fitting: holders plus calculation state.
pub struct Fit {
    source: Arc<DataSource>,
    holders: HashMap<HolderId, Holder>,
    svc: CalculationService,
    ship: Option<HolderId>,
    character: Option<HolderId>,
    next_id: u32,
}

impl Fit {
    /// Create an empty fit against a data source generation.
    pub fn new(source: Arc<DataSource>) -> Self {
        Self {
            source,
            holders: HashMap::new(),
            svc: CalculationService::default(),
            ship: None,
            character: None,
            next_id: 0,
        }
    }

    /// The active data source generation.
    pub fn source(&self) -> &Arc<DataSource> {
        &self.source
    }

    /// The holder filling the ship role, if any.
    pub fn ship(&self) -> Option<HolderId> {
        self.ship
    }

    /// The holder filling the character role, if any.
    pub fn character(&self) -> Option<HolderId> {
        self.character
    }

    pub fn holder(&self, id: HolderId) -> Option<&Holder> {
        self.holders.get(&id)
    }

    /// Calculation-side state, for fleet layers and instrumentation.
    pub fn calculation(&self) -> &CalculationService {
        &self.svc
    }

    /// Install a hook fired once per cache entry dropped by invalidation.
    /// Stat trackers use this to re-sample lazily instead of polling.
    pub fn on_invalidate(&mut self, hook: impl FnMut(HolderId, AttrId) + 'static) {
        self.svc.on_invalidate = Some(Box::new(hook));
    }

    /// Instantiate a holder of the given type and wire it into the fit.
    ///
    /// The holder starts `Offline`; effects gated on higher states activate
    /// through [`Fit::set_state`]. The first ship and character added fill
    /// the fit's ship and character roles.
    pub fn add_holder(&mut self, type_id: TypeId) -> Result<HolderId, CalcError> {
        let item = self
            .source
            .type_by_id(type_id)
            .ok_or(CalcError::TypeNotFound(type_id))?;
        let id = HolderId::new(self.next_id);
        self.next_id += 1;
        let holder = Holder::from_item(id, Arc::clone(item));
        let mut filled_role = None;
        match holder.kind {
            HolderKind::Ship if self.ship.is_none() => {
                self.ship = Some(id);
                filled_role = Some(SHIP_ROLE);
            }
            HolderKind::Character if self.character.is_none() => {
                self.character = Some(id);
                filled_role = Some(CHARACTER_ROLE);
            }
            _ => {}
        }
        debug!(holder = %id, item = %type_id, "adding holder");
        self.svc.register.register_affectee(&holder);
        self.holders.insert(id, holder);
        for effect in self.active_effects(id) {
            self.apply_effect(id, &effect);
        }
        // Entries computed while the role was empty saw their lookups fail;
        // recompute them against the new role holder.
        if let Some(role) = filled_role {
            let stale = self.svc.tracker.dependents_of(role);
            self.cascade_invalidate(stale);
        }
        Ok(id)
    }

    /// Remove a holder, undoing every modifier it contributed.
    pub fn remove_holder(&mut self, id: HolderId) -> Result<(), CalcError> {
        if !self.holders.contains_key(&id) {
            return Err(CalcError::HolderNotFound(id));
        }
        debug!(holder = %id, "removing holder");
        for effect in self.active_effects(id) {
            self.undo_effect(id, &effect);
        }
        // Unpair before the partner's Other modifiers dangle.
        if let Some(partner) = self.holders.get(&id).and_then(Holder::other) {
            self.unpair(partner);
        }
        // Anything computed from this holder's attributes is stale.
        let seeds: Vec<AttrNode> = self.svc.tracker.nodes_of_holder(id);
        self.cascade_invalidate(seeds);
        let holder = match self.holders.remove(&id) {
            Some(holder) => holder,
            None => return Err(CalcError::HolderNotFound(id)),
        };
        self.svc.register.unregister_affectee(&holder);
        self.svc.tracker.remove_holder(id);
        if self.ship == Some(id) {
            self.ship = None;
        }
        if self.character == Some(id) {
            self.character = None;
        }
        Ok(())
    }

    /// Change a holder's state, applying and undoing effects whose
    /// activation gate is crossed.
    pub fn set_state(&mut self, id: HolderId, state: State) -> Result<(), CalcError> {
        let (old, effects) = match self.holders.get_mut(&id) {
            Some(holder) => {
                let old = holder.state;
                holder.state = state;
                (old, holder.item.effects.clone())
            }
            None => return Err(CalcError::HolderNotFound(id)),
        };
        if old == state {
            return Ok(());
        }
        debug!(holder = %id, ?old, ?state, "state change");
        for effect in &effects {
            match (effect.active_at(old), effect.active_at(state)) {
                (false, true) => self.apply_effect(id, effect),
                (true, false) => self.undo_effect(id, effect),
                _ => {}
            }
        }
        Ok(())
    }

    /// Pair two holders (module and charge) so their `Other`-scoped
    /// modifiers resolve to each other. Existing pairings are dissolved.
    pub fn set_other(&mut self, a: HolderId, b: HolderId) -> Result<(), CalcError> {
        for id in [a, b] {
            if !self.holders.contains_key(&id) {
                return Err(CalcError::HolderNotFound(id));
            }
        }
        for id in [a, b] {
            if let Some(partner) = self.holders.get(&id).and_then(Holder::other) {
                self.unpair(partner);
            }
            self.unpair(id);
        }
        // Re-register with the link in place so Other modifiers resolve.
        for id in [a, b] {
            for effect in self.active_effects(id) {
                self.undo_effect(id, &effect);
            }
        }
        if let Some(holder) = self.holders.get_mut(&a) {
            holder.other = Some(b);
        }
        if let Some(holder) = self.holders.get_mut(&b) {
            holder.other = Some(a);
        }
        for id in [a, b] {
            for effect in self.active_effects(id) {
                self.apply_effect(id, &effect);
            }
        }
        Ok(())
    }

    /// Compute (or fetch from cache) an attribute value.
    pub fn attr_value(&mut self, holder: HolderId, attr: AttrId) -> Result<f64, CalcError> {
        let mut chain = Vec::new();
        self.compute(holder, attr, &mut chain)
    }

    /// Set a volatile per-tick override. Wins over the computed value until
    /// [`Fit::clear_volatile`]; entries computed from the attribute are
    /// invalidated so they see the override.
    pub fn set_override(
        &mut self,
        holder: HolderId,
        attr: AttrId,
        value: f64,
    ) -> Result<(), CalcError> {
        match self.holders.get_mut(&holder) {
            Some(h) => h.attrs.set_override(attr, value),
            None => return Err(CalcError::HolderNotFound(holder)),
        }
        self.cascade_invalidate([(holder, attr)]);
        Ok(())
    }

    /// Clear every volatile override in the fit.
    pub fn clear_volatile(&mut self) {
        let mut seeds = Vec::new();
        for (&id, holder) in &mut self.holders {
            for attr in holder.attrs.overridden_attrs() {
                seeds.push((id, attr));
            }
            holder.attrs.clear_volatile();
        }
        self.cascade_invalidate(seeds);
    }

    /// Switch the fit to a new data source generation, re-resolving every
    /// holder's type and recomputing from scratch.
    ///
    /// Fails without side effects if any holder's type is missing from the
    /// new generation.
    pub fn switch_source(&mut self, source: Arc<DataSource>) -> Result<(), CalcError> {
        for holder in self.holders.values() {
            if source.type_by_id(holder.item().id).is_none() {
                return Err(CalcError::TypeNotFound(holder.item().id));
            }
        }
        let ids: Vec<HolderId> = self.holders.keys().copied().collect();
        for &id in &ids {
            for effect in self.active_effects(id) {
                self.undo_effect(id, &effect);
            }
        }
        for &id in &ids {
            // Affectee keys derive from the item, which may differ between
            // generations; re-register around the swap.
            let item = {
                let holder = self
                    .holders
                    .get(&id)
                    .ok_or(CalcError::HolderNotFound(id))?;
                self.svc.register.unregister_affectee(holder);
                Arc::clone(
                    source
                        .type_by_id(holder.item().id)
                        .ok_or(CalcError::TypeNotFound(holder.item().id))?,
                )
            };
            if let Some(holder) = self.holders.get_mut(&id) {
                holder.item = item;
                let dropped = holder.attrs.cached_attrs();
                holder.attrs.invalidate_all();
                self.svc.register.register_affectee(holder);
                if let Some(hook) = self.svc.on_invalidate.as_mut() {
                    for attr in dropped {
                        hook(id, attr);
                    }
                }
            }
        }
        self.source = source;
        self.svc.tracker.clear();
        for &id in &ids {
            for effect in self.active_effects(id) {
                self.apply_effect(id, &effect);
            }
        }
        Ok(())
    }

    // --- internals ---

    fn active_effects(&self, id: HolderId) -> Vec<Arc<Effect>> {
        match self.holders.get(&id) {
            Some(holder) => holder
                .item()
                .effects
                .iter()
                .filter(|effect| effect.active_at(holder.state))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Register an effect's modifiers for a holder and invalidate every
    /// affected attribute. Container layers use this for effects managed
    /// outside the state lifecycle; state-gated effects go through
    /// [`Fit::set_state`].
    pub fn apply_effect(&mut self, id: HolderId, effect: &Arc<Effect>) {
        let mut seeds = Vec::new();
        if let Some(holder) = self.holders.get(&id) {
            for modifier in &effect.modifiers {
                self.svc.register.register_affector(holder, Arc::clone(modifier));
                for affectee in self.svc.register.affectees_for(holder, modifier) {
                    seeds.push((affectee, modifier.tgt_attr));
                }
            }
        }
        self.cascade_invalidate(seeds);
    }

    /// Withdraw an effect's modifiers, symmetric to [`Fit::apply_effect`].
    pub fn undo_effect(&mut self, id: HolderId, effect: &Arc<Effect>) {
        let mut seeds = Vec::new();
        if let Some(holder) = self.holders.get(&id) {
            for modifier in &effect.modifiers {
                for affectee in self.svc.register.affectees_for(holder, modifier) {
                    seeds.push((affectee, modifier.tgt_attr));
                }
                self.svc.register.unregister_affector(holder, modifier);
            }
        }
        self.cascade_invalidate(seeds);
    }

    /// Dissolve a holder's pairing, re-registering its effects so its
    /// `Other` modifiers are withdrawn from the former partner.
    fn unpair(&mut self, id: HolderId) {
        if self.holders.get(&id).and_then(Holder::other).is_none() {
            return;
        }
        for effect in self.active_effects(id) {
            self.undo_effect(id, &effect);
        }
        if let Some(holder) = self.holders.get_mut(&id) {
            holder.other = None;
        }
        for effect in self.active_effects(id) {
            self.apply_effect(id, &effect);
        }
    }

    /// Invalidate cache entries and everything computed from them.
    fn cascade_invalidate(&mut self, seeds: impl IntoIterator<Item = AttrNode>) {
        let mut stale: HashSet<AttrNode> = HashSet::new();
        for seed in seeds {
            if stale.insert(seed) {
                stale.extend(self.svc.tracker.dependents_of(seed));
            }
        }
        for &(holder, attr) in &stale {
            if let Some(h) = self.holders.get_mut(&holder) {
                h.attrs.invalidate(attr);
            }
            self.svc.tracker.clear_inputs((holder, attr));
            if let Some(hook) = self.svc.on_invalidate.as_mut() {
                hook(holder, attr);
            }
        }
    }

    fn compute(
        &mut self,
        hid: HolderId,
        attr: AttrId,
        chain: &mut Vec<AttrNode>,
    ) -> Result<f64, CalcError> {
        let holder = self
            .holders
            .get(&hid)
            .ok_or(CalcError::HolderNotFound(hid))?;
        if let Some(value) = holder.attrs.override_value(attr) {
            return Ok(value);
        }
        if let Some(value) = holder.attrs.cached(attr) {
            return Ok(value);
        }
        if let Some(pos) = chain.iter().position(|&node| node == (hid, attr)) {
            let mut path = chain[pos..].to_vec();
            path.push((hid, attr));
            return Err(CalcError::Cycle { path });
        }
        chain.push((hid, attr));
        let result = self.compute_uncached(hid, attr, chain);
        chain.pop();
        let value = result?;
        if let Some(holder) = self.holders.get_mut(&hid) {
            holder.attrs.store(attr, value);
        }
        Ok(value)
    }

    fn compute_uncached(
        &mut self,
        hid: HolderId,
        attr: AttrId,
        chain: &mut Vec<AttrNode>,
    ) -> Result<f64, CalcError> {
        let def = self
            .source
            .attribute(attr)
            .cloned()
            .unwrap_or_else(|| AttributeDef::fallback(attr));
        let (base, affectors) = {
            let holder = self
                .holders
                .get(&hid)
                .ok_or(CalcError::HolderNotFound(hid))?;
            let base = holder.item().attrs.get(&attr).copied().or(def.default);
            (base, self.svc.register.affectors_for(holder))
        };

        let mut values = Vec::new();
        for spec in affectors {
            if spec.modifier.tgt_attr != attr {
                continue;
            }
            let carrier = spec.holder;
            let Some(carrier_kind) = self.holders.get(&carrier).map(|h| h.kind) else {
                continue;
            };
            if let Some(conditions) = spec.modifier.conditions.clone() {
                let carrier_other = self.holders.get(&carrier).and_then(Holder::other);
                let ship = self.ship;
                let character = self.character;
                let mut lookup = |location: Location, read: AttrId| -> Result<f64, CalcError> {
                    let target = match location {
                        Location::SelfRef => Some(carrier),
                        Location::Ship => ship,
                        Location::Character => character,
                        Location::Other => carrier_other,
                        Location::Target | Location::Area => None,
                    };
                    let Some(target) = target else {
                        // Record the failed read against the role node so
                        // filling the role later invalidates this entry.
                        if let Some(role) = role_node(location) {
                            self.svc.tracker.add_dependency(role, (hid, attr));
                        }
                        return Err(CalcError::AttributeUndefined(carrier, read));
                    };
                    // Before the read, so a failed read still leaves the
                    // edge that invalidates us once the input is defined.
                    self.svc.tracker.add_dependency((target, read), (hid, attr));
                    self.compute(target, read, chain)
                };
                match conditions.evaluate(&mut lookup) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(CalcError::AttributeUndefined(..)) => {
                        // An unresolvable condition input disables the
                        // modifier rather than failing the read.
                        debug!(
                            holder = %hid,
                            carrier = %carrier,
                            "condition input undefined, modifier skipped"
                        );
                        continue;
                    }
                    Err(other) => return Err(other),
                }
            }
            // Recorded even when the read fails: once the attribute is
            // defined (an override, a source switch) the edge cascades.
            self.svc
                .tracker
                .add_dependency((carrier, spec.modifier.src_attr), (hid, attr));
            let value = match self.compute(carrier, spec.modifier.src_attr, chain) {
                Ok(value) => value,
                Err(CalcError::AttributeUndefined(..)) => {
                    debug!(
                        holder = %hid,
                        carrier = %carrier,
                        attr = %spec.modifier.src_attr,
                        "source attribute undefined, modifier skipped"
                    );
                    continue;
                }
                Err(other) => return Err(other),
            };
            values.push(ModifierValue {
                operation: spec.modifier.operation,
                value,
                penalized: !def.stackable
                    && spec.modifier.operation.is_multiplicative()
                    && !carrier_kind.penalty_immune(),
            });
        }

        let base = match base {
            Some(base) => base,
            // Modifiers can define an attribute the type lacks (assignments
            // in particular); with neither, the attribute does not exist.
            None if values.is_empty() => {
                return Err(CalcError::AttributeUndefined(hid, attr))
            }
            None => 0.0,
        };
        Ok(apply_modifiers(
            base,
            &def,
            &values,
            self.source.penalty_decay(),
        ))
    }
}
