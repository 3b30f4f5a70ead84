use fitcalc::builder::BuildStatus;
use fitcalc::condition::{Atom, CompOp};
use fitcalc::data::{AttributeDef, Category, DataSource, Effect, ItemType};
use fitcalc::*;
use std::sync::Arc;

const VELOCITY: AttrId = AttrId(37);
const BOOST: AttrId = AttrId(306);
const LOADED: AttrId = AttrId(500);
const SHIELD: AttrId = AttrId(263);

const SHIP: TypeId = TypeId(1);

fn base_source() -> DataSource {
    let mut source = DataSource::new();
    source.add_attribute(AttributeDef::new(VELOCITY));
    source.add_attribute(AttributeDef::new(BOOST).stackable());
    source.add_attribute(AttributeDef::new(LOADED).stackable());
    source.add_attribute(AttributeDef::new(SHIELD));
    source.add_type(
        ItemType::new(SHIP, GroupId(25), Category::Ship)
            .attr(VELOCITY, 100.0)
            .attr(SHIELD, 1000.0),
    );
    source
}

fn percent_effect(tgt: AttrId, location: Location, filter: FilterType) -> Effect {
    let modifier = Modifier::new(Operation::PostPercent, location, filter, BOOST, tgt);
    Effect::new(EffectId(1), vec![Arc::new(modifier)], BuildStatus::Full)
}

fn velocity_module(type_id: TypeId, boost: f64) -> ItemType {
    ItemType::new(type_id, GroupId(46), Category::Module)
        .attr(BOOST, boost)
        .effect(percent_effect(VELOCITY, Location::Ship, FilterType::Direct))
}

/// A complete pipeline: modules modify the ship, values cascade through
/// source attribute reads, everything is queryable.
#[test]
fn test_complete_pipeline() {
    let mut source = base_source();
    source.add_type(velocity_module(TypeId(2), 10.0));
    // A skill that strengthens the module's boost attribute.
    let skill_modifier = Modifier::new(
        Operation::PostMul,
        Location::Ship,
        FilterType::Group(GroupId(46)),
        BOOST,
        BOOST,
    );
    source.add_type(
        ItemType::new(TypeId(3), GroupId(300), Category::Skill)
            .attr(BOOST, 2.0)
            .effect(Effect::new(
                EffectId(2),
                vec![Arc::new(skill_modifier)],
                BuildStatus::Full,
            )),
    );

    let mut fit = Fit::new(Arc::new(source));
    let ship = fit.add_holder(SHIP).unwrap();
    let module = fit.add_holder(TypeId(2)).unwrap();
    fit.add_holder(TypeId(3)).unwrap();

    // The skill doubles the module's boost, so the ship gains 20%.
    assert!((fit.attr_value(module, BOOST).unwrap() - 20.0).abs() < 1e-9);
    assert!((fit.attr_value(ship, VELOCITY).unwrap() - 120.0).abs() < 1e-9);
}

/// Three identical penalized bonuses yield less than their naive product,
/// and the result does not depend on fitting order.
#[test]
fn test_stacking_penalty_on_modules() {
    let build = |order: &[TypeId]| {
        let mut source = base_source();
        for id in [TypeId(2), TypeId(3), TypeId(4)] {
            source.add_type(velocity_module(id, 10.0));
        }
        let mut fit = Fit::new(Arc::new(source));
        let ship = fit.add_holder(SHIP).unwrap();
        for &id in order {
            fit.add_holder(id).unwrap();
        }
        fit.attr_value(ship, VELOCITY).unwrap()
    };

    let forward = build(&[TypeId(2), TypeId(3), TypeId(4)]);
    let backward = build(&[TypeId(4), TypeId(3), TypeId(2)]);
    assert!((forward - backward).abs() < 1e-9);
    assert!(forward < 100.0 * 1.1f64.powi(3));
    assert!(forward > 110.0);
}

/// Skill-carried bonuses are penalty immune and multiply in full.
#[test]
fn test_skill_bonuses_are_not_penalized() {
    let mut source = base_source();
    for id in [TypeId(2), TypeId(3)] {
        source.add_type(
            ItemType::new(id, GroupId(300), Category::Skill)
                .attr(BOOST, 10.0)
                .effect(percent_effect(VELOCITY, Location::Ship, FilterType::Direct)),
        );
    }
    let mut fit = Fit::new(Arc::new(source));
    let ship = fit.add_holder(SHIP).unwrap();
    fit.add_holder(TypeId(2)).unwrap();
    fit.add_holder(TypeId(3)).unwrap();

    assert!((fit.attr_value(ship, VELOCITY).unwrap() - 121.0).abs() < 1e-9);
}

/// Removing a holder restores every value it had touched.
#[test]
fn test_remove_restores_values() {
    let mut source = base_source();
    source.add_type(velocity_module(TypeId(2), 10.0));
    source.add_type(velocity_module(TypeId(3), 10.0));
    let mut fit = Fit::new(Arc::new(source));
    let ship = fit.add_holder(SHIP).unwrap();

    let a = fit.add_holder(TypeId(2)).unwrap();
    let before = fit.attr_value(ship, VELOCITY).unwrap();
    assert!((before - 110.0).abs() < 1e-9);
    let b = fit.add_holder(TypeId(3)).unwrap();
    // The second bonus stacks penalized: more than one bonus, less than two.
    let both = fit.attr_value(ship, VELOCITY).unwrap();
    assert!(both > before && both < 121.0);

    fit.remove_holder(b).unwrap();
    assert!((fit.attr_value(ship, VELOCITY).unwrap() - before).abs() < 1e-9);
    fit.remove_holder(a).unwrap();
    assert_eq!(fit.attr_value(ship, VELOCITY).unwrap(), 100.0);
}

/// Repeated reads hit the cache; unrelated changes do not invalidate.
#[test]
fn test_cache_idempotence_and_precision() {
    let mut source = base_source();
    source.add_type(velocity_module(TypeId(2), 10.0));
    // A shield module; touches SHIELD, never VELOCITY.
    source.add_type(
        ItemType::new(TypeId(3), GroupId(60), Category::Module)
            .attr(BOOST, 20.0)
            .effect(percent_effect(SHIELD, Location::Ship, FilterType::Direct)),
    );
    let mut fit = Fit::new(Arc::new(source));
    let ship = fit.add_holder(SHIP).unwrap();
    fit.add_holder(TypeId(2)).unwrap();

    fit.attr_value(ship, VELOCITY).unwrap();
    let computed = fit.holder(ship).unwrap().attributes().calculation_count();
    fit.attr_value(ship, VELOCITY).unwrap();
    assert_eq!(
        fit.holder(ship).unwrap().attributes().calculation_count(),
        computed
    );

    // Fitting the shield module leaves the cached velocity intact.
    fit.add_holder(TypeId(3)).unwrap();
    assert!(fit.holder(ship).unwrap().attributes().cached(VELOCITY).is_some());
    fit.attr_value(ship, VELOCITY).unwrap();
    assert_eq!(
        fit.holder(ship).unwrap().attributes().calculation_count(),
        computed
    );
}

/// A conditional modifier switches on and off with its condition input, and
/// the dependent value recomputes when that input changes.
#[test]
fn test_conditional_modifier_follows_input() {
    let mut source = base_source();
    let conditional = Modifier::new(
        Operation::PostPercent,
        Location::Ship,
        FilterType::Direct,
        BOOST,
        VELOCITY,
    )
    .with_conditions(Atom::comparison(
        CompOp::Eq,
        Atom::ValueRef {
            location: Location::SelfRef,
            attr: LOADED,
        },
        Atom::Value(1.0),
    ));
    source.add_type(
        ItemType::new(TypeId(2), GroupId(46), Category::Module)
            .attr(BOOST, 10.0)
            .attr(LOADED, 0.0)
            .effect(Effect::new(
                EffectId(1),
                vec![Arc::new(conditional)],
                BuildStatus::Full,
            )),
    );
    let mut fit = Fit::new(Arc::new(source));
    let ship = fit.add_holder(SHIP).unwrap();
    let module = fit.add_holder(TypeId(2)).unwrap();

    assert_eq!(fit.attr_value(ship, VELOCITY).unwrap(), 100.0);

    // Flipping the condition input invalidates the dependent value.
    fit.set_override(module, LOADED, 1.0).unwrap();
    assert!((fit.attr_value(ship, VELOCITY).unwrap() - 110.0).abs() < 1e-9);

    fit.clear_volatile();
    assert_eq!(fit.attr_value(ship, VELOCITY).unwrap(), 100.0);
}

/// Module/charge pairing routes Other-scoped modifiers both ways.
#[test]
fn test_other_location_pairing() {
    let mut source = base_source();
    let charge_boost = Modifier::new(
        Operation::PostPercent,
        Location::Other,
        FilterType::Direct,
        BOOST,
        VELOCITY,
    );
    source.add_type(
        ItemType::new(TypeId(2), GroupId(46), Category::Module)
            .attr(BOOST, 25.0)
            .effect(Effect::new(
                EffectId(1),
                vec![Arc::new(charge_boost)],
                BuildStatus::Full,
            )),
    );
    source.add_type(
        ItemType::new(TypeId(3), GroupId(83), Category::Charge).attr(VELOCITY, 40.0),
    );
    let mut fit = Fit::new(Arc::new(source));
    fit.add_holder(SHIP).unwrap();
    let module = fit.add_holder(TypeId(2)).unwrap();
    let charge = fit.add_holder(TypeId(3)).unwrap();

    // Unpaired, the charge keeps its base velocity.
    assert_eq!(fit.attr_value(charge, VELOCITY).unwrap(), 40.0);
    fit.set_other(module, charge).unwrap();
    assert!((fit.attr_value(charge, VELOCITY).unwrap() - 50.0).abs() < 1e-9);
}

/// Gang-flagged modifiers apply locally and are exposed for projection.
#[test]
fn test_gang_modifiers() {
    let mut source = base_source();
    let gang_link = Modifier::new(
        Operation::PostPercent,
        Location::Ship,
        FilterType::Direct,
        BOOST,
        VELOCITY,
    )
    .gang();
    source.add_type(
        ItemType::new(TypeId(2), GroupId(316), Category::Module)
            .attr(BOOST, 10.0)
            .effect(Effect::new(
                EffectId(1),
                vec![Arc::new(gang_link)],
                BuildStatus::Full,
            )),
    );
    let mut fit = Fit::new(Arc::new(source));
    let ship = fit.add_holder(SHIP).unwrap();
    let link = fit.add_holder(TypeId(2)).unwrap();

    assert!((fit.attr_value(ship, VELOCITY).unwrap() - 110.0).abs() < 1e-9);
    assert_eq!(fit.calculation().gang_affectors().count(), 1);

    fit.remove_holder(link).unwrap();
    assert_eq!(fit.calculation().gang_affectors().count(), 0);
    assert_eq!(fit.attr_value(ship, VELOCITY).unwrap(), 100.0);
}

/// Circular modifier data is reported, not computed.
#[test]
fn test_cycle_detection() {
    // The ship carries both modifiers, so each source attribute is defined
    // on the carrier and the reads genuinely chase each other.
    let forward = Modifier::new(
        Operation::PostMul,
        Location::Ship,
        FilterType::Direct,
        VELOCITY,
        SHIELD,
    );
    let backward = Modifier::new(
        Operation::PostMul,
        Location::Ship,
        FilterType::Direct,
        SHIELD,
        VELOCITY,
    );
    let mut source = DataSource::new();
    source.add_attribute(AttributeDef::new(VELOCITY));
    source.add_attribute(AttributeDef::new(SHIELD));
    source.add_type(
        ItemType::new(SHIP, GroupId(25), Category::Ship)
            .attr(VELOCITY, 100.0)
            .attr(SHIELD, 1000.0)
            .effect(Effect::new(
                EffectId(1),
                vec![Arc::new(forward), Arc::new(backward)],
                BuildStatus::Full,
            )),
    );
    let mut fit = Fit::new(Arc::new(source));
    let ship = fit.add_holder(SHIP).unwrap();

    match fit.attr_value(ship, VELOCITY) {
        Err(CalcError::Cycle { path }) => {
            assert_eq!(path.first(), path.last());
            assert!(path.len() >= 3);
        }
        other => panic!("expected cycle error, got {:?}", other),
    }
}

/// Querying a holder that was never added fails cleanly.
#[test]
fn test_unknown_holder_and_type() {
    let mut fit = Fit::new(Arc::new(base_source()));
    assert_eq!(
        fit.attr_value(HolderId::new(9), VELOCITY),
        Err(CalcError::HolderNotFound(HolderId::new(9))),
    );
    assert_eq!(
        fit.add_holder(TypeId(99)),
        Err(CalcError::TypeNotFound(TypeId(99))),
    );
}
