//! Fitting example: a ship, modules and a skill
//!
//! This example demonstrates:
//! - Declaring attribute metadata and item types
//! - Adding holders to a fit
//! - Lazy attribute reads and cache-preserving removal

use fitcalc::builder::BuildStatus;
use fitcalc::data::{AttributeDef, Category, DataSource, Effect, ItemType};
use fitcalc::*;
use std::sync::Arc;

fn main() -> Result<(), CalcError> {
    // RUST_LOG=fitcalc=debug shows holder and invalidation activity
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let velocity = AttrId(37);
    let boost = AttrId(306);

    // Declare attribute metadata
    let mut source = DataSource::new();
    source.add_attribute(AttributeDef::new(velocity));
    source.add_attribute(AttributeDef::new(boost).stackable());

    // A ship with 100 m/s base velocity
    source.add_type(ItemType::new(TypeId(1), GroupId(25), Category::Ship).attr(velocity, 100.0));
    println!("Declared ship type: base velocity 100");

    // An afterburner module: +35% ship velocity, scaled by its own boost attribute
    let afterburner = Modifier::new(
        Operation::PostPercent,
        Location::Ship,
        FilterType::Direct,
        boost,
        velocity,
    );
    source.add_type(
        ItemType::new(TypeId(2), GroupId(46), Category::Module)
            .attr(boost, 35.0)
            .effect(Effect::new(
                EffectId(1),
                vec![Arc::new(afterburner)],
                BuildStatus::Full,
            )),
    );
    println!("Declared afterburner type: +35% velocity");

    // A navigation skill: +5% velocity, penalty immune
    let navigation = Modifier::new(
        Operation::PostPercent,
        Location::Ship,
        FilterType::Direct,
        boost,
        velocity,
    );
    source.add_type(
        ItemType::new(TypeId(3), GroupId(300), Category::Skill)
            .attr(boost, 5.0)
            .effect(Effect::new(
                EffectId(2),
                vec![Arc::new(navigation)],
                BuildStatus::Full,
            )),
    );
    println!("Declared navigation skill type: +5% velocity");

    // Assemble the fit
    let mut fit = Fit::new(Arc::new(source));
    let ship = fit.add_holder(TypeId(1))?;
    println!("\nShip alone:        {:>7.2} m/s", fit.attr_value(ship, velocity)?);

    let afterburner = fit.add_holder(TypeId(2))?;
    println!("With afterburner:  {:>7.2} m/s", fit.attr_value(ship, velocity)?);

    fit.add_holder(TypeId(3))?;
    println!("With skill:        {:>7.2} m/s", fit.attr_value(ship, velocity)?);

    // Removal undoes the module's contribution exactly
    fit.remove_holder(afterburner)?;
    println!("Module removed:    {:>7.2} m/s", fit.attr_value(ship, velocity)?);

    // Repeated reads come from the cache
    let computed = fit.holder(ship).map(|h| h.attributes().calculation_count());
    fit.attr_value(ship, velocity)?;
    println!(
        "\nComputations after a repeat read: {:?} (unchanged)",
        computed
    );

    Ok(())
}
