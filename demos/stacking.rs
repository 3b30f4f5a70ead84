//! Stacking penalty example: competing multiplicative bonuses
//!
//! This example demonstrates:
//! - How identical module bonuses degrade with rank
//! - Penalty immunity for stackable attributes

use fitcalc::builder::BuildStatus;
use fitcalc::data::{AttributeDef, Category, DataSource, Effect, ItemType};
use fitcalc::*;
use std::sync::Arc;

fn main() -> Result<(), CalcError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let velocity = AttrId(37);
    let cargo = AttrId(38);
    let boost = AttrId(306);

    let mut source = DataSource::new();
    // Velocity takes stacking penalties; cargo capacity does not.
    source.add_attribute(AttributeDef::new(velocity));
    source.add_attribute(AttributeDef::new(cargo).stackable());
    source.add_attribute(AttributeDef::new(boost).stackable());

    source.add_type(
        ItemType::new(TypeId(1), GroupId(25), Category::Ship)
            .attr(velocity, 100.0)
            .attr(cargo, 100.0),
    );

    // Five identical modules, each +10% to both attributes
    for (attr, type_id) in [(velocity, 2), (cargo, 3)] {
        let modifier = Modifier::new(
            Operation::PostPercent,
            Location::Ship,
            FilterType::Direct,
            boost,
            attr,
        );
        source.add_type(
            ItemType::new(TypeId(type_id), GroupId(46), Category::Module)
                .attr(boost, 10.0)
                .effect(Effect::new(
                    EffectId(type_id),
                    vec![Arc::new(modifier)],
                    BuildStatus::Full,
                )),
        );
    }

    let source = Arc::new(source);
    println!("Five +10% modules on each attribute:\n");
    println!("{:>8} {:>12} {:>12} {:>10}", "modules", "velocity", "cargo", "naive");

    for count in 0..=5 {
        let mut fit = Fit::new(Arc::clone(&source));
        let ship = fit.add_holder(TypeId(1))?;
        for _ in 0..count {
            fit.add_holder(TypeId(2))?;
            fit.add_holder(TypeId(3))?;
        }
        println!(
            "{:>8} {:>12.2} {:>12.2} {:>10.2}",
            count,
            fit.attr_value(ship, velocity)?,
            fit.attr_value(ship, cargo)?,
            100.0 * 1.1f64.powi(count),
        );
    }

    println!("\nVelocity falls behind the naive product: each additional");
    println!("penalized bonus is weighted down by its rank. Cargo is a");
    println!("stackable attribute and multiplies in full.");
    Ok(())
}
