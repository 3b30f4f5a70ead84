//! Modifier application arithmetic.
//!
//! Pure functions that take a base value and a flat list of resolved
//! modifier values and produce the final attribute value: operation buckets
//! in a fixed order, deterministic assignment resolution, stacking penalties
//! for multiplicative buckets, and metadata-driven rounding/clamping.

use crate::data::{AttributeDef, Rounding};
use crate::modifier::Operation;

/// One applicable modifier with its source value already resolved.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ModifierValue {
    pub operation: Operation,
    pub value: f64,
    /// Subject to the stacking penalty (non-stackable attribute, source
    /// holder's category not penalty-immune).
    pub penalized: bool,
}

/// Apply all modifier buckets to a base value.
///
/// Buckets run in [`Operation::ORDER`]. Assignment buckets overwrite the
/// running value; with competing assignments the winner follows the
/// attribute's `high_is_good` flag, so the outcome never depends on
/// insertion order. Additive buckets sum. Multiplicative buckets multiply,
/// with penalized factors weighted down by rank.
pub(crate) fn apply_modifiers(
    base: f64,
    def: &AttributeDef,
    mods: &[ModifierValue],
    decay: f64,
) -> f64 {
    let mut result = base;
    for operation in Operation::ORDER {
        let bucket: Vec<&ModifierValue> = mods
            .iter()
            .filter(|m| m.operation == operation)
            .collect();
        if bucket.is_empty() {
            continue;
        }
        match operation {
            Operation::PreAssign | Operation::PostAssign => {
                let mut winner = bucket[0].value;
                for m in &bucket[1..] {
                    winner = if def.high_is_good {
                        winner.max(m.value)
                    } else {
                        winner.min(m.value)
                    };
                }
                result = winner;
            }
            Operation::ModAdd => {
                result += bucket.iter().map(|m| m.value).sum::<f64>();
            }
            Operation::ModSub => {
                result -= bucket.iter().map(|m| m.value).sum::<f64>();
            }
            Operation::PreMul | Operation::PreDiv | Operation::PostMul | Operation::PostDiv
            | Operation::PostPercent => {
                let factors: Vec<(f64, bool)> = bucket
                    .iter()
                    .filter_map(|m| Some((normalize_factor(operation, m.value)?, m.penalized)))
                    .collect();
                result = apply_multiplicative(result, factors, decay);
            }
        }
    }
    finalize(result, def)
}

/// Convert a raw modifier value into a multiplication factor.
///
/// Returns `None` for a zero divisor, which is skipped rather than
/// poisoning the result with an infinity.
fn normalize_factor(operation: Operation, value: f64) -> Option<f64> {
    match operation {
        Operation::PreMul | Operation::PostMul => Some(value),
        Operation::PreDiv | Operation::PostDiv => {
            if value == 0.0 {
                None
            } else {
                Some(1.0 / value)
            }
        }
        Operation::PostPercent => Some(1.0 + value / 100.0),
        _ => None,
    }
}

/// Multiply the running value by a bucket of factors.
///
/// Penalty-immune factors apply directly. Penalized factors are split into
/// a boosting chain (factor > 1) and a reducing chain (factor < 1), each
/// ranked by deviation from 1 descending; the i-th factor of a chain is
/// weighted by `exp(-(i / decay)^2)`. Ranking by magnitude is what makes
/// the result independent of insertion order.
fn apply_multiplicative(mut result: f64, factors: Vec<(f64, bool)>, decay: f64) -> f64 {
    let mut boosts = Vec::new();
    let mut reductions = Vec::new();
    for (factor, penalized) in factors {
        if !penalized || factor == 1.0 {
            result *= factor;
        } else if factor > 1.0 {
            boosts.push(factor);
        } else {
            reductions.push(factor);
        }
    }
    for chain in [&mut boosts, &mut reductions] {
        chain.sort_by(|a, b| {
            let da = (a - 1.0).abs();
            let db = (b - 1.0).abs();
            db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
        });
        for (rank, factor) in chain.iter().enumerate() {
            let weight = (-(rank as f64 / decay).powi(2)).exp();
            result *= 1.0 + (factor - 1.0) * weight;
        }
    }
    result
}

/// Metadata-driven rounding and clamping.
fn finalize(value: f64, def: &AttributeDef) -> f64 {
    let mut value = match def.rounding {
        Rounding::None => value,
        Rounding::Integer => value.trunc(),
    };
    if let Some(min) = def.min {
        value = value.max(min);
    }
    if let Some(max) = def.max {
        value = value.min(max);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DEFAULT_PENALTY_DECAY;
    use crate::expression::AttrId;

    fn def() -> AttributeDef {
        AttributeDef::new(AttrId(1))
    }

    fn mv(operation: Operation, value: f64, penalized: bool) -> ModifierValue {
        ModifierValue {
            operation,
            value,
            penalized,
        }
    }

    #[test]
    fn test_bucket_order() {
        // ((10 * 2) + 5) with 50% on top: (10*2 + 5) * 1.5 = 37.5
        let mods = [
            mv(Operation::PostMul, 1.5, false),
            mv(Operation::ModAdd, 5.0, false),
            mv(Operation::PreMul, 2.0, false),
        ];
        let result = apply_modifiers(10.0, &def(), &mods, DEFAULT_PENALTY_DECAY);
        assert!((result - 37.5).abs() < 1e-9);
    }

    #[test]
    fn test_division_and_percent_normalization() {
        let mods = [
            mv(Operation::PostDiv, 2.0, false),
            mv(Operation::PostPercent, 10.0, false),
        ];
        // 100 / 2 * 1.1 = 55
        let result = apply_modifiers(100.0, &def(), &mods, DEFAULT_PENALTY_DECAY);
        assert!((result - 55.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_divisor_skipped() {
        let mods = [mv(Operation::PostDiv, 0.0, false)];
        let result = apply_modifiers(100.0, &def(), &mods, DEFAULT_PENALTY_DECAY);
        assert_eq!(result, 100.0);
    }

    #[test]
    fn test_assignment_winner_follows_high_is_good() {
        let mods = [
            mv(Operation::PostAssign, 50.0, false),
            mv(Operation::PostAssign, 80.0, false),
        ];
        assert_eq!(
            apply_modifiers(10.0, &def(), &mods, DEFAULT_PENALTY_DECAY),
            80.0
        );

        let low = AttributeDef::new(AttrId(1)).low_is_good();
        assert_eq!(
            apply_modifiers(10.0, &low, &mods, DEFAULT_PENALTY_DECAY),
            50.0
        );
    }

    #[test]
    fn test_stacking_penalty_below_naive_product() {
        let mods = [
            mv(Operation::PostPercent, 10.0, true),
            mv(Operation::PostPercent, 10.0, true),
            mv(Operation::PostPercent, 10.0, true),
        ];
        let result = apply_modifiers(100.0, &def(), &mods, DEFAULT_PENALTY_DECAY);
        // Strictly less than the naive 1.1^3, strictly more than a single boost.
        assert!(result < 100.0 * 1.1f64.powi(3));
        assert!(result > 110.0);
    }

    #[test]
    fn test_stacking_penalty_order_independent() {
        let a = [
            mv(Operation::PostPercent, 10.0, true),
            mv(Operation::PostPercent, 25.0, true),
            mv(Operation::PostPercent, 5.0, true),
        ];
        let b = [a[2], a[0], a[1]];
        let ra = apply_modifiers(100.0, &def(), &a, DEFAULT_PENALTY_DECAY);
        let rb = apply_modifiers(100.0, &def(), &b, DEFAULT_PENALTY_DECAY);
        assert!((ra - rb).abs() < 1e-9);
    }

    #[test]
    fn test_penalty_chains_split_by_direction() {
        // One boost and one reduction: both are rank 0 in their own chain,
        // so neither is penalized at all.
        let mods = [
            mv(Operation::PostMul, 1.2, true),
            mv(Operation::PostMul, 0.8, true),
        ];
        let result = apply_modifiers(100.0, &def(), &mods, DEFAULT_PENALTY_DECAY);
        assert!((result - 100.0 * 1.2 * 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_immune_factors_bypass_penalty() {
        let penalized = [
            mv(Operation::PostPercent, 10.0, true),
            mv(Operation::PostPercent, 10.0, true),
        ];
        let immune = [
            mv(Operation::PostPercent, 10.0, false),
            mv(Operation::PostPercent, 10.0, false),
        ];
        let rp = apply_modifiers(100.0, &def(), &penalized, DEFAULT_PENALTY_DECAY);
        let ri = apply_modifiers(100.0, &def(), &immune, DEFAULT_PENALTY_DECAY);
        assert!((ri - 121.0).abs() < 1e-9);
        assert!(rp < ri);
    }

    #[test]
    fn test_rounding_and_clamping() {
        let int_def = AttributeDef::new(AttrId(1)).integer();
        let mods = [mv(Operation::PostPercent, 15.0, false)];
        // 10 * 1.15 = 11.5 -> 11
        assert_eq!(
            apply_modifiers(10.0, &int_def, &mods, DEFAULT_PENALTY_DECAY),
            11.0
        );

        let clamped = AttributeDef::new(AttrId(1)).range(0.0, 100.0);
        let big = [mv(Operation::PostMul, 50.0, false)];
        assert_eq!(
            apply_modifiers(10.0, &clamped, &big, DEFAULT_PENALTY_DECAY),
            100.0
        );
    }
}
