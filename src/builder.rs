//! Modifier builder.
//!
//! Converts an effect's pre/post expression trees (or its flat modifier-info
//! records) into structured [`Modifier`]s. All tree-shape recognition and
//! operator normalization happens here, once per effect; calculation never
//! branches on raw expression data. Building is deterministic and
//! side-effect-free, which is what makes the per-source [`BuilderCache`]
//! sound.

use crate::condition::{Atom, CompOp, LogicOp, MathOp};
use crate::error::BuildError;
use crate::expression::{ExprId, Expression, Operand};
use crate::modifier::{FilterType, Location, Modifier, ModifierFunc, ModifierInfo, Operation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Outcome quality of a build.
///
/// `Partial` results are never silently treated as complete: the status
/// travels with the modifier set and is stored on the effect, so callers can
/// tell an intentionally inert effect (`Full` with zero modifiers) from one
/// the builder could not interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildStatus {
    /// Every node of both trees was recognized.
    Full,
    /// At least one sub-tree was skipped as unrecognized.
    Partial,
}

/// Stateless converter from raw effect data to structured modifiers.
///
/// # Examples
///
/// ```rust
/// use fitcalc::builder::{BuildStatus, ModifierBuilder};
/// use fitcalc::expression::{ExprId, Expression, Operand};
///
/// // An intentionally inert effect: integer stub on both sides.
/// let pre = Expression::new(ExprId(1), Operand::DefInt).value("0").build();
/// let post = Expression::new(ExprId(2), Operand::DefInt).value("0").build();
///
/// let (modifiers, status) = ModifierBuilder::build_expressions(&pre, &post).unwrap();
/// assert!(modifiers.is_empty());
/// assert_eq!(status, BuildStatus::Full);
/// ```
pub struct ModifierBuilder;

impl ModifierBuilder {
    /// Build modifiers from a pre/post expression pair.
    ///
    /// Each add-action found in `pre` must have a structurally matching
    /// remove-action in `post`; a disagreement is [`BuildError::Mismatch`].
    /// Unrecognized sub-trees are skipped and reported through a `Partial`
    /// status instead.
    pub fn build_expressions(
        pre: &Expression,
        post: &Expression,
    ) -> Result<(Vec<Modifier>, BuildStatus), BuildError> {
        let mut partial = false;

        let mut adds = Vec::new();
        collect_actions(pre, Polarity::Add, None, &mut adds, &mut partial)?;
        let mut removes = Vec::new();
        collect_actions(post, Polarity::Remove, None, &mut removes, &mut partial)?;

        // Pair every add with a structurally identical remove. Conditions are
        // ignored for pairing; the pre side's conditions win.
        let mut out = Vec::with_capacity(adds.len());
        for add in adds {
            match removes.iter().position(|rem| rem.same_shape(&add)) {
                Some(idx) => {
                    removes.swap_remove(idx);
                    out.push(add);
                }
                None => {
                    return Err(BuildError::Mismatch(format!(
                        "no remove action matches add of {} on {}/{:?}",
                        add.tgt_attr, add.location, add.filter
                    )));
                }
            }
        }
        if let Some(orphan) = removes.first() {
            return Err(BuildError::Mismatch(format!(
                "remove action of {} on {}/{:?} has no matching add",
                orphan.tgt_attr, orphan.location, orphan.filter
            )));
        }

        let status = if partial {
            debug!(pre = %pre.id, post = %post.id, "expression pair built partially");
            BuildStatus::Partial
        } else {
            BuildStatus::Full
        };
        Ok((out, status))
    }

    /// Build modifiers from a flat modifier-info list.
    ///
    /// Semantically equivalent to the expression path. A record missing its
    /// required filter value is skipped and the build reported `Partial`.
    pub fn build_infos(infos: &[ModifierInfo]) -> (Vec<Modifier>, BuildStatus) {
        let mut partial = false;
        let mut out = Vec::with_capacity(infos.len());
        for info in infos {
            match convert_info(info) {
                Some(modifier) => out.push(modifier),
                None => {
                    debug!(?info.func, "modifier info record skipped");
                    partial = true;
                }
            }
        }
        let status = if partial {
            BuildStatus::Partial
        } else {
            BuildStatus::Full
        };
        (out, status)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Polarity {
    Add,
    Remove,
}

fn action_polarity(operand: Operand) -> Option<Polarity> {
    match operand {
        Operand::AddItemModifier
        | Operand::AddLocationModifier
        | Operand::AddLocationGroupModifier
        | Operand::AddLocationSkillModifier
        | Operand::AddOwnerSkillModifier
        | Operand::AddGangItemModifier
        | Operand::AddGangGroupModifier
        | Operand::AddGangSkillModifier => Some(Polarity::Add),
        Operand::RemoveItemModifier
        | Operand::RemoveLocationModifier
        | Operand::RemoveLocationGroupModifier
        | Operand::RemoveLocationSkillModifier
        | Operand::RemoveOwnerSkillModifier
        | Operand::RemoveGangItemModifier
        | Operand::RemoveGangGroupModifier
        | Operand::RemoveGangSkillModifier => Some(Polarity::Remove),
        _ => None,
    }
}

/// Recursively classify a tree node: stub, action, splice or conditional.
fn collect_actions(
    expr: &Expression,
    expected: Polarity,
    conditions: Option<Atom>,
    out: &mut Vec<Modifier>,
    partial: &mut bool,
) -> Result<(), BuildError> {
    if let Some(polarity) = action_polarity(expr.operand) {
        if polarity != expected {
            return Err(BuildError::Mismatch(format!(
                "{} action found on the {} side",
                match polarity {
                    Polarity::Add => "add",
                    Polarity::Remove => "remove",
                },
                match expected {
                    Polarity::Add => "pre",
                    Polarity::Remove => "post",
                },
            )));
        }
        match parse_action(expr) {
            Some(mut modifier) => {
                modifier.conditions = conditions;
                out.push(modifier);
            }
            None => *partial = true,
        }
        return Ok(());
    }

    match expr.operand {
        // Inert stubs: integer 0/1 or boolean true.
        Operand::DefInt => {
            if !matches!(expr.int_value(), Some(0) | Some(1)) {
                *partial = true;
            }
        }
        Operand::DefBool => {
            if expr.bool_value() != Some(true) {
                *partial = true;
            }
        }
        Operand::Splice => {
            for child in [&expr.arg1, &expr.arg2] {
                match child {
                    Some(child) => {
                        collect_actions(child, expected, conditions.clone(), out, partial)?
                    }
                    None => *partial = true,
                }
            }
        }
        Operand::IfThenElse => {
            collect_conditional(expr, expected, conditions, out, partial)?;
        }
        _ => *partial = true,
    }
    Ok(())
}

/// `IfThenElse(arg1 = If(cond, then), arg2 = else)`. The then branch keeps
/// the condition tree as-is; the else branch gets the polarity-inverted
/// tree. Nested conditionals compose with logical AND of the path taken.
fn collect_conditional(
    expr: &Expression,
    expected: Polarity,
    conditions: Option<Atom>,
    out: &mut Vec<Modifier>,
    partial: &mut bool,
) -> Result<(), BuildError> {
    let (if_node, else_branch) = match (&expr.arg1, &expr.arg2) {
        (Some(if_node), Some(else_branch)) if if_node.operand == Operand::If => {
            (if_node, else_branch)
        }
        _ => {
            *partial = true;
            return Ok(());
        }
    };
    let (cond_tree, then_branch) = match (&if_node.arg1, &if_node.arg2) {
        (Some(cond), Some(then)) => (cond, then),
        _ => {
            *partial = true;
            return Ok(());
        }
    };
    let atom = match parse_condition(cond_tree) {
        Some(atom) => atom,
        None => {
            // Whole conditional is unusable without its condition.
            *partial = true;
            return Ok(());
        }
    };

    let then_cond = combine(conditions.clone(), atom.clone());
    collect_actions(then_branch, expected, Some(then_cond), out, partial)?;
    let else_cond = combine(conditions, atom.inverted());
    collect_actions(else_branch, expected, Some(else_cond), out, partial)?;
    Ok(())
}

fn combine(outer: Option<Atom>, inner: Atom) -> Atom {
    match outer {
        Some(outer) => Atom::logic(LogicOp::And, outer, inner),
        None => inner,
    }
}

/// Extract a structured modifier from an action node.
///
/// Shape: `action(arg1 = GenericAttribute(DefOperator, ItemAttribute(loc
/// spec, DefAttribute tgt)), arg2 = DefAttribute src)`. Returns `None` for
/// any deviation, which the caller reports as a partial build.
fn parse_action(expr: &Expression) -> Option<Modifier> {
    let tgt_spec = expr.arg1.as_deref()?;
    if tgt_spec.operand != Operand::GenericAttribute {
        return None;
    }
    let optr_node = tgt_spec.arg1.as_deref()?;
    if optr_node.operand != Operand::DefOperator {
        return None;
    }
    let operation = Operation::from_literal(optr_node.value.as_deref()?)?;

    let item_attr = tgt_spec.arg2.as_deref()?;
    if item_attr.operand != Operand::ItemAttribute {
        return None;
    }
    let loc_spec = item_attr.arg1.as_deref()?;
    let tgt_attr = def_attribute(item_attr.arg2.as_deref()?)?;
    let src_attr = def_attribute(expr.arg2.as_deref()?)?;

    let (location, filter, gang) = match expr.operand {
        Operand::AddItemModifier | Operand::RemoveItemModifier => {
            (def_location(loc_spec)?, FilterType::Direct, false)
        }
        Operand::AddGangItemModifier | Operand::RemoveGangItemModifier => {
            (def_location(loc_spec)?, FilterType::Direct, true)
        }
        Operand::AddLocationModifier | Operand::RemoveLocationModifier => {
            (def_location(loc_spec)?, FilterType::All, false)
        }
        Operand::AddLocationGroupModifier | Operand::RemoveLocationGroupModifier => {
            let (location, group) = location_group(loc_spec)?;
            (location, FilterType::Group(group), false)
        }
        Operand::AddGangGroupModifier | Operand::RemoveGangGroupModifier => {
            let (location, group) = location_group(loc_spec)?;
            (location, FilterType::Group(group), true)
        }
        Operand::AddLocationSkillModifier | Operand::RemoveLocationSkillModifier => {
            let (location, skill) = location_skill(loc_spec)?;
            (location, FilterType::SkillRequired(skill), false)
        }
        Operand::AddGangSkillModifier | Operand::RemoveGangSkillModifier => {
            let (location, skill) = location_skill(loc_spec)?;
            (location, FilterType::SkillRequired(skill), true)
        }
        Operand::AddOwnerSkillModifier | Operand::RemoveOwnerSkillModifier => {
            let (location, skill) = location_skill(loc_spec)?;
            (location, FilterType::OwnerSkillRequired(skill), false)
        }
        _ => return None,
    };

    let mut modifier = Modifier::new(operation, location, filter, src_attr, tgt_attr);
    modifier.gang = gang;
    Some(modifier)
}

fn def_attribute(node: &Expression) -> Option<crate::expression::AttrId> {
    if node.operand == Operand::DefAttribute {
        node.attribute_id
    } else {
        None
    }
}

fn def_location(node: &Expression) -> Option<Location> {
    if node.operand == Operand::DefLocation {
        Location::from_literal(node.value.as_deref()?)
    } else {
        None
    }
}

fn location_group(node: &Expression) -> Option<(Location, crate::expression::GroupId)> {
    if node.operand != Operand::LocationGroup {
        return None;
    }
    let location = def_location(node.arg1.as_deref()?)?;
    let group_node = node.arg2.as_deref()?;
    if group_node.operand != Operand::DefGroup {
        return None;
    }
    Some((location, group_node.group_id?))
}

fn location_skill(node: &Expression) -> Option<(Location, crate::expression::TypeId)> {
    if node.operand != Operand::LocationSkillRequired {
        return None;
    }
    let location = def_location(node.arg1.as_deref()?)?;
    let type_node = node.arg2.as_deref()?;
    if type_node.operand != Operand::DefType {
        return None;
    }
    Some((location, type_node.type_id?))
}

/// Walk a condition sub-tree into an [`Atom`] tree.
fn parse_condition(expr: &Expression) -> Option<Atom> {
    let binary = |expr: &Expression| -> Option<(Atom, Atom)> {
        let left = parse_condition(expr.arg1.as_deref()?)?;
        let right = parse_condition(expr.arg2.as_deref()?)?;
        Some((left, right))
    };
    match expr.operand {
        Operand::And => {
            let (l, r) = binary(expr)?;
            Some(Atom::logic(LogicOp::And, l, r))
        }
        Operand::Or => {
            let (l, r) = binary(expr)?;
            Some(Atom::logic(LogicOp::Or, l, r))
        }
        Operand::Eq => {
            let (l, r) = binary(expr)?;
            Some(Atom::comparison(CompOp::Eq, l, r))
        }
        Operand::NotEq => {
            let (l, r) = binary(expr)?;
            Some(Atom::comparison(CompOp::NotEq, l, r))
        }
        Operand::GreaterThan => {
            let (l, r) = binary(expr)?;
            Some(Atom::comparison(CompOp::Greater, l, r))
        }
        Operand::GreaterEq => {
            let (l, r) = binary(expr)?;
            Some(Atom::comparison(CompOp::GreaterEq, l, r))
        }
        Operand::Add => {
            let (l, r) = binary(expr)?;
            Some(Atom::math(MathOp::Add, l, r))
        }
        Operand::Sub => {
            let (l, r) = binary(expr)?;
            Some(Atom::math(MathOp::Sub, l, r))
        }
        Operand::Mul => {
            let (l, r) = binary(expr)?;
            Some(Atom::math(MathOp::Mul, l, r))
        }
        Operand::DefInt | Operand::DefFloat => Some(Atom::Value(expr.float_value()?)),
        Operand::ItemAttribute => {
            let location = def_location(expr.arg1.as_deref()?)?;
            let attr = def_attribute(expr.arg2.as_deref()?)?;
            Some(Atom::ValueRef { location, attr })
        }
        _ => None,
    }
}

fn convert_info(info: &ModifierInfo) -> Option<Modifier> {
    let (filter, gang) = match info.func {
        ModifierFunc::ItemModifier => (FilterType::Direct, false),
        ModifierFunc::LocationModifier => (FilterType::All, false),
        ModifierFunc::LocationGroupModifier => (FilterType::Group(info.group?), false),
        ModifierFunc::LocationRequiredSkillModifier => {
            (FilterType::SkillRequired(info.skill?), false)
        }
        ModifierFunc::OwnerRequiredSkillModifier => {
            (FilterType::OwnerSkillRequired(info.skill?), false)
        }
        ModifierFunc::GangItemModifier => (FilterType::Direct, true),
        ModifierFunc::GangGroupModifier => (FilterType::Group(info.group?), true),
        ModifierFunc::GangRequiredSkillModifier => (FilterType::SkillRequired(info.skill?), true),
    };
    let mut modifier = Modifier::new(
        info.operation,
        info.domain,
        filter,
        info.src_attr,
        info.tgt_attr,
    );
    modifier.gang = gang;
    Some(modifier)
}

/// Memoizes builder output keyed by immutable input identity.
///
/// One cache instance is scoped per loaded data-source generation; it is
/// never a process-wide global. Caching is sound because building is
/// deterministic: identical trees always yield identical modifier sets.
#[derive(Default)]
pub struct BuilderCache {
    by_expressions: HashMap<(ExprId, ExprId), Result<(Vec<Arc<Modifier>>, BuildStatus), BuildError>>,
    by_infos: HashMap<crate::expression::EffectId, (Vec<Arc<Modifier>>, BuildStatus)>,
}

impl BuilderCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build (or fetch) the modifiers for a pre/post expression pair.
    pub fn build_expressions(
        &mut self,
        pre: &Expression,
        post: &Expression,
    ) -> Result<(Vec<Arc<Modifier>>, BuildStatus), BuildError> {
        self.by_expressions
            .entry((pre.id, post.id))
            .or_insert_with(|| {
                ModifierBuilder::build_expressions(pre, post)
                    .map(|(mods, status)| (mods.into_iter().map(Arc::new).collect(), status))
            })
            .clone()
    }

    /// Build (or fetch) the modifiers for an effect's modifier-info list.
    pub fn build_infos(
        &mut self,
        effect: crate::expression::EffectId,
        infos: &[ModifierInfo],
    ) -> (Vec<Arc<Modifier>>, BuildStatus) {
        self.by_infos
            .entry(effect)
            .or_insert_with(|| {
                let (mods, status) = ModifierBuilder::build_infos(infos);
                (mods.into_iter().map(Arc::new).collect(), status)
            })
            .clone()
    }

    /// Number of cached builds.
    pub fn len(&self) -> usize {
        self.by_expressions.len() + self.by_infos.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.by_expressions.is_empty() && self.by_infos.is_empty()
    }
}
