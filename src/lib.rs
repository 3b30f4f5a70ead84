//! # fitcalc - Lazy, Metadata-Driven Fitting Attribute Engine
//!
//! An attribute calculation engine for ship fittings that provides:
//! - **Structured modifiers** built once from raw game data (expression
//!   trees or flat modifier-info records) and shared between fits
//! - **Lazy** per-holder attribute caches (values computed on first read)
//! - **Exact invalidation** (a change drops only the cache entries whose
//!   inputs changed, found through a dependency graph)
//! - **Deterministic stacking penalties** on competing multiplicative
//!   bonuses, independent of insertion order
//!
//! ## Core Concepts
//!
//! ### Calculation Pipeline
//!
//! Attribute values flow through a simple pipeline:
//!
//! ```text
//! [Expression] → [ModifierBuilder] → [Modifier]
//!                                        │
//! [Fit / holders] ── AffectionRegister ──┘
//!        │
//!   [AttributeMap]  (lazy cache, invalidated via DependencyTracker)
//! ```
//!
//! 1. **Expressions** are decoded game data; the builder compiles each
//!    effect's pre/post pair into structured [`Modifier`]s once
//! 2. **Holders** carry item types into a [`Fit`]; the affection register
//!    indexes which modifiers reach which holders
//! 3. **Reads** walk applicable modifiers, resolve source attributes
//!    recursively, and cache the result per holder
//!
//! ### Key Features
//!
//! - **Affection Register**: bidirectional holder/modifier index, no fit
//!   scans at calculation time
//! - **Dependency Tracking**: recorded during computation, replayed for
//!   cascade invalidation
//! - **Cycle Detection**: circular modifier data is reported as an error,
//!   never a stale value
//! - **Metadata-Driven**: rounding, clamping, penalty immunity and
//!   assignment tie-breaking come from attribute definitions, not code
//!
//! ## Example
//!
//! ```rust
//! use fitcalc::*;
//! use fitcalc::data::{AttributeDef, Category, DataSource, Effect, ItemType};
//! use std::sync::Arc;
//!
//! let velocity = AttrId(37);
//! let boost = AttrId(306);
//!
//! let mut source = DataSource::new();
//! source.add_attribute(AttributeDef::new(velocity).stackable());
//! source.add_attribute(AttributeDef::new(boost).stackable());
//! source.add_type(ItemType::new(TypeId(1), GroupId(25), Category::Ship).attr(velocity, 100.0));
//!
//! let afterburner = Modifier::new(
//!     Operation::PostPercent,
//!     Location::Ship,
//!     FilterType::Direct,
//!     boost,
//!     velocity,
//! );
//! source.add_type(
//!     ItemType::new(TypeId(2), GroupId(46), Category::Module)
//!         .attr(boost, 10.0)
//!         .effect(Effect::new(EffectId(1), vec![Arc::new(afterburner)], BuildStatus::Full)),
//! );
//!
//! let mut fit = Fit::new(Arc::new(source));
//! let ship = fit.add_holder(TypeId(1)).unwrap();
//! fit.add_holder(TypeId(2)).unwrap();
//! assert!((fit.attr_value(ship, velocity).unwrap() - 110.0).abs() < 1e-9);
//! ```
//!
//! ## Modules
//!
//! - [`expression`] - Raw expression trees and id newtypes
//! - [`builder`] - Expression/modifier-info compilation into modifiers
//! - [`modifier`] - Structured modifier model
//! - [`condition`] - Condition trees for conditional modifiers
//! - [`data`] - Item types, effects, attribute metadata, data sources
//! - [`holder`] - Fit-local item instances
//! - [`register`] - Affection register (who modifies whom)
//! - [`graph`] - Attribute dependency tracking
//! - [`map`] - Per-holder attribute caches
//! - [`fit`] - Fits and the calculation service
//! - [`error`] - Error types

pub mod builder;
pub(crate) mod calc;
pub mod condition;
pub mod data;
pub mod error;
pub mod expression;
pub mod fit;
pub mod graph;
pub mod holder;
pub mod map;
pub mod modifier;
pub mod register;

// Re-export main types for convenience
pub use builder::{BuildStatus, BuilderCache, ModifierBuilder};
pub use condition::Atom;
pub use data::DataSource;
pub use error::{BuildError, CalcError};
pub use expression::{AttrId, EffectId, ExprId, Expression, GroupId, Operand, TypeId};
pub use fit::Fit;
pub use holder::{Holder, HolderId, HolderKind, State};
pub use map::AttributeMap;
pub use modifier::{FilterType, Location, Modifier, ModifierFunc, ModifierInfo, Operation};
pub use register::AffectionRegister;
