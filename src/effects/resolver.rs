//! Magnitude resolution.
//!
//! `MagnitudeCalculation` turns a base value plus collected modifiers
//! into a final magnitude and the [`MagnitudeApplied`] payload that
//! records how it was derived. Games read their state into the pipeline
//! through the [`MagnitudeSource`] accessor, and fold the payload back
//! with [`MagnitudeApplied::settle_against`], which is the one place a
//! shield reduces a magnitude.
//!
//! ## Example Usage
//!
//! ```
//! use im::{vector, Vector};
//! use tabletop_engine::core::EntityId;
//! use tabletop_engine::effects::{MagnitudeCalculation, MagnitudeRequest, MagnitudeSource, Shield};
//!
//! struct Arena;
//! impl MagnitudeSource for Arena {
//!     fn contains_entity(&self, entity: EntityId) -> bool {
//!         entity.raw() < 2
//!     }
//!     fn shields(&self, _target: EntityId) -> Vector<Shield> {
//!         vector![Shield::new("ward", 6)]
//!     }
//! }
//!
//! let hit = MagnitudeCalculation::resolve(&Arena, &MagnitudeRequest::new(EntityId(0), EntityId(1), 11)).unwrap();
//! // Shields are not pre-applied by default.
//! assert_eq!(hit.amount, 11);
//!
//! // The fold takes the shield exactly once.
//! let settled = hit.settle_against(&Arena.shields(EntityId(1)));
//! assert_eq!(settled.dealt, 5);
//! assert!(settled.shields.is_empty());
//! ```

use im::Vector;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::modifier::{AppliedModifier, Modifier, ModifierKind, ModifierOrigin, ModifierStack};
use super::shield::{absorb, deplete, Shield, ShieldAbsorption};
use crate::core::{EntityId, Event};
use crate::error::{EngineError, Result};
use crate::rules::CommandContext;

/// Read access the pipeline needs into a game's state.
pub trait MagnitudeSource {
    /// Whether `entity` currently exists.
    fn contains_entity(&self, entity: EntityId) -> bool;

    /// Modifiers contributed by tokens the source holds.
    fn token_modifiers(&self, _source: EntityId) -> Vec<Modifier> {
        Vec::new()
    }

    /// Modifiers contributed by statuses on the target.
    fn status_modifiers(&self, _target: EntityId) -> Vec<Modifier> {
        Vec::new()
    }

    /// The target's shields in grant order.
    fn shields(&self, _target: EntityId) -> Vector<Shield> {
        Vector::new()
    }
}

/// Which origins are collected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectOptions {
    pub tokens: bool,
    pub statuses: bool,
    /// Pre-apply shields inside the pipeline instead of at fold time.
    pub shields: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            tokens: true,
            statuses: true,
            shields: false,
        }
    }
}

/// Who consumes shields for a payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShieldMode {
    /// The fold absorbs `amount` against the target's shields.
    #[default]
    Deferred,
    /// `amount` is already net of shields; the fold only depletes them.
    Preapplied,
    /// Shields are ignored.
    Bypass,
}

/// Input to one resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MagnitudeRequest {
    pub source: EntityId,
    pub target: EntityId,
    pub base: i64,
    pub ability: Option<String>,
    pub collect: CollectOptions,
    pub additional: Vec<Modifier>,
    pub bypass_shields: bool,
}

impl MagnitudeRequest {
    pub fn new(source: EntityId, target: EntityId, base: i64) -> Self {
        Self {
            source,
            target,
            base,
            ability: None,
            collect: CollectOptions::default(),
            additional: Vec::new(),
            bypass_shields: false,
        }
    }

    #[must_use]
    pub fn with_ability(mut self, ability: impl Into<String>) -> Self {
        self.ability = Some(ability.into());
        self
    }

    #[must_use]
    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.additional.push(modifier);
        self
    }

    #[must_use]
    pub fn with_collect(mut self, collect: CollectOptions) -> Self {
        self.collect = collect;
        self
    }

    #[must_use]
    pub fn collect_shields(mut self) -> Self {
        self.collect.shields = true;
        self
    }

    #[must_use]
    pub fn bypass_shields(mut self) -> Self {
        self.bypass_shields = true;
        self
    }

    #[must_use]
    pub fn retarget(&self, target: EntityId) -> Self {
        Self {
            target,
            ..self.clone()
        }
    }

    fn shield_mode(&self) -> ShieldMode {
        if self.bypass_shields {
            ShieldMode::Bypass
        } else if self.collect.shields {
            ShieldMode::Preapplied
        } else {
            ShieldMode::Deferred
        }
    }
}

/// How a magnitude was derived.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    pub base: i64,
    pub steps: Vec<AppliedModifier>,
}

/// Canonical "magnitude applied" payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagnitudeApplied {
    pub source: EntityId,
    pub target: EntityId,
    pub ability: Option<String>,
    pub base: i64,
    /// Final magnitude, never negative.
    pub amount: i64,
    pub breakdown: Breakdown,
    /// Absorption taken up front, in grant order. Only pre-applied
    /// payloads carry records; deferred absorption is decided by the fold
    /// and reported in [`ShieldSettlement::absorbed`].
    pub shields: Vec<ShieldAbsorption>,
    pub shield_mode: ShieldMode,
}

/// Outcome of folding a payload against the target's shields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShieldSettlement {
    /// What actually reaches the target.
    pub dealt: i64,
    /// The target's shield queue afterwards.
    pub shields: Vector<Shield>,
    /// What the shields actually took.
    pub absorbed: Vec<ShieldAbsorption>,
}

impl MagnitudeApplied {
    /// Consume shields for this payload. Call exactly once, from the fold.
    ///
    /// A pre-applied payload whose shields were consumed after it was
    /// resolved deals the absorption it can no longer claim.
    pub fn settle_against(&self, shields: &Vector<Shield>) -> ShieldSettlement {
        match self.shield_mode {
            ShieldMode::Deferred => {
                let result = absorb(shields, self.amount);
                ShieldSettlement {
                    dealt: result.remaining,
                    shields: result.shields,
                    absorbed: result.records,
                }
            }
            ShieldMode::Preapplied => {
                let result = deplete(shields, &self.shields);
                ShieldSettlement {
                    dealt: self.amount + result.remaining,
                    shields: result.shields,
                    absorbed: result.records,
                }
            }
            ShieldMode::Bypass => ShieldSettlement {
                dealt: self.amount,
                shields: shields.clone(),
                absorbed: Vec::new(),
            },
        }
    }

    #[must_use]
    pub fn total_absorbed(&self) -> i64 {
        self.shields.iter().map(|s| s.absorbed).sum()
    }

    /// The canonical event sequence for this payload.
    pub fn to_events<E: From<MagnitudeApplied>>(&self, ctx: &CommandContext) -> Vec<Event<E>> {
        vec![ctx.domain(E::from(self.clone()))]
    }
}

/// The pipeline.
pub struct MagnitudeCalculation;

impl MagnitudeCalculation {
    /// Resolve one request.
    pub fn resolve<S: MagnitudeSource + ?Sized>(
        view: &S,
        request: &MagnitudeRequest,
    ) -> Result<MagnitudeApplied> {
        Self::resolve_against(view, request, None)
    }

    /// Resolve the same request against several targets, e.g. an area
    /// effect. Fails on the first missing entity.
    ///
    /// A target listed more than once sees the shields earlier hits left
    /// behind, so folding the returned payloads in order never counts a
    /// shield twice.
    pub fn resolve_batch<S: MagnitudeSource + ?Sized>(
        view: &S,
        request: &MagnitudeRequest,
        targets: &[EntityId],
    ) -> Result<Vec<MagnitudeApplied>> {
        let mut queues: FxHashMap<EntityId, Vector<Shield>> = FxHashMap::default();
        let mut hits = Vec::with_capacity(targets.len());
        for &target in targets {
            let shields = queues.get(&target).cloned();
            let hit = Self::resolve_against(view, &request.retarget(target), shields.as_ref())?;
            let before = shields.unwrap_or_else(|| view.shields(target));
            queues.insert(target, hit.settle_against(&before).shields);
            hits.push(hit);
        }
        Ok(hits)
    }

    /// `shields` overrides the target's queue as read from `view`.
    fn resolve_against<S: MagnitudeSource + ?Sized>(
        view: &S,
        request: &MagnitudeRequest,
        shields: Option<&Vector<Shield>>,
    ) -> Result<MagnitudeApplied> {
        for entity in [request.source, request.target] {
            if !view.contains_entity(entity) {
                return Err(EngineError::UnknownEntity { entity });
            }
        }

        let mut stack = ModifierStack::new();
        if request.collect.tokens {
            stack.extend(view.token_modifiers(request.source));
        }
        if request.collect.statuses {
            stack.extend(view.status_modifiers(request.target));
        }
        stack.extend(request.additional.iter().cloned());

        let (total, mut steps) = stack.apply(request.base);
        let mut amount = total.max(0);

        let shield_mode = request.shield_mode();
        let records = match shield_mode {
            ShieldMode::Bypass | ShieldMode::Deferred => Vec::new(),
            ShieldMode::Preapplied => {
                let queue = shields.cloned().unwrap_or_else(|| view.shields(request.target));
                let result = absorb(&queue, amount);
                for record in &result.records {
                    amount -= record.absorbed;
                    steps.push(AppliedModifier {
                        id: record.source_id.clone(),
                        origin: ModifierOrigin::Shield,
                        kind: ModifierKind::Flat(-record.absorbed),
                        delta: -record.absorbed,
                        source_id: None,
                        label: None,
                        running_total: amount,
                    });
                }
                result.records
            }
        };

        tracing::trace!(
            source = %request.source,
            target = %request.target,
            base = request.base,
            amount,
            ?shield_mode,
            "magnitude resolved"
        );

        Ok(MagnitudeApplied {
            source: request.source,
            target: request.target,
            ability: request.ability.clone(),
            base: request.base,
            amount,
            breakdown: Breakdown {
                base: request.base,
                steps,
            },
            shields: records,
            shield_mode,
        })
    }
}
