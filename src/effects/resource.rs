//! Bounded resources with deferred cap settlement.
//!
//! Health, energy and the like live in `0..=max`. A gain applied while an
//! effect is still resolving may be allowed to exceed the cap temporarily
//! so that "heal, then take damage, then resolve" nets correctly; the
//! overflow is reconciled by [`BoundedResource::settle`] at the game's
//! settlement point (attack or phase resolution).

use serde::{Deserialize, Serialize};

/// When the cap applies to a gain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Settlement {
    /// Clamp to the cap right away.
    #[default]
    Immediate,
    /// Allow overflow until the next `settle`.
    Deferred,
}

/// A value clamped to `0..=max`, except for deferred overflow.
///
/// ```
/// use tabletop_engine::effects::{BoundedResource, Settlement};
///
/// let mut hp = BoundedResource::full(10);
/// hp.gain(3, Settlement::Deferred);
/// hp.lose(5);
/// hp.settle();
/// assert_eq!(hp.value, 8);
///
/// let mut capped = BoundedResource::full(10);
/// capped.gain(3, Settlement::Immediate);
/// capped.lose(5);
/// assert_eq!(capped.value, 5);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedResource {
    pub value: i64,
    pub max: i64,
}

impl BoundedResource {
    pub fn new(value: i64, max: i64) -> Self {
        Self {
            value: value.clamp(0, max.max(0)),
            max: max.max(0),
        }
    }

    pub fn full(max: i64) -> Self {
        Self::new(max, max)
    }

    /// Add `amount` (negative amounts are ignored).
    pub fn gain(&mut self, amount: i64, settlement: Settlement) {
        let raised = self.value.saturating_add(amount.max(0));
        self.value = match settlement {
            Settlement::Immediate => raised.min(self.max.max(self.value)),
            Settlement::Deferred => raised,
        };
    }

    /// Remove `amount`, flooring at zero. Returns how much was actually
    /// removed.
    pub fn lose(&mut self, amount: i64) -> i64 {
        let before = self.value;
        self.value = self.value.saturating_sub(amount.max(0)).max(0);
        before - self.value
    }

    /// Reconcile overflow. Returns how much was trimmed.
    pub fn settle(&mut self) -> i64 {
        let trimmed = (self.value - self.max).max(0);
        self.value -= trimmed;
        trimmed
    }

    #[must_use]
    pub fn is_over_cap(&self) -> bool {
        self.value > self.max
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value == 0
    }
}
