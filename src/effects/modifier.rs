//! Magnitude modifiers and their application order.
//!
//! A modifier either adds a flat amount or scales the running total by a
//! percentage. Every flat modifier applies before any percentage one;
//! within each kind modifiers apply by ascending priority, and equal
//! priorities keep the order they were collected in.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::core::EntityId;

/// Priority bands used by the collectors. Games may use any value.
pub mod priority {
    pub const TOKEN: i32 = 10;
    pub const STATUS: i32 = 20;
    pub const PREVENTION: i32 = 25;
    pub const SHIELD: i32 = 100;
}

/// How a modifier changes the running total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierKind {
    /// Add this amount (negative to reduce).
    Flat(i64),
    /// Scale by this many percent (`50` is +50%, `-50` halves).
    Percent(i64),
}

impl ModifierKind {
    const fn stage(self) -> u8 {
        match self {
            ModifierKind::Flat(_) => 0,
            ModifierKind::Percent(_) => 1,
        }
    }

    /// The new running total after applying to `total`.
    #[must_use]
    pub fn apply(self, total: i64) -> i64 {
        match self {
            ModifierKind::Flat(amount) => total.saturating_add(amount),
            ModifierKind::Percent(pct) => {
                div_round(total.saturating_mul(100i64.saturating_add(pct)), 100)
            }
        }
    }
}

/// Where a modifier was collected from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierOrigin {
    /// A token held by the source.
    Token,
    /// A status effect on the target.
    Status,
    /// A shield on the target, only when shields are pre-applied.
    Shield,
    /// Supplied directly by the caller.
    Additional,
}

/// One modifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    pub id: String,
    pub kind: ModifierKind,
    pub priority: i32,
    pub origin: ModifierOrigin,
    pub source_id: Option<EntityId>,
    pub label: Option<String>,
}

impl Modifier {
    pub fn flat(id: impl Into<String>, amount: i64, origin: ModifierOrigin) -> Self {
        Self {
            id: id.into(),
            kind: ModifierKind::Flat(amount),
            priority: 0,
            origin,
            source_id: None,
            label: None,
        }
    }

    pub fn percent(id: impl Into<String>, pct: i64, origin: ModifierOrigin) -> Self {
        Self {
            kind: ModifierKind::Percent(pct),
            ..Self::flat(id, 0, origin)
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: EntityId) -> Self {
        self.source_id = Some(source);
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A modifier as applied, with the total after it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedModifier {
    pub id: String,
    pub origin: ModifierOrigin,
    pub kind: ModifierKind,
    /// Change this modifier made to the running total.
    pub delta: i64,
    pub source_id: Option<EntityId>,
    pub label: Option<String>,
    pub running_total: i64,
}

/// Collected modifiers awaiting application.
#[derive(Clone, Debug, Default)]
pub struct ModifierStack {
    entries: SmallVec<[Modifier; 8]>,
}

impl ModifierStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, modifier: Modifier) {
        self.entries.push(modifier);
    }

    pub fn extend(&mut self, modifiers: impl IntoIterator<Item = Modifier>) {
        self.entries.extend(modifiers);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every modifier to `base`, returning the unclamped total and
    /// the ordered steps.
    ///
    /// ```
    /// use tabletop_engine::effects::{Modifier, ModifierOrigin, ModifierStack};
    ///
    /// let mut stack = ModifierStack::new();
    /// stack.push(Modifier::percent("double", 100, ModifierOrigin::Additional));
    /// stack.push(Modifier::flat("fury", 2, ModifierOrigin::Token));
    ///
    /// // Flat first: (5 + 2) * 2
    /// let (total, steps) = stack.apply(5);
    /// assert_eq!(total, 14);
    /// assert_eq!(steps[0].id, "fury");
    /// assert_eq!(steps[1].running_total, 14);
    /// ```
    pub fn apply(mut self, base: i64) -> (i64, Vec<AppliedModifier>) {
        // Stable sort keeps collection order for ties.
        self.entries
            .sort_by_key(|m| (m.kind.stage(), m.priority));

        let mut total = base;
        let steps = self
            .entries
            .into_iter()
            .map(|m| {
                let next = m.kind.apply(total);
                let delta = next - total;
                total = next;
                AppliedModifier {
                    id: m.id,
                    origin: m.origin,
                    kind: m.kind,
                    delta,
                    source_id: m.source_id,
                    label: m.label,
                    running_total: total,
                }
            })
            .collect();

        (total, steps)
    }
}

/// Integer division rounding half away from zero.
fn div_round(numerator: i64, denominator: i64) -> i64 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        quotient + numerator.signum() * denominator.signum()
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_before_percent_regardless_of_priority() {
        let mut stack = ModifierStack::new();
        stack.push(
            Modifier::percent("half", -50, ModifierOrigin::Status).with_priority(-100),
        );
        stack.push(Modifier::flat("plus4", 4, ModifierOrigin::Token).with_priority(50));

        let (total, steps) = stack.apply(6);
        assert_eq!(total, 5);
        assert_eq!(steps[0].id, "plus4");
        assert_eq!(steps[0].running_total, 10);
        assert_eq!(steps[1].delta, -5);
    }

    #[test]
    fn test_priority_then_collection_order() {
        let mut stack = ModifierStack::new();
        stack.push(Modifier::flat("b", 1, ModifierOrigin::Status).with_priority(20));
        stack.push(Modifier::flat("a", 1, ModifierOrigin::Token).with_priority(10));
        stack.push(Modifier::flat("c", 1, ModifierOrigin::Additional).with_priority(20));

        let (_, steps) = stack.apply(0);
        let ids: Vec<_> = steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_negative_running_total_is_not_clamped_here() {
        let mut stack = ModifierStack::new();
        stack.push(Modifier::flat("armor", -5, ModifierOrigin::Status));
        let (total, _) = stack.apply(3);
        assert_eq!(total, -2);
    }

    #[test]
    fn test_div_round() {
        assert_eq!(div_round(250, 100), 3);
        assert_eq!(div_round(249, 100), 2);
        assert_eq!(div_round(-250, 100), -3);
        assert_eq!(div_round(-249, 100), -2);
    }

    #[test]
    fn test_percent_rounding() {
        assert_eq!(ModifierKind::Percent(50).apply(3), 5);
        assert_eq!(ModifierKind::Percent(-50).apply(5), 3);
        assert_eq!(ModifierKind::Percent(-100).apply(9), 0);
    }
}
