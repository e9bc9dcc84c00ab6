//! Shields: consumable absorption granted to a target.
//!
//! Shields are consumed strictly first-granted-first: each shield in
//! queue order absorbs `min(shield.value, remaining)`. Any number of
//! shields may be exhausted by one hit but at most one is left partially
//! consumed, and it stays at the front of the queue.

use im::Vector;
use serde::{Deserialize, Serialize};

/// A granted shield.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shield {
    pub source_id: String,
    pub value: i64,
}

impl Shield {
    pub fn new(source_id: impl Into<String>, value: i64) -> Self {
        Self {
            source_id: source_id.into(),
            value,
        }
    }
}

/// How much one shield took from one hit. Part of the event payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldAbsorption {
    pub source_id: String,
    /// Shield value before the hit.
    pub value: i64,
    pub absorbed: i64,
}

/// Result of running a magnitude through a shield queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Absorption {
    /// Magnitude left after every shield took its share.
    pub remaining: i64,
    /// One record per shield that absorbed anything, in queue order.
    pub records: Vec<ShieldAbsorption>,
    /// The queue afterwards.
    pub shields: Vector<Shield>,
}

impl Absorption {
    #[must_use]
    pub fn total_absorbed(&self) -> i64 {
        self.records.iter().map(|r| r.absorbed).sum()
    }
}

/// Run `magnitude` through `shields` in grant order.
///
/// ```
/// use im::vector;
/// use tabletop_engine::effects::{absorb, Shield};
///
/// let shields = vector![Shield::new("A", 6), Shield::new("B", 3)];
/// let result = absorb(&shields, 8);
///
/// assert_eq!(result.remaining, 0);
/// assert_eq!(result.records[0].absorbed, 6);
/// assert_eq!(result.records[1].absorbed, 2);
/// assert_eq!(result.shields, vector![Shield::new("B", 1)]);
/// ```
pub fn absorb(shields: &Vector<Shield>, magnitude: i64) -> Absorption {
    let mut remaining = magnitude.max(0);
    let mut records = Vec::new();
    let mut left = shields.clone();

    while remaining > 0 {
        let Some(front) = left.pop_front() else {
            break;
        };
        let absorbed = front.value.max(0).min(remaining);
        remaining -= absorbed;
        if absorbed > 0 {
            records.push(ShieldAbsorption {
                source_id: front.source_id.clone(),
                value: front.value,
                absorbed,
            });
        }
        if front.value > absorbed {
            left.push_front(Shield {
                value: front.value - absorbed,
                ..front
            });
        }
    }

    Absorption {
        remaining,
        records,
        shields: left,
    }
}

/// Deplete `shields` by amounts already recorded in `records`.
///
/// Used when the absorption was computed up front and only the queue
/// needs to catch up. Records are matched in order, each against the
/// first shield with the same `source_id` at or after the previous
/// match, so repeated source ids deplete front to back. A shield can
/// give at most its current value; whatever a record claims beyond that
/// (the shield was consumed since the record was made) comes back as
/// `remaining`, and `records` holds only what was actually taken.
///
/// ```
/// use im::vector;
/// use tabletop_engine::effects::{absorb, deplete, Shield};
///
/// let before = vector![Shield::new("A", 6)];
/// let planned = absorb(&before, 6).records;
///
/// // The shield is already gone by the time the record is folded.
/// let late = deplete(&vector![], &planned);
/// assert_eq!(late.remaining, 6);
/// assert!(late.records.is_empty());
/// ```
pub fn deplete(shields: &Vector<Shield>, records: &[ShieldAbsorption]) -> Absorption {
    let mut left = shields.clone();
    let mut remaining = 0;
    let mut applied = Vec::new();
    let mut cursor = 0;

    for record in records {
        let found = left
            .iter()
            .skip(cursor)
            .position(|s| s.source_id == record.source_id)
            .map(|offset| cursor + offset);
        let Some(position) = found else {
            remaining += record.absorbed;
            continue;
        };

        let value = left[position].value;
        let taken = value.max(0).min(record.absorbed);
        remaining += record.absorbed - taken;
        if taken > 0 {
            applied.push(ShieldAbsorption {
                source_id: record.source_id.clone(),
                value,
                absorbed: taken,
            });
        }
        if value > taken {
            left[position].value = value - taken;
            cursor = position + 1;
        } else {
            left.remove(position);
            cursor = position;
        }
    }

    Absorption {
        remaining,
        records: applied,
        shields: left,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use im::vector;

    #[test]
    fn test_partial_single_shield() {
        let result = absorb(&vector![Shield::new("A", 6)], 4);
        assert_eq!(result.remaining, 0);
        assert_eq!(result.shields, vector![Shield::new("A", 2)]);
        assert_eq!(result.total_absorbed(), 4);
    }

    #[test]
    fn test_overflow_past_every_shield() {
        let result = absorb(&vector![Shield::new("A", 2), Shield::new("B", 3)], 11);
        assert_eq!(result.remaining, 6);
        assert!(result.shields.is_empty());
        assert_eq!(result.records.len(), 2);
    }

    #[test]
    fn test_zero_magnitude_touches_nothing() {
        let shields = vector![Shield::new("A", 2)];
        let result = absorb(&shields, 0);
        assert!(result.records.is_empty());
        assert_eq!(result.shields, shields);
    }

    #[test]
    fn test_later_shields_untouched_when_first_suffices() {
        let result = absorb(&vector![Shield::new("A", 5), Shield::new("B", 5)], 5);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.shields, vector![Shield::new("B", 5)]);
    }

    #[test]
    fn test_deplete_matches_absorb() {
        let shields = vector![Shield::new("A", 6), Shield::new("B", 3)];
        let result = absorb(&shields, 8);
        let depleted = deplete(&shields, &result.records);
        assert_eq!(depleted.shields, result.shields);
        assert_eq!(depleted.records, result.records);
        assert_eq!(depleted.remaining, 0);
    }

    #[test]
    fn test_deplete_repeated_source_front_to_back() {
        let shields = vector![Shield::new("A", 2), Shield::new("B", 1), Shield::new("A", 5)];
        let result = absorb(&shields, 6);
        assert_eq!(result.shields, vector![Shield::new("A", 2)]);

        let depleted = deplete(&shields, &result.records);
        assert_eq!(depleted.shields, result.shields);
        assert_eq!(depleted.remaining, 0);
    }

    #[test]
    fn test_deplete_reports_shortfall() {
        let planned = absorb(&vector![Shield::new("A", 6), Shield::new("B", 3)], 8).records;

        // A was worn down to 1 and B is gone by the time the records fold.
        let depleted = deplete(&vector![Shield::new("A", 1)], &planned);
        assert!(depleted.shields.is_empty());
        assert_eq!(depleted.total_absorbed(), 1);
        assert_eq!(depleted.remaining, 7);
    }
}
