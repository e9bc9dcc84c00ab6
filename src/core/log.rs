//! Append-only event log.
//!
//! The log is what a host persists. Replaying it from the initial state
//! reproduces the live state; a bincode checkpoint of the log (or of a
//! [`MatchState`](super::MatchState)) is the engine's only persistence
//! surface.

use im::Vector;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{Event, MatchState};
use crate::error::CodecError;
use crate::rules::{reducer, Domain};

/// Ordered record of every event folded into a match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog<E: Clone> {
    events: Vector<Event<E>>,
}

impl<E: Clone> Default for EventLog<E> {
    fn default() -> Self {
        Self {
            events: Vector::new(),
        }
    }
}

impl<E: Clone> EventLog<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: Event<E>) {
        self.events.push_back(event);
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = Event<E>>) {
        self.events.extend(events);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event<E>> {
        self.events.iter()
    }

    /// Events appended at or after `index`.
    pub fn since(&self, index: usize) -> impl Iterator<Item = &Event<E>> {
        self.events.iter().skip(index)
    }

    /// Rebuild state by folding the whole log onto `initial`.
    pub fn replay<D>(&self, domain: &D, initial: &MatchState<D::Core>) -> MatchState<D::Core>
    where
        D: Domain<Event = E>,
    {
        reducer::fold(domain, initial, self.events.iter())
    }
}

impl<E: Clone + Serialize + DeserializeOwned> EventLog<E> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PhaseId, PlayerId, SystemEvent};

    fn phase_change(to: u32) -> Event<()> {
        Event::system(
            SystemEvent::PhaseChanged {
                from: PhaseId::new(to.saturating_sub(1)),
                to: PhaseId::new(to),
                active_player: PlayerId::new(0),
            },
            u64::from(to),
        )
    }

    #[test]
    fn test_append_and_since() {
        let mut log = EventLog::new();
        log.append(phase_change(1));
        log.extend([phase_change(2), phase_change(3)]);

        assert_eq!(log.len(), 3);
        let tail: Vec<_> = log.since(1).map(|e| e.timestamp).collect();
        assert_eq!(tail, vec![2, 3]);
    }

    #[test]
    fn test_bincode_round_trip() {
        let mut log = EventLog::new();
        log.extend([phase_change(1), phase_change(2)]);

        let bytes = log.to_bytes().unwrap();
        let back: EventLog<()> = EventLog::from_bytes(&bytes).unwrap();
        assert_eq!(log, back);
    }
}
