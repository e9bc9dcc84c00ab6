//! Match state.
//!
//! ## Design Philosophy
//!
//! `MatchState<C>` pairs the game's own state `C` with the engine-owned
//! [`SystemState`]. Both change only by folding events. Engine sub-state
//! uses persistent `im` collections so that the copy-on-write fold keeps
//! every previous snapshot valid at O(1) clone cost.
//!
//! ## Example Usage
//!
//! ```
//! use tabletop_engine::core::{EngineConfig, MatchState, PhaseId};
//!
//! let config = EngineConfig::new(2).with_phase_order([PhaseId::new(1), PhaseId::new(2)]);
//! let state = MatchState::new(0_i64, &config, 42);
//!
//! assert_eq!(state.sys.phase, PhaseId::new(1));
//! assert!(!state.sys.flow_halted());
//! assert!(state.sys.blocker().is_none());
//! ```

use im::Vector;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{EngineConfig, PhaseId};
use crate::error::{Blocker, CodecError};
use crate::interaction::{Interaction, InteractionId};
use crate::response::ResponseWindow;
use crate::undo::{Snapshot, UndoHistory, UndoState};

/// Phase flow state machine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowStatus {
    #[default]
    Idle,
    /// Between leaving `from` and entering `to`.
    Advancing { from: PhaseId, to: PhaseId },
    /// The last exit attempt from `phase` produced a blocker.
    Halted { phase: PhaseId },
}

/// The active interaction plus deferred ones in FIFO order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionState {
    pub current: Option<Interaction>,
    pub queue: Vector<Interaction>,
}

impl InteractionState {
    /// Whether `id` is active or deferred.
    #[must_use]
    pub fn is_pending(&self, id: InteractionId) -> bool {
        self.current.as_ref().is_some_and(|i| i.id == id) || self.queue.iter().any(|i| i.id == id)
    }

    /// All pending interactions, active first.
    pub fn iter(&self) -> impl Iterator<Item = &Interaction> {
        self.current.iter().chain(self.queue.iter())
    }
}

/// Engine-owned sub-state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemState {
    pub phase: PhaseId,
    pub flow: FlowStatus,
    pub interaction: InteractionState,
    pub response_window: Option<ResponseWindow>,
    /// Match seed; per-command RNG streams derive from it.
    pub seed: u64,
    /// Number of recognised events folded so far.
    pub revision: u64,
    /// Next id to hand out for interactions and windows.
    pub next_id: u64,
    #[serde(default)]
    pub undo: UndoState,
}

impl SystemState {
    pub fn new(phase: PhaseId, seed: u64) -> Self {
        Self {
            phase,
            flow: FlowStatus::Idle,
            interaction: InteractionState::default(),
            response_window: None,
            seed,
            revision: 0,
            next_id: 1,
            undo: UndoState::default(),
        }
    }

    #[must_use]
    pub fn flow_halted(&self) -> bool {
        matches!(self.flow, FlowStatus::Halted { .. })
    }

    #[must_use]
    pub fn active_interaction(&self) -> Option<&Interaction> {
        self.interaction.current.as_ref()
    }

    /// What stops the phase from advancing right now.
    #[must_use]
    pub fn blocker(&self) -> Option<Blocker> {
        if let Some(interaction) = &self.interaction.current {
            return Some(Blocker::PendingInteraction(interaction.id));
        }
        self.response_window
            .as_ref()
            .map(|w| Blocker::ResponseWindow(w.id))
    }

    /// An id that was handed out but is no longer pending.
    #[must_use]
    pub fn is_closed(&self, id: InteractionId) -> bool {
        id.0 < self.next_id && !self.interaction.is_pending(id)
    }
}

/// Full state of one match.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchState<C: Clone> {
    pub core: C,
    pub sys: SystemState,
    /// Pre-command snapshots for undo. Empty unless undo is enabled.
    #[serde(default = "UndoHistory::default")]
    pub history: UndoHistory<C>,
}

impl<C: Clone> MatchState<C> {
    /// Initial state of a match.
    pub fn new(core: C, config: &EngineConfig, seed: u64) -> Self {
        Self {
            core,
            sys: SystemState::new(config.initial_phase, seed),
            history: UndoHistory::default(),
        }
    }

    /// This state without its history.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<C> {
        Snapshot {
            core: self.core.clone(),
            sys: self.sys.clone(),
        }
    }
}

impl<C: Clone + Serialize + DeserializeOwned> MatchState<C> {
    /// Encode a checkpoint.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a checkpoint.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PlayerId, Value};
    use crate::interaction::{ChoiceOption, ChoiceSpec, InteractionRequest};

    fn pending(id: u64) -> Interaction {
        InteractionRequest::choice(
            PlayerId::new(0),
            ChoiceSpec::new("pick", vec![ChoiceOption::new("a", "A")]),
        )
        .with_data(Value::from(id as i64))
        .into_interaction(InteractionId(id))
    }

    #[test]
    fn test_blocker_prefers_interaction() {
        let mut sys = SystemState::new(PhaseId::new(0), 1);
        assert!(sys.blocker().is_none());

        sys.interaction.current = Some(pending(1));
        assert_eq!(sys.blocker(), Some(Blocker::PendingInteraction(InteractionId(1))));
    }

    #[test]
    fn test_closed_ids() {
        let mut sys = SystemState::new(PhaseId::new(0), 1);
        sys.next_id = 4;
        sys.interaction.current = Some(pending(2));
        sys.interaction.queue.push_back(pending(3));

        assert!(sys.is_closed(InteractionId(1)));
        assert!(!sys.is_closed(InteractionId(2)));
        assert!(!sys.is_closed(InteractionId(3)));
        assert!(!sys.is_closed(InteractionId(4)));
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let config = EngineConfig::new(2);
        let mut state = MatchState::new(vec![1_i64, 2, 3], &config, 7);
        state.sys.interaction.current = Some(pending(1));
        state.sys.flow = FlowStatus::Halted {
            phase: PhaseId::new(0),
        };

        let bytes = state.to_bytes().unwrap();
        let back: MatchState<Vec<i64>> = MatchState::from_bytes(&bytes).unwrap();
        assert_eq!(state, back);
        assert!(back.sys.flow_halted());
    }
}
