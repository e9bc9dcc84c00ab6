//! Response window records.

use serde::{Deserialize, Serialize};

use super::priority::{ResponderQueue, ResponderRole};
use crate::core::PlayerId;
use crate::interaction::InteractionId;

/// Window identifier, allocated from the match's id counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl WindowId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for WindowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Window({})", self.0)
    }
}

/// The moment a window is opened for.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowType {
    /// Dice have been confirmed.
    AfterRoll,
    /// A card or ability was played.
    AfterCardPlayed,
    /// A multi-part effect paused between parts.
    Breakpoint,
    /// An effect is about to resolve.
    PreResolution,
    Custom(String),
}

/// An open window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseWindow {
    pub id: WindowId,
    pub window_type: WindowType,
    pub source_id: Option<String>,
    /// Front is the only player allowed to act.
    pub responder_queue: ResponderQueue,
    /// Players that passed, in the order they passed. A head dropped
    /// after acting is not listed.
    pub passed: Vec<PlayerId>,
    /// Players that acted at least once.
    pub responded: Vec<PlayerId>,
    /// Interaction owned by the head responder that locks the window.
    pub pending_interaction: Option<InteractionId>,
}

impl ResponseWindow {
    /// The player allowed to act.
    #[must_use]
    pub fn current_responder(&self) -> Option<PlayerId> {
        self.responder_queue.first().copied()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.pending_interaction.is_some()
    }

    /// Nobody acted before the queue emptied.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.responded.is_empty()
    }
}

/// Arguments for opening a window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSpec {
    pub window_type: WindowType,
    pub source_id: Option<String>,
    /// Anchor for turn-order distance; normally the active player.
    pub active: PlayerId,
    pub candidates: Vec<(PlayerId, ResponderRole)>,
}

impl WindowSpec {
    pub fn new(window_type: WindowType, active: PlayerId) -> Self {
        Self {
            window_type,
            source_id: None,
            active,
            candidates: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    #[must_use]
    pub fn with_candidate(mut self, player: PlayerId, role: ResponderRole) -> Self {
        self.candidates.push((player, role));
        self
    }

    /// Every seat as a candidate, with `roles` overriding the default of
    /// bystander.
    #[must_use]
    pub fn with_table(mut self, player_count: usize, roles: &[(PlayerId, ResponderRole)]) -> Self {
        for player in PlayerId::all(player_count) {
            let role = roles
                .iter()
                .find(|(p, _)| *p == player)
                .map_or(ResponderRole::Bystander, |(_, r)| *r);
            self.candidates.push((player, role));
        }
        self
    }
}
