//! The game layer's contract with the engine.
//!
//! Games implement `Domain` to define:
//! - their own state (`Core`), events and commands
//! - how a domain event changes their state
//! - how a domain command becomes events
//! - who is active
//!
//! ## Implementation Notes
//!
//! - `reduce` must be pure and total: no RNG, no clock, no panics for
//!   well-formed events. Everything random was decided in `execute` and
//!   written into the events.
//! - `execute` must not touch state; it only returns events.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

use super::CommandContext;
use crate::core::{Command, CommandName, Event, EventName, MatchState, PhaseId, PlayerId, SystemEvent};
use crate::error::Result;

/// A game plugged into the engine.
pub trait Domain {
    type Core: Clone + Debug + PartialEq + Serialize + DeserializeOwned;
    type Event: Clone + Debug + PartialEq + Serialize + DeserializeOwned + EventName;
    type Command: Clone + Debug + CommandName;

    /// Fold one domain event.
    fn reduce(&self, core: &Self::Core, event: &Self::Event) -> Self::Core;

    /// Turn a domain command into events, or reject it.
    fn execute(
        &self,
        state: &MatchState<Self::Core>,
        command: &Command<Self::Command>,
        ctx: &mut CommandContext,
    ) -> Result<Vec<Event<Self::Event>>>;

    /// The player whose turn it is.
    fn active_player(&self, core: &Self::Core) -> PlayerId;

    /// The player who rolls during `phase`. Defaults to the active player.
    fn roller(&self, core: &Self::Core, _phase: PhaseId) -> PlayerId {
        self.active_player(core)
    }

    /// Mirror an engine event into domain state (e.g. track the active
    /// player on phase change). `None` leaves the core untouched.
    fn observe_system(&self, _core: &Self::Core, _event: &SystemEvent) -> Option<Self::Core> {
        None
    }

    /// What `viewer` may see of the core. Defaults to everything.
    fn player_view(&self, core: &Self::Core, _viewer: PlayerId) -> Self::Core {
        core.clone()
    }
}
