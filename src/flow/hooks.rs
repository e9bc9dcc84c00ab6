//! Phase hooks supplied by the game layer.
//!
//! Every method has a default, so a game only overrides what its
//! phases need. Hooks never change state directly; they return events
//! that the controller folds in order.

use crate::core::{Command, EngineConfig, Event, MatchState, PhaseId, PlayerId};
use crate::error::Result;
use crate::registry::Registry;
use crate::rules::{CommandContext, Domain};

/// What an exit or enter hook sees.
pub struct PhaseArgs<'a, D: Domain> {
    /// Current state, including every event folded so far this command.
    pub state: &'a MatchState<D::Core>,
    pub from: PhaseId,
    pub to: PhaseId,
    /// The advance being processed; synthesised for auto-continue.
    pub command: &'a Command<D::Command>,
    pub registry: &'a Registry<D>,
    pub config: &'a EngineConfig,
}

/// Result of leaving a phase.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseExit<E> {
    pub events: Vec<Event<E>>,
    /// Replaces the computed next phase (e.g. a skip).
    pub override_next: Option<PhaseId>,
    /// A blocker was created; stay in the phase until it clears.
    pub halt: bool,
}

impl<E> Default for PhaseExit<E> {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            override_next: None,
            halt: false,
        }
    }
}

impl<E> PhaseExit<E> {
    pub fn new(events: Vec<Event<E>>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub fn halt(events: Vec<Event<E>>) -> Self {
        Self {
            events,
            override_next: None,
            halt: true,
        }
    }

    #[must_use]
    pub fn with_override(mut self, phase: PhaseId) -> Self {
        self.override_next = Some(phase);
        self
    }
}

/// Auto-continue signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AutoContinue {
    /// The player the engine advances for.
    pub player: PlayerId,
}

/// Game-defined phase logic.
pub trait FlowHooks<D: Domain> {
    /// Preconditions for leaving the current phase. `Err` carries the
    /// reason shown to the client.
    fn can_advance(
        &self,
        _state: &MatchState<D::Core>,
        _command: &Command<D::Command>,
    ) -> std::result::Result<(), String> {
        Ok(())
    }

    /// Next phase after `from`. `None` falls back to the configured order.
    fn next_phase(&self, _state: &MatchState<D::Core>, _from: PhaseId) -> Option<PhaseId> {
        None
    }

    fn on_phase_exit(
        &self,
        _args: &PhaseArgs<'_, D>,
        _ctx: &mut CommandContext,
    ) -> Result<PhaseExit<D::Event>> {
        Ok(PhaseExit::default())
    }

    fn on_phase_enter(
        &self,
        _args: &PhaseArgs<'_, D>,
        _ctx: &mut CommandContext,
    ) -> Result<Vec<Event<D::Event>>> {
        Ok(Vec::new())
    }

    /// Active player once `to` is entered. `None` keeps the player that
    /// issued the advance.
    fn active_player(&self, _state: &MatchState<D::Core>, _from: PhaseId, _to: PhaseId) -> Option<PlayerId> {
        None
    }

    /// Inspect the events folded since the last check and decide whether
    /// the engine should advance again on its own.
    fn on_auto_continue_check(
        &self,
        _state: &MatchState<D::Core>,
        _recent: &[Event<D::Event>],
    ) -> Option<AutoContinue> {
        None
    }
}

/// Hooks that do nothing: phases follow the configured order.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl<D: Domain> FlowHooks<D> for NoHooks {}
