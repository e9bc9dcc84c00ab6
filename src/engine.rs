//! The engine: one entry point per command.
//!
//! `Engine::process` routes a command to the component that owns it,
//! lets every produced event flow through a single [`Transition`], runs
//! auto-continue, and hands back the new state with the events to append
//! to the log. On any error the transition is dropped, so a failed
//! command commits nothing. With undo enabled, every other command opens
//! with a checkpoint; undo commands skip auto-continue.
//!
//! ## Example Usage
//!
//! ```
//! use tabletop_engine::core::{Command, PlayerId};
//! use tabletop_engine::games::duel::{self, Duel};
//!
//! let engine = duel::engine(2);
//! let state = engine.initial_state(Duel::initial_core(2), 7);
//!
//! let outcome = engine.process(&state, &Command::advance(PlayerId::new(0))).unwrap();
//! assert_eq!(outcome.state.sys.phase, duel::INCOME);
//! assert!(!outcome.events.is_empty());
//! ```

use crate::core::{Command, CommandKind, EngineConfig, Event, MatchState, PlayerId, SystemState};
use crate::error::{Blocker, Result, ValidationError};
use crate::flow::{AdvanceMode, FlowHooks, NoHooks, PhaseFlowController};
use crate::interaction::{visible_to, InteractionId, InteractionManager};
use crate::registry::Registry;
use crate::response::ResponseWindowManager;
use crate::rules::{fold, CommandContext, Domain, Transition};
use crate::undo::{UndoHistory, UndoManager};

/// Wire type recorded on events produced by [`Engine::expire`].
pub const EXPIRE_INTERACTION: &str = "SYS_INTERACTION_EXPIRE";

/// New state and the events that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandOutcome<C: Clone, E> {
    pub state: MatchState<C>,
    pub events: Vec<Event<E>>,
}

/// A game wired to its hooks, handlers and configuration.
pub struct Engine<D: Domain, H: FlowHooks<D> = NoHooks> {
    domain: D,
    hooks: H,
    registry: Registry<D>,
    config: EngineConfig,
}

impl<D: Domain> Engine<D, NoHooks> {
    /// Engine whose phases simply follow the configured order.
    pub fn without_hooks(domain: D, registry: Registry<D>, config: EngineConfig) -> Self {
        Self::new(domain, NoHooks, registry, config)
    }
}

impl<D: Domain, H: FlowHooks<D>> Engine<D, H> {
    pub fn new(domain: D, hooks: H, registry: Registry<D>, config: EngineConfig) -> Self {
        Self {
            domain,
            hooks,
            registry,
            config,
        }
    }

    #[must_use]
    pub fn domain(&self) -> &D {
        &self.domain
    }

    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    #[must_use]
    pub fn registry(&self) -> &Registry<D> {
        &self.registry
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// State at match start.
    pub fn initial_state(&self, core: D::Core, seed: u64) -> MatchState<D::Core> {
        MatchState::new(core, &self.config, seed)
    }

    /// Process one command.
    pub fn process(
        &self,
        state: &MatchState<D::Core>,
        command: &Command<D::Command>,
    ) -> Result<CommandOutcome<D::Core, D::Event>> {
        let span = tracing::debug_span!(
            "command",
            kind = command.type_name(),
            player = %command.player,
            revision = state.sys.revision,
        );
        let _enter = span.enter();

        let result = self.run(state, command);
        self.log_result(&result);
        result
    }

    /// Time out interaction `id` at host time `now`.
    pub fn expire(
        &self,
        state: &MatchState<D::Core>,
        id: InteractionId,
        now: u64,
    ) -> Result<CommandOutcome<D::Core, D::Event>> {
        let span = tracing::debug_span!("expire", interaction = %id, now);
        let _enter = span.enter();

        let result = self.run_expire(state, id, now);
        self.log_result(&result);
        result
    }

    /// Rebuild state from a log.
    pub fn replay<'e>(
        &self,
        initial: &MatchState<D::Core>,
        events: impl IntoIterator<Item = &'e Event<D::Event>>,
    ) -> MatchState<D::Core>
    where
        D::Event: 'e,
    {
        fold(&self.domain, initial, events)
    }

    /// What `viewer` may see: the domain's view of the core, and only the
    /// viewer's own interactions. Undo snapshots are never sent.
    pub fn player_view(&self, state: &MatchState<D::Core>, viewer: PlayerId) -> MatchState<D::Core> {
        let mut sys = state.sys.clone();
        sys.interaction = visible_to(&state.sys.interaction, viewer);
        MatchState {
            core: self.domain.player_view(&state.core, viewer),
            sys,
            history: UndoHistory::default(),
        }
    }

    fn run(
        &self,
        state: &MatchState<D::Core>,
        command: &Command<D::Command>,
    ) -> Result<CommandOutcome<D::Core, D::Event>> {
        let mut ctx = self.context(&state.sys, command.player, command.type_name(), command.timestamp);
        let mut tx = Transition::new(&self.domain, state.clone());
        let interactions = InteractionManager::new(&self.registry);
        let windows = self.windows();

        let undoing = command.kind.is_undo();
        if let Some(undo) = self.undo().filter(|_| !undoing) {
            undo.checkpoint(&mut tx, &ctx);
        }

        match &command.kind {
            CommandKind::AdvancePhase => {
                self.flow().advance(&mut tx, command, AdvanceMode::Manual, &mut ctx)?;
            }
            CommandKind::ResolveInteraction {
                interaction,
                resolution,
            } => {
                interactions.resolve(&mut tx, command.player, *interaction, resolution.clone(), &mut ctx)?;
                windows.settle_after_interaction(&mut tx, &state.sys, &mut ctx);
            }
            CommandKind::CancelInteraction { interaction } => {
                interactions.cancel(&mut tx, command.player, *interaction, &mut ctx)?;
                windows.settle_after_interaction(&mut tx, &state.sys, &mut ctx);
            }
            CommandKind::PassResponse { on_behalf_of } => {
                windows.pass(&mut tx, command.player, *on_behalf_of, &mut ctx)?;
            }
            CommandKind::Respond { payload } => {
                windows.respond(&mut tx, command.player, payload.clone(), &mut ctx)?;
            }
            CommandKind::Domain(_) => {
                check_domain_turn(&state.sys, command.player)?;
                let events = self.domain.execute(tx.state(), command, &mut ctx)?;
                tx.apply_all(events);
            }
            CommandKind::RequestUndo => self.require_undo()?.request(&mut tx, command.player, &ctx)?,
            CommandKind::ApproveUndo => self.require_undo()?.approve(&mut tx, command.player, &ctx)?,
            CommandKind::RejectUndo => self.require_undo()?.reject(&mut tx, command.player, &ctx)?,
            CommandKind::CancelUndo => self.require_undo()?.cancel(&mut tx, command.player, &ctx)?,
        }

        if !undoing {
            self.flow().auto_continue(&mut tx, 0, &mut ctx)?;
        }

        let (state, events) = tx.into_parts();
        Ok(CommandOutcome { state, events })
    }

    fn run_expire(
        &self,
        state: &MatchState<D::Core>,
        id: InteractionId,
        now: u64,
    ) -> Result<CommandOutcome<D::Core, D::Event>> {
        let owner = state
            .sys
            .interaction
            .iter()
            .find(|i| i.id == id)
            .map_or_else(|| self.domain.active_player(&state.core), |i| i.player);
        let mut ctx = self.context(&state.sys, owner, EXPIRE_INTERACTION, now);
        let mut tx = Transition::new(&self.domain, state.clone());

        InteractionManager::new(&self.registry).expire(&mut tx, id, now, &mut ctx)?;
        self.windows().settle_after_interaction(&mut tx, &state.sys, &mut ctx);
        self.flow().auto_continue(&mut tx, 0, &mut ctx)?;

        let (state, events) = tx.into_parts();
        Ok(CommandOutcome { state, events })
    }

    fn context(&self, sys: &SystemState, player: PlayerId, command_type: &'static str, timestamp: u64) -> CommandContext {
        CommandContext::new(sys, player, command_type, timestamp)
            .with_interaction_timeout(self.config.default_interaction_timeout)
    }

    fn flow(&self) -> PhaseFlowController<'_, D, H> {
        PhaseFlowController::new(&self.hooks, &self.registry, &self.config)
    }

    fn windows(&self) -> ResponseWindowManager<'_, D> {
        ResponseWindowManager::new(&self.registry)
    }

    fn undo(&self) -> Option<UndoManager<'_>> {
        self.config
            .undo
            .as_ref()
            .map(|undo| UndoManager::new(undo, self.config.player_count))
    }

    fn require_undo(&self) -> Result<UndoManager<'_>, ValidationError> {
        self.undo().ok_or(ValidationError::UndoDisabled)
    }

    fn log_result(&self, result: &Result<CommandOutcome<D::Core, D::Event>>) {
        match result {
            Ok(outcome) => tracing::debug!(
                events = outcome.events.len(),
                revision = outcome.state.sys.revision,
                "command accepted"
            ),
            Err(err) if err.is_recoverable() => {
                tracing::warn!(code = err.reason_code(), %err, "command rejected");
            }
            Err(err) => tracing::error!(kind = err.kind().as_str(), %err, "command dropped"),
        }
    }
}

/// Domain commands wait for the issuing player's own pending decision,
/// and only the head responder may act while a window is open.
fn check_domain_turn(sys: &SystemState, player: PlayerId) -> Result<(), ValidationError> {
    if let Some(interaction) = sys.active_interaction() {
        if interaction.player == player {
            return Err(ValidationError::Blocked(Blocker::PendingInteraction(interaction.id)));
        }
    }
    if let Some(window) = &sys.response_window {
        let head = window.current_responder();
        if head != Some(player) {
            return Err(ValidationError::NotCurrentResponder {
                expected: head,
                got: player,
            });
        }
    }
    Ok(())
}
