//! The phase state machine.
//!
//! ## Advance algorithm
//!
//! 1. Refuse while an interaction or response window is pending, or when
//!    `can_advance` says no.
//! 2. Fold `PhaseAdvanceStarted`, then the exit hook's events.
//! 3. On `halt`, fold `FlowHalted` and stay in the phase.
//! 4. Otherwise pick the next phase (override first), fold
//!    `PhaseChanged` and the enter hook's events.
//!
//! Manual advances report refusals as errors. Auto-continue advances
//! stop quietly instead.

use super::hooks::{FlowHooks, PhaseArgs};
use crate::core::{Command, EngineConfig, PhaseId, PlayerId, SystemEvent, ADVANCE_PHASE};
use crate::error::{EngineError, EngineFault, Result, ValidationError};
use crate::registry::Registry;
use crate::rules::{CommandContext, Domain, Transition};

/// Who asked for the advance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceMode {
    /// An `ADVANCE_PHASE` command.
    Manual,
    /// Engine-initiated after an auto-continue signal.
    Auto,
}

/// How an advance ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced { from: PhaseId, to: PhaseId },
    Halted { phase: PhaseId },
    /// Auto mode only: the advance was not attempted.
    Refused,
}

/// Runs phase transitions with the game's hooks.
pub struct PhaseFlowController<'a, D: Domain, H: FlowHooks<D>> {
    hooks: &'a H,
    registry: &'a Registry<D>,
    config: &'a EngineConfig,
}

impl<'a, D: Domain, H: FlowHooks<D>> PhaseFlowController<'a, D, H> {
    pub fn new(hooks: &'a H, registry: &'a Registry<D>, config: &'a EngineConfig) -> Self {
        Self {
            hooks,
            registry,
            config,
        }
    }

    /// Attempt one advance out of the current phase.
    pub fn advance(
        &self,
        tx: &mut Transition<'_, D>,
        command: &Command<D::Command>,
        mode: AdvanceMode,
        ctx: &mut CommandContext,
    ) -> Result<AdvanceOutcome> {
        let from = tx.state().sys.phase;

        if let Some(blocker) = tx.state().sys.blocker() {
            return match mode {
                AdvanceMode::Manual => Err(ValidationError::Blocked(blocker).into()),
                AdvanceMode::Auto => {
                    tracing::debug!(%from, %blocker, "auto-continue refused");
                    Ok(AdvanceOutcome::Refused)
                }
            };
        }
        if let Err(reason) = self.hooks.can_advance(tx.state(), command) {
            return match mode {
                AdvanceMode::Manual => Err(EngineError::CannotAdvance { phase: from, reason }),
                AdvanceMode::Auto => {
                    tracing::debug!(%from, %reason, "auto-continue refused");
                    Ok(AdvanceOutcome::Refused)
                }
            };
        }

        let planned = self
            .hooks
            .next_phase(tx.state(), from)
            .or_else(|| self.config.next_phase(from))
            .unwrap_or(from);
        self.check_phase(planned)?;

        tx.apply(ctx.system(SystemEvent::PhaseAdvanceStarted { from, to: planned }));

        ctx.sync(&tx.state().sys);
        let exit = {
            let args = self.args(tx, from, planned, command);
            self.hooks.on_phase_exit(&args, ctx)?
        };
        tx.apply_all(exit.events);

        if exit.halt {
            tx.apply(ctx.system(SystemEvent::FlowHalted { phase: from }));
            tracing::debug!(phase = %from, "flow halted");
            return Ok(AdvanceOutcome::Halted { phase: from });
        }

        let to = match exit.override_next {
            Some(phase) => {
                self.check_phase(phase)?;
                tracing::debug!(%planned, %phase, "next phase overridden");
                phase
            }
            None => planned,
        };
        let active_player = self
            .hooks
            .active_player(tx.state(), from, to)
            .unwrap_or(command.player);

        tx.apply(ctx.system(SystemEvent::PhaseChanged {
            from,
            to,
            active_player,
        }));
        tracing::debug!(%from, %to, %active_player, "phase changed");

        ctx.sync(&tx.state().sys);
        let entered = {
            let args = self.args(tx, from, to, command);
            self.hooks.on_phase_enter(&args, ctx)?
        };
        tx.apply_all(entered);

        Ok(AdvanceOutcome::Advanced { from, to })
    }

    /// Keep advancing while the hooks ask for it, starting with the events
    /// folded since `mark`. Returns the number of engine-initiated
    /// advances attempted.
    pub fn auto_continue(
        &self,
        tx: &mut Transition<'_, D>,
        mut mark: usize,
        ctx: &mut CommandContext,
    ) -> Result<u32> {
        let limit = self.config.max_auto_continue;
        let mut iterations = 0;

        while let Some(signal) = self.hooks.on_auto_continue_check(tx.state(), tx.since(mark)) {
            if iterations >= limit {
                return Err(EngineFault::AutoContinueLimit { limit }.into());
            }
            iterations += 1;
            mark = tx.mark();

            let outcome = self.advance_for(tx, signal.player, ctx)?;
            if outcome == AdvanceOutcome::Refused {
                break;
            }
        }
        Ok(iterations)
    }

    fn advance_for(
        &self,
        tx: &mut Transition<'_, D>,
        player: PlayerId,
        ctx: &mut CommandContext,
    ) -> Result<AdvanceOutcome> {
        ctx.act_as(player, ADVANCE_PHASE);
        ctx.sync(&tx.state().sys);
        let command = Command::advance(player).at(ctx.timestamp());
        tracing::debug!(%player, "auto-continue");
        self.advance(tx, &command, AdvanceMode::Auto, ctx)
    }

    fn args<'s>(
        &'s self,
        tx: &'s Transition<'_, D>,
        from: PhaseId,
        to: PhaseId,
        command: &'s Command<D::Command>,
    ) -> PhaseArgs<'s, D> {
        PhaseArgs {
            state: tx.state(),
            from,
            to,
            command,
            registry: self.registry,
            config: self.config,
        }
    }

    fn check_phase(&self, phase: PhaseId) -> Result<()> {
        if self.config.knows_phase(phase) {
            Ok(())
        } else {
            Err(EngineFault::UnknownPhase(phase).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Event, EventName, MatchState, Value};
    use crate::flow::{AutoContinue, PhaseExit};
    use crate::interaction::{ChoiceOption, ChoiceSpec, InteractionManager, InteractionRequest, Resolution};
    use serde::{Deserialize, Serialize};

    const A: PhaseId = PhaseId(0);
    const B: PhaseId = PhaseId(1);
    const C: PhaseId = PhaseId(2);

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Note(String);

    impl EventName for Note {
        fn event_name(&self) -> &'static str {
            "NOTE"
        }
    }

    struct Notes;

    impl Domain for Notes {
        type Core = Vec<String>;
        type Event = Note;
        type Command = ();

        fn reduce(&self, core: &Vec<String>, event: &Note) -> Vec<String> {
            let mut next = core.clone();
            next.push(event.0.clone());
            next
        }

        fn execute(
            &self,
            _state: &MatchState<Vec<String>>,
            _command: &Command<()>,
            _ctx: &mut CommandContext,
        ) -> Result<Vec<Event<Note>>> {
            Ok(Vec::new())
        }

        fn active_player(&self, _core: &Vec<String>) -> PlayerId {
            PlayerId::new(0)
        }
    }

    #[derive(Default)]
    struct Script {
        halt_leaving_a: bool,
        skip_b: bool,
        refuse: bool,
        bogus_next: bool,
        always_continue: bool,
    }

    impl FlowHooks<Notes> for Script {
        fn can_advance(&self, _state: &MatchState<Vec<String>>, _command: &Command<()>) -> std::result::Result<(), String> {
            if self.refuse {
                Err("not yet".into())
            } else {
                Ok(())
            }
        }

        fn next_phase(&self, _state: &MatchState<Vec<String>>, _from: PhaseId) -> Option<PhaseId> {
            self.bogus_next.then_some(PhaseId(99))
        }

        fn on_phase_exit(&self, args: &PhaseArgs<'_, Notes>, ctx: &mut CommandContext) -> Result<PhaseExit<Note>> {
            if args.from == A && self.halt_leaving_a && !args.state.core.contains(&"answered".to_string()) {
                let request = InteractionRequest::choice(
                    PlayerId::new(1),
                    ChoiceSpec::new("react?", vec![ChoiceOption::new("yes", "Yes")]),
                )
                .with_continuation("answer", Value::Null);
                return Ok(PhaseExit::halt(vec![
                    ctx.domain(Note("x".into())),
                    InteractionManager::<Notes>::request(request, ctx),
                ]));
            }
            let exit = PhaseExit::new(vec![ctx.domain(Note(format!("exit {}", args.from.0)))]);
            Ok(if args.from == A && self.skip_b { exit.with_override(C) } else { exit })
        }

        fn on_phase_enter(&self, args: &PhaseArgs<'_, Notes>, ctx: &mut CommandContext) -> Result<Vec<Event<Note>>> {
            Ok(vec![ctx.domain(Note(format!("enter {}", args.to.0)))])
        }

        fn on_auto_continue_check(&self, state: &MatchState<Vec<String>>, _recent: &[Event<Note>]) -> Option<AutoContinue> {
            let resume = state.sys.flow_halted() && state.sys.blocker().is_none();
            (resume || self.always_continue).then_some(AutoContinue { player: PlayerId::new(0) })
        }
    }

    fn config() -> EngineConfig {
        EngineConfig::new(2).with_phase_order([A, B, C]).with_max_auto_continue(4)
    }

    fn registry() -> Registry<Notes> {
        Registry::new().with_continuation("answer", |_args, ctx| Ok(vec![ctx.domain(Note("answered".into()))]))
    }

    fn manual(
        hooks: &Script,
        state: &MatchState<Vec<String>>,
    ) -> Result<(AdvanceOutcome, MatchState<Vec<String>>, Vec<Event<Note>>)> {
        let config = config();
        let registry = registry();
        let controller = PhaseFlowController::new(hooks, &registry, &config);
        let command = Command::advance(PlayerId::new(0));
        let mut ctx = CommandContext::new(&state.sys, PlayerId::new(0), ADVANCE_PHASE, 5);
        let mut tx = Transition::new(&Notes, state.clone());
        let outcome = controller.advance(&mut tx, &command, AdvanceMode::Manual, &mut ctx)?;
        let (state, events) = tx.into_parts();
        Ok((outcome, state, events))
    }

    fn start() -> MatchState<Vec<String>> {
        MatchState::new(Vec::new(), &config(), 1)
    }

    #[test]
    fn test_advance_runs_exit_then_enter() {
        let (outcome, state, events) = manual(&Script::default(), &start()).unwrap();
        assert_eq!(outcome, AdvanceOutcome::Advanced { from: A, to: B });
        assert_eq!(state.sys.phase, B);
        assert_eq!(state.core, vec!["exit 0".to_string(), "enter 1".to_string()]);
        let names: Vec<&str> = events.iter().map(Event::type_name).collect();
        assert_eq!(names, vec!["SYS_PHASE_ADVANCE_STARTED", "NOTE", "SYS_PHASE_CHANGED", "NOTE"]);
    }

    #[test]
    fn test_order_wraps() {
        let mut state = start();
        for _ in 0..3 {
            state = manual(&Script::default(), &state).unwrap().1;
        }
        assert_eq!(state.sys.phase, A);
    }

    #[test]
    fn test_refusal_is_cannot_advance() {
        let hooks = Script {
            refuse: true,
            ..Script::default()
        };
        let err = manual(&hooks, &start()).unwrap_err();
        assert_eq!(
            err,
            EngineError::CannotAdvance {
                phase: A,
                reason: "not yet".into()
            }
        );
    }

    #[test]
    fn test_override_skips_phase() {
        let hooks = Script {
            skip_b: true,
            ..Script::default()
        };
        let (outcome, state, _) = manual(&hooks, &start()).unwrap();
        assert_eq!(outcome, AdvanceOutcome::Advanced { from: A, to: C });
        assert_eq!(state.sys.phase, C);
    }

    #[test]
    fn test_phase_outside_order_is_fault() {
        let hooks = Script {
            bogus_next: true,
            ..Script::default()
        };
        let err = manual(&hooks, &start()).unwrap_err();
        assert_eq!(err, EngineError::Fault(EngineFault::UnknownPhase(PhaseId(99))));
    }

    #[test]
    fn test_halt_then_resume_after_blocker_clears() {
        let hooks = Script {
            halt_leaving_a: true,
            ..Script::default()
        };
        let (outcome, halted, _) = manual(&hooks, &start()).unwrap();
        assert_eq!(outcome, AdvanceOutcome::Halted { phase: A });
        assert_eq!(halted.sys.phase, A);
        assert!(halted.sys.flow_halted());
        assert!(halted.core.contains(&"x".to_string()));

        // A manual retry is blocked by the pending interaction.
        let err = manual(&hooks, &halted).unwrap_err();
        assert_eq!(err.reason_code(), "blocked");

        let config = config();
        let registry = registry();
        let controller = PhaseFlowController::new(&hooks, &registry, &config);
        let interactions = InteractionManager::new(&registry);
        let id = halted.sys.active_interaction().unwrap().id;
        let mut ctx = CommandContext::new(&halted.sys, PlayerId::new(1), "SYS_INTERACTION_RESOLVE", 6);
        let mut tx = Transition::new(&Notes, halted.clone());
        interactions
            .resolve(&mut tx, PlayerId::new(1), id, Resolution::choose("yes"), &mut ctx)
            .unwrap();
        let advances = controller.auto_continue(&mut tx, 0, &mut ctx).unwrap();

        assert_eq!(advances, 1);
        let state = tx.state();
        assert_eq!(state.sys.phase, B);
        assert!(!state.sys.flow_halted());
    }

    #[test]
    fn test_auto_continue_is_bounded() {
        let hooks = Script {
            always_continue: true,
            ..Script::default()
        };
        let config = config();
        let registry = registry();
        let controller = PhaseFlowController::new(&hooks, &registry, &config);
        let state = start();
        let mut ctx = CommandContext::new(&state.sys, PlayerId::new(0), ADVANCE_PHASE, 0);
        let mut tx = Transition::new(&Notes, state);
        let err = controller.auto_continue(&mut tx, 0, &mut ctx).unwrap_err();
        assert_eq!(err, EngineError::Fault(EngineFault::AutoContinueLimit { limit: 4 }));
    }

    #[test]
    fn test_auto_refusal_stops_quietly() {
        let hooks = Script {
            always_continue: true,
            refuse: true,
            ..Script::default()
        };
        let config = config();
        let registry = registry();
        let controller = PhaseFlowController::new(&hooks, &registry, &config);
        let state = start();
        let mut ctx = CommandContext::new(&state.sys, PlayerId::new(0), ADVANCE_PHASE, 0);
        let mut tx = Transition::new(&Notes, state);
        assert_eq!(controller.auto_continue(&mut tx, 0, &mut ctx).unwrap(), 1);
        assert!(tx.events().is_empty());
    }
}
