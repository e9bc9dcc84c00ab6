//! Duel rules: events, commands, the reducer and phase hooks.

use serde::{Deserialize, Serialize};

use super::handlers::DRAIN_TARGET;
use super::state::{DuelState, Fighter, PendingAttack, Status, Token, ATTACK, END, INCOME, MAIN, PHASES, UPKEEP};
use crate::core::{
    Command, CommandKind, CommandName, EngineConfig, Event, EventName, MatchState, PhaseId, PlayerId,
    PlayerMap, SystemEvent, Value,
};
use crate::effects::{MagnitudeApplied, MagnitudeCalculation, MagnitudeRequest, Settlement, Shield};
use crate::error::{EngineError, Result};
use crate::flow::{AutoContinue, FlowHooks, PhaseArgs, PhaseExit};
use crate::interaction::{ChoiceOption, ChoiceSpec, InteractionManager, InteractionRequest};
use crate::response::{ResponderRole, ResponseWindowManager, WindowSpec, WindowType};
use crate::rules::{CommandContext, Domain};

/// `source_id` of the pre-damage window opened for an attack.
pub const ATTACK_SOURCE: &str = "duel.attack";

/// Combat points gained on entering the income phase.
pub const INCOME_CP: i64 = 1;

pub const TOKEN_COST: i64 = 2;
pub const INFLICT_COST: i64 = 3;
pub const DRAIN_COST: i64 = 2;

/// Duel events.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuelEvent {
    IncomeGained { player: PlayerId, amount: i64 },
    CpSpent { player: PlayerId, amount: i64 },
    TokenGained { player: PlayerId, token: Token },
    TokenSpent { player: PlayerId, token: Token },
    StatusApplied { player: PlayerId, status: Status },
    /// Removes every stack.
    StatusCleared { player: PlayerId, status: Status },
    ShieldGranted { player: PlayerId, shield: Shield },
    AttackDeclared { attacker: PlayerId, defender: PlayerId, base: i64 },
    /// Damage; shields are consumed when this is folded.
    Magnitude(MagnitudeApplied),
    Healed { player: PlayerId, amount: i64, settlement: Settlement },
    /// Clears the pending attack and settles every fighter's health.
    AttackResolved { attacker: PlayerId, defender: PlayerId },
    /// End-of-turn settlement of deferred overflow.
    Settled,
}

impl From<MagnitudeApplied> for DuelEvent {
    fn from(applied: MagnitudeApplied) -> Self {
        DuelEvent::Magnitude(applied)
    }
}

impl EventName for DuelEvent {
    fn event_name(&self) -> &'static str {
        match self {
            DuelEvent::IncomeGained { .. } => "DUEL_INCOME_GAINED",
            DuelEvent::CpSpent { .. } => "DUEL_CP_SPENT",
            DuelEvent::TokenGained { .. } => "DUEL_TOKEN_GAINED",
            DuelEvent::TokenSpent { .. } => "DUEL_TOKEN_SPENT",
            DuelEvent::StatusApplied { .. } => "DUEL_STATUS_APPLIED",
            DuelEvent::StatusCleared { .. } => "DUEL_STATUS_CLEARED",
            DuelEvent::ShieldGranted { .. } => "DUEL_SHIELD_GRANTED",
            DuelEvent::AttackDeclared { .. } => "DUEL_ATTACK_DECLARED",
            DuelEvent::Magnitude(_) => "DUEL_DAMAGE_APPLIED",
            DuelEvent::Healed { .. } => "DUEL_HEALED",
            DuelEvent::AttackResolved { .. } => "DUEL_ATTACK_RESOLVED",
            DuelEvent::Settled => "DUEL_SETTLED",
        }
    }
}

/// Duel commands. All are main-phase, active-player only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuelCommand {
    /// Declare an attack; base damage is 2 + d6.
    Attack { target: PlayerId },
    BuyToken(Token),
    Inflict { target: PlayerId, status: Status },
    /// Two-step choice: pick a target, then how much to drain.
    Drain,
}

impl CommandName for DuelCommand {
    fn command_name(&self) -> &'static str {
        match self {
            DuelCommand::Attack { .. } => "DUEL_ATTACK",
            DuelCommand::BuyToken(_) => "DUEL_BUY_TOKEN",
            DuelCommand::Inflict { .. } => "DUEL_INFLICT",
            DuelCommand::Drain => "DUEL_DRAIN",
        }
    }
}

/// The duel game. Acts as its own domain and phase hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Duel {
    pub starting_health: i64,
    pub starting_cp: i64,
}

impl Default for Duel {
    fn default() -> Self {
        Self {
            starting_health: 20,
            starting_cp: 0,
        }
    }
}

impl Duel {
    /// Opening position with default rules.
    pub fn initial_core(player_count: usize) -> DuelState {
        Self::default().core(player_count)
    }

    pub fn core(&self, player_count: usize) -> DuelState {
        DuelState {
            active: PlayerId::new(0),
            round: 1,
            fighters: PlayerMap::new(player_count, |_| Fighter::new(self.starting_health, self.starting_cp)),
            pending_attack: None,
            winner: None,
        }
    }

    /// Engine configuration for a table of `player_count`.
    pub fn config(player_count: usize) -> EngineConfig {
        EngineConfig::new(player_count).with_phase_order(PHASES)
    }

    fn attack(
        &self,
        core: &DuelState,
        player: PlayerId,
        target: PlayerId,
        ctx: &mut CommandContext,
    ) -> Result<Vec<Event<DuelEvent>>> {
        if target == player {
            return Err(EngineError::rejected("cannot attack yourself"));
        }
        if core.fighters.get(target).map_or(true, Fighter::is_defeated) {
            return Err(EngineError::rejected("no such opponent"));
        }
        if core.pending_attack.is_some() {
            return Err(EngineError::rejected("already attacked this turn"));
        }
        let base = 2 + i64::from(ctx.rng().roll_die(6));
        Ok(vec![ctx.domain(DuelEvent::AttackDeclared {
            attacker: player,
            defender: target,
            base,
        })])
    }

    fn drain(&self, core: &DuelState, player: PlayerId, ctx: &mut CommandContext) -> Result<Vec<Event<DuelEvent>>> {
        let options: Vec<ChoiceOption> = core
            .opponents(player)
            .map(|seat| ChoiceOption::new(seat.0.to_string(), seat.to_string()).with_value(i64::from(seat.0)))
            .collect();
        if options.is_empty() {
            return Err(EngineError::rejected("nobody to drain"));
        }
        let request = InteractionRequest::choice(player, ChoiceSpec::new("Drain whom?", options).with_cancel_option())
            .with_source("duel.drain")
            .with_continuation(DRAIN_TARGET, Value::Null);
        Ok(vec![
            ctx.domain(DuelEvent::CpSpent {
                player,
                amount: DRAIN_COST,
            }),
            InteractionManager::<Duel>::request(request, ctx),
        ])
    }

    fn resolve_attack(
        &self,
        core: &DuelState,
        attack: PendingAttack,
        ctx: &mut CommandContext,
    ) -> Result<Vec<Event<DuelEvent>>> {
        let request = MagnitudeRequest::new(attack.attacker.into(), attack.defender.into(), attack.base)
            .with_ability("attack");
        let applied = MagnitudeCalculation::resolve(core, &request)?;
        let mut events = applied.to_events(ctx);
        events.push(ctx.domain(DuelEvent::AttackResolved {
            attacker: attack.attacker,
            defender: attack.defender,
        }));
        Ok(events)
    }

    /// Open the pre-damage window if anyone can react.
    fn reaction_window(
        &self,
        args: &PhaseArgs<'_, Duel>,
        attack: PendingAttack,
        ctx: &mut CommandContext,
    ) -> Result<Option<Event<DuelEvent>>> {
        let spec = WindowSpec::new(WindowType::PreResolution, self.roller(&args.state.core, ATTACK))
            .with_source(ATTACK_SOURCE)
            .with_table(
                args.config.player_count,
                &[
                    (attack.attacker, ResponderRole::Attacker),
                    (attack.defender, ResponderRole::Defender),
                ],
            );
        ResponseWindowManager::new(args.registry).open(args.state, spec, args.config.player_count, ctx)
    }
}

fn spend(fighter: &mut Fighter, amount: i64) {
    fighter.cp = (fighter.cp - amount).max(0);
}

fn stack<K: Ord + Clone>(map: &mut im::OrdMap<K, u32>, key: K, delta: i64) {
    let next = i64::from(map.get(&key).copied().unwrap_or(0)) + delta;
    if next > 0 {
        map.insert(key, u32::try_from(next).unwrap_or(u32::MAX));
    } else {
        map.remove(&key);
    }
}

impl Domain for Duel {
    type Core = DuelState;
    type Event = DuelEvent;
    type Command = DuelCommand;

    fn reduce(&self, core: &DuelState, event: &DuelEvent) -> DuelState {
        let mut next = core.clone();
        let count = next.player_count();
        match event {
            DuelEvent::IncomeGained { player, amount } => {
                if let Some(f) = next.fighters.get_mut(*player) {
                    f.cp += amount;
                }
            }
            DuelEvent::CpSpent { player, amount } => {
                if let Some(f) = next.fighters.get_mut(*player) {
                    spend(f, *amount);
                }
            }
            DuelEvent::TokenGained { player, token } => {
                if let Some(f) = next.fighters.get_mut(*player) {
                    stack(&mut f.tokens, *token, 1);
                }
            }
            DuelEvent::TokenSpent { player, token } => {
                if let Some(f) = next.fighters.get_mut(*player) {
                    stack(&mut f.tokens, *token, -1);
                }
            }
            DuelEvent::StatusApplied { player, status } => {
                if let Some(f) = next.fighters.get_mut(*player) {
                    stack(&mut f.statuses, *status, 1);
                }
            }
            DuelEvent::StatusCleared { player, status } => {
                if let Some(f) = next.fighters.get_mut(*player) {
                    f.statuses.remove(status);
                }
            }
            DuelEvent::ShieldGranted { player, shield } => {
                if let Some(f) = next.fighters.get_mut(*player) {
                    f.shields.push_back(shield.clone());
                }
            }
            DuelEvent::AttackDeclared {
                attacker,
                defender,
                base,
            } => {
                next.pending_attack = Some(PendingAttack {
                    attacker: *attacker,
                    defender: *defender,
                    base: *base,
                    reactions_done: false,
                });
            }
            DuelEvent::Magnitude(applied) => {
                let Some(target) = applied.target.as_player(count) else {
                    return next;
                };
                if let Some(f) = next.fighters.get_mut(target) {
                    let settled = applied.settle_against(&f.shields);
                    f.shields = settled.shields;
                    f.health.lose(settled.dealt);
                }
                let mut alive = next.fighters.iter().filter(|(_, f)| !f.is_defeated()).map(|(p, _)| p);
                if let (Some(last), None) = (alive.next(), alive.next()) {
                    next.winner = next.winner.or(Some(last));
                }
            }
            DuelEvent::Healed {
                player,
                amount,
                settlement,
            } => {
                if let Some(f) = next.fighters.get_mut(*player) {
                    f.health.gain(*amount, *settlement);
                }
            }
            DuelEvent::AttackResolved { .. } => {
                next.pending_attack = None;
                for seat in PlayerId::all(count) {
                    next.fighters[seat].health.settle();
                }
            }
            DuelEvent::Settled => {
                for seat in PlayerId::all(count) {
                    next.fighters[seat].health.settle();
                }
            }
        }
        next
    }

    fn execute(
        &self,
        state: &MatchState<DuelState>,
        command: &Command<DuelCommand>,
        ctx: &mut CommandContext,
    ) -> Result<Vec<Event<DuelEvent>>> {
        let CommandKind::Domain(kind) = &command.kind else {
            return Ok(Vec::new());
        };
        let core = &state.core;
        let player = command.player;
        if core.winner.is_some() {
            return Err(EngineError::rejected("the match is over"));
        }
        if state.sys.phase != MAIN {
            return Err(EngineError::rejected("only during the main phase"));
        }
        if player != core.active {
            return Err(EngineError::rejected("not your turn"));
        }
        let cp = core.fighters.get(player).map_or(0, |f| f.cp);
        let afford = |cost: i64| {
            if cp >= cost {
                Ok(())
            } else {
                Err(EngineError::rejected(format!("needs {cost} cp, have {cp}")))
            }
        };

        match kind {
            DuelCommand::Attack { target } => self.attack(core, player, *target, ctx),
            DuelCommand::BuyToken(token) => {
                afford(TOKEN_COST)?;
                Ok(vec![
                    ctx.domain(DuelEvent::CpSpent {
                        player,
                        amount: TOKEN_COST,
                    }),
                    ctx.domain(DuelEvent::TokenGained { player, token: *token }),
                ])
            }
            DuelCommand::Inflict { target, status } => {
                afford(INFLICT_COST)?;
                if core.fighters.get(*target).is_none() {
                    return Err(EngineError::rejected("no such player"));
                }
                Ok(vec![
                    ctx.domain(DuelEvent::CpSpent {
                        player,
                        amount: INFLICT_COST,
                    }),
                    ctx.domain(DuelEvent::StatusApplied {
                        player: *target,
                        status: *status,
                    }),
                ])
            }
            DuelCommand::Drain => {
                afford(DRAIN_COST)?;
                self.drain(core, player, ctx)
            }
        }
    }

    fn active_player(&self, core: &DuelState) -> PlayerId {
        core.active
    }

    /// The attacker rolled the pending attack.
    fn roller(&self, core: &DuelState, phase: PhaseId) -> PlayerId {
        match core.pending_attack {
            Some(attack) if phase == ATTACK => attack.attacker,
            _ => core.active,
        }
    }

    fn observe_system(&self, core: &DuelState, event: &SystemEvent) -> Option<DuelState> {
        match event {
            SystemEvent::PhaseChanged {
                from,
                to,
                active_player,
            } => {
                let mut next = core.clone();
                next.active = *active_player;
                if *from == END && *to == UPKEEP {
                    next.round += 1;
                }
                Some(next)
            }
            SystemEvent::WindowClosed {
                source_id: Some(source),
                ..
            } if source == ATTACK_SOURCE => {
                let mut next = core.clone();
                if let Some(attack) = next.pending_attack.as_mut() {
                    attack.reactions_done = true;
                }
                Some(next)
            }
            _ => None,
        }
    }
}

impl FlowHooks<Duel> for Duel {
    fn can_advance(&self, state: &MatchState<DuelState>, command: &Command<DuelCommand>) -> std::result::Result<(), String> {
        if state.core.winner.is_some() {
            return Err("the match is over".into());
        }
        if command.player != state.core.active {
            return Err(format!("only {} may advance", state.core.active));
        }
        Ok(())
    }

    fn active_player(&self, state: &MatchState<DuelState>, from: PhaseId, to: PhaseId) -> Option<PlayerId> {
        let core = &state.core;
        if from == END && to == UPKEEP {
            Some(core.next_alive(core.active))
        } else {
            Some(core.active)
        }
    }

    fn on_phase_exit(&self, args: &PhaseArgs<'_, Duel>, ctx: &mut CommandContext) -> Result<PhaseExit<DuelEvent>> {
        let core = &args.state.core;
        let player = core.active;
        match args.from {
            INCOME if core.fighters.get(player).is_some_and(|f| f.status(Status::Stunned) > 0) => {
                tracing::debug!(%player, "stunned, skipping to end");
                Ok(PhaseExit::new(vec![ctx.domain(DuelEvent::StatusCleared {
                    player,
                    status: Status::Stunned,
                })])
                .with_override(END))
            }
            ATTACK => {
                let Some(attack) = core.pending_attack else {
                    return Ok(PhaseExit::default());
                };
                if !attack.reactions_done {
                    if let Some(opened) = self.reaction_window(args, attack, ctx)? {
                        return Ok(PhaseExit::halt(vec![opened]));
                    }
                }
                Ok(PhaseExit::new(self.resolve_attack(core, attack, ctx)?))
            }
            END if core.fighters.iter().any(|(_, f)| f.health.is_over_cap()) => {
                Ok(PhaseExit::new(vec![ctx.domain(DuelEvent::Settled)]))
            }
            _ => Ok(PhaseExit::default()),
        }
    }

    fn on_phase_enter(&self, args: &PhaseArgs<'_, Duel>, ctx: &mut CommandContext) -> Result<Vec<Event<DuelEvent>>> {
        let core = &args.state.core;
        let player = core.active;
        let events = match args.to {
            INCOME => vec![ctx.domain(DuelEvent::IncomeGained {
                player,
                amount: INCOME_CP,
            })],
            UPKEEP if core.fighters.get(player).is_some_and(|f| f.status(Status::Vulnerable) > 0) => {
                vec![ctx.domain(DuelEvent::StatusCleared {
                    player,
                    status: Status::Vulnerable,
                })]
            }
            _ => Vec::new(),
        };
        Ok(events)
    }

    fn on_auto_continue_check(&self, state: &MatchState<DuelState>, _recent: &[Event<DuelEvent>]) -> Option<AutoContinue> {
        let sys = &state.sys;
        (sys.flow_halted() && sys.blocker().is_none() && state.core.winner.is_none())
            .then_some(AutoContinue {
                player: state.core.active,
            })
    }
}
