//! Continuations and response handlers registered by the duel.

use super::game::{Duel, DuelEvent};
use super::state::{DuelState, Token};
use crate::core::{Event, PlayerId, Value};
use crate::effects::{CollectOptions, MagnitudeCalculation, MagnitudeRequest, Settlement, Shield};
use crate::error::{EngineError, Result};
use crate::interaction::{InteractionKind, InteractionManager, InteractionRequest, SliderSpec};
use crate::registry::{ContinuationArgs, Registry, ResponseArgs, ResponseOutcome};
use crate::response::WindowType;
use crate::rules::CommandContext;

pub const DRAIN_TARGET: &str = "duel.drain.target";
pub const DRAIN_AMOUNT: &str = "duel.drain.amount";
pub const GUARD_AMOUNT: &str = "duel.guard.amount";

/// Most a single drain can take.
pub const DRAIN_MAX: i64 = 3;

/// Shield granted by spending a protect token.
pub const PROTECT_SHIELD: i64 = 3;

/// Everything the duel registers.
pub fn registry() -> Registry<Duel> {
    Registry::new()
        .with_continuation(DRAIN_TARGET, drain_target)
        .with_continuation(DRAIN_AMOUNT, drain_amount)
        .with_continuation(GUARD_AMOUNT, guard_amount)
        .with_response_handler(WindowType::PreResolution, protect)
        .with_responder_filter(|core: &DuelState, player, _window_type, _source| {
            core.fighters.get(player).is_some_and(|f| f.token(Token::Protect) > 0)
        })
}

/// First step of a drain: the target is picked, ask how much.
fn drain_target(args: &ContinuationArgs<'_, DuelState>, ctx: &mut CommandContext) -> Result<Vec<Event<DuelEvent>>> {
    let target = chosen_seat(args)?;
    let request = InteractionRequest::slider(
        args.interaction.player,
        SliderSpec::new("Drain how much?", 1, DRAIN_MAX).with_default(1).skippable(),
    )
    .with_source("duel.drain")
    .with_continuation(DRAIN_AMOUNT, Value::map([("target", Value::from(i64::from(target.0)))]));
    Ok(vec![InteractionManager::<Duel>::request(request, ctx)])
}

/// Second step: deal the drained amount, ignoring shields and modifiers,
/// and heal by what was dealt. The heal may overflow until settlement.
fn drain_amount(args: &ContinuationArgs<'_, DuelState>, ctx: &mut CommandContext) -> Result<Vec<Event<DuelEvent>>> {
    let Some(amount) = args.resolution.amount() else {
        tracing::debug!(player = %args.interaction.player, "drain skipped");
        return Ok(Vec::new());
    };
    let target = args
        .params()
        .get("target")
        .and_then(Value::as_int)
        .and_then(|seat| u8::try_from(seat).ok())
        .map(PlayerId::new)
        .ok_or_else(|| EngineError::rejected("drain target missing"))?;

    let source = args.interaction.player;
    let request = MagnitudeRequest::new(source.into(), target.into(), amount)
        .with_ability("drain")
        .with_collect(CollectOptions {
            tokens: false,
            statuses: false,
            shields: false,
        })
        .bypass_shields();
    let applied = MagnitudeCalculation::resolve(&args.state.core, &request)?;
    let healed = applied.amount;

    let mut events = applied.to_events(ctx);
    events.push(ctx.domain(DuelEvent::Healed {
        player: source,
        amount: healed,
        settlement: Settlement::Deferred,
    }));
    Ok(events)
}

/// Response to the pre-damage window. `"shield"` spends a protect token
/// for a shield; `"guard"` also asks how many cp to pour into it.
fn protect(args: &ResponseArgs<'_, DuelState>, ctx: &mut CommandContext) -> Result<ResponseOutcome<DuelEvent>> {
    let player = args.player;
    let Some(fighter) = args.state.core.fighters.get(player) else {
        return Err(EngineError::UnknownEntity { entity: player.into() });
    };
    if fighter.token(Token::Protect) == 0 {
        return Err(EngineError::rejected("no protect token"));
    }
    let spent = ctx.domain(DuelEvent::TokenSpent {
        player,
        token: Token::Protect,
    });

    match args.payload.as_text() {
        Some("shield") => Ok(ResponseOutcome::done(vec![
            spent,
            ctx.domain(DuelEvent::ShieldGranted {
                player,
                shield: Shield::new(format!("protect-{}", args.window.id.0), PROTECT_SHIELD),
            }),
        ])),
        Some("guard") => {
            let request = InteractionRequest::slider(player, SliderSpec::new("Pour cp into the guard", 0, fighter.cp))
                .with_source(format!("protect-{}", args.window.id.0))
                .with_continuation(GUARD_AMOUNT, Value::Null);
            Ok(ResponseOutcome::done(vec![spent, InteractionManager::<Duel>::request(request, ctx)]))
        }
        _ => Err(EngineError::rejected("expected \"shield\" or \"guard\"")),
    }
}

fn guard_amount(args: &ContinuationArgs<'_, DuelState>, ctx: &mut CommandContext) -> Result<Vec<Event<DuelEvent>>> {
    let player = args.interaction.player;
    let amount = args.resolution.amount().unwrap_or(0);
    let source = args.interaction.source_id.clone().unwrap_or_else(|| "guard".into());
    let mut events = Vec::new();
    if amount > 0 {
        events.push(ctx.domain(DuelEvent::CpSpent { player, amount }));
    }
    events.push(ctx.domain(DuelEvent::ShieldGranted {
        player,
        shield: Shield::new(source, PROTECT_SHIELD + 2 * amount),
    }));
    Ok(events)
}

fn chosen_seat(args: &ContinuationArgs<'_, DuelState>) -> Result<PlayerId> {
    let InteractionKind::SimpleChoice(spec) = &args.interaction.kind else {
        return Err(EngineError::rejected("drain target must be a choice"));
    };
    args.resolution
        .first_choice()
        .and_then(|id| spec.options.iter().find(|o| o.id == id))
        .and_then(|option| option.value.as_int())
        .and_then(|seat| u8::try_from(seat).ok())
        .map(PlayerId::new)
        .ok_or_else(|| EngineError::rejected("unknown drain target"))
}
