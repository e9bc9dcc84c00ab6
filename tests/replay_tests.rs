//! Integration tests for event sourcing: replay, determinism and
//! checkpoints.

use proptest::prelude::*;
use serde_json::json;
use tabletop_engine::core::{
    Command, EventKind, EventLog, MatchState, PlayerId, UndoConfig, Value, ADVANCE_PHASE,
};
use tabletop_engine::engine::Engine;
use tabletop_engine::games::duel::{self, Duel, DuelCommand, DuelEvent, DuelState, Status, Token};
use tabletop_engine::interaction::Resolution;
use tabletop_engine::Event;

fn p(n: u8) -> PlayerId {
    PlayerId::new(n)
}

struct Recorder<'e> {
    engine: &'e Engine<Duel, Duel>,
    state: MatchState<DuelState>,
    log: EventLog<DuelEvent>,
}

impl<'e> Recorder<'e> {
    fn new(engine: &'e Engine<Duel, Duel>, initial: &MatchState<DuelState>) -> Self {
        Self {
            engine,
            state: initial.clone(),
            log: EventLog::new(),
        }
    }

    fn send(&mut self, command: Command<DuelCommand>) {
        let outcome = self.engine.process(&self.state, &command).expect("command accepted");
        self.log.extend(outcome.events);
        self.state = outcome.state;
    }

    fn resolve_active(&mut self, resolution: Resolution) {
        let interaction = self.state.sys.active_interaction().expect("interaction pending");
        let (player, id) = (interaction.player, interaction.id);
        self.send(Command::resolve(player, id, resolution));
    }
}

fn opening() -> DuelState {
    let mut core = Duel::initial_core(2);
    core.fighters[p(0)].cp = 5;
    core.fighters[p(1)].tokens.insert(Token::Protect, 1);
    core
}

/// One turn touching every subsystem: a two-step drain, an attack with a
/// reaction window, and end-of-turn settlement.
fn play<'e>(engine: &'e Engine<Duel, Duel>, seed: u64) -> (MatchState<DuelState>, Recorder<'e>) {
    let initial = engine.initial_state(opening(), seed);
    let mut rec = Recorder::new(engine, &initial);

    rec.send(Command::advance(p(0)).at(1));
    rec.send(Command::advance(p(0)).at(2));
    rec.send(Command::domain(p(0), DuelCommand::Drain).at(3));
    rec.resolve_active(Resolution::choose("1"));
    rec.resolve_active(Resolution::Amount(Some(2)));
    rec.send(Command::domain(p(0), DuelCommand::Attack { target: p(1) }).at(4));
    rec.send(Command::advance(p(0)).at(5));
    rec.send(Command::advance(p(0)).at(6));
    rec.send(Command::respond(p(1), Value::from("shield")).at(7));
    rec.send(Command::advance(p(0)).at(8));

    (initial, rec)
}

// =============================================================================
// Replay
// =============================================================================

/// Test that folding the recorded log reproduces the live state.
#[test]
fn test_replay_matches_live_state() {
    let engine = duel::engine(2);
    let (initial, rec) = play(&engine, 42);

    let replayed = engine.replay(&initial, rec.log.iter());

    assert_eq!(replayed, rec.state);
    assert_eq!(rec.log.replay(engine.domain(), &initial), rec.state);
    assert_eq!(rec.state.core.active, p(1));
    assert_eq!(rec.state.core.fighters[p(0)].health.value, 20);
}

/// Test that every recognised event bumps the revision exactly once.
#[test]
fn test_revision_counts_events() {
    let engine = duel::engine(2);
    let (_, rec) = play(&engine, 42);

    assert_eq!(rec.state.sys.revision, rec.log.len() as u64);
}

/// Test that replaying a prefix gives the state at that point.
#[test]
fn test_replay_prefix() {
    let engine = duel::engine(2);
    let initial = engine.initial_state(opening(), 42);
    let mut rec = Recorder::new(&engine, &initial);
    rec.send(Command::advance(p(0)));
    rec.send(Command::advance(p(0)));
    let checkpoint = rec.state.clone();
    let mark = rec.log.len();
    rec.send(Command::domain(p(0), DuelCommand::Drain));

    let partial: Vec<Event<DuelEvent>> = rec.log.iter().take(mark).cloned().collect();
    assert_eq!(engine.replay(&initial, partial.iter()), checkpoint);
    assert_eq!(engine.replay(&checkpoint, rec.log.since(mark)), rec.state);
}

/// Test that a JSON log from a newer build decodes, and its unknown
/// events fold as no-ops.
#[test]
fn test_unknown_variants_in_json_log_are_skipped() {
    let engine = duel::engine(2);
    let (initial, rec) = play(&engine, 42);

    let mut wire = serde_json::to_value(rec.log.iter().collect::<Vec<_>>()).unwrap();
    let events = wire.as_array_mut().unwrap();
    events.insert(
        3,
        json!({"kind": {"System": {"ComboTriggered": {"hits": 3}}}, "timestamp": 9, "source_command": null}),
    );
    events.push(json!({
        "kind": {"Domain": {"Riposte": {"player": 1, "amount": 2}}},
        "timestamp": 10,
        "source_command": "DUEL_RIPOSTE"
    }));

    let decoded: Vec<Event<DuelEvent>> = serde_json::from_value(wire).unwrap();
    assert_eq!(decoded.len(), rec.log.len() + 2);
    assert_eq!(decoded[3].type_name(), "ComboTriggered");
    assert!(matches!(
        &decoded[decoded.len() - 1].kind,
        EventKind::Unrecognized { type_name, payload } if type_name == "Riposte" && payload.get("Riposte").is_some()
    ));

    assert_eq!(engine.replay(&initial, decoded.iter()), rec.state);
    let unknown_only = engine.replay(&initial, [&decoded[3]]);
    assert_eq!(unknown_only, initial);
    assert_eq!(unknown_only.sys.revision, 0);
}

// =============================================================================
// Determinism
// =============================================================================

/// Test that the same seed and commands give the same events.
#[test]
fn test_same_seed_same_log() {
    let engine = duel::engine(2);
    let (_, first) = play(&engine, 7);
    let (_, second) = play(&engine, 7);

    assert_eq!(first.log, second.log);
    assert_eq!(first.state, second.state);
}

/// Test that events carry the command's timestamp and wire type.
#[test]
fn test_events_stamped_by_command() {
    let engine = duel::engine(2);
    let state = engine.initial_state(opening(), 7);

    let outcome = engine.process(&state, &Command::advance(p(0)).at(55)).unwrap();

    assert!(outcome
        .events
        .iter()
        .all(|e| e.timestamp == 55 && e.source_command.as_deref() == Some(ADVANCE_PHASE)));
}

/// Test that a rejected command leaves the caller's state untouched.
#[test]
fn test_rejected_command_commits_nothing() {
    let engine = duel::engine(2);
    let state = engine.initial_state(opening(), 7);
    let before = state.clone();

    assert!(engine
        .process(&state, &Command::domain(p(0), DuelCommand::BuyToken(Token::Fury)))
        .is_err());
    assert_eq!(state, before);
}

// =============================================================================
// Checkpoints
// =============================================================================

/// Test that a bincode checkpoint taken mid-decision resumes identically.
#[test]
fn test_checkpoint_mid_interaction() {
    let engine = duel::engine(2);
    let initial = engine.initial_state(opening(), 3);
    let mut rec = Recorder::new(&engine, &initial);
    rec.send(Command::advance(p(0)));
    rec.send(Command::advance(p(0)));
    rec.send(Command::domain(p(0), DuelCommand::Drain));

    let bytes = rec.state.to_bytes().unwrap();
    let restored = MatchState::<DuelState>::from_bytes(&bytes).unwrap();
    assert_eq!(restored, rec.state);

    let id = restored.sys.active_interaction().unwrap().id;
    let command = Command::resolve(p(0), id, Resolution::choose("1"));
    let live = engine.process(&rec.state, &command).unwrap();
    let resumed = engine.process(&restored, &command).unwrap();
    assert_eq!(live, resumed);
}

/// Test that the event log survives a bincode round trip.
#[test]
fn test_log_checkpoint() {
    let engine = duel::engine(2);
    let (initial, rec) = play(&engine, 5);

    let bytes = rec.log.to_bytes().unwrap();
    let restored = EventLog::<DuelEvent>::from_bytes(&bytes).unwrap();

    assert_eq!(restored, rec.log);
    assert_eq!(restored.replay(engine.domain(), &initial), rec.state);
}

/// Test the JSON shape hosts see on the wire.
#[test]
fn test_event_json_shape() {
    let engine = duel::engine(2);
    let state = engine.initial_state(opening(), 5);
    let outcome = engine.process(&state, &Command::advance(p(0)).at(12)).unwrap();

    let json = serde_json::to_value(&outcome.events[0]).unwrap();

    assert_eq!(json["timestamp"], 12);
    assert_eq!(json["source_command"], ADVANCE_PHASE);
    assert_eq!(json["kind"]["System"]["PhaseAdvanceStarted"]["from"], 0);
    assert_eq!(json["kind"]["System"]["PhaseAdvanceStarted"]["to"], 1);

    let back: Event<DuelEvent> = serde_json::from_value(json).unwrap();
    assert_eq!(back, outcome.events[0]);
}

// =============================================================================
// Property Tests
// =============================================================================

#[derive(Clone, Debug)]
enum Op {
    Advance(u8),
    Attack(u8, u8),
    Buy(u8, Token),
    Inflict(u8, u8, Status),
    Drain(u8),
    Choose(&'static str),
    Amount(Option<i64>),
    Cancel,
    Pass(u8),
    Respond(u8),
    RequestUndo(u8),
    ApproveUndo(u8),
    RejectUndo(u8),
}

fn op() -> impl Strategy<Value = Op> {
    let player = 0u8..2;
    prop_oneof![
        4 => player.clone().prop_map(Op::Advance),
        2 => (player.clone(), player.clone()).prop_map(|(a, t)| Op::Attack(a, t)),
        1 => (player.clone(), prop_oneof![Just(Token::Fury), Just(Token::Protect)]).prop_map(|(a, t)| Op::Buy(a, t)),
        1 => (
            player.clone(),
            player.clone(),
            prop_oneof![Just(Status::Armor), Just(Status::Vulnerable), Just(Status::Stunned)]
        )
            .prop_map(|(a, t, s)| Op::Inflict(a, t, s)),
        1 => player.clone().prop_map(Op::Drain),
        2 => prop_oneof![Just("0"), Just("1")].prop_map(Op::Choose),
        2 => prop_oneof![Just(None), (0i64..4).prop_map(Some)].prop_map(Op::Amount),
        1 => Just(Op::Cancel),
        2 => player.clone().prop_map(Op::Pass),
        1 => player.clone().prop_map(Op::Respond),
        1 => player.clone().prop_map(Op::RequestUndo),
        1 => player.clone().prop_map(Op::ApproveUndo),
        1 => player.prop_map(Op::RejectUndo),
    ]
}

fn command_for(state: &MatchState<DuelState>, op: &Op) -> Option<Command<DuelCommand>> {
    let active = state.sys.active_interaction().map(|i| (i.player, i.id));
    let command = match op {
        Op::Advance(a) => Command::advance(p(*a)),
        Op::Attack(a, t) => Command::domain(p(*a), DuelCommand::Attack { target: p(*t) }),
        Op::Buy(a, token) => Command::domain(p(*a), DuelCommand::BuyToken(*token)),
        Op::Inflict(a, t, status) => Command::domain(
            p(*a),
            DuelCommand::Inflict {
                target: p(*t),
                status: *status,
            },
        ),
        Op::Drain(a) => Command::domain(p(*a), DuelCommand::Drain),
        Op::Choose(option) => {
            let (player, id) = active?;
            Command::resolve(player, id, Resolution::choose(*option))
        }
        Op::Amount(amount) => {
            let (player, id) = active?;
            Command::resolve(player, id, Resolution::Amount(*amount))
        }
        Op::Cancel => {
            let (player, id) = active?;
            Command::cancel(player, id)
        }
        Op::Pass(a) => Command::pass(p(*a)),
        Op::Respond(a) => Command::respond(p(*a), Value::from("shield")),
        Op::RequestUndo(a) => Command::request_undo(p(*a)),
        Op::ApproveUndo(a) => Command::approve_undo(p(*a)),
        Op::RejectUndo(a) => Command::reject_undo(p(*a)),
    };
    Some(command)
}

/// Apply every op the engine accepts; rejected ones are skipped.
fn run_ops(
    engine: &Engine<Duel, Duel>,
    seed: u64,
    ops: &[Op],
) -> (MatchState<DuelState>, MatchState<DuelState>, EventLog<DuelEvent>) {
    let initial = engine.initial_state(opening(), seed);
    let mut state = initial.clone();
    let mut log = EventLog::new();
    for (at, op) in ops.iter().enumerate() {
        let Some(command) = command_for(&state, op) else {
            continue;
        };
        if let Ok(outcome) = engine.process(&state, &command.at(at as u64)) {
            log.extend(outcome.events);
            state = outcome.state;
        }
    }
    (initial, state, log)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: any accepted command sequence is deterministic and its
    /// log rebuilds the live state, including through a JSON round trip.
    #[test]
    fn replay_matches_live_for_random_commands(
        seed in any::<u64>(),
        ops in prop::collection::vec(op(), 0..40)
    ) {
        let engine = duel::engine_with(Duel::config(2).with_undo(UndoConfig::default().with_max_snapshots(4)));
        let (initial, live, log) = run_ops(&engine, seed, &ops);
        let (_, again, log_again) = run_ops(&engine, seed, &ops);

        prop_assert_eq!(&live, &again);
        prop_assert_eq!(&log, &log_again);
        prop_assert_eq!(live.sys.revision, log.len() as u64);
        prop_assert_eq!(&engine.replay(&initial, log.iter()), &live);

        let json = serde_json::to_string(&log.iter().collect::<Vec<_>>()).unwrap();
        let decoded: Vec<Event<DuelEvent>> = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(&engine.replay(&initial, decoded.iter()), &live);
    }
}
