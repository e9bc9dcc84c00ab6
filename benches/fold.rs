//! Benchmarks for replaying event logs and processing commands.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use tabletop_engine::core::{Command, EntityId, EventLog, MatchState, PlayerId};
use tabletop_engine::effects::{BoundedResource, MagnitudeCalculation, MagnitudeRequest, Shield};
use tabletop_engine::engine::Engine;
use tabletop_engine::games::duel::{self, Duel, DuelCommand, DuelEvent, DuelState, MAIN};

/// Play `turns` full turns where every main phase declares an attack.
fn record(engine: &Engine<Duel, Duel>, turns: usize) -> (MatchState<DuelState>, EventLog<DuelEvent>) {
    let mut core = Duel::initial_core(2);
    for seat in PlayerId::all(2) {
        core.fighters[seat].health = BoundedResource::full(10_000);
    }
    let initial = engine.initial_state(core, 99);
    let mut state = initial.clone();
    let mut log = EventLog::new();

    for _ in 0..turns * duel::PHASES.len() {
        let player = state.core.active;
        if state.sys.phase == MAIN {
            let target = PlayerId::new(1 - player.0);
            let outcome = engine
                .process(&state, &Command::domain(player, DuelCommand::Attack { target }))
                .expect("attack accepted");
            log.extend(outcome.events);
            state = outcome.state;
        }
        let outcome = engine.process(&state, &Command::advance(player)).expect("advance accepted");
        log.extend(outcome.events);
        state = outcome.state;
    }

    (initial, log)
}

// =============================================================================
// Replay
// =============================================================================

fn benchmark_replay(criterion: &mut Criterion) {
    let engine = duel::engine(2);
    let mut group = criterion.benchmark_group("replay");

    for turns in [10, 100, 1_000] {
        let (initial, log) = record(&engine, turns);
        group.bench_with_input(BenchmarkId::from_parameter(turns), &log, |bencher, log| {
            bencher.iter(|| black_box(engine.replay(&initial, log.iter())));
        });
    }

    group.finish();
}

// =============================================================================
// Commands
// =============================================================================

fn benchmark_process(criterion: &mut Criterion) {
    let engine = duel::engine(2);
    let state = engine.initial_state(Duel::initial_core(2), 1);

    criterion.bench_function("process_advance", |bencher| {
        bencher.iter(|| black_box(engine.process(&state, &Command::advance(PlayerId::new(0)))));
    });
}

fn benchmark_magnitude(criterion: &mut Criterion) {
    let mut core = Duel::initial_core(4);
    let defender = &mut core.fighters[PlayerId::new(1)];
    for i in 0..8 {
        defender.shields.push_back(Shield::new(format!("s{i}"), 2));
    }
    let request = MagnitudeRequest::new(EntityId(0), EntityId(1), 12).collect_shields();

    criterion.bench_function("magnitude_preapplied", |bencher| {
        bencher.iter(|| black_box(MagnitudeCalculation::resolve(&core, black_box(&request))));
    });
}

criterion_group!(benches, benchmark_replay, benchmark_process, benchmark_magnitude);
criterion_main!(benches);
