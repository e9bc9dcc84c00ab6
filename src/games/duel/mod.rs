//! Duel: a small dice-combat game exercising every engine subsystem.
//!
//! - Turn: upkeep, income (+1 cp), main, attack, end
//! - Main phase: declare an attack (2 + d6), buy tokens, inflict
//!   statuses, or drain an opponent through a two-step choice
//! - Leaving the attack phase opens a pre-damage window for anyone
//!   holding a protect token, then resolves the attack through the
//!   magnitude pipeline
//! - Stunned fighters skip straight from income to end
//! - Drain heals past the cap until the next settlement point
//!
//! Supports 2-8 players.

mod game;
mod handlers;
mod state;

pub use game::{
    Duel, DuelCommand, DuelEvent, ATTACK_SOURCE, DRAIN_COST, INCOME_CP, INFLICT_COST, TOKEN_COST,
};
pub use handlers::{registry, DRAIN_AMOUNT, DRAIN_MAX, DRAIN_TARGET, GUARD_AMOUNT, PROTECT_SHIELD};
pub use state::{
    DuelState, Fighter, PendingAttack, Status, Token, ATTACK, END, INCOME, MAIN, PHASES, UPKEEP,
};

use crate::core::EngineConfig;
use crate::engine::Engine;

/// A duel engine with default rules for `player_count` players.
pub fn engine(player_count: usize) -> Engine<Duel, Duel> {
    assert!((2..=8).contains(&player_count), "Player count must be 2-8");
    engine_with(Duel::config(player_count))
}

/// A duel engine over a customised [`Duel::config`], e.g. with undo.
pub fn engine_with(config: EngineConfig) -> Engine<Duel, Duel> {
    assert!((2..=8).contains(&config.player_count), "Player count must be 2-8");
    Engine::new(Duel::default(), Duel::default(), registry(), config)
}
