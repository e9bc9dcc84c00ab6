//! Core engine types: ids, payloads, commands, events, state, RNG,
//! configuration.
//!
//! Everything here is game-agnostic. Games plug their own state and
//! event types into [`MatchState`] and [`Event`].

pub mod command;
pub mod config;
pub mod entity;
pub mod event;
pub mod log;
pub mod player;
pub mod rng;
pub mod state;
pub mod value;

pub use command::{Command, CommandKind, CommandName, ADVANCE_PHASE};
pub use config::{EngineConfig, PhaseId, UndoConfig, DEFAULT_MAX_AUTO_CONTINUE, DEFAULT_MAX_SNAPSHOTS};
pub use entity::EntityId;
pub use event::{Event, EventKind, EventName, SystemEvent};
pub use log::EventLog;
pub use player::{PlayerId, PlayerMap};
pub use rng::GameRng;
pub use state::{FlowStatus, InteractionState, MatchState, SystemState};
pub use value::Value;
