//! # tabletop-engine
//!
//! An event-sourced rules engine for turn-based tabletop games.
//!
//! ## Design Principles
//!
//! 1. **Events Are The Record**: commands become events; state changes
//!    only by folding events through a pure reducer. Replaying the log
//!    from match start rebuilds the live state exactly.
//!
//! 2. **Waiting Is Data**: a pending decision (interaction) or reaction
//!    opportunity (response window) is stored in state together with the
//!    name of the handler that continues it. Nothing is suspended on the
//!    call stack, so a match survives a restart mid-decision.
//!
//! 3. **Game-Agnostic**: phases, events, commands and state are supplied
//!    by the game through the [`Domain`] and [`FlowHooks`] traits and a
//!    constructed-once [`Registry`].
//!
//! ## Architecture
//!
//! - **One Transition Per Command**: every component appends to the same
//!   [`Transition`], so later steps see post-reduction state. A failed
//!   command drops the transition and commits nothing.
//!
//! - **Persistent Data Structures**: O(1) snapshot cloning via `im-rs`.
//!
//! - **Deterministic RNG**: each command draws from a ChaCha stream keyed
//!   by match seed and revision; results are written into events.
//!
//! ## Modules
//!
//! - `core`: ids, payloads, commands, events, state, RNG, configuration
//! - `effects`: modifiers, shields, bounded resources, magnitude pipeline
//! - `rules`: the `Domain` trait, reducer and command context
//! - `interaction`: blocking player decisions
//! - `response`: multi-player response windows
//! - `flow`: phase hooks and the phase flow controller
//! - `registry`: continuation and response handlers
//! - `undo`: bounded snapshots and the undo approval handshake
//! - `engine`: command routing and auto-continue
//! - `games`: sample games

pub mod core;
pub mod effects;
pub mod engine;
pub mod error;
pub mod flow;
pub mod games;
pub mod interaction;
pub mod registry;
pub mod response;
pub mod rules;
pub mod undo;

// Re-export commonly used types
pub use crate::core::{
    Command, CommandKind, CommandName, EngineConfig, EntityId, Event, EventKind, EventLog, EventName,
    FlowStatus, GameRng, MatchState, PhaseId, PlayerId, PlayerMap, SystemEvent,
    SystemState, UndoConfig, Value,
};

pub use crate::effects::{
    BoundedResource, MagnitudeApplied, MagnitudeCalculation, MagnitudeRequest, MagnitudeSource,
    Modifier, ModifierKind, ModifierOrigin, Settlement, Shield, ShieldMode,
};

pub use crate::engine::{CommandOutcome, Engine};

pub use crate::error::{Blocker, EngineError, EngineFault, ErrorKind, Result, ValidationError};

pub use crate::flow::{AutoContinue, FlowHooks, NoHooks, PhaseArgs, PhaseExit, PhaseFlowController};

pub use crate::interaction::{
    Interaction, InteractionId, InteractionKind, InteractionManager, InteractionRequest, Resolution,
};

pub use crate::registry::{ContinuationArgs, Registry, ResponseArgs, ResponseOutcome};

pub use crate::response::{
    ResponderRole, ResponseWindow, ResponseWindowManager, WindowId, WindowSpec, WindowType,
};

pub use crate::rules::{CommandContext, Domain, Transition};

pub use crate::undo::{UndoHistory, UndoManager, UndoRequest, UndoState};
