//! Commands: player intents entering the engine.
//!
//! A command never changes state by itself. The engine routes it by
//! kind, the responsible component turns it into events, and only the
//! events are folded.
//!
//! ```
//! use tabletop_engine::core::{Command, CommandKind, PlayerId};
//!
//! let cmd: Command<()> = Command::advance(PlayerId::new(0)).at(1_000);
//! assert!(matches!(cmd.kind, CommandKind::AdvancePhase));
//! assert_eq!(cmd.timestamp, 1_000);
//! ```

use serde::{Deserialize, Serialize};

use super::{PlayerId, Value};
use crate::interaction::{InteractionId, Resolution};

/// Wire type of the phase advance command.
pub const ADVANCE_PHASE: &str = "ADVANCE_PHASE";

/// Wire name of a game-defined command.
pub trait CommandName {
    fn command_name(&self) -> &'static str;
}

impl CommandName for () {
    fn command_name(&self) -> &'static str {
        "NOOP"
    }
}

/// What a command asks for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind<K> {
    AdvancePhase,
    ResolveInteraction {
        interaction: InteractionId,
        resolution: Resolution,
    },
    CancelInteraction {
        interaction: InteractionId,
    },
    /// Pass in the open response window, optionally for a disconnected
    /// current responder.
    PassResponse {
        on_behalf_of: Option<PlayerId>,
    },
    /// Act in the open response window.
    Respond {
        payload: Value,
    },
    /// Ask to take back the latest command.
    RequestUndo,
    ApproveUndo,
    RejectUndo,
    /// Withdraw one's own undo request.
    CancelUndo,
    Domain(K),
}

impl<K> CommandKind<K> {
    /// Undo commands are handled before any checkpoint is taken.
    #[must_use]
    pub fn is_undo(&self) -> bool {
        matches!(
            self,
            CommandKind::RequestUndo | CommandKind::ApproveUndo | CommandKind::RejectUndo | CommandKind::CancelUndo
        )
    }
}

/// A player intent stamped with the host's clock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command<K> {
    pub kind: CommandKind<K>,
    pub player: PlayerId,
    pub timestamp: u64,
}

impl<K> Command<K> {
    pub fn new(player: PlayerId, kind: CommandKind<K>) -> Self {
        Self {
            kind,
            player,
            timestamp: 0,
        }
    }

    pub fn advance(player: PlayerId) -> Self {
        Self::new(player, CommandKind::AdvancePhase)
    }

    pub fn resolve(player: PlayerId, interaction: InteractionId, resolution: Resolution) -> Self {
        Self::new(
            player,
            CommandKind::ResolveInteraction {
                interaction,
                resolution,
            },
        )
    }

    pub fn cancel(player: PlayerId, interaction: InteractionId) -> Self {
        Self::new(player, CommandKind::CancelInteraction { interaction })
    }

    pub fn pass(player: PlayerId) -> Self {
        Self::new(player, CommandKind::PassResponse { on_behalf_of: None })
    }

    pub fn pass_for(player: PlayerId, responder: PlayerId) -> Self {
        Self::new(
            player,
            CommandKind::PassResponse {
                on_behalf_of: Some(responder),
            },
        )
    }

    pub fn respond(player: PlayerId, payload: Value) -> Self {
        Self::new(player, CommandKind::Respond { payload })
    }

    pub fn request_undo(player: PlayerId) -> Self {
        Self::new(player, CommandKind::RequestUndo)
    }

    pub fn approve_undo(player: PlayerId) -> Self {
        Self::new(player, CommandKind::ApproveUndo)
    }

    pub fn reject_undo(player: PlayerId) -> Self {
        Self::new(player, CommandKind::RejectUndo)
    }

    pub fn cancel_undo(player: PlayerId) -> Self {
        Self::new(player, CommandKind::CancelUndo)
    }

    pub fn domain(player: PlayerId, command: K) -> Self {
        Self::new(player, CommandKind::Domain(command))
    }

    /// Stamp with the host timestamp.
    #[must_use]
    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

impl<K: CommandName> Command<K> {
    /// Wire type string.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            CommandKind::AdvancePhase => ADVANCE_PHASE,
            CommandKind::ResolveInteraction { .. } => "SYS_INTERACTION_RESOLVE",
            CommandKind::CancelInteraction { .. } => "SYS_INTERACTION_CANCEL",
            CommandKind::PassResponse { .. } => "RESPONSE_PASS",
            CommandKind::Respond { .. } => "RESPONSE_ACT",
            CommandKind::RequestUndo => "SYS_REQUEST_UNDO",
            CommandKind::ApproveUndo => "SYS_APPROVE_UNDO",
            CommandKind::RejectUndo => "SYS_REJECT_UNDO",
            CommandKind::CancelUndo => "SYS_CANCEL_UNDO",
            CommandKind::Domain(k) => k.command_name(),
        }
    }
}
