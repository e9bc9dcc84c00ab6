//! Error taxonomy.
//!
//! Every failure that leaves the engine is an [`EngineError`], classified
//! into one of four kinds:
//!
//! - **Validation**: the command was rejected and nothing changed (stale
//!   interaction id, wrong responder, blocked by a pending decision,
//!   an undo nobody can grant).
//! - **CannotAdvance**: the current phase refused to end.
//! - **UnknownEntity**: a magnitude or reducer lookup hit a missing
//!   entity. This is a bug in the game layer, never a reachable game state.
//! - **EngineFault**: a hook broke its contract (runaway auto-continue,
//!   phase outside the configured order, missing handler).
//!
//! The first two are recoverable and go back to the client with a
//! [`reason_code`](EngineError::reason_code). The last two are logged and
//! the command is dropped; since events are only committed when the whole
//! command succeeds, nothing partial leaks into state.

use crate::core::{EntityId, PhaseId, PlayerId};
use crate::interaction::{HandlerId, InteractionId};
use crate::response::{WindowId, WindowType};

/// Result alias used across the engine.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Coarse classification of an [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    CannotAdvance,
    UnknownEntity,
    EngineFault,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::CannotAdvance => "cannot_advance",
            Self::UnknownEntity => "unknown_entity",
            Self::EngineFault => "engine_fault",
        }
    }

    /// Recoverable errors are surfaced to the originating client; the
    /// rest are internal bugs.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Validation | Self::CannotAdvance)
    }
}

/// What is holding up a command.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Blocker {
    #[error("pending interaction {0}")]
    PendingInteraction(InteractionId),

    #[error("open response window {0}")]
    ResponseWindow(WindowId),
}

/// A rejected command. Never changes state.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("interaction {got} is not the active interaction (active: {active:?})")]
    StaleInteraction {
        active: Option<InteractionId>,
        got: InteractionId,
    },

    #[error("{player} does not own interaction {interaction}")]
    NotInteractionOwner {
        interaction: InteractionId,
        player: PlayerId,
    },

    #[error("invalid resolution for {interaction}: {reason}")]
    InvalidResolution {
        interaction: InteractionId,
        reason: String,
    },

    #[error("interaction {interaction} does not expire until {deadline} (now {now})")]
    NotYetExpired {
        interaction: InteractionId,
        deadline: u64,
        now: u64,
    },

    #[error("response window {0} is already open")]
    AlreadyOpen(WindowId),

    #[error("no response window is open")]
    NoResponseWindow,

    #[error("{got} is not the current responder (expected {expected:?})")]
    NotCurrentResponder {
        expected: Option<PlayerId>,
        got: PlayerId,
    },

    #[error("current responder is resolving interaction {0}")]
    ResponseLocked(InteractionId),

    #[error("command blocked by {0}")]
    Blocked(Blocker),

    #[error("undo is not enabled for this match")]
    UndoDisabled,

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("an undo requested by {0} is already pending")]
    UndoPending(PlayerId),

    #[error("no undo request is pending")]
    NoUndoRequest,

    #[error("only {requester} can cancel their undo request (got {got})")]
    NotUndoRequester { requester: PlayerId, got: PlayerId },

    #[error("{0} cannot vote on their own undo request")]
    OwnUndoRequest(PlayerId),

    #[error("{0} already approved this undo")]
    AlreadyApproved(PlayerId),

    /// Game-layer validation failure.
    #[error("{0}")]
    Rejected(String),
}

impl ValidationError {
    /// Stable machine-readable code for clients.
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::StaleInteraction { .. } => "stale_interaction",
            Self::NotInteractionOwner { .. } => "not_interaction_owner",
            Self::InvalidResolution { .. } => "invalid_resolution",
            Self::NotYetExpired { .. } => "not_yet_expired",
            Self::AlreadyOpen(_) => "already_open",
            Self::NoResponseWindow => "no_response_window",
            Self::NotCurrentResponder { .. } => "not_current_responder",
            Self::ResponseLocked(_) => "response_locked",
            Self::Blocked(_) => "blocked",
            Self::UndoDisabled => "undo_disabled",
            Self::NothingToUndo => "nothing_to_undo",
            Self::UndoPending(_) => "undo_pending",
            Self::NoUndoRequest => "no_undo_request",
            Self::NotUndoRequester { .. } => "not_undo_requester",
            Self::OwnUndoRequest(_) => "own_undo_request",
            Self::AlreadyApproved(_) => "already_approved",
            Self::Rejected(_) => "rejected",
        }
    }
}

/// A hook or registry contract violation. Aborts the command.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EngineFault {
    #[error("auto-continue exceeded {limit} advances in one command")]
    AutoContinueLimit { limit: u32 },

    #[error("{0} is not part of the configured phase order")]
    UnknownPhase(PhaseId),

    #[error("no continuation registered for {0}")]
    MissingContinuation(HandlerId),

    #[error("no response handler registered for {0:?}")]
    MissingResponseHandler(WindowType),
}

/// Engine error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("command rejected: {0}")]
    Validation(#[from] ValidationError),

    #[error("cannot leave {phase}: {reason}")]
    CannotAdvance { phase: PhaseId, reason: String },

    #[error("unknown entity {entity}")]
    UnknownEntity { entity: EntityId },

    #[error("engine fault: {0}")]
    Fault(#[from] EngineFault),
}

impl EngineError {
    /// Shorthand for a game-layer rejection.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Validation(ValidationError::Rejected(reason.into()))
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::CannotAdvance { .. } => ErrorKind::CannotAdvance,
            Self::UnknownEntity { .. } => ErrorKind::UnknownEntity,
            Self::Fault(_) => ErrorKind::EngineFault,
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        self.kind().is_recoverable()
    }

    /// Stable machine-readable code for clients.
    pub const fn reason_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.reason_code(),
            Self::CannotAdvance { .. } => "cannot_advance",
            Self::UnknownEntity { .. } => "unknown_entity",
            Self::Fault(_) => "engine_fault",
        }
    }
}

/// Checkpoint encoding failure.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("bincode: {0}")]
    Bincode(#[from] bincode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let stale = EngineError::from(ValidationError::StaleInteraction {
            active: Some(InteractionId(2)),
            got: InteractionId(1),
        });
        assert_eq!(stale.kind(), ErrorKind::Validation);
        assert!(stale.is_recoverable());
        assert_eq!(stale.reason_code(), "stale_interaction");

        let fault = EngineError::from(EngineFault::AutoContinueLimit { limit: 3 });
        assert_eq!(fault.kind(), ErrorKind::EngineFault);
        assert!(!fault.is_recoverable());

        let missing = EngineError::UnknownEntity { entity: EntityId(9) };
        assert!(!missing.is_recoverable());
        assert_eq!(missing.kind().as_str(), "unknown_entity");
    }

    #[test]
    fn test_display() {
        let err = EngineError::CannotAdvance {
            phase: PhaseId::new(2),
            reason: "roll first".into(),
        };
        assert_eq!(err.to_string(), "cannot leave Phase(2): roll first");

        let blocked = EngineError::from(ValidationError::Blocked(Blocker::PendingInteraction(
            InteractionId(4),
        )));
        assert_eq!(
            blocked.to_string(),
            "command rejected: command blocked by pending interaction Interaction(4)"
        );
    }
}
