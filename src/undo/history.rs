//! Undo records: the pending handshake and the bounded snapshot stack.

use im::Vector;
use serde::{Deserialize, Serialize};

use crate::core::{PlayerId, SystemState};

/// An undo waiting for other players' approval.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoRequest {
    pub requester: PlayerId,
    /// Approvers in the order they approved. Never contains the requester.
    pub approvals: Vec<PlayerId>,
    pub required: u32,
}

impl UndoRequest {
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.approvals.len() >= self.required as usize
    }
}

/// Engine-owned undo bookkeeping, visible to every player.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoState {
    pub pending: Option<UndoRequest>,
    /// Number of snapshots that can still be restored.
    pub depth: usize,
}

/// State as it was before one command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot<C> {
    pub core: C,
    pub sys: SystemState,
}

/// Snapshots, oldest first. Snapshots never hold history of their own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoHistory<C: Clone> {
    snapshots: Vector<Snapshot<C>>,
}

impl<C: Clone> Default for UndoHistory<C> {
    fn default() -> Self {
        Self {
            snapshots: Vector::new(),
        }
    }
}

impl<C: Clone> UndoHistory<C> {
    /// Push `snapshot`, dropping the oldest ones beyond `limit`.
    pub fn push(&mut self, snapshot: Snapshot<C>, limit: usize) {
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > limit {
            self.snapshots.pop_front();
        }
    }

    pub fn pop(&mut self) -> Option<Snapshot<C>> {
        self.snapshots.pop_back()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&Snapshot<C>> {
        self.snapshots.last()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}
