//! Multi-player undo over bounded pre-command snapshots.

pub mod history;
pub mod manager;

pub use history::{Snapshot, UndoHistory, UndoRequest, UndoState};
pub use manager::UndoManager;
