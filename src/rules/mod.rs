//! Game layer contract and the reducer.
//!
//! Games implement [`Domain`] to plug their state, events and commands
//! into the engine. [`reducer`] folds events; [`Transition`] accumulates
//! the events of one command while keeping state current.

pub mod context;
pub mod domain;
pub mod reducer;

pub use context::CommandContext;
pub use domain::Domain;
pub use reducer::{fold, reduce, SystemReducer, Transition};
