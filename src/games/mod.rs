//! Sample games.

pub mod duel;
