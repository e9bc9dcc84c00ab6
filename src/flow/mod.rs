//! Phase flow: game hooks and the controller that drives them.

pub mod controller;
pub mod hooks;

pub use controller::{AdvanceMode, AdvanceOutcome, PhaseFlowController};
pub use hooks::{AutoContinue, FlowHooks, NoHooks, PhaseArgs, PhaseExit};
