//! Effect/magnitude pipeline.
//!
//! - `modifier`: flat and percentage modifiers and their order
//! - `shield`: first-granted-first absorption
//! - `resource`: bounded values with deferred cap settlement
//! - `resolver`: the pipeline itself and its event payload

pub mod modifier;
pub mod resolver;
pub mod resource;
pub mod shield;

pub use modifier::{AppliedModifier, Modifier, ModifierKind, ModifierOrigin, ModifierStack};
pub use resolver::{
    Breakdown, CollectOptions, MagnitudeApplied, MagnitudeCalculation, MagnitudeRequest,
    MagnitudeSource, ShieldMode, ShieldSettlement,
};
pub use resource::{BoundedResource, Settlement};
pub use shield::{absorb, deplete, Absorption, Shield, ShieldAbsorption};
