//! Blocking player decisions.

pub mod kind;
pub mod manager;

pub use kind::{
    ChoiceOption, ChoiceSpec, Continuation, HandlerId, Interaction, InteractionId, InteractionKind,
    InteractionRequest, Resolution, Selection, SliderSpec, CANCEL_OPTION_ID,
};
pub use manager::{visible_to, InteractionManager};
