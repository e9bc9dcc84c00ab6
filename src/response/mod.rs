//! Reactive multi-player response windows.

pub mod manager;
pub mod priority;
pub mod window;

pub use manager::ResponseWindowManager;
pub use priority::{responder_order, ResponderQueue, ResponderRole};
pub use window::{ResponseWindow, WindowId, WindowSpec, WindowType};
