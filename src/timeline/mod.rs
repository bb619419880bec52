//! Interactive editing on top of the engine: gestures, frame navigation and
//! the controller that ties them to undo, tracking and persistence.

mod controller;
mod gesture;
mod navigation;

pub use controller::{GestureOutcome, TimelineController, TimelineEvent};
pub use gesture::{Gesture, Handle};
pub use navigation::FrameCursor;
