//! Editor state and the transform synchronizer: reconciles interactive
//! manipulation (drag, resize, rotate, endpoint editing) with persisted
//! layer attributes.

mod editor;

pub use editor::{Editor, Gesture, Tool, TransformSnapshot};
