//! Software compositor for the masked canvas.
//!
//! Produces the final visible image for a project: the base color fill
//! gated by the template alpha mask, the layer stack rendered back to
//! front, a second mask application over the combined stack, and optional
//! interactive-only overlays on top.

mod error;
mod fonts;
mod mask;
mod paint;
mod render;

pub use error::RenderError;
pub use fonts::FontStore;
pub use mask::apply_alpha_mask;
pub use render::{render, BrushCursor, Overlays, RenderOptions};
