//! Shared leaf types for the stencil editor core.

pub mod color;

pub use color::Color;
