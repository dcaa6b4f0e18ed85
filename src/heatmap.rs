//! Gradient-weighted class activation maps and their rendering.

pub mod cam;
pub mod colormap;
pub mod engine;
pub mod overlay;
pub mod region;
