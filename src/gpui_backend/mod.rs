//! GPUI integration for gpui_livecanvas.
//!
//! This module provides a GPUI view that drives a
//! [`Compositor`](crate::compositor::Compositor) every frame and paints its
//! retained screen layer with GPUI primitives.

mod paint;
mod view;

pub use view::{GpuiCanvasView, SharedCompositor};
