use std::cell::RefCell;
use std::rc::Rc;

use gpui::prelude::*;
use gpui::{Window, canvas, div};

use crate::compositor::{Compositor, PaintOutcome};
use crate::geom::ScreenPoint;
use crate::surface::Layer;

use super::paint::{paint_layer, to_hsla};

/// A compositor shared between a [`GpuiCanvasView`] and the application.
pub type SharedCompositor = Rc<RefCell<Compositor<Layer>>>;

/// A GPUI view that drives a [`Compositor`] once per animation frame.
///
/// The compositor is sized from the element bounds each frame. Bounds with
/// zero area count as hidden, so nothing is drawn and no change state is
/// consumed until the element becomes visible again.
#[derive(Clone)]
pub struct GpuiCanvasView {
    compositor: SharedCompositor,
}

impl GpuiCanvasView {
    /// Create a view for the compositor.
    pub fn new(compositor: Compositor<Layer>) -> Self {
        Self {
            compositor: Rc::new(RefCell::new(compositor)),
        }
    }

    /// Access the shared compositor, for adding views and feeding data.
    pub fn compositor(&self) -> SharedCompositor {
        Rc::clone(&self.compositor)
    }
}

impl Render for GpuiCanvasView {
    fn render(&mut self, _window: &mut Window, _cx: &mut Context<Self>) -> impl IntoElement {
        let compositor = Rc::clone(&self.compositor);
        let background = self
            .compositor
            .borrow()
            .config()
            .background
            .color()
            .map(to_hsla);

        let mut root = div().size_full();
        if let Some(background) = background {
            root = root.bg(background);
        }
        root.child(
            canvas(
                move |bounds, window, _| {
                    let width = f32::from(bounds.size.width).floor();
                    let height = f32::from(bounds.size.height).floor();
                    let origin = ScreenPoint::new(
                        f32::from(bounds.origin.x),
                        f32::from(bounds.origin.y),
                    );
                    let visible = width >= 1.0 && height >= 1.0;
                    {
                        let mut shared = compositor.borrow_mut();
                        if visible
                            && let Err(error) = shared.set_size(width as u32, height as u32)
                        {
                            tracing::warn!(%error, "ignoring unusable canvas bounds");
                        }
                        shared.set_visibility(move || visible);
                        let outcome = shared.paint();
                        if matches!(outcome, PaintOutcome::Painted { draining: true, .. }) {
                            // Keep frames coming while trails fade out.
                            window.request_animation_frame();
                        }
                    }
                    (compositor, origin)
                },
                move |_, (compositor, origin), window, cx| {
                    let compositor = compositor.borrow();
                    paint_layer(compositor.screen(), origin, window, cx);
                },
            )
            .size_full(),
        )
    }
}
