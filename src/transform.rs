//! Coordinate mapping between model and screen space.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::geom::{Point, ScreenPoint, ScreenRect, Viewport};

const MIN_SPAN: f64 = 1e-12;

static MAP_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identity of a coordinate mapping.
///
/// Every constructed [`CoordMap`] gets a fresh id; clones share it. Comparing
/// ids detects "the view moved" without comparing matrices every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapId(u64);

impl MapId {
    fn next() -> Self {
        Self(MAP_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Linear mapping from model coordinates into a screen rectangle.
///
/// Model Y grows upward, screen Y grows downward.
#[derive(Debug, Clone)]
pub struct CoordMap {
    id: MapId,
    viewport: Viewport,
    screen: ScreenRect,
}

impl CoordMap {
    /// Create a mapping for the given viewport and screen rectangle.
    ///
    /// Returns `None` when the screen rectangle has no area or the viewport is
    /// not finite.
    pub fn new(viewport: Viewport, screen: ScreenRect) -> Option<Self> {
        if !screen.is_valid() || !viewport.is_finite() {
            return None;
        }
        let viewport = Viewport::new(
            viewport.x.with_min_span(MIN_SPAN),
            viewport.y.with_min_span(MIN_SPAN),
        );
        Some(Self {
            id: MapId::next(),
            viewport,
            screen,
        })
    }

    /// Access the mapping identity.
    pub fn id(&self) -> MapId {
        self.id
    }

    /// Check whether two mappings are the same instance.
    pub fn same_as(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// Access the model viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Access the screen rectangle.
    pub fn screen(&self) -> ScreenRect {
        self.screen
    }

    /// Map a model point into screen space.
    pub fn model_to_screen(&self, point: Point) -> ScreenPoint {
        let x_norm = (point.x - self.viewport.x.min) / self.viewport.x.span();
        let y_norm = (point.y - self.viewport.y.min) / self.viewport.y.span();
        let sx = self.screen.min.x as f64 + x_norm * self.screen.width() as f64;
        let sy = self.screen.max.y as f64 - y_norm * self.screen.height() as f64;
        ScreenPoint::new(sx as f32, sy as f32)
    }

    /// Map a screen point into model space.
    pub fn screen_to_model(&self, point: ScreenPoint) -> Point {
        let x_norm = (point.x as f64 - self.screen.min.x as f64) / self.screen.width() as f64;
        let y_norm = (self.screen.max.y as f64 - point.y as f64) / self.screen.height() as f64;
        Point::new(
            self.viewport.x.min + x_norm * self.viewport.x.span(),
            self.viewport.y.min + y_norm * self.viewport.y.span(),
        )
    }
}
