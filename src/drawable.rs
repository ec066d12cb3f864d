//! The contract every renderable object fulfills.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::PositionError;
use crate::geom::Point;
use crate::surface::Canvas;
use crate::transform::CoordMap;

static MODEL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of an underlying model object (a series, a body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(u64);

impl ModelId {
    /// Allocate a fresh identifier.
    pub fn next() -> Self {
        Self(MODEL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Identifier of a drawable inside its scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableId(pub(crate) u64);

/// A renderable unit exposing change state and z-order.
///
/// [`changed`](Drawable::changed) is a destructive read: it reports whether
/// anything visible changed since the previous call (including owned
/// children) and then resets.
pub trait Drawable {
    /// Draw onto `canvas` using the given coordinate mapping.
    fn draw(&mut self, canvas: &mut dyn Canvas, map: &CoordMap);

    /// Report and reset the changed state.
    fn changed(&mut self) -> bool;

    /// Draw order; larger values are drawn later (on top).
    fn z_index(&self) -> i32 {
        0
    }

    /// Change the draw order; ignored by drawables with a fixed z-index.
    ///
    /// Inside a scene graph, call this through
    /// [`SceneGraph::update`](crate::scene::SceneGraph::update) so the graph
    /// can re-sort.
    fn set_z_index(&mut self, _z_index: i32) {}

    /// Hit-test a model-space point.
    fn contains(&self, _point: Point) -> bool {
        false
    }

    /// Whether the drawable may be dragged by the user.
    fn is_draggable(&self) -> bool {
        false
    }

    /// Enable or disable dragging; ignored by drawables that cannot move.
    fn set_draggable(&mut self, _draggable: bool) {}

    /// Model-space position.
    fn position(&self) -> Point {
        Point::default()
    }

    /// Move the drawable, if its kind allows it.
    fn set_position(&mut self, _position: Point) -> Result<(), PositionError> {
        Err(PositionError::Immovable)
    }

    /// The model object this drawable renders, if any.
    ///
    /// A scene refuses (in debug builds) two drawables for the same model.
    fn model_id(&self) -> Option<ModelId> {
        None
    }

    /// Access trace-specific controls. Only [`Trace`](crate::trace::Trace)
    /// returns `Some`.
    fn as_trace_mut(&mut self) -> Option<&mut dyn TraceControl> {
        None
    }
}

/// Capability implemented by drawables that replay a point series.
pub trait TraceControl {
    /// The series being replayed.
    fn series_id(&self) -> ModelId;

    /// Forget everything drawn so far; the next draw is a full redraw.
    fn reset(&mut self);
}
