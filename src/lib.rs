//! gpui_livecanvas is an incremental redraw pipeline for live canvases.
//! The crate targets append-only sensor data drawn every frame, repainting
//! only what changed and fading old frames into trails on request.

#![forbid(unsafe_code)]

pub mod change;
pub mod compositor;
pub mod config;
pub mod datasource;
pub mod drawable;
pub mod error;
pub mod geom;
pub mod render;
pub mod scene;
pub mod shapes;
pub mod subject;
pub mod surface;
pub mod trace;
pub mod transform;
pub mod view;

#[cfg(feature = "gpui")]
pub mod gpui_backend;

pub use change::ChangeFlag;
pub use compositor::{Compositor, PaintOutcome};
pub use config::{Background, CompositorConfig, DEFAULT_TRAIL_PERSISTENCE};
pub use datasource::{AppendCursor, PointSeries, Replay, Sample, SharedSeries};
pub use drawable::{Drawable, DrawableId, ModelId, TraceControl};
pub use error::{ConfigError, ObserverError, PositionError};
pub use geom::{Point, Range, ScreenPoint, ScreenRect, Viewport};
pub use render::{
    Color, LineSegment, LineStyle, MarkerShape, MarkerStyle, RectStyle, RenderCommand, TextStyle,
};
pub use scene::SceneGraph;
pub use shapes::{Anchor, AnchorMarker, Label, PointAnchor, Shape, ShapeKind};
pub use subject::{ErrorReporter, Event, LogReporter, Observer, Subject, observer_fn};
pub use surface::{BlitSource, Canvas, Layer, LayerEntry, LayerStats, Redraw, Surface};
pub use trace::{DrawMode, Trace, TraceStyle};
pub use transform::{CoordMap, MapId};
pub use view::{View, ViewId};

#[cfg(feature = "gpui")]
pub use gpui_backend::{GpuiCanvasView, SharedCompositor};
