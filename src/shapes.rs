//! Non-series drawables: shapes, labels and anchored markers.
//!
//! The three kinds differ in how they treat repositioning. A [`Shape`] moves
//! itself, a [`Label`] refuses to move, and an [`AnchorMarker`] forwards the
//! move to the model object it marks.

use std::cell::Cell;
use std::rc::Rc;

use crate::change::ChangeFlag;
use crate::drawable::{Drawable, ModelId};
use crate::error::PositionError;
use crate::geom::{Point, ScreenPoint, ScreenRect};
use crate::render::{MarkerStyle, RectStyle, RenderCommand, TextStyle};
use crate::scene::z;
use crate::surface::Canvas;
use crate::transform::CoordMap;

/// Geometry of a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeKind {
    /// Axis-aligned rectangle; the position is its lower-left corner.
    Rect {
        /// Width in model units.
        width: f64,
        /// Height in model units.
        height: f64,
        /// Styling.
        style: RectStyle,
    },
    /// Point marker; the position is its center.
    Marker {
        /// Styling.
        style: MarkerStyle,
        /// Hit-test radius in model units.
        tolerance: f64,
    },
}

/// A freely movable shape in model space.
#[derive(Debug, Clone)]
pub struct Shape {
    kind: ShapeKind,
    position: Point,
    z_index: i32,
    draggable: bool,
    flag: ChangeFlag,
}

impl Shape {
    /// Create a rectangle with its lower-left corner at `origin`.
    pub fn rect(origin: Point, width: f64, height: f64, style: RectStyle) -> Self {
        Self::new(
            ShapeKind::Rect {
                width,
                height,
                style,
            },
            origin,
        )
    }

    /// Create a point marker.
    pub fn marker(center: Point, style: MarkerStyle, tolerance: f64) -> Self {
        Self::new(ShapeKind::Marker { style, tolerance }, center)
    }

    fn new(kind: ShapeKind, position: Point) -> Self {
        Self {
            kind,
            position,
            z_index: z::SHAPES,
            draggable: false,
            flag: ChangeFlag::new(true),
        }
    }

    /// Set the draw order.
    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Access the geometry.
    pub fn kind(&self) -> ShapeKind {
        self.kind
    }

    /// Replace the geometry.
    pub fn set_kind(&mut self, kind: ShapeKind) {
        if self.kind != kind {
            self.kind = kind;
            self.flag.set();
        }
    }
}

impl Drawable for Shape {
    fn draw(&mut self, canvas: &mut dyn Canvas, map: &CoordMap) {
        match self.kind {
            ShapeKind::Rect {
                width,
                height,
                style,
            } => {
                let a = map.model_to_screen(self.position);
                let b = map.model_to_screen(Point::new(
                    self.position.x + width,
                    self.position.y + height,
                ));
                let rect = ScreenRect::new(
                    ScreenPoint::new(a.x.min(b.x), a.y.min(b.y)),
                    ScreenPoint::new(a.x.max(b.x), a.y.max(b.y)),
                );
                canvas.draw(RenderCommand::Rect { rect, style });
            }
            ShapeKind::Marker { style, .. } => {
                canvas.draw(RenderCommand::Marker {
                    point: map.model_to_screen(self.position),
                    style,
                });
            }
        }
    }

    fn changed(&mut self) -> bool {
        self.flag.query()
    }

    fn z_index(&self) -> i32 {
        self.z_index
    }

    fn set_z_index(&mut self, z_index: i32) {
        self.z_index = z_index;
    }

    fn contains(&self, point: Point) -> bool {
        match self.kind {
            ShapeKind::Rect { width, height, .. } => {
                let dx = point.x - self.position.x;
                let dy = point.y - self.position.y;
                (0.0..=width).contains(&dx) && (0.0..=height).contains(&dy)
            }
            ShapeKind::Marker { tolerance, .. } => {
                distance(point, self.position) <= tolerance
            }
        }
    }

    fn is_draggable(&self) -> bool {
        self.draggable
    }

    fn set_draggable(&mut self, draggable: bool) {
        self.draggable = draggable;
    }

    fn position(&self) -> Point {
        self.position
    }

    fn set_position(&mut self, position: Point) -> Result<(), PositionError> {
        if self.position != position {
            self.position = position;
            self.flag.set();
        }
        Ok(())
    }
}

/// A text annotation pinned to a model-space point.
#[derive(Debug, Clone)]
pub struct Label {
    text: String,
    position: Point,
    style: TextStyle,
    z_index: i32,
    flag: ChangeFlag,
}

impl Label {
    /// Create a label.
    pub fn new(text: impl Into<String>, position: Point, style: TextStyle) -> Self {
        Self {
            text: text.into(),
            position,
            style,
            z_index: z::LABELS,
            flag: ChangeFlag::new(true),
        }
    }

    /// Access the text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.text != text {
            self.text = text;
            self.flag.set();
        }
    }
}

impl Drawable for Label {
    fn draw(&mut self, canvas: &mut dyn Canvas, map: &CoordMap) {
        canvas.draw(RenderCommand::Text {
            position: map.model_to_screen(self.position),
            text: self.text.clone(),
            style: self.style.clone(),
        });
    }

    fn changed(&mut self) -> bool {
        self.flag.query()
    }

    fn z_index(&self) -> i32 {
        self.z_index
    }

    fn set_z_index(&mut self, z_index: i32) {
        self.z_index = z_index;
    }

    fn position(&self) -> Point {
        self.position
    }
}

/// A model object whose position an [`AnchorMarker`] displays and edits.
pub trait Anchor {
    /// Identity of the model object.
    fn model_id(&self) -> ModelId;

    /// Current position.
    fn position(&self) -> Point;

    /// Move the model object.
    fn set_position(&self, position: Point);
}

/// A plain shared point usable as an [`Anchor`].
#[derive(Debug)]
pub struct PointAnchor {
    id: ModelId,
    position: Cell<Point>,
}

impl PointAnchor {
    /// Create a shared anchor at `position`.
    pub fn shared(position: Point) -> Rc<Self> {
        Rc::new(Self {
            id: ModelId::next(),
            position: Cell::new(position),
        })
    }
}

impl Anchor for PointAnchor {
    fn model_id(&self) -> ModelId {
        self.id
    }

    fn position(&self) -> Point {
        self.position.get()
    }

    fn set_position(&self, position: Point) {
        self.position.set(position);
    }
}

/// A draggable marker that displays and edits an [`Anchor`].
///
/// It reports a change whenever the anchor moved since the previous query,
/// whoever moved it.
pub struct AnchorMarker {
    anchor: Rc<dyn Anchor>,
    style: MarkerStyle,
    tolerance: f64,
    seen: Option<Point>,
    z_index: i32,
    draggable: bool,
    flag: ChangeFlag,
}

impl AnchorMarker {
    /// Create a draggable marker for the anchor.
    pub fn new(anchor: Rc<dyn Anchor>, style: MarkerStyle, tolerance: f64) -> Self {
        Self {
            anchor,
            style,
            tolerance,
            seen: None,
            z_index: z::SHAPES,
            draggable: true,
            flag: ChangeFlag::default(),
        }
    }

    /// Access the anchor.
    pub fn anchor(&self) -> &Rc<dyn Anchor> {
        &self.anchor
    }

    /// Replace the marker styling.
    pub fn set_style(&mut self, style: MarkerStyle) {
        if self.style != style {
            self.style = style;
            self.flag.set();
        }
    }
}

impl Drawable for AnchorMarker {
    fn draw(&mut self, canvas: &mut dyn Canvas, map: &CoordMap) {
        canvas.draw(RenderCommand::Marker {
            point: map.model_to_screen(self.anchor.position()),
            style: self.style,
        });
    }

    fn changed(&mut self) -> bool {
        let position = self.anchor.position();
        let moved = self.seen != Some(position);
        self.seen = Some(position);
        self.flag.query() | moved
    }

    fn z_index(&self) -> i32 {
        self.z_index
    }

    fn set_z_index(&mut self, z_index: i32) {
        self.z_index = z_index;
    }

    fn contains(&self, point: Point) -> bool {
        distance(point, self.anchor.position()) <= self.tolerance
    }

    fn is_draggable(&self) -> bool {
        self.draggable
    }

    fn set_draggable(&mut self, draggable: bool) {
        self.draggable = draggable;
    }

    fn position(&self) -> Point {
        self.anchor.position()
    }

    fn set_position(&mut self, position: Point) -> Result<(), PositionError> {
        self.anchor.set_position(position);
        Ok(())
    }

    fn model_id(&self) -> Option<ModelId> {
        Some(self.anchor.model_id())
    }
}

impl std::fmt::Debug for AnchorMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorMarker")
            .field("model", &self.anchor.model_id())
            .field("position", &self.anchor.position())
            .field("z_index", &self.z_index)
            .finish()
    }
}

fn distance(a: Point, b: Point) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}
