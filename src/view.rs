//! Views: a scene graph shown through one coordinate mapping.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::change::ChangeFlag;
use crate::drawable::DrawableId;
use crate::geom::{ScreenPoint, ScreenRect, Viewport};
use crate::render::RenderCommand;
use crate::scene::SceneGraph;
use crate::subject::{Event, Subject};
use crate::surface::Canvas;
use crate::transform::CoordMap;

static VIEW_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(u64);

impl ViewId {
    fn next() -> Self {
        Self(VIEW_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A region of the screen showing one scene graph.
///
/// Replacing the viewport or the screen region builds a new [`CoordMap`],
/// whose fresh identity makes every buffered drawable redraw in full, and
/// broadcasts [`Event::MapChanged`].
#[derive(Debug)]
pub struct View {
    id: ViewId,
    name: String,
    scene: SceneGraph,
    viewport: Viewport,
    screen: ScreenRect,
    map: Option<CoordMap>,
    flag: ChangeFlag,
    subject: Subject,
}

impl View {
    /// Create a view with an empty scene graph.
    pub fn new(name: impl Into<String>, viewport: Viewport, screen: ScreenRect) -> Self {
        Self {
            id: ViewId::next(),
            name: name.into(),
            scene: SceneGraph::new(),
            viewport,
            screen,
            map: CoordMap::new(viewport, screen),
            flag: ChangeFlag::new(true),
            subject: Subject::new("view"),
        }
    }

    /// Access the view id.
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Access the view name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Access the subject broadcasting mapping changes.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Access the scene graph.
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Mutably access the scene graph.
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    /// Current model-space viewport.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Current screen region.
    pub fn screen_rect(&self) -> ScreenRect {
        self.screen
    }

    /// Current mapping; `None` while the region or the viewport is unusable.
    pub fn map(&self) -> Option<&CoordMap> {
        self.map.as_ref()
    }

    /// Show a different part of model space.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        if self.viewport != viewport {
            self.viewport = viewport;
            self.rebuild_map();
        }
    }

    /// Move or resize the view on screen.
    pub fn set_screen_rect(&mut self, screen: ScreenRect) {
        if self.screen != screen {
            self.screen = screen;
            self.rebuild_map();
        }
    }

    fn rebuild_map(&mut self) {
        self.map = CoordMap::new(self.viewport, self.screen);
        self.flag.set();
        match &self.map {
            Some(map) => self.subject.notify(&Event::MapChanged(map.id())),
            None => tracing::debug!(view = %self.name, "view has no drawable area"),
        }
    }

    /// Report and reset own and scene change state.
    ///
    /// Without a mapping the scene cannot be drawn, so its change state is
    /// left for the frame that restores the mapping.
    pub fn changed(&mut self) -> bool {
        let own = self.flag.query();
        if self.map.is_none() {
            return own;
        }
        own | self.scene.changed()
    }

    /// Draw the scene clipped to the view region.
    pub fn paint(&mut self, canvas: &mut dyn Canvas) {
        let Some(map) = &self.map else {
            return;
        };
        canvas.draw(RenderCommand::ClipRect(map.screen()));
        self.scene.draw(canvas, map);
        canvas.draw(RenderCommand::ClipEnd);
    }

    /// Find the front-most drawable under a screen point.
    pub fn drawable_at(&self, point: ScreenPoint) -> Option<DrawableId> {
        let map = self.map.as_ref()?;
        if !map.screen().contains(point) {
            return None;
        }
        self.scene.find_at(map.screen_to_model(point))
    }

    /// Make every trace in the scene forget its buffer and replay from the
    /// oldest retained sample.
    pub fn reset_traces(&mut self) {
        self.scene.for_each_trace(|trace| trace.reset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Point, Range};
    use crate::render::RectStyle;
    use crate::shapes::Shape;
    use crate::subject::observer_fn;
    use crate::surface::Layer;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn viewport(max: f64) -> Viewport {
        Viewport::new(Range::new(0.0, max), Range::new(0.0, max))
    }

    #[test]
    fn viewport_change_builds_new_map_and_notifies() {
        let mut view = View::new("main", viewport(10.0), ScreenRect::from_size(100.0, 100.0));
        let first = view.map().map(CoordMap::id).expect("map");
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        view.subject().subscribe(observer_fn(move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        }));
        view.changed();

        view.set_viewport(viewport(10.0));
        assert!(!view.changed());
        assert!(events.borrow().is_empty());

        view.set_viewport(viewport(20.0));
        let second = view.map().map(CoordMap::id).expect("map");
        assert_ne!(first, second);
        assert!(view.changed());
        assert_eq!(*events.borrow(), [Event::MapChanged(second)]);
    }

    #[test]
    fn empty_region_disables_painting() {
        let mut view = View::new("main", viewport(10.0), ScreenRect::from_size(100.0, 100.0));
        view.set_screen_rect(ScreenRect::from_size(0.0, 0.0));
        assert!(view.map().is_none());
        let mut layer = Layer::new(10, 10);
        view.paint(&mut layer);
        assert!(layer.is_empty());
    }

    #[test]
    fn unmapped_view_settles_until_the_region_returns() {
        let series = crate::datasource::PointSeries::shared(8);
        series
            .borrow_mut()
            .append(crate::datasource::Sample::new(1.0, 1.0));
        let mut view = View::new("main", viewport(10.0), ScreenRect::from_size(100.0, 100.0));
        view.scene_mut()
            .add(Box::new(crate::trace::Trace::new(&series)));

        view.set_screen_rect(ScreenRect::from_size(0.0, 0.0));
        assert!(view.changed());
        assert!(!view.changed());
        series
            .borrow_mut()
            .append(crate::datasource::Sample::new(2.0, 2.0));
        assert!(!view.changed());

        view.set_screen_rect(ScreenRect::from_size(100.0, 100.0));
        assert!(view.changed());
        let mut layer = Layer::new(100, 100);
        view.paint(&mut layer);
        assert!(!view.changed());
        // Clip pair around a marker and one segment.
        assert_eq!(layer.len(), 4);
    }

    #[test]
    fn paint_is_clipped_to_the_region() {
        let mut view = View::new("main", viewport(10.0), ScreenRect::from_size(100.0, 100.0));
        view.scene_mut()
            .add(Box::new(Shape::rect(Point::new(1.0, 1.0), 1.0, 1.0, RectStyle::default())));
        let mut layer = Layer::new(100, 100);
        view.paint(&mut layer);
        let commands: Vec<_> = layer.commands().collect();
        assert_eq!(commands.len(), 3);
        assert!(matches!(commands[0], RenderCommand::ClipRect(_)));
        assert!(matches!(commands[2], RenderCommand::ClipEnd));
    }

    #[test]
    fn drawable_at_maps_screen_to_model() {
        let mut view = View::new("main", viewport(10.0), ScreenRect::from_size(100.0, 100.0));
        let id = view
            .scene_mut()
            .add(Box::new(Shape::rect(Point::new(0.0, 0.0), 2.0, 2.0, RectStyle::default())));
        // Model (1, 1) sits at screen (10, 90).
        assert_eq!(view.drawable_at(ScreenPoint::new(10.0, 90.0)), Some(id));
        assert_eq!(view.drawable_at(ScreenPoint::new(90.0, 10.0)), None);
        assert_eq!(view.drawable_at(ScreenPoint::new(500.0, 10.0)), None);
    }

    #[test]
    fn reset_traces_reaches_every_trace() {
        let series = crate::datasource::PointSeries::shared(8);
        series
            .borrow_mut()
            .append(crate::datasource::Sample::new(1.0, 1.0));
        let mut view = View::new("main", viewport(10.0), ScreenRect::from_size(100.0, 100.0));
        view.scene_mut()
            .add(Box::new(crate::trace::Trace::new(&series)));
        let mut layer = Layer::new(100, 100);
        view.changed();
        view.paint(&mut layer);
        assert!(!view.changed());

        view.reset_traces();
        assert!(view.changed());
    }
}
