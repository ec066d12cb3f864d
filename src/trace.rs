//! Incremental rendering of a point series.
//!
//! A [`Trace`] owns a buffered [`Surface`] and an [`AppendCursor`]. In steady
//! state each frame only replays the samples appended since the previous
//! frame, so its cost grows with new points rather than total points.

use std::cell::Cell;
use std::rc::Rc;

use crate::change::ChangeFlag;
use crate::datasource::{AppendCursor, PointSeries, Replay, SharedSeries};
use crate::drawable::{Drawable, ModelId, TraceControl};
use crate::error::ObserverError;
use crate::geom::ScreenPoint;
use crate::render::{LineSegment, LineStyle, MarkerStyle, RenderCommand, clip_segment};
use crate::subject::{Event, Observer, Subject};
use crate::surface::{Canvas, Layer, Redraw, Surface};
use crate::transform::CoordMap;

/// How samples are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    /// Connect continuous samples; mark the start of each run.
    #[default]
    Lines,
    /// Mark every sample.
    Dots,
}

/// Trace styling.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TraceStyle {
    /// Stroke for connecting segments.
    pub line: LineStyle,
    /// Marker for isolated samples and run starts.
    pub marker: MarkerStyle,
    /// Joining mode.
    pub mode: DrawMode,
}

/// Observer that records a reset of the watched series.
#[derive(Debug)]
struct ResetWatch {
    series: ModelId,
    pending: Cell<bool>,
}

impl Observer for ResetWatch {
    fn observe(&self, event: &Event) -> Result<(), ObserverError> {
        if *event == Event::SeriesReset(self.series) {
            self.pending.set(true);
        }
        Ok(())
    }
}

/// Drawable that replays a shared [`PointSeries`].
pub struct Trace {
    series: SharedSeries,
    series_id: ModelId,
    series_subject: Subject,
    watch: Rc<ResetWatch>,
    observer: Rc<dyn Observer>,
    cursor: AppendCursor,
    surface: Surface,
    style: TraceStyle,
    z_index: i32,
    flag: ChangeFlag,
}

impl Trace {
    /// Create a trace for the series with default styling.
    pub fn new(series: &SharedSeries) -> Self {
        Self::with_style(series, TraceStyle::default())
    }

    /// Create a trace for the series with the given styling.
    pub fn with_style(series: &SharedSeries, style: TraceStyle) -> Self {
        let (series_id, series_subject, cursor) = {
            let series = series.borrow();
            (series.id(), series.subject().clone(), series.cursor())
        };
        let watch = Rc::new(ResetWatch {
            series: series_id,
            pending: Cell::new(false),
        });
        let observer: Rc<dyn Observer> = watch.clone();
        series_subject.subscribe(Rc::clone(&observer));
        Self {
            series: Rc::clone(series),
            series_id,
            series_subject,
            watch,
            observer,
            cursor,
            surface: Surface::new(),
            style,
            z_index: 0,
            flag: ChangeFlag::new(true),
        }
    }

    /// Set the draw order.
    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Access the replayed series.
    pub fn series(&self) -> &SharedSeries {
        &self.series
    }

    /// Access the styling.
    pub fn style(&self) -> TraceStyle {
        self.style
    }

    /// Replace the styling; everything is redrawn.
    pub fn set_style(&mut self, style: TraceStyle) {
        if self.style != style {
            self.style = style;
            self.surface.invalidate();
            self.flag.set();
        }
    }

    /// Access the buffered surface.
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Access the replay cursor.
    pub fn cursor(&self) -> &AppendCursor {
        &self.cursor
    }
}

impl Drawable for Trace {
    fn draw(&mut self, canvas: &mut dyn Canvas, map: &CoordMap) {
        let series = self.series.borrow();
        if series.is_stale(&self.cursor) {
            self.surface.invalidate();
        }
        self.surface.sync_map(map);

        let cursor = &mut self.cursor;
        let style = self.style;
        let mut outcome = None;
        let redraw = self.surface.render(canvas, |layer, redraw| {
            if redraw == Redraw::Full {
                cursor.reset();
            }
            outcome = Some(replay(&series, cursor, map, style, layer));
        });
        if let Some(replay) = outcome {
            tracing::trace!(
                series = ?self.series_id,
                ?redraw,
                replayed = replay.replayed,
                "trace drawn"
            );
        }
    }

    fn changed(&mut self) -> bool {
        let reset = self.watch.pending.replace(false);
        if reset {
            self.cursor.reset();
            self.surface.invalidate();
        }
        let pending = self.series.borrow().has_pending(&self.cursor);
        self.flag.query() | reset | pending
    }

    fn z_index(&self) -> i32 {
        self.z_index
    }

    fn set_z_index(&mut self, z_index: i32) {
        self.z_index = z_index;
    }

    fn model_id(&self) -> Option<ModelId> {
        Some(self.series_id)
    }

    fn as_trace_mut(&mut self) -> Option<&mut dyn TraceControl> {
        Some(self)
    }
}

impl TraceControl for Trace {
    fn series_id(&self) -> ModelId {
        self.series_id
    }

    fn reset(&mut self) {
        self.cursor.reset();
        self.surface.invalidate();
        self.flag.set();
    }
}

impl Drop for Trace {
    fn drop(&mut self) {
        self.series_subject.unsubscribe(&self.observer);
    }
}

impl std::fmt::Debug for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trace")
            .field("series", &self.series_id)
            .field("cursor", &self.cursor)
            .field("style", &self.style)
            .field("z_index", &self.z_index)
            .finish()
    }
}

fn replay(
    series: &PointSeries,
    cursor: &mut AppendCursor,
    map: &CoordMap,
    style: TraceStyle,
    layer: &mut Layer,
) -> Replay {
    let clip = map.screen();
    let mut pen: Option<ScreenPoint> = cursor
        .last_sample()
        .map(|sample| map.model_to_screen(sample.point));
    series.advance(cursor, |sample, discontinuous| {
        let point = map.model_to_screen(sample.point);
        match pen {
            Some(from) if style.mode == DrawMode::Lines && !discontinuous => {
                if let Some((start, end)) = clip_segment(from, point, clip) {
                    layer.draw(RenderCommand::Line {
                        segment: LineSegment::new(start, end),
                        style: style.line,
                    });
                }
            }
            _ => {
                if clip.contains(point) {
                    layer.draw(RenderCommand::Marker {
                        point,
                        style: style.marker,
                    });
                }
            }
        }
        pen = Some(point);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::Sample;
    use crate::geom::{Point, Range, ScreenRect, Viewport};

    fn map() -> CoordMap {
        let viewport = Viewport::new(Range::new(0.0, 10.0), Range::new(0.0, 10.0));
        CoordMap::new(viewport, ScreenRect::from_size(100.0, 100.0)).expect("valid map")
    }

    fn lines(layer: &Layer) -> Vec<LineSegment> {
        layer
            .commands()
            .filter_map(|command| match command {
                RenderCommand::Line { segment, .. } => Some(*segment),
                _ => None,
            })
            .collect()
    }

    fn markers(layer: &Layer) -> Vec<ScreenPoint> {
        layer
            .commands()
            .filter_map(|command| match command {
                RenderCommand::Marker { point, .. } => Some(*point),
                _ => None,
            })
            .collect()
    }

    fn trace_layer(trace: &Trace) -> &Layer {
        trace.surface().layer().expect("trace layer allocated")
    }

    #[test]
    fn sequence_change_breaks_the_line() {
        let series = PointSeries::shared(16);
        {
            let mut series = series.borrow_mut();
            series.append(Sample::with_sequence(Point::new(0.0, 0.0), 1, 1));
            series.append(Sample::with_sequence(Point::new(1.0, 1.0), 1, 1));
            series.append(Sample::with_sequence(Point::new(2.0, 5.0), 2, 1));
        }
        let map = map();
        let mut trace = Trace::new(&series);
        let mut screen = Layer::new(100, 100);
        assert!(trace.changed());
        trace.draw(&mut screen, &map);

        let layer = trace_layer(&trace);
        let p0 = map.model_to_screen(Point::new(0.0, 0.0));
        let p1 = map.model_to_screen(Point::new(1.0, 1.0));
        let p2 = map.model_to_screen(Point::new(2.0, 5.0));
        assert_eq!(lines(layer), [LineSegment::new(p0, p1)]);
        assert!(markers(layer).contains(&p2));
        assert!(lines(layer).iter().all(|segment| segment.end != p2));
    }

    #[test]
    fn incremental_draw_cost_tracks_new_samples() {
        let series = PointSeries::shared(4096);
        series
            .borrow_mut()
            .extend((0..1000).map(|i| Sample::new(i as f64 * 0.01, 5.0)));
        let map = map();
        let mut trace = Trace::new(&series);
        let mut screen = Layer::new(100, 100);
        trace.changed();
        trace.draw(&mut screen, &map);
        assert!(!trace.changed());

        let before = trace_layer(&trace).stats();
        series
            .borrow_mut()
            .extend((1000..1005).map(|i| Sample::new(i as f64 * 0.001, 5.0)));
        assert!(trace.changed());
        trace.draw(&mut screen, &map);
        let after = trace_layer(&trace).stats();

        assert_eq!(after.draws - before.draws, 5);
        assert_eq!(after.clears, before.clears);
        assert!(!trace.changed());
    }

    #[test]
    fn eviction_past_cursor_forces_full_redraw() {
        let series = PointSeries::shared(8);
        series
            .borrow_mut()
            .extend((0..4).map(|i| Sample::new(i as f64, 1.0)));
        let map = map();
        let mut trace = Trace::new(&series);
        let mut screen = Layer::new(100, 100);
        trace.changed();
        trace.draw(&mut screen, &map);
        let clears = trace_layer(&trace).stats().clears;

        series
            .borrow_mut()
            .extend((0..20).map(|i| Sample::new(i as f64 * 0.1, 2.0)));
        assert!(trace.changed());
        trace.draw(&mut screen, &map);

        let layer = trace_layer(&trace);
        assert_eq!(layer.stats().clears, clears + 1);
        // Eight retained samples: one run-start marker and seven segments.
        assert_eq!(markers(layer).len(), 1);
        assert_eq!(lines(layer).len(), 7);
    }

    #[test]
    fn series_reset_reaches_trace_through_the_bus() {
        let series = PointSeries::shared(8);
        series
            .borrow_mut()
            .extend((0..4).map(|i| Sample::new(i as f64, 1.0)));
        let map = map();
        let mut trace = Trace::new(&series);
        let mut screen = Layer::new(100, 100);
        trace.changed();
        trace.draw(&mut screen, &map);
        assert!(!trace.changed());

        series.borrow_mut().reset();
        assert!(trace.changed());
        assert!(trace.surface().needs_full_redraw());
        trace.draw(&mut screen, &map);
        assert!(trace_layer(&trace).is_empty());
    }

    #[test]
    fn dropping_trace_unsubscribes() {
        let series = PointSeries::shared(8);
        let trace = Trace::new(&series);
        assert_eq!(series.borrow().subject().observer_count(), 1);
        drop(trace);
        assert_eq!(series.borrow().subject().observer_count(), 0);
    }

    #[test]
    fn dots_mode_marks_every_sample() {
        let series = PointSeries::shared(8);
        series
            .borrow_mut()
            .extend((0..5).map(|i| Sample::new(i as f64, 1.0)));
        let style = TraceStyle {
            mode: DrawMode::Dots,
            ..TraceStyle::default()
        };
        let mut trace = Trace::with_style(&series, style);
        let mut screen = Layer::new(100, 100);
        trace.draw(&mut screen, &map());
        let layer = trace_layer(&trace);
        assert_eq!(markers(layer).len(), 5);
        assert!(lines(layer).is_empty());
    }

    #[test]
    fn capability_reset_schedules_full_redraw() {
        let series = PointSeries::shared(8);
        series.borrow_mut().append(Sample::new(1.0, 1.0));
        let mut trace = Trace::new(&series);
        let mut screen = Layer::new(100, 100);
        trace.changed();
        trace.draw(&mut screen, &map());
        assert!(!trace.changed());

        let control = trace.as_trace_mut().expect("trace capability");
        assert_eq!(control.series_id(), series.borrow().id());
        control.reset();
        assert!(trace.changed());
        assert!(trace.surface().needs_full_redraw());
    }
}
