//! Drawing targets and buffered incremental redraw.
//!
//! A [`Canvas`] is anything that accepts primitive drawing operations: the
//! host's on-screen surface or an offscreen [`Layer`]. A [`Surface`] owns one
//! cached layer and decides, per frame, whether new content can be drawn on
//! top of it or the layer must be cleared and redrawn from scratch.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::geom::{ScreenPoint, ScreenRect};
use crate::render::{Color, RectStyle, RenderCommand};
use crate::transform::{CoordMap, MapId};

/// Entries fainter than this are dropped from a layer.
const MIN_VISIBLE_OPACITY: f32 = 1.0 / 255.0;

static LAYER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A drawing target.
pub trait Canvas {
    /// Allocated size in pixels.
    fn size(&self) -> (u32, u32);

    /// Reallocate the backing store, discarding its contents.
    fn allocate(&mut self, width: u32, height: u32);

    /// Erase everything.
    fn clear(&mut self);

    /// Perform one primitive drawing operation.
    fn draw(&mut self, command: RenderCommand);

    /// Copy an offscreen layer onto this canvas in one operation.
    fn blit(&mut self, source: &Layer);
}

/// A retained drawing command and its remaining opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerEntry {
    /// The command.
    pub command: RenderCommand,
    /// Opacity multiplier applied when the command is presented.
    pub opacity: f32,
    source: Option<BlitSource>,
}

impl LayerEntry {
    fn drawn(command: RenderCommand, opacity: f32) -> Self {
        Self {
            command,
            opacity,
            source: None,
        }
    }

    /// The layer content this entry was blitted from, if any.
    pub fn source(&self) -> Option<BlitSource> {
        self.source
    }
}

/// Identity of a layer's content between two destructive operations.
///
/// While the stamp of a layer is unchanged its content only grew, so a newer
/// blit of it covers every entry an older blit left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlitSource {
    layer: u64,
    generation: u64,
}

/// Cumulative operation counters of a layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerStats {
    /// Primitive drawing operations (everything except fills).
    pub draws: u64,
    /// Translucent or opaque background fills.
    pub fills: u64,
    /// Layer-to-layer copies.
    pub blits: u64,
    /// Clears.
    pub clears: u64,
}

/// Offscreen buffer holding retained drawing commands.
///
/// A translucent [`RenderCommand::Fill`] fades everything already retained by
/// `1 - alpha`; entries that become invisible are dropped, which keeps a
/// layer with a trails effect bounded in size.
///
/// Blitting a layer replaces what an earlier blit of the same content left
/// behind, so redrawing an unchanged trace every frame does not pile up
/// faded duplicates. Content from before a clear keeps fading as a trail.
#[derive(Debug, Clone)]
pub struct Layer {
    id: u64,
    generation: u64,
    width: u32,
    height: u32,
    entries: Vec<LayerEntry>,
    stats: LayerStats,
}

impl Layer {
    /// Allocate an empty layer.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Self {
        assert_valid_size(width, height);
        Self {
            id: LAYER_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            generation: 0,
            width,
            height,
            entries: Vec::new(),
            stats: LayerStats::default(),
        }
    }

    /// Access retained entries in paint order.
    pub fn entries(&self) -> &[LayerEntry] {
        &self.entries
    }

    /// Iterate over retained commands in paint order.
    pub fn commands(&self) -> impl Iterator<Item = &RenderCommand> + '_ {
        self.entries.iter().map(|entry| &entry.command)
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Access the operation counters.
    pub fn stats(&self) -> LayerStats {
        self.stats
    }

    /// Stamp attached to entries blitted from the current content.
    pub fn blit_source(&self) -> BlitSource {
        BlitSource {
            layer: self.id,
            generation: self.generation,
        }
    }

    fn bounds(&self) -> ScreenRect {
        ScreenRect::new(
            ScreenPoint::new(0.0, 0.0),
            ScreenPoint::new(self.width as f32, self.height as f32),
        )
    }

    fn fill(&mut self, color: Option<Color>, alpha: f32) {
        self.stats.fills += 1;
        self.generation += 1;
        if alpha >= 1.0 {
            self.entries.clear();
        } else {
            self.fade(1.0 - alpha);
        }
        if let Some(color) = color {
            let bounds = self.bounds();
            let command = RenderCommand::Rect {
                rect: bounds,
                style: RectStyle {
                    fill: color,
                    stroke: Color::new(0.0, 0.0, 0.0, 0.0),
                    stroke_width: 0.0,
                },
            };
            self.entries.push(LayerEntry::drawn(command, alpha.min(1.0)));
        }
    }

    fn fade(&mut self, keep: f32) {
        let mut kept: Vec<LayerEntry> = Vec::with_capacity(self.entries.len());
        for mut entry in self.entries.drain(..) {
            match entry.command {
                RenderCommand::ClipRect(_) => kept.push(entry),
                RenderCommand::ClipEnd => {
                    // Drop clip pairs whose content faded away entirely.
                    if matches!(
                        kept.last().map(|last| &last.command),
                        Some(RenderCommand::ClipRect(_))
                    ) {
                        kept.pop();
                    } else {
                        kept.push(entry);
                    }
                }
                _ => {
                    entry.opacity *= keep;
                    if entry.opacity >= MIN_VISIBLE_OPACITY {
                        kept.push(entry);
                    }
                }
            }
        }
        self.entries = kept;
    }
}

impl Canvas for Layer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn allocate(&mut self, width: u32, height: u32) {
        assert_valid_size(width, height);
        self.width = width;
        self.height = height;
        self.generation += 1;
        self.entries.clear();
    }

    fn clear(&mut self) {
        self.stats.clears += 1;
        self.generation += 1;
        self.entries.clear();
    }

    fn draw(&mut self, command: RenderCommand) {
        if let RenderCommand::Fill { color, alpha } = command {
            self.fill(color, alpha);
            return;
        }
        self.stats.draws += 1;
        self.entries.push(LayerEntry::drawn(command, 1.0));
    }

    fn blit(&mut self, source: &Layer) {
        self.stats.blits += 1;
        let stamp = source.blit_source();
        self.entries.retain(|entry| entry.source != Some(stamp));
        self.entries
            .extend(source.entries.iter().map(|entry| LayerEntry {
                source: Some(stamp),
                ..entry.clone()
            }));
    }
}

fn assert_valid_size(width: u32, height: u32) {
    assert!(
        width > 0 && height > 0,
        "surface size must be positive, got {width}x{height}"
    );
}

/// Which path [`Surface::render`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redraw {
    /// Only new content was drawn on top of the cached layer.
    Incremental,
    /// The layer was cleared and everything was drawn again.
    Full,
}

/// A cached offscreen layer with redraw bookkeeping.
///
/// The layer is discarded, and a full redraw scheduled, exactly when the
/// requested size or the coordinate mapping identity changes. An explicit
/// [`invalidate`](Surface::invalidate) schedules a full redraw but keeps the
/// allocation.
#[derive(Debug)]
pub struct Surface {
    requested: (u32, u32),
    map: Option<MapId>,
    layer: Option<Layer>,
    needs_full_redraw: bool,
}

impl Default for Surface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface {
    /// Create a surface with no size and no layer.
    pub fn new() -> Self {
        Self {
            requested: (0, 0),
            map: None,
            layer: None,
            needs_full_redraw: true,
        }
    }

    /// The most recently requested size.
    pub fn requested_size(&self) -> (u32, u32) {
        self.requested
    }

    /// Request a layer size; a no-op when unchanged.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn request_size(&mut self, width: u32, height: u32) {
        assert_valid_size(width, height);
        if self.requested == (width, height) {
            return;
        }
        self.requested = (width, height);
        self.discard("size changed");
    }

    /// Follow a coordinate mapping: its screen size and its identity.
    pub fn sync_map(&mut self, map: &CoordMap) {
        let (width, height) = map.screen().pixel_size();
        self.request_size(width.max(1), height.max(1));
        if self.map != Some(map.id()) {
            self.map = Some(map.id());
            self.discard("coordinate map changed");
        }
    }

    /// Schedule a full redraw on the next render.
    pub fn invalidate(&mut self) {
        self.needs_full_redraw = true;
    }

    /// Check whether the next render will be a full redraw.
    pub fn needs_full_redraw(&self) -> bool {
        self.needs_full_redraw || self.layer.is_none()
    }

    /// Access the cached layer.
    pub fn layer(&self) -> Option<&Layer> {
        self.layer.as_ref()
    }

    /// Bring the cached layer up to date and blit it onto `dest`.
    ///
    /// `draw` receives the layer and the chosen path: on
    /// [`Redraw::Incremental`] it must draw only new content, on
    /// [`Redraw::Full`] the layer has just been cleared and it must draw
    /// everything.
    pub fn render<F>(&mut self, dest: &mut dyn Canvas, draw: F) -> Redraw
    where
        F: FnOnce(&mut Layer, Redraw),
    {
        let (width, height) = self.requested;
        let redraw = if self.needs_full_redraw() {
            Redraw::Full
        } else {
            Redraw::Incremental
        };
        let layer = self
            .layer
            .get_or_insert_with(|| Layer::new(width, height));
        if redraw == Redraw::Full {
            layer.clear();
        }
        draw(layer, redraw);
        self.needs_full_redraw = false;
        dest.blit(layer);
        redraw
    }

    fn discard(&mut self, reason: &'static str) {
        if self.layer.take().is_some() {
            tracing::debug!(
                reason,
                width = self.requested.0,
                height = self.requested.1,
                "discarding cached layer"
            );
        }
        self.needs_full_redraw = true;
    }
}
