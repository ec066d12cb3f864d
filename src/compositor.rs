//! Frame-level compositing: background, alpha trails and view painting.
//!
//! [`Compositor::paint`] is called once per frame by the host. It queries
//! change state top-down (compositor, views, scene graphs, drawables), skips
//! the frame entirely when nothing changed, and otherwise paints the
//! background pass followed by every view.
//!
//! With alpha below 1 the background pass is translucent, so earlier frames
//! stay visible as fading trails. A residue counter keeps repainting for
//! `ceil(K / alpha) - 1` frames after the last change so the trails finish
//! fading instead of freezing on screen.

use std::fmt;

use crate::change::ChangeFlag;
use crate::config::{
    Background, CompositorConfig, trail_frames, validate_alpha, validate_size,
};
use crate::error::ConfigError;
use crate::render::RenderCommand;
use crate::subject::{Event, Subject};
use crate::surface::{Canvas, Layer};
use crate::view::{View, ViewId};

/// What one call to [`Compositor::paint`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintOutcome {
    /// The visibility predicate reported the surface as hidden.
    Hidden,
    /// Nothing changed and no trails are fading; nothing was drawn.
    Idle,
    /// The frame was painted.
    Painted {
        /// Whether anything reported a change this frame.
        changed: bool,
        /// Whether further frames are needed for trails to fade out.
        draining: bool,
    },
}

impl PaintOutcome {
    /// Whether anything was drawn.
    pub fn painted(self) -> bool {
        matches!(self, Self::Painted { .. })
    }
}

/// Owner of the on-screen canvas and the views painted onto it.
pub struct Compositor<C: Canvas = Layer> {
    screen: C,
    views: Vec<View>,
    config: CompositorConfig,
    residue: u32,
    flag: ChangeFlag,
    subject: Subject,
    visibility: Box<dyn Fn() -> bool>,
}

impl<C: Canvas> Compositor<C> {
    /// Create a compositor with the default configuration.
    pub fn new(screen: C) -> Result<Self, ConfigError> {
        Self::with_config(screen, CompositorConfig::default())
    }

    /// Create a compositor, allocating the screen at the configured size.
    pub fn with_config(mut screen: C, config: CompositorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (width, height) = config.size;
        if screen.size() != (width, height) {
            screen.allocate(width, height);
        }
        Ok(Self {
            screen,
            views: Vec::new(),
            config,
            residue: 0,
            flag: ChangeFlag::new(true),
            subject: Subject::new("compositor"),
            visibility: Box::new(|| true),
        })
    }

    /// Access the on-screen canvas.
    pub fn screen(&self) -> &C {
        &self.screen
    }

    /// Access the configuration.
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Access the subject broadcasting view and size changes.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Remaining frames of trail fading.
    pub fn residue(&self) -> u32 {
        self.residue
    }

    /// Set the background pass opacity.
    pub fn set_alpha(&mut self, alpha: f32) -> Result<(), ConfigError> {
        validate_alpha(alpha)?;
        if self.config.alpha != alpha {
            tracing::debug!(from = self.config.alpha, to = alpha, "compositor alpha changed");
            self.config.alpha = alpha;
            self.flag.set();
        }
        Ok(())
    }

    /// Set the background.
    pub fn set_background(&mut self, background: Background) {
        if self.config.background != background {
            self.config.background = background;
            self.flag.set();
        }
    }

    /// Set the trail persistence `K`.
    pub fn set_trail_persistence(&mut self, persistence: u32) -> Result<(), ConfigError> {
        if persistence == 0 {
            return Err(ConfigError::ZeroPersistence);
        }
        self.config.trail_persistence = persistence;
        Ok(())
    }

    /// Resize the on-screen canvas; a no-op when unchanged.
    pub fn set_size(&mut self, width: u32, height: u32) -> Result<(), ConfigError> {
        validate_size(width, height)?;
        if self.config.size == (width, height) {
            return Ok(());
        }
        tracing::debug!(width, height, "compositor resized");
        self.config.size = (width, height);
        self.screen.allocate(width, height);
        self.flag.set();
        self.subject.notify(&Event::SizeChanged { width, height });
        Ok(())
    }

    /// Install the predicate consulted once per paint.
    pub fn set_visibility<F>(&mut self, visible: F)
    where
        F: Fn() -> bool + 'static,
    {
        self.visibility = Box::new(visible);
    }

    /// Add a view on top of the existing ones.
    pub fn add_view(&mut self, view: View) -> ViewId {
        let id = view.id();
        self.views.push(view);
        self.flag.set();
        self.subject.notify(&Event::ViewAdded(id));
        id
    }

    /// Remove a view. Removing an absent view is a no-op.
    pub fn remove_view(&mut self, id: ViewId) -> Option<View> {
        let index = self.views.iter().position(|view| view.id() == id)?;
        let view = self.views.remove(index);
        self.flag.set();
        self.subject.notify(&Event::ViewRemoved(id));
        Some(view)
    }

    /// Access a view.
    pub fn view(&self, id: ViewId) -> Option<&View> {
        self.views.iter().find(|view| view.id() == id)
    }

    /// Mutably access a view.
    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut View> {
        self.views.iter_mut().find(|view| view.id() == id)
    }

    /// Iterate over views in paint order.
    pub fn views(&self) -> impl Iterator<Item = &View> + '_ {
        self.views.iter()
    }

    /// Paint one frame if anything requires it.
    pub fn paint(&mut self) -> PaintOutcome {
        let _span = tracing::trace_span!("paint").entered();
        if !(self.visibility)() {
            tracing::trace!("surface hidden, skipping paint");
            return PaintOutcome::Hidden;
        }

        let mut changed = self.flag.query();
        for view in &mut self.views {
            changed |= view.changed();
        }
        if !changed && self.residue == 0 {
            return PaintOutcome::Idle;
        }

        let alpha = self.config.alpha;
        let background = self.config.background.color();
        if alpha >= 1.0 {
            self.screen.clear();
            if let Some(color) = background {
                self.screen.draw(RenderCommand::Fill {
                    color: Some(color),
                    alpha: 1.0,
                });
            }
        } else {
            self.screen.draw(RenderCommand::Fill {
                color: background,
                alpha,
            });
        }
        for view in &mut self.views {
            view.paint(&mut self.screen);
        }

        let was_draining = self.residue > 0;
        if changed {
            self.residue = trail_frames(self.config.trail_persistence, alpha);
        }
        self.residue = self.residue.saturating_sub(1);
        let draining = self.residue > 0;
        if draining && !was_draining {
            tracing::debug!(frames = self.residue, "trails fading");
        } else if was_draining && !draining {
            tracing::debug!("trails settled");
        }
        tracing::trace!(changed, residue = self.residue, "frame painted");
        PaintOutcome::Painted { changed, draining }
    }
}

impl<C: Canvas + fmt::Debug> fmt::Debug for Compositor<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("screen", &self.screen)
            .field("views", &self.views)
            .field("config", &self.config)
            .field("residue", &self.residue)
            .finish_non_exhaustive()
    }
}
