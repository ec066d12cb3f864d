//! Geometric primitives used by the redraw pipeline.
//!
//! [`Point`], [`Range`] and [`Viewport`] live in model space. [`ScreenPoint`]
//! and [`ScreenRect`] are surface pixel coordinates.

/// A point in model space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// X value in model coordinates.
    pub x: f64,
    /// Y value in model coordinates.
    pub y: f64,
}

impl Point {
    /// Create a new model point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in screen space (pixel coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    /// X value in screen pixels.
    pub x: f32,
    /// Y value in screen pixels.
    pub y: f32,
}

impl ScreenPoint {
    /// Create a new screen point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A rectangle in screen space (pixel coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenRect {
    /// Top-left corner.
    pub min: ScreenPoint,
    /// Bottom-right corner.
    pub max: ScreenPoint,
}

impl ScreenRect {
    /// Create a new screen rectangle from corners.
    pub fn new(min: ScreenPoint, max: ScreenPoint) -> Self {
        Self { min, max }
    }

    /// Create a rectangle at the origin with the given size.
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new(ScreenPoint::new(0.0, 0.0), ScreenPoint::new(width, height))
    }

    /// Rectangle width in pixels.
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Rectangle height in pixels.
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Check whether the rectangle has positive area.
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    /// Check whether the point lies inside the rectangle (edges included).
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    /// Pixel size rounded up to whole pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width().max(0.0).ceil() as u32,
            self.height().max(0.0).ceil() as u32,
        )
    }
}

/// Numeric range with inclusive bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
}

impl Range {
    /// Create a new range, swapping bounds if needed.
    pub fn new(mut min: f64, mut max: f64) -> Self {
        if min > max {
            std::mem::swap(&mut min, &mut max);
        }
        Self { min, max }
    }

    /// Span of the range.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    /// Check whether both bounds are finite.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    /// Check whether the value lies inside the range.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Ensure the range has at least the given span.
    pub fn with_min_span(&self, min_span: f64) -> Self {
        let span = self.span();
        if span >= min_span {
            return *self;
        }
        let center = (self.min + self.max) * 0.5;
        let half = min_span * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }
}

/// Visible model ranges on both axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// X axis range.
    pub x: Range,
    /// Y axis range.
    pub y: Range,
}

impl Viewport {
    /// Create a viewport from X and Y ranges.
    pub fn new(x: Range, y: Range) -> Self {
        Self { x, y }
    }

    /// Check whether both axes are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_with_min_span_expands() {
        let range = Range::new(2.0, 2.0);
        let expanded = range.with_min_span(1.0);
        assert!(expanded.span() >= 1.0);
        assert!(((expanded.min + expanded.max) * 0.5 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn screen_rect_pixel_size_rounds_up() {
        let rect = ScreenRect::new(ScreenPoint::new(10.0, 5.0), ScreenPoint::new(20.5, 15.0));
        assert_eq!(rect.pixel_size(), (11, 10));
        assert!(rect.contains(ScreenPoint::new(10.0, 15.0)));
        assert!(!rect.contains(ScreenPoint::new(9.9, 6.0)));
    }
}
