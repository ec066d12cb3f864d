//! Compositor configuration.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::render::Color;

/// Default trail persistence `K`.
pub const DEFAULT_TRAIL_PERSISTENCE: u32 = 10;

/// What the compositor paints behind the views.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Background {
    /// Nothing; previous frames show through unless alpha is 1.
    Transparent,
    /// A solid color.
    Color(Color),
}

impl Background {
    /// The background color, if any.
    pub fn color(self) -> Option<Color> {
        match self {
            Self::Transparent => None,
            Self::Color(color) => Some(color),
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::Color(Color::WHITE)
    }
}

impl FromStr for Background {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("transparent") {
            return Ok(Self::Transparent);
        }
        Color::from_hex(text)
            .map(Self::Color)
            .ok_or_else(|| ConfigError::InvalidBackground(text.to_string()))
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transparent => f.write_str("transparent"),
            Self::Color(color) => {
                let channel = |value: f32| (value.clamp(0.0, 1.0) * 255.0).round() as u8;
                write!(
                    f,
                    "#{:02x}{:02x}{:02x}",
                    channel(color.r),
                    channel(color.g),
                    channel(color.b)
                )?;
                if color.a < 1.0 {
                    write!(f, "{:02x}", channel(color.a))?;
                }
                Ok(())
            }
        }
    }
}

/// Configuration for a [`Compositor`](crate::compositor::Compositor).
#[derive(Debug, Clone, PartialEq)]
pub struct CompositorConfig {
    /// Background painted before the views.
    pub background: Background,
    /// Opacity of the per-frame background pass, in `(0, 1]`.
    ///
    /// Below 1, earlier frames stay partly visible (trails).
    pub alpha: f32,
    /// Trail persistence `K`: after the last change, repainting continues
    /// for `ceil(K / alpha) - 1` frames so trails fade out.
    pub trail_persistence: u32,
    /// On-screen surface size in pixels.
    pub size: (u32, u32),
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            background: Background::default(),
            alpha: 1.0,
            trail_persistence: DEFAULT_TRAIL_PERSISTENCE,
            size: (800, 600),
        }
    }
}

impl CompositorConfig {
    /// Check every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_alpha(self.alpha)?;
        validate_size(self.size.0, self.size.1)?;
        if self.trail_persistence == 0 {
            return Err(ConfigError::ZeroPersistence);
        }
        Ok(())
    }

    /// Number of paints following a change while trails fade out.
    pub fn trail_frames(&self) -> u32 {
        trail_frames(self.trail_persistence, self.alpha)
    }
}

pub(crate) fn validate_alpha(alpha: f32) -> Result<(), ConfigError> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::AlphaOutOfRange(alpha))
    }
}

pub(crate) fn validate_size(width: u32, height: u32) -> Result<(), ConfigError> {
    if width == 0 || height == 0 {
        return Err(ConfigError::InvalidSize { width, height });
    }
    Ok(())
}

/// `ceil(persistence / alpha)`, the residue set by a changed translucent
/// paint. Zero at alpha 1.
///
/// The ratio is rounded to four decimals first: a decimal alpha such as 0.7
/// widens to 0.69999998, and `7 / 0.7` must still give 10 frames, not 11.
pub(crate) fn trail_frames(persistence: u32, alpha: f32) -> u32 {
    if alpha >= 1.0 {
        return 0;
    }
    let ratio = f64::from(persistence) / f64::from(alpha);
    let frames = ((ratio * 1e4).round() / 1e4).ceil();
    if frames >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        frames as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CompositorConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.trail_frames(), 0);
    }

    #[test]
    fn alpha_must_be_in_half_open_unit_interval() {
        for alpha in [0.0, -0.5, 1.01, f32::NAN] {
            let config = CompositorConfig {
                alpha,
                ..CompositorConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::AlphaOutOfRange(_))
            ));
        }
        assert_eq!(validate_alpha(1.0), Ok(()));
        assert_eq!(validate_alpha(0.01), Ok(()));
    }

    #[test]
    fn zero_size_and_persistence_are_rejected() {
        let config = CompositorConfig {
            size: (0, 10),
            ..CompositorConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidSize {
                width: 0,
                height: 10
            })
        );
        let config = CompositorConfig {
            trail_persistence: 0,
            ..CompositorConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroPersistence));
    }

    #[test]
    fn trail_frames_rounds_up() {
        assert_eq!(trail_frames(10, 0.5), 20);
        assert_eq!(trail_frames(10, 0.3), 34);
        assert_eq!(trail_frames(10, 1.0), 0);
    }

    #[test]
    fn trail_frames_is_exact_for_decimal_alphas() {
        let cases = [
            (7, 0.7, 10),
            (3, 0.3, 10),
            (10, 0.2, 50),
            (10, 0.1, 100),
            (9, 0.9, 10),
            (1, 0.25, 4),
            (10, 0.3, 34),
            (7, 0.33, 22),
        ];
        for (persistence, alpha, expected) in cases {
            assert_eq!(
                trail_frames(persistence, alpha),
                expected,
                "persistence {persistence}, alpha {alpha}"
            );
        }
    }

    #[test]
    fn background_parses_and_prints() {
        assert_eq!("transparent".parse::<Background>(), Ok(Background::Transparent));
        assert_eq!(" Transparent ".parse::<Background>(), Ok(Background::Transparent));
        let background: Background = "#ff0000".parse().expect("valid color");
        assert_eq!(background.color(), Some(Color::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(background.to_string(), "#ff0000");
        let background: Background = "#00000080".parse().expect("valid color");
        assert_eq!(background.to_string(), "#00000080");
        assert_eq!(
            "red".parse::<Background>(),
            Err(ConfigError::InvalidBackground("red".to_string()))
        );
    }
}
