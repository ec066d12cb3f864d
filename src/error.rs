//! Error types shared across the redraw pipeline.
//!
//! Only recoverable conditions are modeled here. Misuse such as replaying a
//! cursor against a foreign series panics at the call site instead.

use thiserror::Error;

/// Errors raised when validating compositor configuration.
///
/// Setters return these synchronously so the application layer can reject a
/// user preference before committing it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Background alpha must lie in `(0, 1]`.
    #[error("alpha must be in (0, 1], got {0}")]
    AlphaOutOfRange(f32),
    /// Surfaces must have a positive area.
    #[error("invalid surface size {width}x{height}")]
    InvalidSize {
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
    },
    /// Trail persistence must be at least one frame.
    #[error("trail persistence must be at least 1")]
    ZeroPersistence,
    /// Background string could not be parsed.
    #[error("invalid background `{0}`: expected `transparent` or `#rrggbb[aa]`")]
    InvalidBackground(String),
}

/// Failure reported by an observer callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ObserverError {
    message: String,
}

impl ObserverError {
    /// Create an observer error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Access the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised when repositioning a drawable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PositionError {
    /// The drawable has a fixed position.
    #[error("drawable cannot be repositioned")]
    Immovable,
}
