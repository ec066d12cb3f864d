//! Destructive-read change tracking.

/// A dirty bit whose read also clears it.
///
/// Every stateful object in the pipeline owns one. The compositor performs a
/// single top-down pass per frame, so each flag has exactly one reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeFlag {
    dirty: bool,
}

impl ChangeFlag {
    /// Create a flag, optionally starting dirty.
    pub fn new(dirty: bool) -> Self {
        Self { dirty }
    }

    /// Mark the owner as changed.
    pub fn set(&mut self) {
        self.dirty = true;
    }

    /// Return the current value and reset it.
    pub fn query(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Inspect the value without resetting it.
    pub fn peek(&self) -> bool {
        self.dirty
    }
}
