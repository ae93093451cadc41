//! # Transition Guard
//!
//! Holds the primary axes at their pre-transition values for a fixed number
//! of ticks after a mode change.

use std::collections::BTreeMap;

/// Frozen primary outputs and the ticks left to hold them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionGuard {
    remaining_ticks: u32,
    frozen: BTreeMap<u8, i32>,
}

impl TransitionGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the hold window.
    ///
    /// A guard already running is replaced, never extended.
    pub fn arm(&mut self, ticks: u32, frozen: BTreeMap<u8, i32>) {
        self.remaining_ticks = ticks;
        self.frozen = frozen;
    }

    /// Ticks still to hold after the current one.
    #[must_use]
    pub fn remaining_ticks(&self) -> u32 {
        self.remaining_ticks
    }

    /// Consumes one tick of the window.
    ///
    /// Returns the frozen values while the window is open, `None` after.
    pub fn take(&mut self) -> Option<&BTreeMap<u8, i32>> {
        if self.remaining_ticks == 0 {
            return None;
        }
        self.remaining_ticks -= 1;
        Some(&self.frozen)
    }
}
