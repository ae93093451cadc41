//! # Control Mode
//!
//! Which source drives the primary axes.
//!
//! The mode is never stored as free-standing state: it is derived from the
//! mode button on every tick and compared with the previous tick's result.

use std::fmt;

/// Source selected for the primary axes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Pilot's controller (mode button held)
    Physical,
    /// Vision guidance (mode button released)
    Vision,
}

impl Mode {
    /// Physical while the mode button is pressed, Vision otherwise.
    #[must_use]
    pub fn from_button(pressed: bool) -> Self {
        if pressed {
            Mode::Physical
        } else {
            Mode::Vision
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Physical => write!(f, "PHYSICAL"),
            Mode::Vision => write!(f, "VISION"),
        }
    }
}

/// A detected mode change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Mode,
    pub to: Mode,
}

/// One-tick memory used for edge detection
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeTracker {
    previous: Option<Mode>,
}

impl ModeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mode observed on the last tick that had a mode-button sample.
    #[must_use]
    pub fn previous(&self) -> Option<Mode> {
        self.previous
    }

    /// Records this tick's mode and reports a change against the last one.
    ///
    /// The first observed mode is the initial mode, not a transition.
    pub fn observe(&mut self, mode: Mode) -> Option<Transition> {
        let transition = match self.previous {
            Some(from) if from != mode => Some(Transition { from, to: mode }),
            _ => None,
        };
        self.previous = Some(mode);
        transition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_button() {
        assert_eq!(Mode::from_button(true), Mode::Physical);
        assert_eq!(Mode::from_button(false), Mode::Vision);
    }

    #[test]
    fn test_initial_mode_is_not_a_transition() {
        let mut tracker = ModeTracker::new();
        assert_eq!(tracker.observe(Mode::Vision), None);
        assert_eq!(tracker.previous(), Some(Mode::Vision));
    }

    #[test]
    fn test_edges_detected() {
        let mut tracker = ModeTracker::new();
        tracker.observe(Mode::Physical);
        assert_eq!(tracker.observe(Mode::Physical), None);
        assert_eq!(
            tracker.observe(Mode::Vision),
            Some(Transition {
                from: Mode::Physical,
                to: Mode::Vision,
            })
        );
        assert_eq!(
            tracker.observe(Mode::Physical),
            Some(Transition {
                from: Mode::Vision,
                to: Mode::Physical,
            })
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Mode::Physical.to_string(), "PHYSICAL");
        assert_eq!(Mode::Vision.to_string(), "VISION");
    }
}
