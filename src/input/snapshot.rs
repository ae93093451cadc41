//! # Input Snapshot
//!
//! Last-known state of one input source: every axis and button index the
//! source has reported, with the most recent value for each.

use std::collections::BTreeMap;

use crate::event::protocol::{EventKind, JoystickEvent};

/// Last-known axis and button values of one source
///
/// Values are only ever overwritten, never removed.
///
/// # Examples
///
/// ```
/// use fpv_vision_router::event::protocol::JoystickEvent;
/// use fpv_vision_router::input::snapshot::InputSnapshot;
///
/// let mut snapshot = InputSnapshot::new();
/// snapshot.apply(&JoystickEvent::axis(0, 1, -171));
/// snapshot.apply(&JoystickEvent::button(0, 3, true));
///
/// assert_eq!(snapshot.axis(1), Some(-171));
/// assert_eq!(snapshot.button(3), Some(true));
/// assert_eq!(snapshot.axis(0), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputSnapshot {
    axes: BTreeMap<u8, i32>,
    buttons: BTreeMap<u8, bool>,
}

impl InputSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one event.
    pub fn apply(&mut self, event: &JoystickEvent) {
        match event.kind {
            EventKind::Axis => self.set_axis(event.number, event.value),
            EventKind::Button => self.set_button(event.number, event.is_pressed()),
        }
    }

    /// Sets an axis value.
    pub fn set_axis(&mut self, index: u8, value: i32) {
        self.axes.insert(index, value);
    }

    /// Sets a button state.
    pub fn set_button(&mut self, index: u8, pressed: bool) {
        self.buttons.insert(index, pressed);
    }

    /// Last value of an axis, if it has ever been reported.
    #[must_use]
    pub fn axis(&self, index: u8) -> Option<i32> {
        self.axes.get(&index).copied()
    }

    /// Last state of a button, if it has ever been reported.
    #[must_use]
    pub fn button(&self, index: u8) -> Option<bool> {
        self.buttons.get(&index).copied()
    }

    /// All reported axes, ordered by index.
    #[must_use]
    pub fn axes(&self) -> &BTreeMap<u8, i32> {
        &self.axes
    }

    /// All reported buttons, ordered by index.
    #[must_use]
    pub fn buttons(&self) -> &BTreeMap<u8, bool> {
        &self.buttons
    }

    /// True if nothing has been reported yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty() && self.buttons.is_empty()
    }

    /// Re-expresses the snapshot as events, axes first.
    ///
    /// Used to resend full state so a remote receiver stays fresh.
    #[must_use]
    pub fn to_events(&self, time: u64) -> Vec<JoystickEvent> {
        self.axes
            .iter()
            .map(|(&index, &value)| JoystickEvent::axis(time, index, value))
            .chain(
                self.buttons
                    .iter()
                    .map(|(&index, &pressed)| JoystickEvent::button(time, index, pressed)),
            )
            .collect()
    }
}
