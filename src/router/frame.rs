//! # Output Frame
//!
//! The batch of events the router emits once per tick.

use crate::event::protocol::{EventKind, JoystickEvent};

/// One composed output channel value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputEvent {
    /// Button or axis
    pub kind: EventKind,
    /// Channel index
    pub number: u8,
    /// Axis position or button state (0/1)
    pub value: i32,
}

/// All channel values composed in one tick, sent as one batch
///
/// Every configured axis and (non-mode) button index appears exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputFrame {
    /// Router-local timestamp in milliseconds
    pub time: u64,
    /// Axes first (ascending index), then buttons (ascending index)
    pub events: Vec<OutputEvent>,
}

impl OutputFrame {
    /// Creates an empty frame.
    #[must_use]
    pub fn new(time: u64) -> Self {
        Self {
            time,
            events: Vec::new(),
        }
    }

    /// Appends an axis value.
    pub fn push_axis(&mut self, number: u8, value: i32) {
        self.events.push(OutputEvent {
            kind: EventKind::Axis,
            number,
            value,
        });
    }

    /// Appends a button state.
    pub fn push_button(&mut self, number: u8, pressed: bool) {
        self.events.push(OutputEvent {
            kind: EventKind::Button,
            number,
            value: i32::from(pressed),
        });
    }

    /// Value of an axis in this frame.
    #[must_use]
    pub fn axis(&self, number: u8) -> Option<i32> {
        self.find(EventKind::Axis, number)
    }

    /// State of a button in this frame.
    #[must_use]
    pub fn button(&self, number: u8) -> Option<bool> {
        self.find(EventKind::Button, number).map(|value| value != 0)
    }

    fn find(&self, kind: EventKind, number: u8) -> Option<i32> {
        self.events
            .iter()
            .find(|event| event.kind == kind && event.number == number)
            .map(|event| event.value)
    }

    /// Number of events in the frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if the frame carries no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Values without the timestamp, for comparing frames across ticks.
    #[must_use]
    pub fn values(&self) -> &[OutputEvent] {
        &self.events
    }

    /// Wire events, all stamped with the frame time.
    pub fn to_events(&self) -> impl Iterator<Item = JoystickEvent> + '_ {
        self.events.iter().map(move |event| JoystickEvent {
            kind: event.kind,
            time: self.time,
            number: event.number,
            value: event.value,
            init: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_lookup() {
        let mut frame = OutputFrame::new(20);
        frame.push_axis(0, 100);
        frame.push_button(0, true);

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.axis(0), Some(100));
        assert_eq!(frame.button(0), Some(true));
        assert_eq!(frame.axis(1), None);
        assert_eq!(frame.button(1), None);
    }

    #[test]
    fn test_to_events_uses_frame_time() {
        let mut frame = OutputFrame::new(1234);
        frame.push_axis(2, -5);
        frame.push_button(4, false);

        let events: Vec<_> = frame.to_events().collect();
        assert_eq!(events[0], JoystickEvent::axis(1234, 2, -5));
        assert_eq!(events[1], JoystickEvent::button(1234, 4, false));
    }

    #[test]
    fn test_values_ignore_time() {
        let mut a = OutputFrame::new(1);
        let mut b = OutputFrame::new(2);
        a.push_axis(0, 7);
        b.push_axis(0, 7);
        assert_ne!(a, b);
        assert_eq!(a.values(), b.values());
    }
}
