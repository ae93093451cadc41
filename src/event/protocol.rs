//! # Joystick Event Protocol
//!
//! Core definitions for the joystick event stream.
//!
//! Every datagram carries exactly one record:
//!
//! ```text
//! {"type": 2, "time": 3656941, "number": 1, "value": -171}
//! ```
//!
//! `type` follows the Linux joystick API: 1 = button, 2 = axis. Senders that
//! forward raw `jstest --event` output may also set the init flag (`0x80`) on
//! the synthetic events the kernel emits when a device is opened.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default UDP port for the joystick event stream
pub const DEFAULT_EVENT_PORT: u16 = 5005;

/// Largest datagram the receivers read
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Button event type code
pub const JS_EVENT_BUTTON: u8 = 0x01;

/// Axis event type code
pub const JS_EVENT_AXIS: u8 = 0x02;

/// Init flag OR-ed into the type of synthetic startup events
pub const JS_EVENT_INIT: u8 = 0x80;

/// Axis value range (Linux joystick API)
pub const AXIS_VALUE_MIN: i32 = -32767;
pub const AXIS_VALUE_MAX: i32 = 32767;
pub const AXIS_VALUE_CENTER: i32 = 0;

/// Button values
pub const BUTTON_RELEASED: i32 = 0;
pub const BUTTON_PRESSED: i32 = 1;

/// Event timestamp for an elapsed duration, in whole milliseconds
///
/// Saturates at `u64::MAX`.
#[must_use]
pub fn timestamp_millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Kind of input channel an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Digital button, value 0 or 1
    Button,
    /// Analog axis, value in `AXIS_VALUE_MIN..=AXIS_VALUE_MAX`
    Axis,
}

impl EventKind {
    /// Wire type code (without the init flag)
    pub fn code(self) -> u8 {
        match self {
            EventKind::Button => JS_EVENT_BUTTON,
            EventKind::Axis => JS_EVENT_AXIS,
        }
    }

    /// Parse a wire type code, returning the kind and whether the init flag was set
    ///
    /// # Examples
    ///
    /// ```
    /// use fpv_vision_router::event::protocol::EventKind;
    ///
    /// assert_eq!(EventKind::from_code(2), Some((EventKind::Axis, false)));
    /// assert_eq!(EventKind::from_code(0x81), Some((EventKind::Button, true)));
    /// assert_eq!(EventKind::from_code(3), None);
    /// ```
    pub fn from_code(code: u8) -> Option<(Self, bool)> {
        let init = code & JS_EVENT_INIT != 0;
        match code & !JS_EVENT_INIT {
            JS_EVENT_BUTTON => Some((EventKind::Button, init)),
            JS_EVENT_AXIS => Some((EventKind::Axis, init)),
            _ => None,
        }
    }

    /// Short label used in logs
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Button => "BUTTON",
            EventKind::Axis => "AXIS  ",
        }
    }
}

/// One decoded joystick event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickEvent {
    /// Button or axis
    pub kind: EventKind,
    /// Source timestamp in milliseconds
    pub time: u64,
    /// Button or axis index
    pub number: u8,
    /// Axis position or button state
    pub value: i32,
    /// Synthetic startup event (init flag was set on the wire)
    pub init: bool,
}

impl JoystickEvent {
    /// Create an axis event
    pub fn axis(time: u64, number: u8, value: i32) -> Self {
        Self {
            kind: EventKind::Axis,
            time,
            number,
            value,
            init: false,
        }
    }

    /// Create a button event
    pub fn button(time: u64, number: u8, pressed: bool) -> Self {
        Self {
            kind: EventKind::Button,
            time,
            number,
            value: if pressed { BUTTON_PRESSED } else { BUTTON_RELEASED },
            init: false,
        }
    }

    /// Button state for button events (any non-zero value is pressed)
    pub fn is_pressed(&self) -> bool {
        self.value != BUTTON_RELEASED
    }
}

/// Flat record as it appears on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    #[serde(rename = "type")]
    pub kind: u8,
    pub time: u64,
    pub number: u8,
    pub value: i32,
}

impl From<&JoystickEvent> for WireRecord {
    fn from(event: &JoystickEvent) -> Self {
        let mut kind = event.kind.code();
        if event.init {
            kind |= JS_EVENT_INIT;
        }
        Self {
            kind,
            time: event.time,
            number: event.number,
            value: event.value,
        }
    }
}
