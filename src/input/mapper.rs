//! # Controller Input Mapper Module
//!
//! Converts raw evdev events from a local joystick into indexed
//! [`JoystickEvent`]s, numbered the way the kernel joydev driver numbers them.
//!
//! ## Numbering
//!
//! | Channel | Index order |
//! |---------|-------------|
//! | Axes | ascending `ABS_*` code among the axes the device exposes |
//! | Buttons | codes `>= BTN_MISC` ascending, then lower key codes ascending |
//!
//! ## Value Ranges
//!
//! Every axis is rescaled from its device range (for example 0-255 on a
//! DualSense stick) to the joystick API range −32767..=32767. Buttons are 0/1.
//!
//! ## Usage
//!
//! ```
//! use evdev::{AbsoluteAxisType, EventType, InputEvent, Key};
//! use fpv_vision_router::input::mapper::{AxisRange, EventMapper};
//!
//! let mapper = EventMapper::from_layout(
//!     &[(AbsoluteAxisType::ABS_X, AxisRange::new(0, 255))],
//!     &[Key::BTN_SOUTH],
//! );
//!
//! let raw = InputEvent::new(EventType::ABSOLUTE, AbsoluteAxisType::ABS_X.0, 255);
//! let event = mapper.map_event(&raw, 0).unwrap();
//! assert_eq!(event.number, 0);
//! assert_eq!(event.value, 32767);
//! ```

use std::collections::HashMap;

use evdev::{AbsoluteAxisType, InputEvent, InputEventKind, Key};

use super::snapshot::InputSnapshot;
use crate::event::protocol::{JoystickEvent, AXIS_VALUE_MAX, AXIS_VALUE_MIN};

/// First key code the joydev driver numbers as a joystick button
pub const BTN_MISC: u16 = 0x100;

/// Raw value range reported by the device for one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    /// Raw minimum
    pub min: i32,
    /// Raw maximum
    pub max: i32,
}

impl AxisRange {
    /// Creates a range.
    #[must_use]
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Scales a raw value to −32767..=32767.
    ///
    /// Degenerate ranges (min >= max) pass the value through clamped.
    #[must_use]
    pub fn scale(&self, raw: i32) -> i32 {
        if self.min >= self.max {
            return raw.clamp(AXIS_VALUE_MIN, AXIS_VALUE_MAX);
        }

        let clamped = i64::from(raw.clamp(self.min, self.max));
        let span = i64::from(self.max) - i64::from(self.min);
        let out_span = i64::from(AXIS_VALUE_MAX) - i64::from(AXIS_VALUE_MIN);

        // Rounded integer scaling
        let offset = ((clamped - i64::from(self.min)) * out_span + span / 2) / span;
        (i64::from(AXIS_VALUE_MIN) + offset) as i32
    }
}

/// Maps evdev codes to joystick indices.
///
/// # Thread Safety
///
/// `EventMapper` holds no interior mutability; share it by reference or clone.
#[derive(Debug, Clone, Default)]
pub struct EventMapper {
    axes: HashMap<u16, (u8, AxisRange)>,
    buttons: HashMap<u16, u8>,
}

impl EventMapper {
    /// Builds a mapper from the axes and keys a device exposes.
    ///
    /// Input order does not matter; indices are assigned by code as joydev does.
    /// Anything past index 255 is ignored.
    #[must_use]
    pub fn from_layout(axes: &[(AbsoluteAxisType, AxisRange)], keys: &[Key]) -> Self {
        let mut sorted_axes: Vec<_> = axes.to_vec();
        sorted_axes.sort_by_key(|(axis, _)| axis.0);
        sorted_axes.dedup_by_key(|(axis, _)| axis.0);

        let axes = sorted_axes
            .into_iter()
            .zip(0..=u8::MAX)
            .map(|((axis, range), index)| (axis.0, (index, range)))
            .collect();

        let mut codes: Vec<u16> = keys.iter().map(|key| key.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        let (joystick, other): (Vec<u16>, Vec<u16>) =
            codes.into_iter().partition(|&code| code >= BTN_MISC);

        let buttons = joystick
            .into_iter()
            .chain(other)
            .zip(0..=u8::MAX)
            .collect();

        Self { axes, buttons }
    }

    /// Number of mapped axes.
    #[must_use]
    pub fn axis_count(&self) -> usize {
        self.axes.len()
    }

    /// Number of mapped buttons.
    #[must_use]
    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }

    /// Joystick index of an evdev axis.
    #[must_use]
    pub fn axis_index(&self, axis: AbsoluteAxisType) -> Option<u8> {
        self.axes.get(&axis.0).map(|(index, _)| *index)
    }

    /// Joystick index of an evdev key.
    #[must_use]
    pub fn button_index(&self, key: Key) -> Option<u8> {
        self.buttons.get(&key.code()).copied()
    }

    /// Converts one evdev event.
    ///
    /// Returns `None` for sync events, unmapped codes, and key auto-repeat.
    #[must_use]
    pub fn map_event(&self, event: &InputEvent, time: u64) -> Option<JoystickEvent> {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => {
                let (index, range) = self.axes.get(&axis.0)?;
                Some(JoystickEvent::axis(time, *index, range.scale(event.value())))
            }
            InputEventKind::Key(key) => {
                // value 2 is auto-repeat
                if event.value() > 1 {
                    return None;
                }
                let index = self.buttons.get(&key.code())?;
                Some(JoystickEvent::button(time, *index, event.value() != 0))
            }
            _ => None,
        }
    }

    /// Builds an initial snapshot from raw axis values and pressed keys.
    #[must_use]
    pub fn initial_snapshot(&self, raw_axes: &[(AbsoluteAxisType, i32)], pressed: &[Key]) -> InputSnapshot {
        let mut snapshot = InputSnapshot::new();

        for (axis, raw) in raw_axes {
            if let Some((index, range)) = self.axes.get(&axis.0) {
                snapshot.set_axis(*index, range.scale(*raw));
            }
        }

        for (&code, &index) in &self.buttons {
            let is_pressed = pressed.iter().any(|key| key.code() == code);
            snapshot.set_button(index, is_pressed);
        }

        snapshot
    }
}
