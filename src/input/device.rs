//! # Joystick Device Module
//!
//! Local joystick detection, connection, and state reading using the Linux
//! evdev interface.
//!
//! ## Device Detection
//!
//! A device counts as a joystick when it exposes both:
//! - At least one absolute axis (`ABS_X` for sticks, throttles, gimbals)
//! - At least one joystick/gamepad button (key code `>= BTN_MISC`)
//!
//! Keyboards and touchpads are skipped by this test.

use evdev::{AbsoluteAxisType, Device, EventStream, Key};
use std::path::Path;
use tracing::{debug, info};

use super::mapper::{AxisRange, EventMapper, BTN_MISC};
use super::snapshot::InputSnapshot;
use crate::error::{Result, RouterError};

/// Directory scanned for event devices
const INPUT_DIR: &str = "/dev/input";

/// Local joystick handle
///
/// Represents an open evdev device plus the joystick numbering derived from
/// its capabilities.
pub struct JoystickDevice {
    device: Device,
    device_path: String,
    mapper: EventMapper,
}

impl std::fmt::Debug for JoystickDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoystickDevice")
            .field("device_path", &self.device_path)
            .field("axes", &self.mapper.axis_count())
            .field("buttons", &self.mapper.button_count())
            .finish_non_exhaustive()
    }
}

impl JoystickDevice {
    /// Open a joystick
    ///
    /// # Arguments
    ///
    /// * `path` - Explicit `/dev/input/eventX` path, or `None` to auto-detect
    ///
    /// # Errors
    ///
    /// - `DeviceNotFound`: Auto-detection found no joystick
    /// - `Device`: The explicit path could not be opened or is not a joystick
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fpv_vision_router::input::device::JoystickDevice;
    ///
    /// let joystick = JoystickDevice::open(None)?;
    /// println!("Connected to joystick at: {}", joystick.device_path());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::open_path(Path::new(path)),
            None => Self::detect(),
        }
    }

    /// Open a specific device path
    fn open_path(path: &Path) -> Result<Self> {
        let device = Device::open(path)
            .map_err(|e| RouterError::Device(format!("Failed to open {}: {}", path.display(), e)))?;

        if !is_joystick(&device) {
            return Err(RouterError::Device(format!(
                "{} does not look like a joystick",
                path.display()
            )));
        }

        Ok(Self::from_device(device, path.to_string_lossy().to_string()))
    }

    /// Scan `/dev/input` for the first joystick
    fn detect() -> Result<Self> {
        let input_dir = Path::new(INPUT_DIR);

        if !input_dir.exists() {
            return Err(RouterError::Device(format!("{} directory not found", INPUT_DIR)));
        }

        let mut entries: Vec<_> = std::fs::read_dir(input_dir)
            .map_err(|e| RouterError::Device(format!("Failed to read {}: {}", INPUT_DIR, e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| RouterError::Device(format!("Failed to read directory entry: {}", e)))?;

        // Sort entries for deterministic device selection when multiple joysticks are connected
        entries.sort_by_key(|entry| entry.path());

        for entry in entries {
            let path = entry.path();

            let is_event_node = path
                .file_name()
                .map(|name| name.to_string_lossy().starts_with("event"))
                .unwrap_or(false);
            if !is_event_node {
                continue;
            }

            match Device::open(&path) {
                Ok(device) => {
                    debug!(
                        "Found input device: {} ({})",
                        path.display(),
                        device.name().unwrap_or("unnamed")
                    );

                    if is_joystick(&device) {
                        let device_path = path.to_string_lossy().to_string();
                        info!("Found joystick at: {}", device_path);
                        return Ok(Self::from_device(device, device_path));
                    }
                }
                Err(e) => {
                    // Permission denied or other errors - skip device
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Err(RouterError::DeviceNotFound)
    }

    fn from_device(device: Device, device_path: String) -> Self {
        let mapper = build_mapper(&device);
        info!(
            "Joystick {} exposes {} axes and {} buttons",
            device_path,
            mapper.axis_count(),
            mapper.button_count()
        );
        Self {
            device,
            device_path,
            mapper,
        }
    }

    /// Device path this joystick was opened from
    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    /// Human-readable device name
    pub fn name(&self) -> Option<&str> {
        self.device.name()
    }

    /// Joystick numbering for this device
    pub fn mapper(&self) -> &EventMapper {
        &self.mapper
    }

    /// Read the current axis and button state
    ///
    /// Lets the first published sample reflect actual hardware, including
    /// a mode switch that is already held at startup.
    ///
    /// # Errors
    ///
    /// Returns `Device` error if the state ioctls fail (e.g., controller unplugged).
    pub fn read_state(&self) -> Result<InputSnapshot> {
        let abs_state = self
            .device
            .get_abs_state()
            .map_err(|e| RouterError::Device(format!("Failed to read axis state: {}", e)))?;
        let key_state = self
            .device
            .get_key_state()
            .map_err(|e| RouterError::Device(format!("Failed to read key state: {}", e)))?;

        let raw_axes: Vec<(AbsoluteAxisType, i32)> = self
            .device
            .supported_absolute_axes()
            .map(|axes| {
                axes.iter()
                    .filter_map(|axis| {
                        abs_state
                            .get(usize::from(axis.0))
                            .map(|info| (axis, info.value))
                    })
                    .collect()
            })
            .unwrap_or_default();
        let pressed: Vec<Key> = key_state.iter().collect();

        Ok(self.mapper.initial_snapshot(&raw_axes, &pressed))
    }

    /// Turn the device into an async event stream
    ///
    /// # Errors
    ///
    /// Returns `Device` error if the device cannot be switched to non-blocking mode.
    pub fn into_event_stream(self) -> Result<(EventStream, EventMapper)> {
        let stream = self
            .device
            .into_event_stream()
            .map_err(|e| RouterError::Device(format!("Failed to create event stream: {}", e)))?;
        Ok((stream, self.mapper))
    }
}

fn is_joystick(device: &Device) -> bool {
    let has_stick = device
        .supported_absolute_axes()
        .map(|axes| axes.contains(AbsoluteAxisType::ABS_X))
        .unwrap_or(false);
    let has_buttons = device
        .supported_keys()
        .map(|keys| keys.iter().any(|key| key.code() >= BTN_MISC))
        .unwrap_or(false);
    has_stick && has_buttons
}

fn build_mapper(device: &Device) -> EventMapper {
    let abs_state = device.get_abs_state().ok();

    let axes: Vec<(AbsoluteAxisType, AxisRange)> = device
        .supported_absolute_axes()
        .map(|axes| {
            axes.iter()
                .map(|axis| {
                    let range = abs_state
                        .as_ref()
                        .and_then(|state| state.get(usize::from(axis.0)))
                        .map(|info| AxisRange::new(info.minimum, info.maximum))
                        .unwrap_or_else(|| AxisRange::new(-32767, 32767));
                    (axis, range)
                })
                .collect()
        })
        .unwrap_or_default();

    let keys: Vec<Key> = device
        .supported_keys()
        .map(|keys| keys.iter().collect())
        .unwrap_or_default();

    EventMapper::from_layout(&axes, &keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_nonexistent_path() {
        let result = JoystickDevice::open(Some("/dev/input/nonexistent_event_12345"));
        match result {
            Err(RouterError::Device(msg)) => {
                assert!(msg.contains("nonexistent_event_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Device error, got: {:?}", other),
        }
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_detect_with_real_hardware() {
        // This test requires a connected joystick
        let joystick = JoystickDevice::open(None).expect("Joystick not found");
        assert!(joystick.device_path().starts_with("/dev/input/event"));
        assert!(joystick.mapper().axis_count() > 0);

        let state = joystick.read_state().unwrap();
        assert!(!state.is_empty());
    }
}
