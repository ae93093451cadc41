//! # Joystick Event Encoder
//!
//! Encodes joystick events into UTF-8 JSON datagrams.

use super::protocol::{JoystickEvent, WireRecord};
use crate::error::Result;

/// Encode one event as a complete datagram payload
///
/// # Arguments
///
/// * `event` - Event to encode
///
/// # Returns
///
/// * `Result<Vec<u8>>` - UTF-8 JSON bytes with fields in `type, time, number, value` order
///
/// # Examples
///
/// ```
/// use fpv_vision_router::event::encoder::encode_event;
/// use fpv_vision_router::event::protocol::JoystickEvent;
///
/// let bytes = encode_event(&JoystickEvent::axis(1001, 1, -32767))?;
/// assert_eq!(bytes, br#"{"type":2,"time":1001,"number":1,"value":-32767}"#);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn encode_event(event: &JoystickEvent) -> Result<Vec<u8>> {
    let record = WireRecord::from(event);
    Ok(serde_json::to_vec(&record)?)
}
