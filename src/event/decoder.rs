//! # Joystick Event Decoder
//!
//! Decodes inbound datagrams into [`JoystickEvent`]s.

use super::protocol::{EventKind, JoystickEvent, WireRecord, MAX_DATAGRAM_SIZE};
use crate::error::{Result, RouterError};

/// Decode one datagram
///
/// # Arguments
///
/// * `datagram` - Raw datagram payload
///
/// # Returns
///
/// * `Result<JoystickEvent>` - Decoded event, or error if malformed
///
/// # Errors
///
/// Returns error if:
/// - Payload is empty or larger than `MAX_DATAGRAM_SIZE`
/// - Payload is not valid UTF-8
/// - Payload is not a JSON object with integer `type`, `time`, `number`, `value`
/// - `type` is neither button nor axis (init flag allowed)
///
/// # Examples
///
/// ```
/// use fpv_vision_router::event::decoder::decode_event;
/// use fpv_vision_router::event::protocol::EventKind;
///
/// let event = decode_event(br#"{"type": 2, "time": 3656941, "number": 1, "value": -171}"#)?;
/// assert_eq!(event.kind, EventKind::Axis);
/// assert_eq!(event.value, -171);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn decode_event(datagram: &[u8]) -> Result<JoystickEvent> {
    if datagram.is_empty() {
        return Err(RouterError::Codec("Empty datagram".to_string()));
    }

    if datagram.len() > MAX_DATAGRAM_SIZE {
        return Err(RouterError::Codec(format!(
            "Datagram too large: {} bytes (max {})",
            datagram.len(),
            MAX_DATAGRAM_SIZE
        )));
    }

    let text = std::str::from_utf8(datagram)
        .map_err(|e| RouterError::Codec(format!("Invalid UTF-8: {}", e)))?;

    let record: WireRecord = serde_json::from_str(text.trim())?;

    let (kind, init) = EventKind::from_code(record.kind)
        .ok_or_else(|| RouterError::Codec(format!("Unknown event type: {}", record.kind)))?;

    Ok(JoystickEvent {
        kind,
        time: record.time,
        number: record.number,
        value: record.value,
        init,
    })
}
