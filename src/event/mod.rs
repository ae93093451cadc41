//! # Joystick Event Module
//!
//! Wire representation of joystick events exchanged over UDP.
//!
//! This module handles:
//! - The `{type, time, number, value}` event record
//! - Encoding one event per datagram as UTF-8 JSON
//! - Decoding and validating inbound datagrams

pub mod protocol;
pub mod encoder;
pub mod decoder;
