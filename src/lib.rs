//! # FPV Vision Router Library
//!
//! Arbitrate drone control between a pilot's joystick and a vision-guidance
//! stream, and forward one unified joystick event stream over UDP.
//!
//! This library provides the adapters that keep the latest state of each
//! source, the fixed-rate router that decides which source drives each
//! output axis, and the UDP plumbing on both sides.

pub mod config;
pub mod error;
pub mod event;
pub mod input;
pub mod net;
pub mod router;
