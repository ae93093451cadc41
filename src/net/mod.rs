//! # Network Module
//!
//! UDP plumbing shared by the adapters and the output sink.
//!
//! This module handles:
//! - The `DatagramSink` seam used to mock outbound sends
//! - The output sink that carries composed frames downstream
//! - The receive loop that feeds inbound events into last-value cells

pub mod transport;
pub mod sink;
pub mod receiver;
