//! # Vision Input Adapter
//!
//! Receives axis commands from the vision-guidance process over UDP.
//!
//! Only axis events are accepted. Every accepted datagram refreshes one
//! global age for the whole source.

use tokio_util::sync::CancellationToken;

use super::cell::source_cell;
use super::AdapterHandle;
use crate::config::VisionConfig;
use crate::error::Result;
use crate::net::receiver::{EventFilter, EventReceiver};

/// Bind the vision socket and start receiving
///
/// # Errors
///
/// Returns `Io` error if the address cannot be bound.
pub async fn spawn(config: &VisionConfig, cancel: CancellationToken) -> Result<AdapterHandle> {
    let (publisher, reader) = source_cell();
    let receiver = EventReceiver::bind(&config.bind_host, config.bind_port, "vision").await?;
    let local_addr = receiver.local_addr()?;

    let task = tokio::spawn(async move {
        receiver.run(publisher, EventFilter::AxesOnly, cancel).await;
    });

    Ok(AdapterHandle::new(reader, task, Some(local_addr)))
}
