//! # Input Module
//!
//! Adapters that keep the latest known state of each control source.
//!
//! Each adapter runs its own receive loop and publishes into a last-value
//! cell. The router only ever reads those cells.

pub mod snapshot;
pub mod cell;
pub mod mapper;
pub mod device;
pub mod physical;
pub mod vision;
pub mod forward;

use std::net::SocketAddr;
use tokio::task::JoinHandle;

use cell::SourceReader;

/// A running adapter: its read side plus the background receive task
#[derive(Debug)]
pub struct AdapterHandle {
    reader: SourceReader,
    task: JoinHandle<()>,
    local_addr: Option<SocketAddr>,
}

impl AdapterHandle {
    pub(crate) fn new(reader: SourceReader, task: JoinHandle<()>, local_addr: Option<SocketAddr>) -> Self {
        Self {
            reader,
            task,
            local_addr,
        }
    }

    /// Non-blocking read side for the router
    pub fn reader(&self) -> SourceReader {
        self.reader.clone()
    }

    /// Bound UDP address, for UDP-backed adapters
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// True once the receive loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the receive loop to exit
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!("Adapter task ended abnormally: {}", e);
        }
    }
}
