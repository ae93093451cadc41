//! Trait abstraction for datagram output to enable testing

use async_trait::async_trait;
use std::io;
use tokio::net::UdpSocket;

/// Trait for sending one datagram to a fixed destination
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatagramSink: Send {
    /// Send one datagram, returning the number of bytes written
    async fn send_datagram(&mut self, data: &[u8]) -> io::Result<usize>;
}

/// Connected UDP socket that implements DatagramSink
#[derive(Debug)]
pub struct UdpDatagramSink {
    socket: UdpSocket,
}

impl UdpDatagramSink {
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }

    /// Local address the socket is bound to
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl DatagramSink for UdpDatagramSink {
    async fn send_datagram(&mut self, data: &[u8]) -> io::Result<usize> {
        self.socket.send(data).await
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Recording sink for testing
    #[derive(Clone)]
    pub struct RecordingSink {
        pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
        pub send_error: Arc<Mutex<Option<io::ErrorKind>>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                send_error: Arc::new(Mutex::new(None)),
            }
        }

        pub fn get_sent(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }

        pub fn set_send_error(&self, error: Option<io::ErrorKind>) {
            *self.send_error.lock().unwrap() = error;
        }
    }

    #[async_trait]
    impl DatagramSink for RecordingSink {
        async fn send_datagram(&mut self, data: &[u8]) -> io::Result<usize> {
            if let Some(error) = *self.send_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock send error"));
            }
            self.sent.lock().unwrap().push(data.to_vec());
            Ok(data.len())
        }
    }
}
