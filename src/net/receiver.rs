//! # Event Receiver
//!
//! Binds a UDP socket and decodes one joystick event per datagram.
//!
//! Malformed datagrams are dropped and logged, never fatal. The receive loop
//! is the only place that waits on the network; it publishes into a
//! last-value cell that the router reads without blocking.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, RouterError};
use crate::event::decoder::decode_event;
use crate::event::protocol::{EventKind, JoystickEvent, MAX_DATAGRAM_SIZE};
use crate::input::cell::SourcePublisher;

/// Pause after a socket error before receiving again
pub const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Repeated socket errors are logged at `warn` once per this many
const ERROR_LOG_INTERVAL: u64 = 100;

/// Which events a receive loop accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFilter {
    /// Axes and buttons
    All,
    /// Axes only; buttons are dropped
    AxesOnly,
}

impl EventFilter {
    /// True if the event passes the filter.
    pub fn accepts(self, event: &JoystickEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::AxesOnly => event.kind == EventKind::Axis,
        }
    }
}

/// Counters for one receive loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Datagrams decoded and published
    pub accepted: u64,
    /// Datagrams that failed to decode
    pub malformed: u64,
    /// Valid events rejected by the filter
    pub filtered: u64,
    /// Failed socket reads
    pub socket_errors: u64,
}

/// UDP joystick event receiver
#[derive(Debug)]
pub struct EventReceiver {
    socket: UdpSocket,
    label: &'static str,
    stats: ReceiverStats,
}

impl EventReceiver {
    /// Bind to `host:port`
    ///
    /// # Errors
    ///
    /// Returns `Io` error if the address is invalid or already in use.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fpv_vision_router::net::receiver::EventReceiver;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let mut receiver = EventReceiver::bind("0.0.0.0", 5006, "vision").await?;
    ///     if let Some((event, from)) = receiver.recv_event().await? {
    ///         println!("{} from {}", event.value, from);
    ///     }
    ///     Ok(())
    /// }
    /// ```
    pub async fn bind(host: &str, port: u16, label: &'static str) -> Result<Self> {
        let socket = UdpSocket::bind((host, port)).await?;
        info!("{} receiver listening on {}", label, socket.local_addr()?);
        Ok(Self {
            socket,
            label,
            stats: ReceiverStats::default(),
        })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Counters so far
    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    /// Receive one datagram
    ///
    /// # Returns
    ///
    /// * `Ok(Some(..))` - Decoded event and sender address
    /// * `Ok(None)` - Datagram was malformed and dropped
    ///
    /// # Errors
    ///
    /// Returns `Io` error if the socket itself fails.
    pub async fn recv_event(&mut self) -> Result<Option<(JoystickEvent, SocketAddr)>> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = self.socket.recv_from(&mut buf).await?;

        match decode_event(&buf[..len]) {
            Ok(event) => Ok(Some((event, from))),
            Err(e) => {
                self.stats.malformed += 1;
                warn!(
                    "{} receiver dropped malformed datagram from {}: {} ({:?})",
                    self.label,
                    from,
                    e,
                    String::from_utf8_lossy(&buf[..len.min(64)])
                );
                Ok(None)
            }
        }
    }

    /// Receive until cancelled, publishing accepted events
    ///
    /// Socket errors are counted and the loop continues after
    /// [`RECV_ERROR_BACKOFF`].
    pub async fn run(mut self, publisher: SourcePublisher, filter: EventFilter, cancel: CancellationToken) -> ReceiverStats {
        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.recv_event() => received,
            };

            match received {
                Ok(Some((event, from))) => {
                    if filter.accepts(&event) {
                        self.stats.accepted += 1;
                        debug!(
                            "[{}] {} {} | Number: {:>2} | Value: {:>6}",
                            self.label,
                            from,
                            event.kind.label(),
                            event.number,
                            event.value
                        );
                        publisher.apply(&event);
                    } else {
                        self.stats.filtered += 1;
                        debug!(
                            "{} receiver ignoring {} event {} from {}",
                            self.label,
                            event.kind.label().trim_end(),
                            event.number,
                            from
                        );
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = self.back_off(e) => {}
                    }
                }
            }
        }

        info!(
            "{} receiver stopped ({} accepted, {} malformed, {} filtered, {} socket errors)",
            self.label, self.stats.accepted, self.stats.malformed, self.stats.filtered, self.stats.socket_errors
        );
        self.stats
    }

    async fn back_off(&mut self, error: RouterError) {
        self.stats.socket_errors += 1;
        let count = self.stats.socket_errors;

        if count == 1 || count % ERROR_LOG_INTERVAL == 0 {
            warn!("{} receiver socket error (#{}): {}", self.label, count, error);
        } else {
            debug!("{} receiver socket error (#{}): {}", self.label, count, error);
        }

        tokio::time::sleep(RECV_ERROR_BACKOFF).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::encoder::encode_event;
    use crate::input::cell::source_cell;

    async fn sender_to(receiver: &EventReceiver) -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();
        (socket, SocketAddr::from(([127, 0, 0, 1], port)))
    }

    #[test]
    fn test_filter() {
        let axis = JoystickEvent::axis(0, 0, 1);
        let button = JoystickEvent::button(0, 0, true);
        assert!(EventFilter::All.accepts(&axis));
        assert!(EventFilter::All.accepts(&button));
        assert!(EventFilter::AxesOnly.accepts(&axis));
        assert!(!EventFilter::AxesOnly.accepts(&button));
    }

    #[tokio::test]
    async fn test_recv_event_decodes() {
        let mut receiver = EventReceiver::bind("127.0.0.1", 0, "test").await.unwrap();
        let (socket, addr) = sender_to(&receiver).await;

        let event = JoystickEvent::axis(9, 2, 4000);
        socket.send_to(&encode_event(&event).unwrap(), addr).await.unwrap();

        let (received, from) = receiver.recv_event().await.unwrap().unwrap();
        assert_eq!(received, event);
        assert_eq!(from, socket.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_recv_event_drops_malformed() {
        let mut receiver = EventReceiver::bind("127.0.0.1", 0, "test").await.unwrap();
        let (socket, addr) = sender_to(&receiver).await;

        socket.send_to(b"garbage", addr).await.unwrap();
        assert!(receiver.recv_event().await.unwrap().is_none());
        assert_eq!(receiver.stats().malformed, 1);
    }

    #[tokio::test]
    async fn test_run_publishes_and_stops_on_cancel() {
        let receiver = EventReceiver::bind("127.0.0.1", 0, "vision").await.unwrap();
        let (socket, addr) = sender_to(&receiver).await;
        let (publisher, reader) = source_cell();
        let cancel = CancellationToken::new();

        let task = tokio::spawn(receiver.run(publisher, EventFilter::AxesOnly, cancel.clone()));

        socket.send_to(b"{not json", addr).await.unwrap();
        socket
            .send_to(&encode_event(&JoystickEvent::button(1, 3, true)).unwrap(), addr)
            .await
            .unwrap();
        socket
            .send_to(&encode_event(&JoystickEvent::axis(2, 0, -500)).unwrap(), addr)
            .await
            .unwrap();

        // Wait for the axis to land
        for _ in 0..100 {
            if reader.latest_axes().get(&0) == Some(&-500) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        let stats = task.await.unwrap();

        assert_eq!(reader.latest_axes().get(&0), Some(&-500));
        assert!(reader.latest_buttons().is_empty());
        assert!(reader.age().is_some());
        assert_eq!(
            stats,
            ReceiverStats {
                accepted: 1,
                malformed: 1,
                filtered: 1,
                socket_errors: 0,
            }
        );
    }

    fn socket_error() -> RouterError {
        RouterError::Io(std::io::Error::new(std::io::ErrorKind::Other, "network is down"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_socket_error_backs_off() {
        let mut receiver = EventReceiver::bind("127.0.0.1", 0, "test").await.unwrap();

        let started = tokio::time::Instant::now();
        for _ in 0..3 {
            receiver.back_off(socket_error()).await;
        }

        assert_eq!(started.elapsed(), RECV_ERROR_BACKOFF * 3);
        assert_eq!(receiver.stats().socket_errors, 3);
    }
}
