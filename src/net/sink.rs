//! # Output Sink
//!
//! Sends composed output frames to the downstream consumer over UDP.
//!
//! This module handles:
//! - Opening a UDP socket connected to the configured host:port
//! - Encoding each frame event as one datagram
//! - Bounding each frame send with one short timeout so the tick loop never stalls

use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info};

use super::transport::{DatagramSink, UdpDatagramSink};
use crate::error::{Result, RouterError};
use crate::event::encoder::encode_event;
use crate::event::protocol::JoystickEvent;
use crate::router::frame::OutputFrame;

/// Output Sink
///
/// Owns the output transport for the lifetime of the router loop.
pub struct OutputSink<S: DatagramSink = UdpDatagramSink> {
    transport: S,
    destination: String,
    send_timeout: Duration,
    frames_sent: u64,
}

impl<S: DatagramSink> std::fmt::Debug for OutputSink<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputSink")
            .field("destination", &self.destination)
            .field("send_timeout", &self.send_timeout)
            .field("frames_sent", &self.frames_sent)
            .finish_non_exhaustive()
    }
}

impl OutputSink<UdpDatagramSink> {
    /// Open a UDP sink connected to `host:port`
    ///
    /// # Errors
    ///
    /// Returns `OutputSink` error if the local socket cannot be bound or the
    /// destination cannot be resolved. This is fatal at startup.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use fpv_vision_router::net::sink::OutputSink;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let sink = OutputSink::connect("192.168.1.100", 5005, Duration::from_millis(20)).await?;
    ///     println!("Sending to {}", sink.destination());
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(host: &str, port: u16, send_timeout: Duration) -> Result<Self> {
        let destination = format!("{}:{}", host, port);

        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(|e| RouterError::OutputSink(format!("Failed to bind local socket: {}", e)))?;

        socket
            .connect(&destination)
            .await
            .map_err(|e| RouterError::OutputSink(format!("Failed to connect to {}: {}", destination, e)))?;

        info!("Output sink ready, sending to {}", destination);
        Ok(Self::with_transport(UdpDatagramSink::new(socket), destination, send_timeout))
    }
}

impl<S: DatagramSink> OutputSink<S> {
    /// Wrap an existing transport
    pub fn with_transport(transport: S, destination: impl Into<String>, send_timeout: Duration) -> Self {
        Self {
            transport,
            destination: destination.into(),
            send_timeout,
            frames_sent: 0,
        }
    }

    /// Send one event as one datagram
    ///
    /// # Errors
    ///
    /// Returns `SendTimeout` if the transport does not accept the datagram in
    /// time, or `Io` if it fails.
    pub async fn send_event(&mut self, event: &JoystickEvent) -> Result<()> {
        let deadline = Instant::now() + self.send_timeout;
        self.send_before(event, deadline).await
    }

    /// Send a batch of events under one timeout
    ///
    /// The send timeout bounds the batch as a whole, not each datagram, so a
    /// slow transport can hold the caller for at most one timeout. Stops at
    /// the first failing event; the rest of the batch is dropped.
    ///
    /// # Returns
    ///
    /// * `Result<usize>` - Number of datagrams sent
    pub async fn send_batch(&mut self, events: impl IntoIterator<Item = JoystickEvent>) -> Result<usize> {
        let deadline = Instant::now() + self.send_timeout;
        let mut sent = 0;
        for event in events {
            self.send_before(&event, deadline).await?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Send a whole frame, bounded like [`send_batch`](Self::send_batch)
    pub async fn send(&mut self, frame: &OutputFrame) -> Result<usize> {
        let sent = self.send_batch(frame.to_events()).await?;

        self.frames_sent += 1;
        debug!("Sent frame t={} ({} events) to {}", frame.time, sent, self.destination);
        Ok(sent)
    }

    async fn send_before(&mut self, event: &JoystickEvent, deadline: Instant) -> Result<()> {
        let datagram = encode_event(event)?;
        let limit = self.send_timeout;

        tokio::time::timeout_at(deadline, self.transport.send_datagram(&datagram))
            .await
            .map_err(|_| RouterError::SendTimeout(limit))??;

        Ok(())
    }

    /// Destination as `host:port`
    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Frames sent completely
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Release the transport
    pub fn close(self) -> S {
        info!("Closing output sink to {} after {} frames", self.destination, self.frames_sent);
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::decoder::decode_event;
    use crate::net::transport::mocks::RecordingSink;
    use crate::net::transport::MockDatagramSink;
    use std::io;
    use tokio_test::{assert_err, assert_ok};

    fn sample_frame() -> OutputFrame {
        let mut frame = OutputFrame::new(40);
        frame.push_axis(0, 100);
        frame.push_axis(4, -32767);
        frame.push_button(0, true);
        frame
    }

    #[tokio::test]
    async fn test_send_frame_one_datagram_per_event() {
        let transport = RecordingSink::new();
        let mut sink = OutputSink::with_transport(transport.clone(), "test", Duration::from_millis(20));

        let sent = assert_ok!(sink.send(&sample_frame()).await);
        assert_eq!(sent, 3);
        assert_eq!(sink.frames_sent(), 1);

        let datagrams = transport.get_sent();
        assert_eq!(datagrams.len(), 3);

        let decoded: Vec<_> = datagrams.iter().map(|d| decode_event(d).unwrap()).collect();
        assert_eq!(decoded[0], JoystickEvent::axis(40, 0, 100));
        assert_eq!(decoded[1], JoystickEvent::axis(40, 4, -32767));
        assert_eq!(decoded[2], JoystickEvent::button(40, 0, true));
    }

    #[tokio::test]
    async fn test_send_failure_is_reported() {
        let transport = RecordingSink::new();
        transport.set_send_error(Some(io::ErrorKind::ConnectionRefused));
        let mut sink = OutputSink::with_transport(transport.clone(), "test", Duration::from_millis(20));

        let result = sink.send(&sample_frame()).await;
        assert!(matches!(result, Err(RouterError::Io(_))));
        assert_eq!(sink.frames_sent(), 0);

        // Sink stays usable after a failure
        transport.set_send_error(None);
        assert_ok!(sink.send(&sample_frame()).await);
        assert_eq!(sink.frames_sent(), 1);
    }

    #[tokio::test]
    async fn test_send_stops_at_first_failure() {
        let mut transport = MockDatagramSink::new();
        transport
            .expect_send_datagram()
            .times(1)
            .returning(|_| Err(io::Error::new(io::ErrorKind::Other, "boom")));

        let mut sink = OutputSink::with_transport(transport, "mock", Duration::from_millis(20));
        assert_err!(sink.send(&sample_frame()).await);
    }

    #[tokio::test]
    async fn test_send_event_payload() {
        let mut transport = MockDatagramSink::new();
        transport
            .expect_send_datagram()
            .withf(|data: &[u8]| data == br#"{"type":1,"time":5,"number":2,"value":0}"#)
            .times(1)
            .returning(|data| Ok(data.len()));

        let mut sink = OutputSink::with_transport(transport, "mock", Duration::from_millis(20));
        assert_ok!(sink.send_event(&JoystickEvent::button(5, 2, false)).await);
    }

    struct StalledSink;

    #[async_trait::async_trait]
    impl DatagramSink for StalledSink {
        async fn send_datagram(&mut self, _data: &[u8]) -> io::Result<usize> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_times_out() {
        let mut sink = OutputSink::with_transport(StalledSink, "stalled", Duration::from_millis(20));
        let result = sink.send(&sample_frame()).await;
        assert!(matches!(result, Err(RouterError::SendTimeout(d)) if d == Duration::from_millis(20)));
    }

    /// Accepts every datagram, but only after `delay`
    struct SlowSink {
        delay: Duration,
        accepted: usize,
    }

    #[async_trait::async_trait]
    impl DatagramSink for SlowSink {
        async fn send_datagram(&mut self, data: &[u8]) -> io::Result<usize> {
            tokio::time::sleep(self.delay).await;
            self.accepted += 1;
            Ok(data.len())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bounds_whole_frame() {
        let mut frame = OutputFrame::new(0);
        for index in 0..8 {
            frame.push_axis(index, 0);
        }
        for index in 0..14 {
            frame.push_button(index, false);
        }

        // Each datagram alone fits the timeout; the frame does not
        let transport = SlowSink {
            delay: Duration::from_millis(19),
            accepted: 0,
        };
        let mut sink = OutputSink::with_transport(transport, "slow", Duration::from_millis(20));

        let started = tokio::time::Instant::now();
        let result = sink.send(&frame).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(RouterError::SendTimeout(_))));
        assert!(elapsed <= Duration::from_millis(20), "frame send took {:?}", elapsed);
        assert_eq!(sink.frames_sent(), 0);
        assert_eq!(sink.close().accepted, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_frame_within_timeout() {
        let transport = SlowSink {
            delay: Duration::from_millis(5),
            accepted: 0,
        };
        let mut sink = OutputSink::with_transport(transport, "slow", Duration::from_millis(20));

        assert_eq!(sink.send(&sample_frame()).await.unwrap(), 3);
        assert_eq!(sink.close().accepted, 3);
    }

    #[tokio::test]
    async fn test_connect_and_send_over_udp() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let mut sink = OutputSink::connect("127.0.0.1", port, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(sink.destination(), format!("127.0.0.1:{}", port));
        sink.send_event(&JoystickEvent::axis(1, 0, 55)).await.unwrap();

        let mut buf = [0u8; 1024];
        let len = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(decode_event(&buf[..len]).unwrap(), JoystickEvent::axis(1, 0, 55));
    }
}
