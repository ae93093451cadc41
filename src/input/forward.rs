//! # Device Forwarder
//!
//! Streams a local joystick to a remote router's UDP physical input.
//!
//! Each device event is sent as one datagram as soon as it is read. On top
//! of that the full last-known state is re-sent every keepalive period, so a
//! controller that is held still still keeps the remote side fresh.

use evdev::EventStream;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::device::JoystickDevice;
use super::mapper::EventMapper;
use super::snapshot::InputSnapshot;
use crate::error::Result;
use crate::event::protocol::{timestamp_millis, JoystickEvent};
use crate::net::sink::OutputSink;
use crate::net::transport::{DatagramSink, UdpDatagramSink};

/// Forwarding counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    /// Device events sent
    pub events: u64,
    /// Full-state keepalives sent
    pub keepalives: u64,
    /// Sends that failed or timed out
    pub failures: u64,
}

/// Forwards joystick events to one destination
pub struct DeviceForwarder<S: DatagramSink = UdpDatagramSink> {
    sink: OutputSink<S>,
    snapshot: InputSnapshot,
    started: Instant,
    stats: ForwardStats,
}

impl<S: DatagramSink> DeviceForwarder<S> {
    /// Creates a forwarder that starts from `initial` state.
    pub fn new(sink: OutputSink<S>, initial: InputSnapshot) -> Self {
        Self {
            sink,
            snapshot: initial,
            started: Instant::now(),
            stats: ForwardStats::default(),
        }
    }

    /// Last-known state that keepalives carry
    pub fn snapshot(&self) -> &InputSnapshot {
        &self.snapshot
    }

    /// Counters so far
    pub fn stats(&self) -> ForwardStats {
        self.stats
    }

    /// Record and send one event
    ///
    /// The event is kept in the snapshot even if the send fails, so the next
    /// keepalive still carries it.
    ///
    /// # Errors
    ///
    /// Returns the sink error for a failed send.
    pub async fn forward(&mut self, event: &JoystickEvent) -> Result<()> {
        self.snapshot.apply(event);
        match self.sink.send_event(event).await {
            Ok(()) => {
                self.stats.events += 1;
                Ok(())
            }
            Err(e) => {
                self.stats.failures += 1;
                Err(e)
            }
        }
    }

    /// Re-send the whole snapshot, stamped with the current time
    ///
    /// # Errors
    ///
    /// Returns the first sink error; the remaining events are skipped.
    pub async fn send_keepalive(&mut self) -> Result<usize> {
        let time = timestamp_millis(self.started.elapsed());
        match self.sink.send_batch(self.snapshot.to_events(time)).await {
            Ok(sent) => {
                self.stats.keepalives += 1;
                Ok(sent)
            }
            Err(e) => {
                self.stats.failures += 1;
                Err(e)
            }
        }
    }

    /// Forward until cancelled or the device goes away
    pub async fn run(
        mut self,
        mut stream: EventStream,
        mapper: EventMapper,
        keepalive: Duration,
        cancel: CancellationToken,
    ) -> ForwardStats {
        let mut keepalive = tokio::time::interval(keepalive);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = keepalive.tick() => {
                    if let Err(e) = self.send_keepalive().await {
                        warn!("Keepalive to {} failed: {}", self.sink.destination(), e);
                    }
                }
                result = stream.next_event() => match result {
                    Ok(raw) => {
                        let time = timestamp_millis(self.started.elapsed());
                        let Some(event) = mapper.map_event(&raw, time) else {
                            continue;
                        };
                        debug!(
                            "Time: {:>8} | {} | Number: {:>2} | Value: {:>6}",
                            event.time,
                            event.kind.label(),
                            event.number,
                            event.value
                        );
                        if let Err(e) = self.forward(&event).await {
                            warn!("Send to {} failed: {}", self.sink.destination(), e);
                        }
                    }
                    Err(e) => {
                        error!("Joystick read failed: {}", e);
                        break;
                    }
                }
            }
        }

        info!(
            "Forwarder stopped: {} events, {} keepalives, {} failures",
            self.stats.events, self.stats.keepalives, self.stats.failures
        );
        self.sink.close();
        self.stats
    }
}

/// Open a sink to `host:port` and forward `device` to it until cancelled
///
/// # Errors
///
/// Returns an error if the device state cannot be read or the sink cannot be
/// opened.
pub async fn forward_device(
    device: JoystickDevice,
    host: &str,
    port: u16,
    keepalive: Duration,
    send_timeout: Duration,
    cancel: CancellationToken,
) -> Result<ForwardStats> {
    let initial = device.read_state()?;
    let sink = OutputSink::connect(host, port, send_timeout).await?;
    info!(
        "Forwarding {} to {} (keepalive every {:?})",
        device.device_path(),
        sink.destination(),
        keepalive
    );

    let (stream, mapper) = device.into_event_stream()?;
    let forwarder = DeviceForwarder::new(sink, initial);
    Ok(forwarder.run(stream, mapper, keepalive, cancel).await)
}
