//! # Physical Input Adapter
//!
//! Keeps the latest axis and button state of the pilot's controller.
//!
//! Two backends:
//! - **evdev**: a joystick attached to this machine
//! - **udp**: joystick events forwarded from another machine (`send` subcommand)
//!
//! A motionless controller produces no events, so the evdev backend marks
//! itself fresh on a heartbeat for as long as the device stream stays open.
//! The UDP backend only becomes fresh when datagrams arrive.

use evdev::EventStream;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::cell::{source_cell, SourcePublisher};
use super::device::JoystickDevice;
use super::mapper::EventMapper;
use super::AdapterHandle;
use crate::config::{Config, PhysicalSource};
use crate::error::Result;
use crate::event::protocol::timestamp_millis;
use crate::net::receiver::{EventFilter, EventReceiver};

/// Start the backend selected in `[physical]`
///
/// # Errors
///
/// Returns an error if the device cannot be opened or the socket cannot be
/// bound. Both are fatal at startup.
pub async fn spawn(config: &Config, cancel: CancellationToken) -> Result<AdapterHandle> {
    match config.physical.source {
        PhysicalSource::Evdev => {
            let path = Some(config.physical.device_path.as_str()).filter(|p| !p.is_empty());
            let device = JoystickDevice::open(path)?;
            spawn_device(device, config.liveness.device_heartbeat(), cancel)
        }
        PhysicalSource::Udp => spawn_udp(&config.physical.bind_host, config.physical.bind_port, cancel).await,
    }
}

/// Start the evdev backend on an opened device
///
/// The current hardware state is published before this returns, so the very
/// first router tick already sees the real mode switch position.
///
/// # Errors
///
/// Returns `Device` error if the state cannot be read or the event stream
/// cannot be created.
pub fn spawn_device(device: JoystickDevice, heartbeat: Duration, cancel: CancellationToken) -> Result<AdapterHandle> {
    let (publisher, reader) = source_cell();

    info!(
        "Physical input: {} ({})",
        device.device_path(),
        device.name().unwrap_or("unnamed")
    );
    publisher.publish(device.read_state()?);

    let (stream, mapper) = device.into_event_stream()?;
    let task = tokio::spawn(run_device(stream, mapper, publisher, heartbeat, cancel));

    Ok(AdapterHandle::new(reader, task, None))
}

/// Start the UDP backend
///
/// # Errors
///
/// Returns `Io` error if the address cannot be bound.
pub async fn spawn_udp(host: &str, port: u16, cancel: CancellationToken) -> Result<AdapterHandle> {
    let (publisher, reader) = source_cell();
    let receiver = EventReceiver::bind(host, port, "physical").await?;
    let local_addr = receiver.local_addr()?;

    let task = tokio::spawn(async move {
        receiver.run(publisher, EventFilter::All, cancel).await;
    });

    Ok(AdapterHandle::new(reader, task, Some(local_addr)))
}

async fn run_device(
    mut stream: EventStream,
    mapper: EventMapper,
    publisher: SourcePublisher,
    heartbeat: Duration,
    cancel: CancellationToken,
) {
    let started = Instant::now();
    let mut heartbeat = tokio::time::interval(heartbeat);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = heartbeat.tick() => publisher.touch(),
            result = stream.next_event() => match result {
                Ok(raw) => {
                    let time = timestamp_millis(started.elapsed());
                    if let Some(event) = mapper.map_event(&raw, time) {
                        debug!(
                            "[physical] {} | Number: {:>2} | Value: {:>6}",
                            event.kind.label(),
                            event.number,
                            event.value
                        );
                        publisher.apply(&event);
                    }
                }
                Err(e) => {
                    // Freshness stops here; the router turns this into PhysicalLost
                    error!("Physical device read failed: {}", e);
                    break;
                }
            }
        }
    }

    info!("Physical device loop stopped");
}
