//! # Router Loop
//!
//! The dedicated control-loop task: sample both adapters, tick the router,
//! send the frame, wait for the next deadline.
//!
//! The loop never waits on adapter I/O. Send failures drop the frame and are
//! logged. Health is published on a `watch` channel; the owning process
//! decides what a fatal status means and cancels the loop.

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::liveness::RouterStatus;
use super::scheduler::TickScheduler;
use super::ControlRouter;
use crate::config::Config;
use crate::input::cell::SourceReader;
use crate::net::sink::OutputSink;
use crate::net::transport::{DatagramSink, UdpDatagramSink};

/// Number of ticks between status log messages
const LOG_INTERVAL_TICKS: u64 = 500;

/// Totals reported when the loop exits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    /// Ticks run
    pub ticks: u64,
    /// Frames sent in full
    pub frames_sent: u64,
    /// Frames dropped by a failed send
    pub send_failures: u64,
    /// Deadlines skipped by the scheduler
    pub missed_ticks: u64,
    /// Status after the last tick
    pub final_status: RouterStatus,
}

/// Control loop bound to its inputs and output
pub struct RouterLoop<S: DatagramSink = UdpDatagramSink> {
    router: ControlRouter,
    sink: OutputSink<S>,
    physical: SourceReader,
    vision: SourceReader,
    scheduler: TickScheduler,
    status_tx: watch::Sender<RouterStatus>,
}

impl<S: DatagramSink> RouterLoop<S> {
    /// Builds the loop and its status channel.
    ///
    /// The schedule starts now, so build the loop right before running it.
    pub fn new(
        config: &Config,
        sink: OutputSink<S>,
        physical: SourceReader,
        vision: SourceReader,
    ) -> (Self, watch::Receiver<RouterStatus>) {
        let (status_tx, status_rx) = watch::channel(RouterStatus::default());
        let looped = Self {
            router: ControlRouter::new(config),
            sink,
            physical,
            vision,
            scheduler: TickScheduler::new(config.router.tick_period()),
            status_tx,
        };
        (looped, status_rx)
    }

    /// Run until `cancel` fires
    ///
    /// Cancellation is checked at every tick boundary. Once it fires no
    /// further frame is sent and the output transport is released.
    pub async fn run(mut self, cancel: CancellationToken) -> LoopSummary {
        let rate_hz = 1.0 / self.scheduler.period().as_secs_f64();
        info!(
            "Router loop started at {:.0}Hz, sending to {}",
            rate_hz,
            self.sink.destination()
        );

        let mut summary = LoopSummary {
            ticks: 0,
            frames_sent: 0,
            send_failures: 0,
            missed_ticks: 0,
            final_status: RouterStatus::default(),
        };
        let mut last_status: Option<RouterStatus> = None;

        loop {
            let tick = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                tick = self.scheduler.next_tick() => tick,
            };
            if cancel.is_cancelled() {
                break;
            }

            let now = Instant::now();
            let physical = self.physical.sample_at(now);
            let vision = self.vision.sample_at(now);
            let outcome = self.router.tick(&physical, &vision, tick.since_start);
            summary.ticks += 1;

            if last_status.map_or(true, |previous| !same_condition(previous, outcome.status)) {
                report_status(outcome.status);
            }
            last_status = Some(outcome.status);
            summary.final_status = outcome.status;
            self.status_tx.send_replace(outcome.status);

            match self.sink.send(&outcome.frame).await {
                Ok(_) => summary.frames_sent += 1,
                Err(e) => {
                    summary.send_failures += 1;
                    if summary.send_failures == 1 || summary.send_failures % LOG_INTERVAL_TICKS == 0 {
                        warn!("Dropped frame t={}: {} ({} dropped so far)", outcome.frame.time, e, summary.send_failures);
                    } else {
                        debug!("Dropped frame t={}: {}", outcome.frame.time, e);
                    }
                }
            }

            if summary.ticks % LOG_INTERVAL_TICKS == 0 {
                info!(
                    "Ran {} ticks: mode={}, status={}, {} frames sent, {} dropped, {} deadlines missed",
                    summary.ticks,
                    outcome.mode.map_or_else(|| "none".to_string(), |mode| mode.to_string()),
                    outcome.status,
                    summary.frames_sent,
                    summary.send_failures,
                    self.scheduler.missed()
                );
            }
        }

        summary.missed_ticks = self.scheduler.missed();
        info!(
            "Router loop stopped after {} ticks ({} frames sent, {} dropped, {} deadlines missed)",
            summary.ticks, summary.frames_sent, summary.send_failures, summary.missed_ticks
        );
        self.sink.close();
        summary
    }
}

/// Ages change every tick; only a change of condition is worth a log line.
fn same_condition(a: RouterStatus, b: RouterStatus) -> bool {
    std::mem::discriminant(&a) == std::mem::discriminant(&b)
}

fn report_status(status: RouterStatus) {
    if status.is_fatal() {
        error!("Router status: {}", status);
    } else if status.is_degraded() {
        warn!("Router status: {}, primary axes neutral", status);
    } else {
        info!("Router status: {}", status);
    }
}
