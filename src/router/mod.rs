//! # Control Router
//!
//! Per-tick arbitration between the physical controller and vision guidance.
//!
//! Each tick the router:
//! 1. Derives the mode from the mode button's latest sample
//! 2. Passes auxiliary axes and buttons through from the physical source
//! 3. Picks the primary axes from the source the mode selects
//! 4. Holds the primaries at their pre-transition values for a few ticks
//!    after a mode change
//! 5. Forces the primaries neutral when their source cannot be trusted
//!
//! [`ControlRouter::tick`] is pure with respect to I/O: it takes two samples
//! and returns a frame. Timing and sending live in [`runner`].

pub mod frame;
pub mod routing;
pub mod mode;
pub mod guard;
pub mod liveness;
pub mod scheduler;
pub mod runner;

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::event::protocol::timestamp_millis;
use crate::input::cell::SourceSample;
use frame::OutputFrame;
use guard::TransitionGuard;
use liveness::{LivenessMonitor, RouterStatus};
use mode::{Mode, ModeTracker, Transition};
use routing::{AxisClass, RoutingTable};

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Frame to send
    pub frame: OutputFrame,
    /// Mode this tick, `None` while no mode-button sample exists
    pub mode: Option<Mode>,
    /// Health after this tick
    pub status: RouterStatus,
    /// Mode change detected this tick
    pub transition: Option<Transition>,
    /// True if the primaries were held by the transition guard
    pub guarded: bool,
}

/// Stateful per-tick composer
///
/// Owns the mode memory, the transition guard, and the previous tick's
/// primary outputs. Nothing else survives between ticks.
#[derive(Debug, Clone)]
pub struct ControlRouter {
    table: RoutingTable,
    liveness: LivenessMonitor,
    guard_ticks: u32,
    neutral: i32,
    tracker: ModeTracker,
    guard: TransitionGuard,
    last_primary: BTreeMap<u8, i32>,
    last_time: Option<u64>,
}

impl ControlRouter {
    /// Creates a router from the `[router]`, `[routing]` and `[liveness]` sections.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            RoutingTable::from_config(&config.routing),
            LivenessMonitor::from_config(&config.liveness),
            config.router.guard_ticks,
            config.router.neutral_value,
        )
    }

    #[must_use]
    pub fn with_parts(table: RoutingTable, liveness: LivenessMonitor, guard_ticks: u32, neutral: i32) -> Self {
        Self {
            table,
            liveness,
            guard_ticks,
            neutral,
            tracker: ModeTracker::new(),
            guard: TransitionGuard::new(),
            last_primary: BTreeMap::new(),
            last_time: None,
        }
    }

    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Mode seen on the most recent tick that had a mode-button sample.
    pub fn mode(&self) -> Option<Mode> {
        self.tracker.previous()
    }

    /// Compose one frame
    ///
    /// # Arguments
    ///
    /// * `physical` - Consistent sample of the physical source
    /// * `vision` - Consistent sample of the vision source
    /// * `since_start` - Time since the loop started; becomes the frame timestamp
    ///
    /// Always returns a frame, even for degraded or fatal conditions. Those
    /// are reported through [`TickOutcome::status`].
    pub fn tick(&mut self, physical: &SourceSample, vision: &SourceSample, since_start: Duration) -> TickOutcome {
        let time = self.next_timestamp(since_start);

        let mode = physical.snapshot.button(self.table.mode_button()).map(Mode::from_button);
        let transition = mode.and_then(|mode| self.tracker.observe(mode));

        if let Some(change) = transition {
            info!(
                "Mode {} -> {}, holding primaries for {} ticks",
                change.from, change.to, self.guard_ticks
            );
            self.guard.arm(self.guard_ticks, self.last_primary.clone());
        }

        // The window runs on ticks, whether or not a later override applies
        let held = self.guard.take().cloned();
        let guarded = held.is_some();

        let status = if self.liveness.physical_is_lost(physical, since_start) {
            RouterStatus::PhysicalLost { age: physical.age }
        } else {
            match mode {
                None => RouterStatus::AwaitingPhysical,
                Some(Mode::Vision) if self.liveness.vision_is_stale(vision) => {
                    RouterStatus::VisionStale { age: vision.age }
                }
                Some(_) => RouterStatus::Nominal,
            }
        };

        let mut frame = OutputFrame::new(time);
        let mut primary = BTreeMap::new();

        for &(index, class) in self.table.axes() {
            let value = match class {
                AxisClass::Auxiliary => physical.snapshot.axis(index).unwrap_or(self.neutral),
                AxisClass::Primary => {
                    let value = self.primary_value(index, mode, status, held.as_ref(), physical, vision);
                    primary.insert(index, value);
                    value
                }
            };
            frame.push_axis(index, value);
        }

        for &index in self.table.buttons() {
            frame.push_button(index, physical.snapshot.button(index).unwrap_or(false));
        }

        debug!(
            "Tick t={} mode={:?} status={} guarded={} hold_left={}",
            time,
            mode,
            status,
            guarded,
            self.guard.remaining_ticks()
        );

        self.last_primary = primary;

        TickOutcome {
            frame,
            mode,
            status,
            transition,
            guarded,
        }
    }

    fn primary_value(
        &self,
        index: u8,
        mode: Option<Mode>,
        status: RouterStatus,
        held: Option<&BTreeMap<u8, i32>>,
        physical: &SourceSample,
        vision: &SourceSample,
    ) -> i32 {
        if status != RouterStatus::Nominal {
            return self.neutral;
        }
        if let Some(frozen) = held {
            return frozen.get(&index).copied().unwrap_or(self.neutral);
        }
        let source = match mode {
            Some(Mode::Physical) => physical,
            Some(Mode::Vision) => vision,
            None => return self.neutral,
        };
        source.snapshot.axis(index).unwrap_or(self.neutral)
    }

    /// Milliseconds since start, bumped so frames never share a timestamp.
    fn next_timestamp(&mut self, since_start: Duration) -> u64 {
        let millis = timestamp_millis(since_start);
        let time = match self.last_time {
            Some(previous) => millis.max(previous.saturating_add(1)),
            None => millis,
        };
        self.last_time = Some(time);
        time
    }
}
