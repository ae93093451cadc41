//! # Tick Scheduler
//!
//! Fixed-rate ticks on absolute deadlines.
//!
//! Tick `n` is due at `start + n * period`. Waiting for an absolute deadline
//! instead of sleeping a fixed period after each tick keeps the long-run
//! rate exact no matter how long each tick's work takes. A tick that is a
//! whole period or more late skips the deadlines it overran.

use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;

/// One scheduled tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Deadline index (gaps mean skipped deadlines)
    pub index: u64,
    /// Time since the scheduler started, measured on wake-up
    pub since_start: Duration,
    /// Deadlines skipped right before this tick
    pub skipped: u64,
}

/// Drift-corrected fixed-rate scheduler
#[derive(Debug)]
pub struct TickScheduler {
    period: Duration,
    start: Instant,
    next: u64,
    missed: u64,
}

impl TickScheduler {
    /// Starts the schedule now; the first tick is due immediately.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self::starting_at(period, Instant::now())
    }

    #[must_use]
    pub fn starting_at(period: Duration, start: Instant) -> Self {
        Self {
            period: period.max(Duration::from_nanos(1)),
            start,
            next: 0,
            missed: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    /// Total deadlines skipped so far.
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Absolute deadline of tick `index`.
    #[must_use]
    pub fn deadline(&self, index: u64) -> Instant {
        let nanos = u64::try_from(self.period.as_nanos())
            .unwrap_or(u64::MAX)
            .saturating_mul(index);
        self.start + Duration::from_nanos(nanos)
    }

    /// Waits for the next deadline
    ///
    /// Returns immediately if that deadline has already passed.
    pub async fn next_tick(&mut self) -> Tick {
        let deadline = self.deadline(self.next);
        tokio::time::sleep_until(deadline).await;

        let now = Instant::now();
        let late = now.saturating_duration_since(deadline);
        let skipped = u64::try_from(late.as_nanos() / self.period.as_nanos()).unwrap_or(u64::MAX);

        if skipped > 0 {
            self.missed = self.missed.saturating_add(skipped);
            warn!(
                "Tick {} ran {:?} late, skipping {} deadline(s)",
                self.next, late, skipped
            );
        }

        let index = self.next.saturating_add(skipped);
        self.next = index.saturating_add(1);

        Tick {
            index,
            since_start: now.saturating_duration_since(self.start),
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(20);

    #[tokio::test(start_paused = true)]
    async fn test_ticks_land_on_deadlines() {
        let mut scheduler = TickScheduler::new(PERIOD);

        for expected in 0..5u32 {
            let tick = scheduler.next_tick().await;
            assert_eq!(tick.index, u64::from(expected));
            assert_eq!(tick.since_start, PERIOD * expected);
            assert_eq!(tick.skipped, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_time_does_not_accumulate_drift() {
        let mut scheduler = TickScheduler::new(PERIOD);

        for expected in 0..50u32 {
            let tick = scheduler.next_tick().await;
            assert_eq!(tick.since_start, PERIOD * expected);
            // Simulated work inside the tick
            tokio::time::advance(Duration::from_millis(7)).await;
        }
        assert_eq!(scheduler.missed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrun_skips_missed_deadlines() {
        let mut scheduler = TickScheduler::new(PERIOD);
        scheduler.next_tick().await;

        // Tick 0's work overruns into tick 3's slot
        tokio::time::advance(Duration::from_millis(65)).await;

        let tick = scheduler.next_tick().await;
        assert_eq!(tick.skipped, 2);
        assert_eq!(tick.index, 3);
        assert_eq!(tick.since_start, Duration::from_millis(65));
        assert_eq!(scheduler.missed(), 2);

        // Back on the grid
        let tick = scheduler.next_tick().await;
        assert_eq!(tick.index, 4);
        assert_eq!(tick.since_start, Duration::from_millis(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slightly_late_tick_is_not_skipped() {
        let mut scheduler = TickScheduler::new(PERIOD);
        scheduler.next_tick().await;
        tokio::time::advance(Duration::from_millis(35)).await;

        let tick = scheduler.next_tick().await;
        assert_eq!(tick.index, 1);
        assert_eq!(tick.skipped, 0);
    }

    #[test]
    fn test_deadline() {
        let start = Instant::now();
        let scheduler = TickScheduler::starting_at(PERIOD, start);
        assert_eq!(scheduler.deadline(0), start);
        assert_eq!(scheduler.deadline(50), start + Duration::from_secs(1));
    }
}
