//! # Liveness
//!
//! Decides when a source's last-known values can no longer be trusted.
//!
//! - Vision older than its threshold while in VISION mode: degraded, the
//!   primary axes go neutral until fresh data resumes.
//! - Physical older than its threshold: fatal, the owning process halts.

use std::fmt;
use std::time::Duration;

use crate::config::LivenessConfig;
use crate::input::cell::SourceSample;

/// Router health, published once per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterStatus {
    /// Everything fresh
    Nominal,
    /// No mode-button sample from the physical source yet
    AwaitingPhysical,
    /// In VISION mode without fresh vision data
    VisionStale { age: Option<Duration> },
    /// Physical source gone
    PhysicalLost { age: Option<Duration> },
}

impl RouterStatus {
    /// True if the process must stop.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, RouterStatus::PhysicalLost { .. })
    }

    /// True if primaries are being forced neutral but the loop carries on.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, RouterStatus::VisionStale { .. } | RouterStatus::AwaitingPhysical)
    }
}

impl Default for RouterStatus {
    fn default() -> Self {
        RouterStatus::AwaitingPhysical
    }
}

impl fmt::Display for RouterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterStatus::Nominal => write!(f, "nominal"),
            RouterStatus::AwaitingPhysical => write!(f, "awaiting physical input"),
            RouterStatus::VisionStale { age: Some(age) } => write!(f, "vision stale ({:?} old)", age),
            RouterStatus::VisionStale { age: None } => write!(f, "vision stale (no data yet)"),
            RouterStatus::PhysicalLost { age: Some(age) } => write!(f, "physical lost ({:?} old)", age),
            RouterStatus::PhysicalLost { age: None } => write!(f, "physical lost (no data)"),
        }
    }
}

/// Staleness thresholds for both sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessMonitor {
    vision_stale: Duration,
    physical_stale: Duration,
}

impl LivenessMonitor {
    #[must_use]
    pub fn new(vision_stale: Duration, physical_stale: Duration) -> Self {
        Self {
            vision_stale,
            physical_stale,
        }
    }

    #[must_use]
    pub fn from_config(config: &LivenessConfig) -> Self {
        Self::new(config.vision_stale(), config.physical_stale())
    }

    /// True if vision data is missing or too old to drive the primaries.
    #[must_use]
    pub fn vision_is_stale(&self, vision: &SourceSample) -> bool {
        vision.is_stale(self.vision_stale)
    }

    /// True if the physical source counts as lost.
    ///
    /// A source that has never reported gets one threshold's worth of time
    /// from loop start before it is declared lost.
    #[must_use]
    pub fn physical_is_lost(&self, physical: &SourceSample, since_start: Duration) -> bool {
        match physical.age {
            Some(age) => age > self.physical_stale,
            None => since_start > self.physical_stale,
        }
    }
}

impl Default for LivenessMonitor {
    fn default() -> Self {
        Self::from_config(&LivenessConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::snapshot::InputSnapshot;

    fn sample(age_ms: Option<u64>) -> SourceSample {
        SourceSample::new(InputSnapshot::new(), age_ms.map(Duration::from_millis))
    }

    #[test]
    fn test_vision_staleness() {
        let monitor = LivenessMonitor::default();
        assert!(monitor.vision_is_stale(&sample(None)));
        assert!(!monitor.vision_is_stale(&sample(Some(1000))));
        assert!(monitor.vision_is_stale(&sample(Some(1001))));
    }

    #[test]
    fn test_physical_loss() {
        let monitor = LivenessMonitor::default();
        let early = Duration::from_millis(100);
        let late = Duration::from_millis(500);

        assert!(!monitor.physical_is_lost(&sample(Some(200)), late));
        assert!(monitor.physical_is_lost(&sample(Some(201)), late));
        // Grace period for a source that has not reported yet
        assert!(!monitor.physical_is_lost(&sample(None), early));
        assert!(monitor.physical_is_lost(&sample(None), late));
    }

    #[test]
    fn test_status_classification() {
        assert!(RouterStatus::PhysicalLost { age: None }.is_fatal());
        assert!(!RouterStatus::PhysicalLost { age: None }.is_degraded());
        assert!(RouterStatus::VisionStale { age: None }.is_degraded());
        assert!(RouterStatus::AwaitingPhysical.is_degraded());
        assert!(!RouterStatus::Nominal.is_fatal());
        assert!(!RouterStatus::Nominal.is_degraded());
        assert_eq!(RouterStatus::default(), RouterStatus::AwaitingPhysical);
    }

    #[test]
    fn test_status_display() {
        let status = RouterStatus::VisionStale {
            age: Some(Duration::from_millis(1500)),
        };
        assert_eq!(status.to_string(), "vision stale (1.5s old)");
        assert_eq!(RouterStatus::Nominal.to_string(), "nominal");
    }
}
