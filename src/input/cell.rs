//! # Last-Value Cell
//!
//! Single-writer/single-reader cell shared between an adapter's receive
//! loop and the router tick.
//!
//! The writer updates the whole [`SourceState`] in one `send_modify`, so a
//! reader always sees a consistent snapshot: no torn reads of partially
//! updated axis sets. Reads never block on the writer's I/O.

use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::snapshot::InputSnapshot;
use crate::event::protocol::JoystickEvent;

/// State published by one adapter
#[derive(Debug, Clone, Default)]
pub struct SourceState {
    /// Last-known values
    pub snapshot: InputSnapshot,
    /// When the source last proved it was alive (`None` until the first sample)
    pub last_fresh: Option<Instant>,
}

/// One consistent read of a source, taken at a tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSample {
    /// Last-known values
    pub snapshot: InputSnapshot,
    /// Time since the last fresh sample (`None` if there never was one)
    pub age: Option<Duration>,
}

impl SourceSample {
    /// Builds a sample directly, mostly for tests and replay.
    #[must_use]
    pub fn new(snapshot: InputSnapshot, age: Option<Duration>) -> Self {
        Self { snapshot, age }
    }

    /// True if the sample is missing or older than `threshold`.
    #[must_use]
    pub fn is_stale(&self, threshold: Duration) -> bool {
        match self.age {
            Some(age) => age > threshold,
            None => true,
        }
    }
}

/// Creates a connected publisher/reader pair.
///
/// # Examples
///
/// ```
/// use fpv_vision_router::event::protocol::JoystickEvent;
/// use fpv_vision_router::input::cell::source_cell;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (publisher, reader) = source_cell();
/// assert!(reader.age().is_none());
///
/// publisher.apply(&JoystickEvent::axis(0, 0, 100));
/// assert_eq!(reader.latest_axes().get(&0), Some(&100));
/// assert!(reader.age().is_some());
/// # }
/// ```
#[must_use]
pub fn source_cell() -> (SourcePublisher, SourceReader) {
    let (tx, rx) = watch::channel(SourceState::default());
    (SourcePublisher { tx }, SourceReader { rx })
}

/// Write side, owned by an adapter's receive loop
#[derive(Debug)]
pub struct SourcePublisher {
    tx: watch::Sender<SourceState>,
}

impl SourcePublisher {
    /// Records one fresh event.
    pub fn apply(&self, event: &JoystickEvent) {
        self.apply_all(std::slice::from_ref(event));
    }

    /// Records several events as one atomic update.
    pub fn apply_all(&self, events: &[JoystickEvent]) {
        let now = Instant::now();
        self.tx.send_modify(|state| {
            for event in events {
                state.snapshot.apply(event);
            }
            state.last_fresh = Some(now);
        });
    }

    /// Replaces the whole snapshot.
    pub fn publish(&self, snapshot: InputSnapshot) {
        let now = Instant::now();
        self.tx.send_modify(|state| {
            state.snapshot = snapshot;
            state.last_fresh = Some(now);
        });
    }

    /// Marks the source alive without changing any value.
    pub fn touch(&self) {
        let now = Instant::now();
        self.tx.send_modify(|state| state.last_fresh = Some(now));
    }
}

/// Read side, held by the router
#[derive(Debug, Clone)]
pub struct SourceReader {
    rx: watch::Receiver<SourceState>,
}

impl SourceReader {
    /// Takes one consistent sample, with age measured at `now`.
    #[must_use]
    pub fn sample_at(&self, now: Instant) -> SourceSample {
        let state = self.rx.borrow();
        SourceSample {
            snapshot: state.snapshot.clone(),
            age: state.last_fresh.map(|at| now.saturating_duration_since(at)),
        }
    }

    /// Takes one consistent sample, with age measured now.
    #[must_use]
    pub fn sample(&self) -> SourceSample {
        self.sample_at(Instant::now())
    }

    /// Most recent axis values.
    #[must_use]
    pub fn latest_axes(&self) -> BTreeMap<u8, i32> {
        self.rx.borrow().snapshot.axes().clone()
    }

    /// Most recent button states.
    #[must_use]
    pub fn latest_buttons(&self) -> BTreeMap<u8, bool> {
        self.rx.borrow().snapshot.buttons().clone()
    }

    /// Time since the last fresh sample.
    #[must_use]
    pub fn age(&self) -> Option<Duration> {
        self.rx
            .borrow()
            .last_fresh
            .map(|at| Instant::now().saturating_duration_since(at))
    }
}
