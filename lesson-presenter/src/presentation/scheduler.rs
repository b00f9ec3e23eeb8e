//! Timeline scheduler
//!
//! Arms one deadline per timeline event and fires them in order.
//!
//! **Design:**
//! - Deadlines are computed once, relative to the instant of arming:
//!   `max(0, event.time - origin) / speed`. Firing late never shifts the
//!   deadlines of later events.
//! - A single tokio task per handle walks the deadlines in timeline order
//!   with `sleep_until`, so events with equal or near-equal deadlines can
//!   never overtake each other.
//! - Cancellation is cooperative: `cancel_all` raises a shared flag and
//!   aborts the task. The flag is checked immediately before every fire, so
//!   nothing fires after `cancel_all` returns.

use crate::presentation::payload::TimelineEvent;
use lesson_common::time::media_to_wall;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

/// A timeline event handed to the fire callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledCue {
    /// Index of the event in the full timeline
    pub index: usize,
    pub event: TimelineEvent,
}

/// Arms timeline events against the tokio clock
pub struct TimelineScheduler;

impl TimelineScheduler {
    /// Arm every event at `event.time / speed` from now
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(events: &[TimelineEvent], speed: f64, on_fire: F) -> ScheduleHandle
    where
        F: FnMut(ScheduledCue) + Send + 'static,
    {
        Self::arm_from(events, 0, 0, speed, on_fire)
    }

    /// Arm `events[first_index..]` relative to media position `origin_ms`
    ///
    /// Each deadline is `max(0, event.time - origin_ms) / speed` from now.
    /// Events already behind `origin_ms` fire immediately, in order.
    pub fn arm_from<F>(
        events: &[TimelineEvent],
        first_index: usize,
        origin_ms: u64,
        speed: f64,
        mut on_fire: F,
    ) -> ScheduleHandle
    where
        F: FnMut(ScheduledCue) + Send + 'static,
    {
        let armed_at = Instant::now();
        let cues: Vec<(Instant, ScheduledCue)> = events
            .iter()
            .enumerate()
            .skip(first_index)
            .map(|(index, event)| {
                let delay = media_to_wall(event.time_ms.saturating_sub(origin_ms), speed);
                (
                    armed_at + delay,
                    ScheduledCue {
                        index,
                        event: event.clone(),
                    },
                )
            })
            .collect();

        let armed = cues.len();
        let cancelled = Arc::new(AtomicBool::new(false));
        let fired = Arc::new(AtomicUsize::new(0));

        debug!(
            armed,
            first_index,
            origin_ms,
            speed,
            "Arming timeline events"
        );

        let task = if armed == 0 {
            None
        } else {
            let cancelled = Arc::clone(&cancelled);
            let fired = Arc::clone(&fired);
            Some(tokio::spawn(async move {
                for (deadline, cue) in cues {
                    tokio::time::sleep_until(deadline).await;
                    if cancelled.load(Ordering::Acquire) {
                        return;
                    }
                    fired.fetch_add(1, Ordering::AcqRel);
                    trace!(index = cue.index, time_ms = cue.event.time_ms, "Timeline event due");
                    on_fire(cue);
                }
            }))
        };

        ScheduleHandle {
            cancelled,
            fired,
            armed,
            task,
        }
    }
}

/// Owns every timer armed by one [`TimelineScheduler`] call
///
/// Dropping the handle cancels whatever has not fired yet.
pub struct ScheduleHandle {
    cancelled: Arc<AtomicBool>,
    fired: Arc<AtomicUsize>,
    armed: usize,
    task: Option<JoinHandle<()>>,
}

impl ScheduleHandle {
    /// A handle owning nothing, already cancelled
    pub fn empty() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(true)),
            fired: Arc::new(AtomicUsize::new(0)),
            armed: 0,
            task: None,
        }
    }

    /// Cancel every timer under this handle
    ///
    /// Safe to call repeatedly; a no-op once cancelled or fully fired.
    pub fn cancel_all(&mut self) {
        let dropped = self.pending();
        let was_cancelled = self.cancelled.swap(true, Ordering::AcqRel);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if !was_cancelled && dropped > 0 {
            debug!(dropped, "Cancelled pending timeline events");
        }
    }

    /// Timers neither fired nor cancelled
    pub fn pending(&self) -> usize {
        if self.is_cancelled() {
            return 0;
        }
        self.armed.saturating_sub(self.fired())
    }

    /// Timers that have fired
    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::Acquire)
    }

    /// Number of timers armed by this handle
    pub fn armed(&self) -> usize {
        self.armed
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
