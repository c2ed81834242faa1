//! Ready-queue for tasks awaiting execution.
//!
//! Among the tasks whose start time has passed, the one expected to finish
//! soonest goes first. Tasks without an estimate sort last.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use super::time::{system_clock, SharedClock};

#[derive(Debug, Clone)]
pub struct ScheduledTask<T> {
    pub id: String,
    pub payload: T,
    /// Seconds.
    pub expected_duration: Option<f64>,
    pub delay: Option<Duration>,
    pub scheduled_at: DateTime<Utc>,
}

impl<T> ScheduledTask<T> {
    pub fn new(id: impl Into<String>, payload: T) -> Self {
        Self {
            id: id.into(),
            payload,
            expected_duration: None,
            delay: None,
            scheduled_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    pub fn with_expected_duration(mut self, secs: f64) -> Self {
        self.expected_duration = Some(secs);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn cost(&self) -> f64 {
        self.expected_duration.unwrap_or(f64::INFINITY)
    }
}

#[derive(Debug)]
pub struct TaskScheduler<T> {
    queue: Vec<ScheduledTask<T>>,
    clock: SharedClock,
}

impl<T> Default for TaskScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskScheduler<T> {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            queue: Vec::new(),
            clock,
        }
    }

    /// Stamp `scheduled_at` (now plus any delay) and enqueue.
    pub fn schedule(&mut self, mut task: ScheduledTask<T>) {
        let now = self.clock.now();
        task.scheduled_at = now + task.delay.unwrap_or_else(Duration::zero);
        debug!("Scheduled task {} for {}", task.id, task.scheduled_at);
        self.queue.push(task);
    }

    /// Remove and return the cheapest task that is due at `now`.
    pub fn next_ready(&mut self, now: DateTime<Utc>) -> Option<ScheduledTask<T>> {
        let index = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, t)| t.scheduled_at <= now)
            .min_by(|(ia, a), (ib, b)| {
                a.cost()
                    .partial_cmp(&b.cost())
                    .unwrap_or(Ordering::Equal)
                    .then(ia.cmp(ib))
            })
            .map(|(i, _)| i)?;
        Some(self.queue.remove(index))
    }

    pub fn next_ready_now(&mut self) -> Option<ScheduledTask<T>> {
        let now = self.clock.now();
        self.next_ready(now)
    }

    /// Remove the most recently scheduled task with this id, due or not.
    pub fn take(&mut self, id: &str) -> Option<ScheduledTask<T>> {
        let index = self.queue.iter().rposition(|t| t.id == id)?;
        Some(self.queue.remove(index))
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}
