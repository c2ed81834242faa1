use std::collections::VecDeque;

use chrono::Duration;
use serde_json::{json, Value};
use tracing::warn;

use super::types::{AlertLevel, ErrorRecord};
use crate::kernel::bus::EventManager;
use crate::kernel::event::{topics, EventPriority};
use crate::kernel::time::{system_clock, SharedClock};

const MAX_ERRORS: usize = 1000;
const ALERT_AFTER: usize = 3;
const ALERT_WINDOW_MINUTES: i64 = 5;

/// Keeps recent errors and alerts when one kind keeps recurring.
#[derive(Debug)]
pub struct ErrorTracker {
    events: EventManager,
    errors: VecDeque<ErrorRecord>,
    clock: SharedClock,
}

impl ErrorTracker {
    pub fn new(events: EventManager) -> Self {
        Self::with_clock(events, system_clock())
    }

    pub fn with_clock(events: EventManager, clock: SharedClock) -> Self {
        Self {
            events,
            errors: VecDeque::new(),
            clock,
        }
    }

    /// Returns true when this error triggered a `system.error_alert`.
    pub fn track_error(&mut self, kind: &str, message: &str, context: Value) -> bool {
        let record = ErrorRecord {
            kind: kind.to_string(),
            message: message.to_string(),
            timestamp: self.clock.now(),
            context,
        };
        if self.errors.len() >= MAX_ERRORS {
            self.errors.pop_front();
        }
        self.errors.push_back(record.clone());
        self.analyze(&record)
    }

    fn analyze(&self, record: &ErrorRecord) -> bool {
        let cutoff = self.clock.now() - Duration::minutes(ALERT_WINDOW_MINUTES);
        let similar = self
            .errors
            .iter()
            .filter(|e| e.kind == record.kind && e.timestamp > cutoff)
            .count();
        if similar < ALERT_AFTER {
            return false;
        }

        warn!("{} {} errors in the last {} minutes", similar, record.kind, ALERT_WINDOW_MINUTES);
        self.events.emit_from(
            topics::SYSTEM_ERROR_ALERT,
            json!({
                "message": format!("Multiple {} errors detected", record.kind),
                "level": AlertLevel::Error,
                "error_data": record,
                "timestamp": self.clock.now().to_rfc3339(),
            }),
            EventPriority::High,
            "monitor",
        );
        true
    }

    pub fn errors(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.errors.iter()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}
