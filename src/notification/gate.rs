//! Notification gate
//!
//! Time-windowed suppression of repeated administrator alerts. Records live in
//! memory for the lifetime of the process and are lost on restart.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Subject key used for cluster-wide alerts
pub const CLUSTER_SUBJECT: &str = "cluster";

/// Default minimum interval between two notifications for the same subject
pub const DEFAULT_RENOTIFY_INTERVAL: Duration = Duration::from_secs(4 * 60 * 60);

/// Rate limiter keyed by notification subject (an application ID or [`CLUSTER_SUBJECT`])
#[derive(Debug, Default)]
pub struct NotificationGate {
    last_sent: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a notification for `subject` may be sent now; records the send if so.
    pub fn try_acquire(&self, subject: &str, min_interval: Duration) -> bool {
        self.try_acquire_at(subject, min_interval, Utc::now())
    }

    /// [`try_acquire`](Self::try_acquire) against an explicit clock reading.
    ///
    /// Check and record happen under one lock, so concurrent callers on the same
    /// subject cannot both pass.
    pub fn try_acquire_at(&self, subject: &str, min_interval: Duration, now: DateTime<Utc>) -> bool {
        let mut last_sent = match self.last_sent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let allowed = match last_sent.get(subject) {
            None => true,
            Some(previous) => {
                let elapsed = now.signed_duration_since(*previous);
                match chrono::Duration::from_std(min_interval) {
                    Ok(interval) => elapsed > interval,
                    Err(_) => false,
                }
            }
        };

        if allowed {
            last_sent.insert(subject.to_string(), now);
        } else {
            debug!(subject = %subject, "Notification suppressed");
        }
        allowed
    }

    /// When `subject` was last notified, if ever
    pub fn last_sent(&self, subject: &str) -> Option<DateTime<Utc>> {
        let last_sent = match self.last_sent.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        last_sent.get(subject).copied()
    }
}
