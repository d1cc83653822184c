// src/notify.rs
//! Notification schedules: which event should alert which session, and when.
//!
//! The service only tracks firing times and marks schedules sent; the
//! browser-side client does the actual displaying. A minute-granularity
//! ticker sweeps due schedules so a client polling "pending" never sees an
//! alert it should already have shown.

use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSchedule {
    pub id: u64,
    pub session_id: String,
    pub event_id: String,
    pub event_timestamp: DateTime<Utc>,
    pub minutes_before: i64,
    pub sent_at: Option<DateTime<Utc>>,
}

impl NotificationSchedule {
    /// The instant this schedule should fire.
    pub fn fire_at(&self) -> DateTime<Utc> {
        self.event_timestamp - ChronoDuration::minutes(self.minutes_before)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.sent_at.is_none() && self.fire_at() <= now
    }
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    schedules: Vec<NotificationSchedule>,
}

/// In-memory schedule store, partitioned by opaque session id.
#[derive(Default)]
pub struct NotificationStore {
    inner: Mutex<Inner>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &self,
        session_id: &str,
        event_id: &str,
        event_timestamp: DateTime<Utc>,
        minutes_before: i64,
    ) -> NotificationSchedule {
        let mut inner = self.inner.lock().expect("notification mutex poisoned");
        inner.next_id += 1;
        let schedule = NotificationSchedule {
            id: inner.next_id,
            session_id: session_id.to_string(),
            event_id: event_id.to_string(),
            event_timestamp,
            minutes_before,
            sent_at: None,
        };
        inner.schedules.push(schedule.clone());
        schedule
    }

    /// Unsent schedules for one session.
    pub fn pending(&self, session_id: &str) -> Vec<NotificationSchedule> {
        let inner = self.inner.lock().expect("notification mutex poisoned");
        inner
            .schedules
            .iter()
            .filter(|s| s.session_id == session_id && s.sent_at.is_none())
            .cloned()
            .collect()
    }

    pub fn remove(&self, session_id: &str, id: u64) -> bool {
        let mut inner = self.inner.lock().expect("notification mutex poisoned");
        let before = inner.schedules.len();
        inner
            .schedules
            .retain(|s| !(s.id == id && s.session_id == session_id));
        inner.schedules.len() != before
    }

    /// Mark every due schedule sent at `now`; returns what fired.
    pub fn mark_due_sent(&self, now: DateTime<Utc>) -> Vec<NotificationSchedule> {
        let mut inner = self.inner.lock().expect("notification mutex poisoned");
        let mut fired = Vec::new();
        for s in inner.schedules.iter_mut() {
            if s.is_due(now) {
                s.sent_at = Some(now);
                fired.push(s.clone());
            }
        }
        fired
    }
}

/// Minute ticker marking due schedules sent.
pub fn spawn_notification_ticker(store: Arc<NotificationStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            ticker.tick().await;
            let fired = store.mark_due_sent(Utc::now());
            if !fired.is_empty() {
                info!(target: "notify", fired = fired.len(), "notification schedules fired");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid instant")
    }

    #[test]
    fn fire_time_subtracts_lead_minutes() {
        let store = NotificationStore::new();
        let s = store.add("sess", "ev1", ts("2025-06-01T12:00:00Z"), 30);
        assert_eq!(s.fire_at(), ts("2025-06-01T11:30:00Z"));
        assert!(!s.is_due(ts("2025-06-01T11:29:59Z")));
        assert!(s.is_due(ts("2025-06-01T11:30:00Z")));
    }

    #[test]
    fn due_schedules_are_marked_sent_once() {
        let store = NotificationStore::new();
        store.add("sess", "ev1", ts("2025-06-01T12:00:00Z"), 15);
        store.add("sess", "ev2", ts("2025-06-02T12:00:00Z"), 15);

        let fired = store.mark_due_sent(ts("2025-06-01T11:50:00Z"));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].event_id, "ev1");

        // Second sweep finds nothing new.
        assert!(store.mark_due_sent(ts("2025-06-01T11:55:00Z")).is_empty());
        assert_eq!(store.pending("sess").len(), 1);
    }

    #[test]
    fn sessions_are_partitioned() {
        let store = NotificationStore::new();
        let a = store.add("a", "ev1", ts("2025-06-01T12:00:00Z"), 5);
        store.add("b", "ev1", ts("2025-06-01T12:00:00Z"), 5);
        assert_eq!(store.pending("a").len(), 1);
        assert!(store.remove("a", a.id));
        assert!(store.pending("a").is_empty());
        assert_eq!(store.pending("b").len(), 1);
    }
}
