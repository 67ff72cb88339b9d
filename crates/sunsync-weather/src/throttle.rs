//! Rate limiting for "new weather" notifications.
//!
//! The clock only moves when a notification is actually shown, never on a
//! plain sync.

use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

use crate::error::StoreError;
use crate::store::NotificationStateStore;

/// Minimum gap between two notifications
pub const THROTTLE_WINDOW_HOURS: i64 = 24;

/// Whether enough time has passed since `last`. No previous notification counts as due.
pub fn is_due(last: Option<DateTime<Utc>>, now: DateTime<Utc>, window: TimeDelta) -> bool {
    match last {
        None => true,
        Some(last) => now.signed_duration_since(last) >= window,
    }
}

pub struct NotificationThrottle {
    state: Arc<dyn NotificationStateStore>,
    window: TimeDelta,
}

impl NotificationThrottle {
    pub fn new(state: Arc<dyn NotificationStateStore>) -> Self {
        Self::with_window(state, TimeDelta::hours(THROTTLE_WINDOW_HOURS))
    }

    pub fn with_window(state: Arc<dyn NotificationStateStore>, window: TimeDelta) -> Self {
        Self { state, window }
    }

    /// Decide whether a notification may be shown at `now`.
    ///
    /// An unreadable timestamp suppresses the notification.
    pub fn should_notify(&self, now: DateTime<Utc>, enabled: bool) -> bool {
        if !enabled {
            return false;
        }

        match self.state.last_notified_at() {
            Ok(last) => is_due(last, now, self.window),
            Err(e) => {
                tracing::warn!("Could not read last notification time: {}", e);
                false
            }
        }
    }

    /// Record that a notification was shown at `now`.
    pub fn mark_notified(&self, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.state.set_last_notified_at(now)
    }

    pub fn last_notified_at(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.state.last_notified_at()
    }
}
