//! Notification throttling.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeDelta};
use parking_lot::Mutex;
use tracing::debug;

use crate::config::ConfigProvider;

/// Time of the last permitted attempt.
#[derive(Debug, Default)]
struct ThrottleState {
    last_sent: Option<DateTime<Local>>,
}

/// Rate limiter for notification attempts.
///
/// At most one attempt is allowed per throttle window. The window is read
/// from the [`ConfigProvider`] on every check. Suppressed events are dropped,
/// not queued.
#[derive(Debug)]
pub struct NotificationGate {
    config: Arc<ConfigProvider>,
    state: Mutex<ThrottleState>,
}

impl NotificationGate {
    /// Creates a gate that has never allowed an attempt.
    #[must_use]
    pub fn new(config: Arc<ConfigProvider>) -> Self {
        Self {
            config,
            state: Mutex::new(ThrottleState::default()),
        }
    }

    /// Decides whether an attempt at `now` may proceed, and records it if so.
    ///
    /// Check and record happen under one lock: two concurrent callers inside
    /// the same window cannot both be allowed. The recorded time never moves
    /// backwards.
    pub fn should_attempt(&self, now: DateTime<Local>) -> bool {
        let window = TimeDelta::from_std(self.config.throttle_window()).unwrap_or(TimeDelta::MAX);
        let mut state = self.state.lock();

        let allowed = match state.last_sent {
            None => true,
            Some(last) => now.signed_duration_since(last) >= window,
        };

        if allowed {
            state.last_sent = Some(state.last_sent.map_or(now, |last| last.max(now)));
        } else {
            debug!(window_ms = window.num_milliseconds(), "notification throttled");
        }
        allowed
    }

    /// Returns the time of the last permitted attempt.
    #[must_use]
    pub fn last_sent(&self) -> Option<DateTime<Local>> {
        self.state.lock().last_sent
    }
}
