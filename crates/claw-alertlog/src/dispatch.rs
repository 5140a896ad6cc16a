//! Fire-and-forget alert dispatch.
//!
//! Delivery runs detached from the caller. On a Tokio runtime it goes to the
//! blocking pool; otherwise it gets its own thread. The outcome is only
//! visible through `tracing`.

use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::channels::{AlertMessage, NotificationChannel};

/// Hands `alert` to `channel` without waiting for the result.
pub(crate) fn spawn_alert(channel: Arc<dyn NotificationChannel>, alert: AlertMessage) {
    let job = move || deliver(channel.as_ref(), &alert);

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            drop(handle.spawn_blocking(job));
        }
        Err(_) => {
            let spawned = thread::Builder::new()
                .name("alertlog-dispatch".to_string())
                .spawn(job);
            if let Err(err) = spawned {
                warn!(error = %err, "could not start alert dispatch thread");
            }
        }
    }
}

fn deliver(channel: &dyn NotificationChannel, alert: &AlertMessage) {
    match channel.send_alert(alert) {
        Ok(()) => debug!(channel = %channel.name(), code = %alert.code, "alert delivered"),
        Err(err) => warn!(
            channel = %channel.name(),
            code = %alert.code,
            error = %err,
            "alert delivery failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LogError, Result};
    use chrono::Local;
    use std::sync::mpsc;
    use std::time::Duration;

    #[derive(Debug)]
    struct SignalChannel {
        tx: parking_lot::Mutex<mpsc::Sender<String>>,
        fail: bool,
    }

    impl NotificationChannel for SignalChannel {
        fn name(&self) -> &str {
            "signal"
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn send_alert(&self, alert: &AlertMessage) -> Result<()> {
            let _ = self.tx.lock().send(alert.code.clone());
            if self.fail {
                Err(LogError::delivery_failed("boom"))
            } else {
                Ok(())
            }
        }
    }

    fn alert(code: &str) -> AlertMessage {
        AlertMessage::new("Acme", code, "Main", "failure", Local::now())
    }

    #[test]
    fn dispatch_without_runtime_uses_thread() {
        let (tx, rx) = mpsc::channel();
        let channel = Arc::new(SignalChannel {
            tx: parking_lot::Mutex::new(tx),
            fail: false,
        });

        spawn_alert(channel, alert("E1"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).ok(), Some("E1".to_string()));
    }

    #[test]
    fn dispatch_failure_is_contained() {
        let (tx, rx) = mpsc::channel();
        let channel = Arc::new(SignalChannel {
            tx: parking_lot::Mutex::new(tx),
            fail: true,
        });

        spawn_alert(channel, alert("E2"));
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).ok(), Some("E2".to_string()));
    }

    #[tokio::test]
    async fn dispatch_on_runtime_uses_blocking_pool() {
        let (tx, rx) = mpsc::channel();
        let channel = Arc::new(SignalChannel {
            tx: parking_lot::Mutex::new(tx),
            fail: false,
        });

        spawn_alert(channel, alert("E3"));
        let received = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
            .await
            .ok()
            .and_then(std::result::Result::ok);
        assert_eq!(received, Some("E3".to_string()));
    }
}
