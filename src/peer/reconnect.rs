//! Reconnection supervision
//!
//! Centralizes every delayed rebuild decision: degraded links get a short
//! countdown before being rebuilt, failed or timed-out links get exactly one
//! delayed retry. At most one timer exists per remote peer; scheduling a new
//! one replaces the old, and a link that recovers cancels its timer.

use crate::config::RoomSessionConfig;
use crate::peer::link::LinkEvent;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One timer slot per remote peer
#[derive(Default)]
pub struct TimerTable {
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TimerTable {
    /// Install a timer for `remote_id`, aborting any previous one
    pub fn set(&self, remote_id: &str, handle: JoinHandle<()>) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some(old) = timers.insert(remote_id.to_string(), handle) {
                old.abort();
            }
        }
    }

    /// Cancel the timer for `remote_id`, if any
    pub fn cancel(&self, remote_id: &str) {
        if let Ok(mut timers) = self.timers.lock() {
            if let Some(handle) = timers.remove(remote_id) {
                handle.abort();
                debug!(peer_id = %remote_id, "Cancelled pending reconnect timer");
            }
        }
    }

    /// Cancel everything (session teardown)
    pub fn cancel_all(&self) {
        if let Ok(mut timers) = self.timers.lock() {
            for (_, handle) in timers.drain() {
                handle.abort();
            }
        }
    }

    /// Whether a timer is pending for `remote_id`
    pub fn is_pending(&self, remote_id: &str) -> bool {
        self.timers
            .lock()
            .map(|timers| {
                timers
                    .get(remote_id)
                    .map(|h| !h.is_finished())
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }
}

/// Schedules link rebuilds after degradation, failure, and timeout
pub struct ReconnectSupervisor {
    timers: TimerTable,

    /// Peers that already consumed their single post-failure retry
    retried: Mutex<HashSet<String>>,

    degraded_delay: std::time::Duration,
    retry_delay: std::time::Duration,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
}

impl ReconnectSupervisor {
    /// Create a supervisor emitting rebuild events on `event_tx`
    pub fn new(config: &RoomSessionConfig, event_tx: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self {
            timers: TimerTable::default(),
            retried: Mutex::new(HashSet::new()),
            degraded_delay: config.degraded_reconnect_delay(),
            retry_delay: config.retry_delay(),
            event_tx,
        }
    }

    /// Start the degraded-link countdown for `remote_id`
    ///
    /// When it fires, a [`LinkEvent::RelinkDue`] asks the session to rebuild
    /// the link if it is still unhealthy. Recovery before the deadline is
    /// handled by [`mark_connected`](Self::mark_connected).
    pub fn schedule_degraded(&self, remote_id: &str) {
        info!(
            peer_id = %remote_id,
            delay_ms = self.degraded_delay.as_millis() as u64,
            "Link degraded; scheduling reconnect"
        );
        self.schedule(remote_id, self.degraded_delay);
    }

    /// Schedule the single delayed retry after a failure or connect timeout
    ///
    /// Returns `false` when the retry budget for this peer is already spent;
    /// the caller should then leave the peer visible with poor quality.
    pub fn schedule_retry(&self, remote_id: &str) -> bool {
        {
            let Ok(mut retried) = self.retried.lock() else {
                return false;
            };
            if !retried.insert(remote_id.to_string()) {
                warn!(peer_id = %remote_id, "Retry budget exhausted; leaving link degraded");
                return false;
            }
        }

        info!(
            peer_id = %remote_id,
            delay_ms = self.retry_delay.as_millis() as u64,
            "Scheduling connection retry"
        );
        self.schedule(remote_id, self.retry_delay);
        true
    }

    fn schedule(&self, remote_id: &str, delay: std::time::Duration) {
        let event_tx = self.event_tx.clone();
        let remote_id_owned = remote_id.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = event_tx.send(LinkEvent::RelinkDue {
                remote_id: remote_id_owned,
            });
        });

        self.timers.set(remote_id, handle);
    }

    /// Whether the single post-failure retry for `remote_id` is unspent
    pub fn retry_available(&self, remote_id: &str) -> bool {
        self.retried
            .lock()
            .map(|retried| !retried.contains(remote_id))
            .unwrap_or(false)
    }

    /// Note a successful connection: cancels the pending timer and restores
    /// the retry budget
    pub fn mark_connected(&self, remote_id: &str) {
        self.timers.cancel(remote_id);
        if let Ok(mut retried) = self.retried.lock() {
            retried.remove(remote_id);
        }
    }

    /// Cancel the pending timer for `remote_id` without touching its retry
    /// budget
    ///
    /// Used when the link is removed as part of a rebuild; the budget must
    /// survive so the rebuilt link cannot retry forever.
    pub fn cancel_timer(&self, remote_id: &str) {
        self.timers.cancel(remote_id);
    }

    /// Drop all supervision state for `remote_id` (peer left the room)
    pub fn forget(&self, remote_id: &str) {
        self.timers.cancel(remote_id);
        if let Ok(mut retried) = self.retried.lock() {
            retried.remove(remote_id);
        }
    }

    /// Cancel all timers and reset retry budgets (session teardown)
    pub fn shutdown(&self) {
        self.timers.cancel_all();
        if let Ok(mut retried) = self.retried.lock() {
            retried.clear();
        }
    }

    /// Whether a rebuild timer is pending for `remote_id`
    pub fn is_pending(&self, remote_id: &str) -> bool {
        self.timers.is_pending(remote_id)
    }
}
