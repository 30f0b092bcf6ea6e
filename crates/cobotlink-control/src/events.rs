//! Control event bus.
//!
//! Every session transition and every motion outcome is published here, so
//! callers can tell a completed move from a dropped or failed one even though
//! the acknowledgement looks the same for all of them.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::command::{MotionKind, TARGET_LEN};

/// Control event kinds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ControlEventKind {
    /// A new driver handle was acquired and motion is admitted
    SessionEnabled,
    /// The driver handle was released
    SessionDisabled,
    /// Motion output paused, new motion no longer admitted
    SessionPaused,
    /// Motion output resumed
    SessionResumed,
    SafetyPopupClosed,
    ProtectiveStopUnlocked,
    /// A motion run took the guard and started on a worker
    MotionStarted {
        kind: MotionKind,
        target: [f64; TARGET_LEN],
    },
    /// The driver finished the move
    MotionCompleted {
        kind: MotionKind,
        target: [f64; TARGET_LEN],
        elapsed_ms: u64,
    },
    /// The driver reported a runtime failure
    MotionFailed {
        kind: MotionKind,
        target: [f64; TARGET_LEN],
        error: String,
    },
    /// The command never reached the driver
    MotionDropped { method: String, reason: String },
    /// The payload did not validate
    PayloadRejected { method: String, reason: String },
}

impl ControlEventKind {
    /// Get the kind name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ControlEventKind::SessionEnabled => "session_enabled",
            ControlEventKind::SessionDisabled => "session_disabled",
            ControlEventKind::SessionPaused => "session_paused",
            ControlEventKind::SessionResumed => "session_resumed",
            ControlEventKind::SafetyPopupClosed => "safety_popup_closed",
            ControlEventKind::ProtectiveStopUnlocked => "protective_stop_unlocked",
            ControlEventKind::MotionStarted { .. } => "motion_started",
            ControlEventKind::MotionCompleted { .. } => "motion_completed",
            ControlEventKind::MotionFailed { .. } => "motion_failed",
            ControlEventKind::MotionDropped { .. } => "motion_dropped",
            ControlEventKind::PayloadRejected { .. } => "payload_rejected",
        }
    }

    /// Check if this event ends a motion run.
    pub fn is_motion_finished(&self) -> bool {
        matches!(
            self,
            ControlEventKind::MotionCompleted { .. } | ControlEventKind::MotionFailed { .. }
        )
    }
}

/// Control event with context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlEvent {
    /// Event ID
    pub id: String,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// What happened
    pub kind: ControlEventKind,
}

impl ControlEvent {
    /// Create a new control event.
    pub fn new(kind: ControlEventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Event filter for subscriptions.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Accepted kind names, `None` accepts everything
    pub type_names: Option<Vec<&'static str>>,
}

impl EventFilter {
    /// Create a filter accepting only the given kind names.
    pub fn kinds(type_names: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            type_names: Some(type_names.into_iter().collect()),
        }
    }

    /// Check if an event matches this filter.
    pub fn matches(&self, event: &ControlEvent) -> bool {
        match &self.type_names {
            Some(names) => names.contains(&event.kind.type_name()),
            None => true,
        }
    }
}

/// Event bus for control events.
pub struct ControlEventBus {
    broadcast_tx: broadcast::Sender<ControlEvent>,
    recent_events: Mutex<VecDeque<ControlEvent>>,
    max_stored: usize,
}

impl ControlEventBus {
    /// Create a new event bus.
    pub fn new(capacity: usize, max_stored: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));

        Self {
            broadcast_tx,
            recent_events: Mutex::new(VecDeque::with_capacity(max_stored)),
            max_stored,
        }
    }

    /// Publish an event. Never blocks, so motion workers can call it.
    pub fn publish(&self, kind: ControlEventKind) {
        let event = ControlEvent::new(kind);

        {
            let mut events = self.recent_events.lock();
            events.push_back(event.clone());
            while events.len() > self.max_stored {
                events.pop_front();
            }
        }

        // No subscribers is fine
        let _ = self.broadcast_tx.send(event);
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Subscribe with a filter.
    pub fn subscribe_filtered(&self, filter: EventFilter) -> FilteredSubscriber {
        FilteredSubscriber {
            rx: self.broadcast_tx.subscribe(),
            filter,
        }
    }

    /// Get recent events, oldest first.
    pub fn get_recent(&self, limit: usize) -> Vec<ControlEvent> {
        let events = self.recent_events.lock();
        let start = events.len().saturating_sub(limit);
        events.iter().skip(start).cloned().collect()
    }

    /// Count stored events of one kind.
    pub fn count(&self, type_name: &str) -> usize {
        self.recent_events
            .lock()
            .iter()
            .filter(|e| e.kind.type_name() == type_name)
            .count()
    }

    /// Clear all stored events.
    pub fn clear(&self) {
        self.recent_events.lock().clear();
    }
}

impl Default for ControlEventBus {
    fn default() -> Self {
        Self::new(1000, 500)
    }
}

/// Filtered event subscriber.
pub struct FilteredSubscriber {
    rx: broadcast::Receiver<ControlEvent>,
    filter: EventFilter,
}

impl FilteredSubscriber {
    /// Receive next filtered event.
    pub async fn recv(&mut self) -> Result<ControlEvent, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.filter.matches(&event) {
                return Ok(event);
            }
        }
    }
}
