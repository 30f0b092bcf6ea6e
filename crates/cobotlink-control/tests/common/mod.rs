//! Shared helpers for control integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use cobotlink_control::{
    CommandRouter, ControlEvent, ControlEventBus, ControlSession, EventFilter, FilteredSubscriber,
    SimulatedConnector, SimulatedDriver,
};

/// A router wired to a simulated arm.
pub struct TestRig {
    pub connector: Arc<SimulatedConnector>,
    pub events: Arc<ControlEventBus>,
    pub session: Arc<ControlSession>,
    pub router: Arc<CommandRouter>,
}

impl TestRig {
    /// Rig whose moves take `move_ms` milliseconds.
    pub fn new(move_ms: u64) -> Self {
        let connector = Arc::new(SimulatedConnector::new(
            "127.0.0.1",
            Duration::from_millis(move_ms),
        ));
        let events = Arc::new(ControlEventBus::default());
        let session = Arc::new(ControlSession::new(connector.clone(), events.clone()));
        let router = Arc::new(CommandRouter::new(session.clone()));

        Self {
            connector,
            events,
            session,
            router,
        }
    }

    /// Driver handle of the current session.
    pub fn driver(&self) -> Arc<SimulatedDriver> {
        self.connector
            .last_driver()
            .expect("session has not been enabled")
    }

    /// Subscribe to events of the given kinds.
    pub fn watch(&self, kinds: &[&'static str]) -> FilteredSubscriber {
        self.events
            .subscribe_filtered(EventFilter::kinds(kinds.iter().copied()))
    }
}

/// Wait for the next event on `sub`.
pub async fn next_event(sub: &mut FilteredSubscriber) -> ControlEvent {
    tokio::time::timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event bus closed")
}

/// Payload text for a move target.
pub fn target_payload(target: [f64; 6]) -> serde_json::Value {
    let parts: Vec<String> = target.iter().map(|v| v.to_string()).collect();
    serde_json::Value::String(format!("[{}]", parts.join(", ")))
}
