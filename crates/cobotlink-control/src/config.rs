//! Control core configuration.

use serde::{Deserialize, Serialize};

/// Settings for the control session and its event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Broadcast channel capacity for control events
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Number of recent events kept for inspection
    #[serde(default = "default_max_stored_events")]
    pub max_stored_events: usize,
}

fn default_event_capacity() -> usize { 1000 }
fn default_max_stored_events() -> usize { 500 }

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            max_stored_events: default_max_stored_events(),
        }
    }
}
