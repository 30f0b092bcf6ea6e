//! Control error types.

use crate::driver::DriverError;
use crate::session::SessionState;
use crate::validator::PayloadError;

/// Errors produced while handling a control command.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    #[error("Execution guard busy, {method} dropped")]
    GuardBusy { method: &'static str },

    #[error("Session not ready for {operation} (state: {state})")]
    SessionNotReady {
        operation: &'static str,
        state: SessionState,
    },

    #[error("Driver runtime failure: {0}")]
    DriverRuntimeFailure(DriverError),

    #[error("Driver unavailable: {0}")]
    DriverUnavailable(DriverError),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),
}

impl ControlError {
    /// Check if the error must be reported to the caller instead of being
    /// logged and acknowledged.
    pub fn is_surfaced(&self) -> bool {
        matches!(
            self,
            ControlError::SessionNotReady { .. }
                | ControlError::DriverUnavailable(_)
                | ControlError::UnknownMethod(_)
        )
    }
}
