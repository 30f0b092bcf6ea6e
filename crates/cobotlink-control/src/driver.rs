//! Robot-driver capability.
//!
//! The driver library that plans trajectories and talks to the arm's
//! real-time controller lives outside this crate. The session only ever talks
//! to these traits, so the hardware driver and the simulator are
//! interchangeable.

use std::sync::Arc;

use crate::command::TARGET_LEN;

/// Robot driver error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Driver closed")]
    Closed,
}

/// A connected robot driver handle.
///
/// Every method blocks the calling thread until the controller has finished
/// the request. Move methods return once the arm has reached the target or
/// the controller reported a runtime failure.
pub trait RobotDriver: Send + Sync {
    /// Clear any latched error on the controller.
    fn reset_error(&self) -> Result<(), DriverError>;

    /// Joint-space move.
    fn move_j(&self, target: &[f64; TARGET_LEN]) -> Result<(), DriverError>;

    /// Linear move in tool space.
    fn move_l(&self, target: &[f64; TARGET_LEN]) -> Result<(), DriverError>;

    /// Process move to a pose.
    fn move_p(&self, target: &[f64; TARGET_LEN]) -> Result<(), DriverError>;

    /// Pause motion output.
    fn pause(&self) -> Result<(), DriverError>;

    /// Resume motion output.
    fn play(&self) -> Result<(), DriverError>;

    fn close_safety_popup(&self) -> Result<(), DriverError>;

    fn unlock_protective_stop(&self) -> Result<(), DriverError>;

    /// Release the connection to the controller.
    fn close(&self) -> Result<(), DriverError>;
}

/// Creates driver handles for new control sessions.
pub trait DriverConnector: Send + Sync {
    /// Open a new driver handle. May block while the connection is set up.
    fn connect(&self) -> Result<Arc<dyn RobotDriver>, DriverError>;
}
