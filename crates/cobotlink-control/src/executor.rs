//! Motion execution.
//!
//! Each admitted motion command runs on its own blocking worker so the
//! command-reception loop never waits on the arm. The worker owns the guard
//! permit for the whole run and drops it once the driver call returns,
//! whether it succeeded, failed or panicked.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::command::{ControlMethod, MotionCommand, MotionKind};
use crate::driver::{DriverError, RobotDriver};
use crate::error::ControlError;
use crate::events::{ControlEventBus, ControlEventKind};
use crate::guard::GuardPermit;
use crate::session::ControlSession;

/// How a motion run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionOutcome {
    Completed,
    Failed(DriverError),
}

/// Result of one motion run.
#[derive(Debug, Clone)]
pub struct MotionReport {
    pub command: MotionCommand,
    pub outcome: MotionOutcome,
    pub elapsed: Duration,
}

impl MotionReport {
    /// Check if the driver finished the move.
    pub fn is_completed(&self) -> bool {
        self.outcome == MotionOutcome::Completed
    }
}

/// Runs validated motion commands against the session's driver handle.
#[derive(Clone)]
pub struct MotionExecutor {
    events: Arc<ControlEventBus>,
}

impl MotionExecutor {
    /// Create a new executor publishing to the given event bus.
    pub fn new(events: Arc<ControlEventBus>) -> Self {
        Self { events }
    }

    /// Admit `command` through the session's guard and start it on a
    /// blocking worker.
    ///
    /// Returns [`ControlError::GuardBusy`] without touching the driver when
    /// another run holds the guard or the guard is closed. The returned handle
    /// resolves once the run has finished and released the guard; dropping it
    /// detaches the run.
    pub fn execute(
        &self,
        session: &ControlSession,
        command: MotionCommand,
    ) -> Result<JoinHandle<MotionReport>, ControlError> {
        let method = ControlMethod::from(command.kind()).method_name();
        let (permit, driver) = match session.admit_motion(method) {
            Ok(admitted) => admitted,
            Err(e) => {
                warn!(method = %method, error = %e, "Motion command dropped");
                self.events.publish(ControlEventKind::MotionDropped {
                    method: method.to_string(),
                    reason: e.to_string(),
                });
                return Err(e);
            }
        };

        Ok(self.spawn(permit, driver, command))
    }

    /// Start an already admitted command on a blocking worker.
    pub fn spawn(
        &self,
        permit: GuardPermit,
        driver: Arc<dyn RobotDriver>,
        command: MotionCommand,
    ) -> JoinHandle<MotionReport> {
        let events = self.events.clone();

        events.publish(ControlEventKind::MotionStarted {
            kind: command.kind(),
            target: *command.target(),
        });
        info!(kind = %command.kind(), target = ?command.target(), "Motion started");

        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| drive(driver.as_ref(), &command)))
                .unwrap_or_else(|_| Err(DriverError::Runtime("robot driver panicked".to_string())));
            let elapsed = started.elapsed();
            drop(permit);

            let outcome = match result {
                Ok(()) => {
                    info!(
                        kind = %command.kind(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Motion completed"
                    );
                    events.publish(ControlEventKind::MotionCompleted {
                        kind: command.kind(),
                        target: *command.target(),
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                    MotionOutcome::Completed
                }
                Err(e) => {
                    error!(kind = %command.kind(), error = %e, "Motion failed");
                    events.publish(ControlEventKind::MotionFailed {
                        kind: command.kind(),
                        target: *command.target(),
                        error: e.to_string(),
                    });
                    MotionOutcome::Failed(e)
                }
            };

            MotionReport {
                command,
                outcome,
                elapsed,
            }
        })
    }
}

fn drive(driver: &dyn RobotDriver, command: &MotionCommand) -> Result<(), DriverError> {
    match command.kind() {
        MotionKind::JointMove => driver.move_j(command.target()),
        MotionKind::LinearMove => driver.move_l(command.target()),
        MotionKind::PoseMove => driver.move_p(command.target()),
    }
}
