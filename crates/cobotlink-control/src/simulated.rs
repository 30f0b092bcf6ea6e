//! In-process simulated robot driver.
//!
//! Stands in for the hardware driver when none is linked. Each move sleeps
//! for a fixed duration. The driver records recent calls and the peak number
//! of moves running at once, which is what the single-flight tests assert on.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::command::{MotionKind, TARGET_LEN};
use crate::driver::{DriverConnector, DriverError, RobotDriver};

/// Calls kept in a driver's log; older ones are discarded.
pub const CALL_LOG_CAPACITY: usize = 1024;

/// A call received by the simulated driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    ResetError,
    Move {
        kind: MotionKind,
        target: [f64; TARGET_LEN],
    },
    Pause,
    Play,
    CloseSafetyPopup,
    UnlockProtectiveStop,
    Close,
}

/// Simulated driver handle.
#[derive(Debug)]
pub struct SimulatedDriver {
    move_duration: Duration,
    fail_moves: AtomicBool,
    closed: AtomicBool,
    active_moves: AtomicUsize,
    peak_moves: AtomicUsize,
    completed_moves: AtomicUsize,
    calls: Mutex<VecDeque<DriverCall>>,
}

impl SimulatedDriver {
    /// Create a driver whose moves take `move_duration`.
    pub fn new(move_duration: Duration) -> Self {
        Self {
            move_duration,
            fail_moves: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            active_moves: AtomicUsize::new(0),
            peak_moves: AtomicUsize::new(0),
            completed_moves: AtomicUsize::new(0),
            calls: Mutex::new(VecDeque::new()),
        }
    }

    /// Make every following move fail with a runtime error.
    pub fn set_fail_moves(&self, fail: bool) {
        self.fail_moves.store(fail, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Moves running right now.
    pub fn active_moves(&self) -> usize {
        self.active_moves.load(Ordering::SeqCst)
    }

    /// Highest number of moves that ever ran at the same time.
    pub fn peak_moves(&self) -> usize {
        self.peak_moves.load(Ordering::SeqCst)
    }

    /// Moves that ran to the end without failing.
    pub fn completed_moves(&self) -> usize {
        self.completed_moves.load(Ordering::SeqCst)
    }

    /// The last [`CALL_LOG_CAPACITY`] calls, oldest first.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().iter().cloned().collect()
    }

    /// Targets of the moves still in the call log, in order.
    pub fn move_targets(&self) -> Vec<[f64; TARGET_LEN]> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DriverCall::Move { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: DriverCall) -> Result<(), DriverError> {
        debug!(?call, "Simulated driver call");
        let closed = self.is_closed();
        {
            let mut calls = self.calls.lock();
            if calls.len() == CALL_LOG_CAPACITY {
                calls.pop_front();
            }
            calls.push_back(call);
        }
        if closed {
            return Err(DriverError::Closed);
        }
        Ok(())
    }

    fn simulate_move(&self, kind: MotionKind, target: &[f64; TARGET_LEN]) -> Result<(), DriverError> {
        self.record(DriverCall::Move {
            kind,
            target: *target,
        })?;

        let active = self.active_moves.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_moves.fetch_max(active, Ordering::SeqCst);
        std::thread::sleep(self.move_duration);
        self.active_moves.fetch_sub(1, Ordering::SeqCst);

        if self.fail_moves.load(Ordering::SeqCst) {
            return Err(DriverError::Runtime(format!("simulated {} failure", kind)));
        }
        self.completed_moves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl RobotDriver for SimulatedDriver {
    fn reset_error(&self) -> Result<(), DriverError> {
        self.record(DriverCall::ResetError)
    }

    fn move_j(&self, target: &[f64; TARGET_LEN]) -> Result<(), DriverError> {
        self.simulate_move(MotionKind::JointMove, target)
    }

    fn move_l(&self, target: &[f64; TARGET_LEN]) -> Result<(), DriverError> {
        self.simulate_move(MotionKind::LinearMove, target)
    }

    fn move_p(&self, target: &[f64; TARGET_LEN]) -> Result<(), DriverError> {
        self.simulate_move(MotionKind::PoseMove, target)
    }

    fn pause(&self) -> Result<(), DriverError> {
        self.record(DriverCall::Pause)
    }

    fn play(&self) -> Result<(), DriverError> {
        self.record(DriverCall::Play)
    }

    fn close_safety_popup(&self) -> Result<(), DriverError> {
        self.record(DriverCall::CloseSafetyPopup)
    }

    fn unlock_protective_stop(&self) -> Result<(), DriverError> {
        self.record(DriverCall::UnlockProtectiveStop)
    }

    fn close(&self) -> Result<(), DriverError> {
        self.record(DriverCall::Close)?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out [`SimulatedDriver`]s.
#[derive(Debug)]
pub struct SimulatedConnector {
    host: String,
    move_duration: Duration,
    fail_connect: AtomicBool,
    connections: AtomicUsize,
    last_driver: Mutex<Option<Arc<SimulatedDriver>>>,
}

impl SimulatedConnector {
    pub fn new(host: impl Into<String>, move_duration: Duration) -> Self {
        Self {
            host: host.into(),
            move_duration,
            fail_connect: AtomicBool::new(false),
            connections: AtomicUsize::new(0),
            last_driver: Mutex::new(None),
        }
    }

    /// Make following connection attempts fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Number of driver handles opened so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Most recently opened driver handle. Earlier handles are not retained.
    pub fn last_driver(&self) -> Option<Arc<SimulatedDriver>> {
        self.last_driver.lock().clone()
    }
}

impl DriverConnector for SimulatedConnector {
    fn connect(&self) -> Result<Arc<dyn RobotDriver>, DriverError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(DriverError::ConnectionFailed(format!(
                "simulated controller at {} unreachable",
                self.host
            )));
        }

        let driver = Arc::new(SimulatedDriver::new(self.move_duration));
        *self.last_driver.lock() = Some(driver.clone());
        self.connections.fetch_add(1, Ordering::SeqCst);
        debug!(host = %self.host, "Simulated driver connected");
        Ok(driver)
    }
}
