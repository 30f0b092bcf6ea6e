//! Control session state machine.
//!
//! The session owns the robot driver handle and the execution guard.
//!
//! ```text
//! Uninitialized --enable--> Enabled <--pause/play--> Paused
//!        Disabled <--disable-- Enabled | Paused
//!        Disabled --enable--> Enabled
//! ```
//!
//! Session operations are serialized with an async mutex, so two transitions
//! never interleave. Motion admission does not take that mutex; it only goes
//! through the guard, which lets `disable` wait for an in-flight run while
//! holding the transition lock.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::driver::{DriverConnector, DriverError, RobotDriver};
use crate::error::ControlError;
use crate::events::{ControlEventBus, ControlEventKind};
use crate::guard::{ExecutionGuard, GuardPermit};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Uninitialized,
    Enabled,
    Paused,
    Disabled,
}

impl SessionState {
    /// Check if a driver handle is held in this state.
    pub fn has_driver(&self) -> bool {
        matches!(self, SessionState::Enabled | SessionState::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Enabled => "enabled",
            SessionState::Paused => "paused",
            SessionState::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// `driver` is `Some` exactly when `state.has_driver()`; both change under one
// write lock.
struct Inner {
    state: SessionState,
    driver: Option<Arc<dyn RobotDriver>>,
}

/// Control session for one robot arm.
pub struct ControlSession {
    inner: RwLock<Inner>,
    transitions: Mutex<()>,
    guard: Arc<ExecutionGuard>,
    connector: Arc<dyn DriverConnector>,
    events: Arc<ControlEventBus>,
}

impl ControlSession {
    /// Create an uninitialized session that will open driver handles through
    /// `connector`.
    pub fn new(connector: Arc<dyn DriverConnector>, events: Arc<ControlEventBus>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                state: SessionState::Uninitialized,
                driver: None,
            }),
            transitions: Mutex::new(()),
            guard: Arc::new(ExecutionGuard::new()),
            connector,
            events,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.inner.read().state
    }

    /// Check if a driver handle is currently held.
    pub fn has_driver(&self) -> bool {
        self.inner.read().driver.is_some()
    }

    /// The guard protecting the actuator.
    pub fn guard(&self) -> &Arc<ExecutionGuard> {
        &self.guard
    }

    /// Event bus this session publishes to.
    pub fn events(&self) -> &Arc<ControlEventBus> {
        &self.events
    }

    /// Acquire a fresh driver handle and start admitting motion.
    ///
    /// Valid from `Uninitialized` and `Disabled`.
    pub async fn enable(&self) -> Result<(), ControlError> {
        let _transition = self.transitions.lock().await;
        let state = self.state();
        if !matches!(state, SessionState::Uninitialized | SessionState::Disabled) {
            return Err(not_ready("enable", state));
        }

        info!(%state, "Enable starting");
        let connector = self.connector.clone();
        let driver = run_blocking(move || {
            let driver = connector.connect()?;
            if let Err(e) = driver.reset_error() {
                if let Err(close_err) = driver.close() {
                    warn!(error = %close_err, "Failed to close driver after reset failure");
                }
                return Err(e);
            }
            Ok(driver)
        })
        .await
        .map_err(ControlError::DriverUnavailable)?;

        {
            let mut inner = self.inner.write();
            inner.driver = Some(driver);
            inner.state = SessionState::Enabled;
        }
        self.guard.open();
        self.events.publish(ControlEventKind::SessionEnabled);
        info!("Enable executed");
        Ok(())
    }

    /// Stop admitting motion, wait for any in-flight run to finish, then
    /// close and release the driver handle.
    ///
    /// Valid from `Enabled` and `Paused`.
    pub async fn disable(&self) -> Result<(), ControlError> {
        let _transition = self.transitions.lock().await;
        let state = self.state();
        if !state.has_driver() {
            return Err(not_ready("disable", state));
        }

        info!(%state, "Disable starting");
        self.guard.close();
        if self.guard.is_held() {
            info!("Waiting for in-flight motion before releasing driver");
        }
        self.guard.wait_idle().await;

        let driver = {
            let mut inner = self.inner.write();
            inner.state = SessionState::Disabled;
            inner.driver.take()
        };
        if let Some(driver) = driver {
            if let Err(e) = run_blocking(move || driver.close()).await {
                warn!(error = %e, "Driver close reported an error, handle released anyway");
            }
        }

        self.events.publish(ControlEventKind::SessionDisabled);
        info!("Disable executed");
        Ok(())
    }

    /// Pause motion output and stop admitting new motion. A run already in
    /// flight is not interrupted.
    ///
    /// Valid from `Enabled`.
    pub async fn pause(&self) -> Result<(), ControlError> {
        let _transition = self.transitions.lock().await;
        let driver = self.driver_in("pause", &[SessionState::Enabled])?;

        info!("Pause starting");
        self.guard.close();
        if let Err(e) = run_blocking(move || driver.pause()).await {
            self.guard.open();
            return Err(ControlError::DriverRuntimeFailure(e));
        }

        self.inner.write().state = SessionState::Paused;
        self.events.publish(ControlEventKind::SessionPaused);
        info!(in_flight = self.guard.is_held(), "Pause executed");
        Ok(())
    }

    /// Resume motion output and admit motion again.
    ///
    /// Valid from `Paused`.
    pub async fn play(&self) -> Result<(), ControlError> {
        let _transition = self.transitions.lock().await;
        let driver = self.driver_in("play", &[SessionState::Paused])?;

        info!("Play starting");
        run_blocking(move || driver.play())
            .await
            .map_err(ControlError::DriverRuntimeFailure)?;

        self.inner.write().state = SessionState::Enabled;
        self.guard.open();
        self.events.publish(ControlEventKind::SessionResumed);
        info!("Play executed");
        Ok(())
    }

    /// Dismiss the safety popup on the teach pendant and re-admit motion.
    /// Does not change the session state.
    pub async fn close_safety_popup(&self) -> Result<(), ControlError> {
        let _transition = self.transitions.lock().await;
        let driver = self.driver_in(
            "close_safety_popup",
            &[SessionState::Enabled, SessionState::Paused],
        )?;

        info!("Close safety popup starting");
        run_blocking(move || driver.close_safety_popup())
            .await
            .map_err(ControlError::DriverRuntimeFailure)?;

        self.guard.open();
        self.events.publish(ControlEventKind::SafetyPopupClosed);
        info!("Close safety popup executed");
        Ok(())
    }

    /// Release a protective stop and re-admit motion. Does not change the
    /// session state.
    pub async fn unlock_protective_stop(&self) -> Result<(), ControlError> {
        let _transition = self.transitions.lock().await;
        let driver = self.driver_in(
            "unlock_protective_stop",
            &[SessionState::Enabled, SessionState::Paused],
        )?;

        info!("Unlock protective stop starting");
        run_blocking(move || driver.unlock_protective_stop())
            .await
            .map_err(ControlError::DriverRuntimeFailure)?;

        self.guard.open();
        self.events.publish(ControlEventKind::ProtectiveStopUnlocked);
        info!("Unlock protective stop executed");
        Ok(())
    }

    /// Disable the session if it holds a driver handle. Returns whether a
    /// teardown happened.
    pub async fn shutdown(&self) -> Result<bool, ControlError> {
        if !self.state().has_driver() {
            debug!(state = %self.state(), "Shutdown with no driver handle");
            return Ok(false);
        }
        match self.disable().await {
            Ok(()) => Ok(true),
            // Another task disabled the session first
            Err(ControlError::SessionNotReady { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Take the guard for one motion run and hand out the driver handle.
    pub(crate) fn admit_motion(
        &self,
        method: &'static str,
    ) -> Result<(GuardPermit, Arc<dyn RobotDriver>), ControlError> {
        let Some(permit) = self.guard.try_permit() else {
            let state = self.state();
            return Err(if state.has_driver() {
                ControlError::GuardBusy { method }
            } else {
                not_ready(method, state)
            });
        };

        // Holding the permit keeps `disable` from releasing the handle.
        let inner = self.inner.read();
        match &inner.driver {
            Some(driver) => Ok((permit, driver.clone())),
            None => Err(not_ready(method, inner.state)),
        }
    }

    fn driver_in(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<Arc<dyn RobotDriver>, ControlError> {
        let inner = self.inner.read();
        match &inner.driver {
            Some(driver) if allowed.contains(&inner.state) => Ok(driver.clone()),
            _ => Err(not_ready(operation, inner.state)),
        }
    }
}

fn not_ready(operation: &'static str, state: SessionState) -> ControlError {
    ControlError::SessionNotReady { operation, state }
}

/// Run a blocking driver call off the reception loop.
async fn run_blocking<T, F>(f: F) -> Result<T, DriverError>
where
    F: FnOnce() -> Result<T, DriverError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(DriverError::Runtime(format!("driver worker failed: {}", e))))
}
