//! Named command routing.
//!
//! Maps each method name from the command channel to its session or motion
//! handler and wraps the response in a [`CommandAcknowledgement`].

use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ack::CommandAcknowledgement;
use crate::command::{ControlMethod, MotionKind};
use crate::error::ControlError;
use crate::events::ControlEventKind;
use crate::executor::{MotionExecutor, MotionReport};
use crate::session::ControlSession;
use crate::validator::CommandValidator;

/// What a dispatched command started.
#[derive(Debug)]
pub enum Dispatch {
    /// A session operation that has already completed
    Session,
    /// A motion run on a blocking worker
    Motion(JoinHandle<MotionReport>),
}

/// Routes named commands to the control session.
pub struct CommandRouter {
    session: Arc<ControlSession>,
    executor: MotionExecutor,
}

impl CommandRouter {
    /// Create a router for `session`.
    pub fn new(session: Arc<ControlSession>) -> Self {
        let executor = MotionExecutor::new(session.events().clone());
        Self { session, executor }
    }

    /// The routed session.
    pub fn session(&self) -> &Arc<ControlSession> {
        &self.session
    }

    /// Handle one command from the channel.
    ///
    /// Invalid payloads, dropped motion and driver runtime failures are
    /// logged, published on the event bus and still acknowledged.
    /// `SessionNotReady`, enable failures and unknown method names are
    /// returned as errors.
    pub async fn handle(
        &self,
        method_name: &str,
        payload: &Value,
    ) -> Result<CommandAcknowledgement, ControlError> {
        let ack = CommandAcknowledgement::now();
        let method: ControlMethod = method_name.parse()?;
        debug!(method = %method, %payload, "Handling command");

        match self.dispatch(method, payload).await {
            Ok(_) => {}
            Err(e) if e.is_surfaced() => {
                warn!(method = %method, error = %e, "Command rejected");
                return Err(e);
            }
            Err(e) => {
                warn!(method = %method, error = %e, "Command handled with error, acknowledging");
            }
        }

        info!(method = %method, response = %ack.to_json(), "Response");
        Ok(ack)
    }

    /// Run the handler for `method`.
    pub async fn dispatch(
        &self,
        method: ControlMethod,
        payload: &Value,
    ) -> Result<Dispatch, ControlError> {
        match method {
            ControlMethod::Enable => self.session.enable().await.map(|_| Dispatch::Session),
            ControlMethod::Disable => self.session.disable().await.map(|_| Dispatch::Session),
            ControlMethod::Pause => self.session.pause().await.map(|_| Dispatch::Session),
            ControlMethod::Play => self.session.play().await.map(|_| Dispatch::Session),
            ControlMethod::CloseSafetyPopup => self
                .session
                .close_safety_popup()
                .await
                .map(|_| Dispatch::Session),
            ControlMethod::UnlockProtectiveStop => self
                .session
                .unlock_protective_stop()
                .await
                .map(|_| Dispatch::Session),
            ControlMethod::MoveJ => self.motion(MotionKind::JointMove, payload),
            ControlMethod::MoveL => self.motion(MotionKind::LinearMove, payload),
            ControlMethod::MoveP => self.motion(MotionKind::PoseMove, payload),
        }
    }

    /// Tear the session down before the process exits.
    pub async fn shutdown(&self) -> Result<bool, ControlError> {
        self.session.shutdown().await
    }

    fn motion(&self, kind: MotionKind, payload: &Value) -> Result<Dispatch, ControlError> {
        let command = CommandValidator::parse(kind, payload).map_err(|e| {
            self.session
                .events()
                .publish(ControlEventKind::PayloadRejected {
                    method: ControlMethod::from(kind).method_name().to_string(),
                    reason: e.to_string(),
                });
            ControlError::InvalidPayload(e)
        })?;

        self.executor
            .execute(&self.session, command)
            .map(Dispatch::Motion)
    }
}
