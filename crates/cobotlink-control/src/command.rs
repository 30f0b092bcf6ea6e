//! Command data structures.
//!
//! Defines the named control methods accepted from the cloud channel and the
//! validated motion command handed to the executor.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Number of components in every motion target.
pub const TARGET_LEN: usize = 6;

/// Kind of move requested from the robot driver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MotionKind {
    /// Joint-space move (`movej`)
    JointMove,
    /// Linear tool-space move (`movel`)
    LinearMove,
    /// Process move to a pose (`movep`)
    PoseMove,
}

impl MotionKind {
    /// Get the kind name used in logs and events.
    pub fn type_name(&self) -> &'static str {
        match self {
            MotionKind::JointMove => "joint_move",
            MotionKind::LinearMove => "linear_move",
            MotionKind::PoseMove => "pose_move",
        }
    }
}

impl std::fmt::Display for MotionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A validated motion request.
///
/// Only [`crate::validator::CommandValidator`] constructs these, so `target`
/// always holds exactly six finite components.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotionCommand {
    kind: MotionKind,
    target: [f64; TARGET_LEN],
    issued_at: DateTime<Utc>,
}

impl MotionCommand {
    pub(crate) fn new(kind: MotionKind, target: [f64; TARGET_LEN]) -> Self {
        Self {
            kind,
            target,
            issued_at: Utc::now(),
        }
    }

    /// Kind of move.
    pub fn kind(&self) -> MotionKind {
        self.kind
    }

    /// Target vector consumed opaquely by the driver.
    pub fn target(&self) -> &[f64; TARGET_LEN] {
        &self.target
    }

    /// When the command was validated.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }
}

/// Named commands delivered by the cloud command channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ControlMethod {
    Enable,
    Disable,
    Pause,
    Play,
    MoveJ,
    MoveL,
    MoveP,
    CloseSafetyPopup,
    UnlockProtectiveStop,
}

impl ControlMethod {
    /// Every method the router accepts.
    pub const ALL: [ControlMethod; 9] = [
        ControlMethod::Enable,
        ControlMethod::Disable,
        ControlMethod::Pause,
        ControlMethod::Play,
        ControlMethod::MoveJ,
        ControlMethod::MoveL,
        ControlMethod::MoveP,
        ControlMethod::CloseSafetyPopup,
        ControlMethod::UnlockProtectiveStop,
    ];

    /// Method name as it appears on the wire.
    pub fn method_name(&self) -> &'static str {
        match self {
            ControlMethod::Enable => "EnableControlCommand",
            ControlMethod::Disable => "DisableControlCommand",
            ControlMethod::Pause => "PauseControlCommand",
            ControlMethod::Play => "PlayControlCommand",
            ControlMethod::MoveJ => "MoveJControlCommand",
            ControlMethod::MoveL => "MoveLControlCommand",
            ControlMethod::MoveP => "MovePControlCommand",
            ControlMethod::CloseSafetyPopup => "CloseSafetyPopupControlCommand",
            ControlMethod::UnlockProtectiveStop => "UnlockProtectiveStopControlCommand",
        }
    }

    /// Motion kind for move methods, `None` for session methods.
    pub fn motion_kind(&self) -> Option<MotionKind> {
        match self {
            ControlMethod::MoveJ => Some(MotionKind::JointMove),
            ControlMethod::MoveL => Some(MotionKind::LinearMove),
            ControlMethod::MoveP => Some(MotionKind::PoseMove),
            _ => None,
        }
    }

    /// Check if this is a motion method.
    pub fn is_motion(&self) -> bool {
        self.motion_kind().is_some()
    }
}

impl From<MotionKind> for ControlMethod {
    fn from(kind: MotionKind) -> Self {
        match kind {
            MotionKind::JointMove => ControlMethod::MoveJ,
            MotionKind::LinearMove => ControlMethod::MoveL,
            MotionKind::PoseMove => ControlMethod::MoveP,
        }
    }
}

impl FromStr for ControlMethod {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControlMethod::ALL
            .into_iter()
            .find(|m| m.method_name() == s)
            .ok_or_else(|| ControlError::UnknownMethod(s.to_string()))
    }
}

impl std::fmt::Display for ControlMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.method_name())
    }
}
