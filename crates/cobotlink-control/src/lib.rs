//! Control core for a remotely commanded collaborative robot arm.
//!
//! Provides:
//! - Motion command data structures and payload validation
//! - A single-flight execution guard for the physical actuator
//! - Blocking motion execution bridged off the command-reception loop
//! - The enable/pause/play/disable control session state machine
//! - Named command routing and acknowledgements
//! - A control event bus for observing outcomes

pub mod ack;
pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod executor;
pub mod guard;
pub mod router;
pub mod session;
pub mod simulated;
pub mod validator;

// Re-exports
pub use ack::CommandAcknowledgement;

pub use command::{ControlMethod, MotionCommand, MotionKind, TARGET_LEN};

pub use config::ControlConfig;

pub use driver::{DriverConnector, DriverError, RobotDriver};

pub use error::ControlError;

pub use events::{ControlEvent, ControlEventBus, ControlEventKind, EventFilter, FilteredSubscriber};

pub use executor::{MotionExecutor, MotionOutcome, MotionReport};

pub use guard::{ExecutionGuard, GuardPermit};

pub use router::{CommandRouter, Dispatch};

pub use session::{ControlSession, SessionState};

pub use simulated::{DriverCall, SimulatedConnector, SimulatedDriver};

pub use validator::{CommandValidator, PayloadError};
