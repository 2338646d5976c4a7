//! Inbound commands to the incubator core.
//!
//! These represent actions requested by the outside world (dashboard, CLI,
//! tests) that [`Incubator`](super::service::Incubator) routes through the
//! command gate.

use serde::Serialize;

use crate::actuators::Channel;
use crate::safety::SetpointKind;

/// Commands that external adapters can send into the core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Switch one relay on or off (heater-on is subject to safety vetoes).
    Actuate { channel: Channel, on: bool },

    /// Change an operator target.  `raw` is validated, not trusted.
    SetSetpoint { kind: SetpointKind, raw: String },

    /// Force every heater off, unconditionally.
    EmergencyShutdown,

    /// Reset the interlock latch once the cutoff reports clear.
    ClearInterlock,
}

/// Structured answer to every command.  Never a raw error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandReply {
    pub success: bool,
    pub message: String,
}

impl CommandReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl<E: core::fmt::Display> From<Result<String, E>> for CommandReply {
    fn from(result: Result<String, E>) -> Self {
        match result {
            Ok(msg) => Self::ok(msg),
            Err(e) => Self::fail(e.to_string()),
        }
    }
}
