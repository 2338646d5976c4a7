//! Outbound application events.
//!
//! The supervisor, the interlock and the command gate emit these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them.

use crate::actuators::Channel;
use crate::safety::SetpointKind;

use super::ports::TelemetryRecord;

/// Structured events emitted by the supervisor core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Periodic status snapshot (about once a minute).
    Telemetry(TelemetryRecord),

    /// The hardware cutoff opened and the heaters were forced off.
    InterlockTripped,

    /// An operator reset the interlock latch after the cutoff closed.
    InterlockCleared,

    /// An operator-requested emergency shutdown ran.
    EmergencyShutdown,

    /// A manual relay command was applied.
    RelayCommanded { channel: Channel, on: bool },

    /// An operator target was changed.
    SetpointChanged { kind: SetpointKind, value: f32 },

    /// The supervisor loop started.
    Started,

    /// The supervisor loop stopped and relays were released.
    Stopped,
}
