//! Command gate: authorisation of manual actuation and setpoint changes.
//!
//! Every operator request passes through here before it reaches a relay
//! or the live state.  Heater-on requests are checked against two hard
//! vetoes (overheat, stale sensor); emergency shutdown bypasses all
//! checks.

use std::sync::Arc;

use log::{info, warn};

use crate::actuators::{ActuatorBank, Channel};
use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink};
use crate::error::{Error, ValidationError};
use crate::interlock::OverheatInterlock;
use crate::safety::{self, SetpointKind};
use crate::state::SharedState;

pub struct CommandGate {
    state: Arc<SharedState>,
    bank: Arc<ActuatorBank>,
    interlock: Arc<OverheatInterlock>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    stale_after: chrono::Duration,
}

impl CommandGate {
    pub fn new(
        state: Arc<SharedState>,
        bank: Arc<ActuatorBank>,
        interlock: Arc<OverheatInterlock>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
        stale_after: chrono::Duration,
    ) -> Self {
        Self {
            state,
            bank,
            interlock,
            sink,
            clock,
            stale_after,
        }
    }

    /// Switch one operator-addressable relay.
    ///
    /// On success returns the relay's confirmed state.  Whatever happens at
    /// the hardware, the channel's live-state flag is resynced from the
    /// actuator before this returns.
    ///
    /// Heater-on vetoes are evaluated with the channel lock held, so a
    /// request cannot switch a heater back on after an interlock trip has
    /// forced it off.
    pub fn request_actuation(&self, channel: Channel, on: bool) -> Result<bool, Error> {
        if !channel.is_wired() {
            return Err(ValidationError::UnknownChannel(channel.to_string()).into());
        }

        let now = self.clock.now();
        let confirmed = self.bank.set_and_mirror_guarded(channel, on, &self.state, || {
            if !(on && channel.is_heater()) {
                return Ok(());
            }
            let overheat = self.state.is_overheat() || self.interlock.is_latched();
            safety::check_heater_enable(overheat, self.state.last_updated(), now, self.stale_after)
        })?;
        info!("Turned {} {}", if on { "ON" } else { "OFF" }, channel);
        self.sink.emit(&AppEvent::RelayCommanded {
            channel,
            on: confirmed,
        });
        Ok(confirmed)
    }

    /// Validate `raw` for `kind` and store it.  Rejected input leaves the
    /// target untouched.
    pub fn update_setpoint(&self, kind: SetpointKind, raw: &str) -> Result<f32, Error> {
        let value = kind.validate(raw).inspect_err(|e| warn!("Setpoint rejected: {}", e))?;
        self.state.set_target(kind, value);
        info!("{} target updated to {}{}", kind, value, kind.unit());
        self.sink.emit(&AppEvent::SetpointChanged { kind, value });
        Ok(value)
    }

    /// Both heaters OFF, unconditionally.  Hardware failures are logged
    /// and returned, but every heater is still attempted.
    pub fn emergency_shutdown(&self) -> Result<(), Error> {
        warn!("EMERGENCY SHUTDOWN triggered by user");
        let result = self.interlock.emergency_shutdown();
        self.sink.emit(&AppEvent::EmergencyShutdown);
        result.map_err(Into::into)
    }

    /// Reset the interlock latch if the cutoff has closed again.
    pub fn clear_interlock(&self) -> bool {
        self.interlock.clear()
    }
}
