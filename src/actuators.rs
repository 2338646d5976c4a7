//! Relay channels and the per-channel locked actuator bank.
//!
//! The set of channels is closed: three wired devices plus five reserved
//! relays on the same board.  Each channel is guarded by its own lock, held
//! for the whole "write GPIO → update tracked state → mirror into live
//! state" sequence, so an interlock shutdown and a concurrent manual
//! command on the same heater serialise instead of interleaving.
//!
//! ## Lock order
//!
//! channel lock → [`SharedState`] lock.  The live-state lock is only taken
//! *inside* a channel lock, never the other way round.

use core::fmt;
use core::str::FromStr;

use log::{error, info};
use parking_lot::Mutex;
use serde::Serialize;

use crate::app::ports::RelayPort;
use crate::error::{ActuatorError, Error, SafetyVeto, ValidationError};
use crate::pins;
use crate::state::SharedState;

// ---------------------------------------------------------------------------
// Channel identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Channel {
    Heater1 = 0,
    Heater2 = 1,
    Humidifier = 2,
    Relay4 = 3,
    Relay5 = 4,
    Relay6 = 5,
    Relay7 = 6,
    Relay8 = 7,
}

impl Channel {
    pub const COUNT: usize = 8;

    pub const ALL: [Channel; Self::COUNT] = [
        Self::Heater1,
        Self::Heater2,
        Self::Humidifier,
        Self::Relay4,
        Self::Relay5,
        Self::Relay6,
        Self::Relay7,
        Self::Relay8,
    ];

    pub const HEATERS: [Channel; 2] = [Self::Heater1, Self::Heater2];

    /// Channels mirrored into live state and addressable by operators.
    pub const WIRED: [Channel; 3] = [Self::Heater1, Self::Heater2, Self::Humidifier];

    pub const fn gpio(self) -> u8 {
        match self {
            Self::Heater1 => pins::HEATER1_GPIO,
            Self::Heater2 => pins::HEATER2_GPIO,
            Self::Humidifier => pins::HUMIDIFIER_GPIO,
            Self::Relay4 => pins::RELAY4_GPIO,
            Self::Relay5 => pins::RELAY5_GPIO,
            Self::Relay6 => pins::RELAY6_GPIO,
            Self::Relay7 => pins::RELAY7_GPIO,
            Self::Relay8 => pins::RELAY8_GPIO,
        }
    }

    pub const fn is_heater(self) -> bool {
        matches!(self, Self::Heater1 | Self::Heater2)
    }

    pub const fn is_wired(self) -> bool {
        matches!(self, Self::Heater1 | Self::Heater2 | Self::Humidifier)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Heater1 => "heater1",
            Self::Heater2 => "heater2",
            Self::Humidifier => "humidifier",
            Self::Relay4 => "relay4",
            Self::Relay5 => "relay5",
            Self::Relay6 => "relay6",
            Self::Relay7 => "relay7",
            Self::Relay8 => "relay8",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ch| ch.name() == s)
            .ok_or_else(|| ValidationError::UnknownChannel(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// One channel
// ---------------------------------------------------------------------------

/// A relay plus its last-known-good state.
///
/// `on` only changes after the driver confirms the write, so a failed write
/// leaves the tracked state describing what the hardware last accepted.
pub struct ActuatorChannel {
    channel: Channel,
    driver: Box<dyn RelayPort>,
    on: bool,
}

impl ActuatorChannel {
    fn new(channel: Channel, driver: Box<dyn RelayPort>) -> Self {
        Self {
            channel,
            driver,
            on: false,
        }
    }

    fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        if let Err(e) = self.driver.write(on) {
            error!("Relay {} (GPIO {}) write failed: {}", self.channel, self.channel.gpio(), e);
            return Err(e);
        }
        self.on = on;
        info!(
            "Relay {} turned {} (GPIO {})",
            self.channel,
            if on { "ON" } else { "OFF" },
            self.channel.gpio()
        );
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}

// ---------------------------------------------------------------------------
// Bank
// ---------------------------------------------------------------------------

/// All eight relays, each behind its own lock.
pub struct ActuatorBank {
    channels: [Mutex<ActuatorChannel>; Channel::COUNT],
}

impl ActuatorBank {
    /// Build the bank from one driver per channel and drive every relay OFF.
    ///
    /// A relay that refuses the initial OFF is logged; its tracked state is
    /// still `false` because that is the board's power-on level.
    pub fn new(mut driver_for: impl FnMut(Channel) -> Box<dyn RelayPort>) -> Self {
        let channels = Channel::ALL.map(|ch| {
            let mut actuator = ActuatorChannel::new(ch, driver_for(ch));
            if let Err(e) = actuator.driver.write(false) {
                error!("Relay {} initial OFF failed: {}", ch, e);
            }
            Mutex::new(actuator)
        });
        info!("Relay bank initialised with all relays OFF");
        Self { channels }
    }

    /// Authoritative tracked state of one channel.
    pub fn get(&self, channel: Channel) -> bool {
        self.channels[channel.index()].lock().is_on()
    }

    /// Drive one channel.  Does not touch live state.
    pub fn set(&self, channel: Channel, on: bool) -> Result<(), ActuatorError> {
        self.channels[channel.index()].lock().set(on)
    }

    /// Drive one channel and, under the same channel lock, mirror its
    /// resulting state into `state`.  The mirror happens on failure too, so
    /// live state always reflects what the hardware last accepted.
    pub fn set_and_mirror(
        &self,
        channel: Channel,
        on: bool,
        state: &SharedState,
    ) -> Result<bool, ActuatorError> {
        let mut actuator = self.channels[channel.index()].lock();
        let result = actuator.set(on);
        state.set_relay_flag(channel, actuator.is_on());
        result.map(|()| actuator.is_on())
    }

    /// Like [`set_and_mirror`](Self::set_and_mirror), but `guard` is
    /// evaluated with the channel lock held and the write only happens if
    /// it passes.  A shutdown that raises its veto before taking the
    /// channel lock is therefore either seen by `guard` or runs after this
    /// write and undoes it.
    pub fn set_and_mirror_guarded(
        &self,
        channel: Channel,
        on: bool,
        state: &SharedState,
        guard: impl FnOnce() -> Result<(), SafetyVeto>,
    ) -> Result<bool, Error> {
        let mut actuator = self.channels[channel.index()].lock();
        guard()?;
        let result = actuator.set(on);
        state.set_relay_flag(channel, actuator.is_on());
        result.map(|()| actuator.is_on()).map_err(Into::into)
    }

    /// Copy one channel's tracked state into `state`.
    pub fn mirror(&self, channel: Channel, state: &SharedState) -> bool {
        let actuator = self.channels[channel.index()].lock();
        state.set_relay_flag(channel, actuator.is_on());
        actuator.is_on()
    }

    /// Force every channel in `channels` OFF.  Every channel is attempted
    /// even if an earlier one fails; the first failure is returned.
    pub fn force_off(
        &self,
        channels: &[Channel],
        state: Option<&SharedState>,
    ) -> Result<(), ActuatorError> {
        let mut first_err = None;
        for &ch in channels {
            let result = match state {
                Some(state) => self.set_and_mirror(ch, false, state).map(|_| ()),
                None => self.set(ch, false),
            };
            if let Err(e) = result {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Both heaters OFF.
    pub fn heaters_off(&self, state: Option<&SharedState>) -> Result<(), ActuatorError> {
        self.force_off(&Channel::HEATERS, state)
    }

    /// Every relay OFF, then release the pins.  Used at shutdown; failures
    /// are logged and swallowed since the process is exiting.
    pub fn shutdown(&self, state: Option<&SharedState>) {
        if let Err(e) = self.force_off(&Channel::ALL, state) {
            error!("Relay shutdown incomplete: {}", e);
        }
        for slot in &self.channels {
            slot.lock().driver.release();
        }
        info!("All relays turned OFF and released");
    }
}
