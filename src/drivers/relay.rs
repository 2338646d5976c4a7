//! Relay coil driver (one channel of the 8-way relay board).
//!
//! Active-high: driving the pin high energises the coil and closes the
//! load circuit.  The driver is dumb; safety decisions live in the command
//! gate and the supervisor.
//!
//! ## Dual-target design
//!
//! Generic over `embedded-hal` [`OutputPin`]: a Linux GPIO line on the
//! Pi, a simulated pin on the host, a recording pin in tests.

use embedded_hal::digital::OutputPin;
use log::debug;

use crate::actuators::Channel;
use crate::app::ports::RelayPort;
use crate::error::ActuatorError;

pub struct RelayDriver<P> {
    channel: Channel,
    pin: Option<P>,
}

impl<P: OutputPin> RelayDriver<P> {
    pub fn new(channel: Channel, pin: P) -> Self {
        Self {
            channel,
            pin: Some(pin),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Give the pin back (after [`release`](RelayPort::release) this is `None`).
    pub fn into_pin(self) -> Option<P> {
        self.pin
    }
}

impl<P: OutputPin + Send> RelayPort for RelayDriver<P> {
    fn write(&mut self, on: bool) -> Result<(), ActuatorError> {
        let pin = self
            .pin
            .as_mut()
            .ok_or(ActuatorError::HardwareWrite(self.channel))?;
        let result = if on { pin.set_high() } else { pin.set_low() };
        result.map_err(|_| ActuatorError::HardwareWrite(self.channel))
    }

    /// Leave the coil de-energised and drop the pin handle.
    fn release(&mut self) {
        if let Some(mut pin) = self.pin.take() {
            let _ = pin.set_low();
            debug!("Relay {} (GPIO {}) released", self.channel, self.channel.gpio());
        }
    }
}
