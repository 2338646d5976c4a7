//! Thermal cutoff input.
//!
//! The cutoff is a normally-closed thermostat pulling the line to ground.
//! With the internal pull-up enabled, an open circuit (overheat, or a cut
//! wire) reads high.

use embedded_hal::digital::InputPin;
use log::debug;

use crate::app::ports::OverheatSignal;
use crate::error::InterlockError;

pub struct OverheatInput<P> {
    pin: Option<P>,
}

impl<P: InputPin> OverheatInput<P> {
    pub fn new(pin: P) -> Self {
        Self { pin: Some(pin) }
    }
}

impl<P: InputPin + Send> OverheatSignal for OverheatInput<P> {
    fn is_open(&mut self) -> Result<bool, InterlockError> {
        let pin = self.pin.as_mut().ok_or(InterlockError::Unavailable)?;
        pin.is_high().map_err(|_| InterlockError::ReadFailed)
    }

    fn release(&mut self) {
        if self.pin.take().is_some() {
            debug!("Overheat input released");
        }
    }
}
