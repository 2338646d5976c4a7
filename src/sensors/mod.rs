//! Sensor subsystem.
//!
//! Only one physical sensor exists: an SHT30 on I2C.  The supervisor sees
//! it through [`SensorPort`](crate::app::ports::SensorPort) and never
//! touches the bus itself.

pub mod sht30;

use serde::Serialize;

/// One successful measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub temperature_f: f32,
    pub humidity_pct: f32,
}

impl Reading {
    pub const fn new(temperature_f: f32, humidity_pct: f32) -> Self {
        Self {
            temperature_f,
            humidity_pct,
        }
    }
}
