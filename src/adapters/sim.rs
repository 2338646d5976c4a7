//! Simulated incubator board for hosts without GPIO or I2C.
//!
//! Provides `embedded-hal` implementations backed by one shared
//! [`SimWorld`], so the real drivers ([`Sht30`], [`RelayDriver`],
//! [`OverheatInput`]) run unchanged on a laptop:
//!
//! ```text
//!   RelayDriver ──▶ SimOutputPin ─┐
//!                                 ├──▶ SimWorld (thermal model)
//!   Sht30 ──▶ SimI2c ◀────────────┤       │ T > cutoff
//!   OverheatInput ──▶ SimInputPin ┘       ▼
//!                                   EdgeNotifier (rising edge)
//! ```
//!
//! Thermal model: each energised heater adds a fixed rate and the chamber
//! loses heat towards ambient.  One heater settles around 97 °F; both
//! together eventually open the cutoff.  The humidifier raises RH, and the
//! chamber dries out otherwise.  The model advances whenever the sensor is
//! asked for a measurement.

use std::sync::Arc;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal::i2c::{ErrorKind, ErrorType as I2cErrorType, I2c, Operation};
use log::warn;
use parking_lot::Mutex;

use crate::actuators::Channel;
use crate::drivers::overheat::OverheatInput;
use crate::drivers::relay::RelayDriver;
use crate::interlock::EdgeNotifier;
use crate::pins;
use crate::sensors::sht30::{self, Sht30};

const AMBIENT_F: f32 = 72.0;
const AMBIENT_RH: f32 = 35.0;
/// °F per second per energised heater.
const HEATER_RATE: f32 = 0.02;
/// Fraction of the chamber/ambient gap lost per second.
const LOSS_RATE: f32 = 0.0008;
const HUMIDIFIER_RATE: f32 = 0.05;
const DRYING_RATE: f32 = 0.002;
/// The thermal cutoff opens above this.
const CUTOFF_F: f32 = 104.0;

// ═══════════════════════════════════════════════════════════════
//  World state
// ═══════════════════════════════════════════════════════════════

pub struct SimWorld {
    pub temperature_f: f32,
    pub humidity_pct: f32,
    relays: [bool; Channel::COUNT],
    cutoff_open: bool,
    sensor_fault: bool,
    staged: [u8; 6],
    last_step: Instant,
    edge: Option<EdgeNotifier>,
}

impl SimWorld {
    fn step(&mut self, dt: Duration) {
        let dt = dt.as_secs_f32();
        let heaters = Channel::HEATERS
            .iter()
            .filter(|ch| self.relays[**ch as usize])
            .count() as f32;

        self.temperature_f +=
            (heaters * HEATER_RATE - (self.temperature_f - AMBIENT_F) * LOSS_RATE) * dt;

        if self.relays[Channel::Humidifier as usize] {
            self.humidity_pct += HUMIDIFIER_RATE * dt;
        } else {
            self.humidity_pct -= (self.humidity_pct - AMBIENT_RH) * DRYING_RATE * dt;
        }
        self.humidity_pct = self.humidity_pct.clamp(0.0, 100.0);

        if self.temperature_f > CUTOFF_F {
            self.set_cutoff(true);
        }
    }

    fn set_cutoff(&mut self, open: bool) {
        let rising = open && !self.cutoff_open;
        self.cutoff_open = open;
        if rising {
            warn!("SIM: thermal cutoff opened at {:.1}°F", self.temperature_f);
            if let Some(edge) = &self.edge {
                edge.notify();
            }
        }
    }

    fn stage_measurement(&mut self) {
        let celsius = (self.temperature_f - 32.0) * 5.0 / 9.0;
        let t_raw = ((celsius + 45.0) / 175.0 * 65535.0).clamp(0.0, 65535.0).round() as u16;
        let h_raw = (self.humidity_pct / 100.0 * 65535.0).clamp(0.0, 65535.0).round() as u16;
        self.staged = sht30::encode_frame(t_raw, h_raw);
    }
}

// ═══════════════════════════════════════════════════════════════
//  Board
// ═══════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct SimBoard {
    world: Arc<Mutex<SimWorld>>,
}

impl SimBoard {
    pub fn new(temperature_f: f32, humidity_pct: f32) -> Self {
        Self {
            world: Arc::new(Mutex::new(SimWorld {
                temperature_f,
                humidity_pct,
                relays: [false; Channel::COUNT],
                cutoff_open: false,
                sensor_fault: false,
                staged: [0; 6],
                last_step: Instant::now(),
                edge: None,
            })),
        }
    }

    pub fn sensor(&self) -> Sht30<SimI2c, SimDelay> {
        Sht30::new(
            SimI2c {
                world: self.world.clone(),
            },
            SimDelay,
            pins::SHT30_ADDRESS,
        )
    }

    pub fn relay(&self, channel: Channel) -> RelayDriver<SimOutputPin> {
        RelayDriver::new(
            channel,
            SimOutputPin {
                world: self.world.clone(),
                index: channel as usize,
            },
        )
    }

    pub fn overheat_input(&self) -> OverheatInput<SimInputPin> {
        OverheatInput::new(SimInputPin {
            world: self.world.clone(),
        })
    }

    /// Deliver rising edges on the cutoff line to `edge`.
    pub fn attach_edge(&self, edge: EdgeNotifier) {
        self.world.lock().edge = Some(edge);
    }

    /// Force the cutoff open or closed (fault injection).
    pub fn set_cutoff(&self, open: bool) {
        self.world.lock().set_cutoff(open);
    }

    /// Make the sensor bus fail until cleared.
    pub fn set_sensor_fault(&self, fault: bool) {
        self.world.lock().sensor_fault = fault;
    }

    pub fn relay_level(&self, channel: Channel) -> bool {
        self.world.lock().relays[channel as usize]
    }

    pub fn temperature_f(&self) -> f32 {
        self.world.lock().temperature_f
    }
}

// ═══════════════════════════════════════════════════════════════
//  embedded-hal implementations
// ═══════════════════════════════════════════════════════════════

pub struct SimOutputPin {
    world: Arc<Mutex<SimWorld>>,
    index: usize,
}

impl PinErrorType for SimOutputPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for SimOutputPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.world.lock().relays[self.index] = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.world.lock().relays[self.index] = true;
        Ok(())
    }
}

pub struct SimInputPin {
    world: Arc<Mutex<SimWorld>>,
}

impl PinErrorType for SimInputPin {
    type Error = core::convert::Infallible;
}

impl InputPin for SimInputPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.world.lock().cutoff_open)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.world.lock().cutoff_open)
    }
}

/// Answers SHT30 commands from the world model.
pub struct SimI2c {
    world: Arc<Mutex<SimWorld>>,
}

impl I2cErrorType for SimI2c {
    type Error = ErrorKind;
}

impl I2c for SimI2c {
    fn transaction(
        &mut self,
        _address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut world = self.world.lock();
        if world.sensor_fault {
            return Err(ErrorKind::Other);
        }
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if bytes.starts_with(&[0x24, 0x00]) {
                        let now = Instant::now();
                        let dt = now.saturating_duration_since(world.last_step);
                        world.last_step = now;
                        world.step(dt);
                        world.stage_measurement();
                    }
                }
                Operation::Read(buf) => {
                    let n = buf.len().min(6);
                    buf[..n].copy_from_slice(&world.staged[..n]);
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SimDelay;

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }
}
