//! Sensirion SHT30 temperature / humidity sensor.
//!
//! Single-shot, high-repeatability measurements over I2C:
//!
//! 1. write command `0x2400` (clock stretching disabled),
//! 2. wait ≥ 15 ms,
//! 3. read 6 bytes: `T_msb T_lsb T_crc RH_msb RH_lsb RH_crc`.
//!
//! Each 16-bit word carries a CRC-8 (poly `0x31`, init `0xFF`).  A CRC
//! mismatch is a typed [`SensorError::Checksum`]; a reading outside the
//! physically plausible window is clamped and logged instead of rejected.
//!
//! The driver is generic over `embedded-hal` 1.0 [`I2c`] and [`DelayNs`],
//! so the same code runs on a Linux I2C bus, the simulated board, or a
//! test double.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{error, info, warn};

use crate::app::ports::SensorPort;
use crate::error::SensorError;

use super::Reading;

const CMD_SOFT_RESET: u16 = 0x30A2;
const CMD_MEASURE_HIGH_REPEATABILITY: u16 = 0x2400;

const RESET_WAIT_MS: u32 = 50;
const MEASURE_WAIT_MS: u32 = 20;

const CRC_POLY: u8 = 0x31;
const CRC_INIT: u8 = 0xFF;

/// Plausible window; values outside are clamped.
const MIN_TEMP_F: f32 = 32.0;
const MAX_TEMP_F: f32 = 212.0;
const MIN_RH: f32 = 0.0;
const MAX_RH: f32 = 100.0;

pub struct Sht30<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
    initialized: bool,
}

impl<I2C: I2c, D: DelayNs> Sht30<I2C, D> {
    /// Soft-reset the sensor.  A failed reset leaves the driver
    /// uninitialised; every later read then fails with
    /// [`SensorError::NotInitialized`] until [`reset`](Self::reset) succeeds.
    pub fn new(i2c: I2C, delay: D, address: u8) -> Self {
        let mut sensor = Self {
            i2c,
            delay,
            address,
            initialized: false,
        };
        match sensor.reset() {
            Ok(()) => info!("SHT30 sensor initialized at 0x{:02X}", address),
            Err(e) => error!("Error initializing SHT30 sensor: {}", e),
        }
        sensor
    }

    pub fn reset(&mut self) -> Result<(), SensorError> {
        self.send_command(CMD_SOFT_RESET)?;
        self.delay.delay_ms(RESET_WAIT_MS);
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// One measurement, converted to °F / %RH and rounded to 0.1.
    pub fn measure(&mut self) -> Result<Reading, SensorError> {
        if !self.initialized {
            return Err(SensorError::NotInitialized);
        }
        self.send_command(CMD_MEASURE_HIGH_REPEATABILITY)?;
        self.delay.delay_ms(MEASURE_WAIT_MS);

        let mut frame = [0u8; 6];
        self.i2c
            .read(self.address, &mut frame)
            .map_err(|_| SensorError::Bus)?;
        decode_frame(&frame)
    }

    fn send_command(&mut self, cmd: u16) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &cmd.to_be_bytes())
            .map_err(|_| SensorError::Bus)
    }
}

impl<I2C, D> SensorPort for Sht30<I2C, D>
where
    I2C: I2c + Send,
    D: DelayNs + Send,
{
    fn read(&mut self) -> Result<Reading, SensorError> {
        self.measure().inspect_err(|e| error!("Error reading SHT30 sensor: {}", e))
    }
}

/// CRC-8 as specified by Sensirion for every measurement word.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = CRC_INIT;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// Verify and convert a raw 6-byte measurement frame.
pub fn decode_frame(frame: &[u8; 6]) -> Result<Reading, SensorError> {
    let (t_word, t_crc) = (&frame[0..2], frame[2]);
    let (h_word, h_crc) = (&frame[3..5], frame[5]);

    if crc8(t_word) != t_crc || crc8(h_word) != h_crc {
        warn!(
            "CRC checksum failed: T {:02X}!={:02X} or RH {:02X}!={:02X}",
            t_crc,
            crc8(t_word),
            h_crc,
            crc8(h_word)
        );
        return Err(SensorError::Checksum);
    }

    let t_raw = u16::from_be_bytes([frame[0], frame[1]]) as f32;
    let h_raw = u16::from_be_bytes([frame[3], frame[4]]) as f32;

    let celsius = -45.0 + 175.0 * t_raw / 65535.0;
    let mut temperature_f = round1(celsius * 9.0 / 5.0 + 32.0);
    let mut humidity_pct = round1(100.0 * h_raw / 65535.0);

    if !(MIN_TEMP_F..=MAX_TEMP_F).contains(&temperature_f)
        || !(MIN_RH..=MAX_RH).contains(&humidity_pct)
    {
        warn!(
            "Sensor returned suspicious values: Temp={}°F, Humidity={}%",
            temperature_f, humidity_pct
        );
        temperature_f = temperature_f.clamp(MIN_TEMP_F, MAX_TEMP_F);
        humidity_pct = humidity_pct.clamp(MIN_RH, MAX_RH);
    }

    Ok(Reading::new(temperature_f, humidity_pct))
}

/// Build a frame with valid CRCs from raw words (simulation and tests).
pub fn encode_frame(t_raw: u16, h_raw: u16) -> [u8; 6] {
    let t = t_raw.to_be_bytes();
    let h = h_raw.to_be_bytes();
    [t[0], t[1], crc8(&t), h[0], h[1], crc8(&h)]
}

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}
