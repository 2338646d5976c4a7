//! GPIO / bus assignments for the incubator relay HAT and sensors.
//!
//! Single source of truth: the relay bank and the drivers reference this
//! module rather than hard-coding BCM numbers.

// ---------------------------------------------------------------------------
// 8-channel relay board (active HIGH: GPIO high = relay energised)
// ---------------------------------------------------------------------------

pub const HEATER1_GPIO: u8 = 17;
pub const HEATER2_GPIO: u8 = 18;
pub const HUMIDIFIER_GPIO: u8 = 27;

// Reserved for future devices, driven OFF at start and shutdown.
pub const RELAY4_GPIO: u8 = 22;
pub const RELAY5_GPIO: u8 = 23;
pub const RELAY6_GPIO: u8 = 24;
pub const RELAY7_GPIO: u8 = 25;
pub const RELAY8_GPIO: u8 = 4;

// ---------------------------------------------------------------------------
// Overheat cutoff
// ---------------------------------------------------------------------------

/// Digital input with pull-up.  The thermal cutoff circuit is normally
/// closed (reads LOW); an overheat opens it and the pin reads HIGH.
pub const OVERHEAT_GPIO: u8 = 26;

// ---------------------------------------------------------------------------
// SHT30 temperature / humidity sensor
// ---------------------------------------------------------------------------

/// Linux I2C bus number (`/dev/i2c-1` on Raspberry Pi 2 and later).
pub const SENSOR_I2C_BUS: u8 = 1;
/// 7-bit address with ADDR pin tied low.
pub const SHT30_ADDRESS: u8 = 0x44;
