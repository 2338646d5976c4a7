//! Unified error types for the incubator supervisor.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! supervisor cycle and the command gate uniform in how they report
//! failures.  Hardware-layer variants are `Copy` so they can be passed
//! through the cycle and turned into alerts without allocation.

use core::fmt;

use crate::actuators::Channel;
use crate::safety::SetpointKind;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The temperature/humidity sensor could not be read.
    Sensor(SensorError),
    /// A relay command failed.
    Actuator(ActuatorError),
    /// The overheat interlock could not be queried.
    Interlock(InterlockError),
    /// Manual input was malformed or out of range.
    Validation(ValidationError),
    /// A heater-on request was blocked by a live safety condition.
    Veto(SafetyVeto),
    /// The historical logger failed.
    History(HistoryError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Interlock(e) => write!(f, "interlock: {e}"),
            Self::Validation(e) => write!(f, "{e}"),
            Self::Veto(e) => write!(f, "{e}"),
            Self::History(e) => write!(f, "history: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The driver never completed its reset sequence.
    NotInitialized,
    /// I2C transaction failed or timed out.
    Bus,
    /// CRC of a measurement word did not match.
    Checksum,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "sensor not initialized or not connected"),
            Self::Bus => write!(f, "I2C bus transaction failed"),
            Self::Checksum => write!(f, "CRC checksum verification failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// GPIO write to the relay coil failed.
    HardwareWrite(Channel),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HardwareWrite(ch) => write!(f, "relay write failed on {ch}"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Interlock errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockError {
    /// No overheat input is attached (never set up, or released at shutdown).
    Unavailable,
    /// GPIO read of the overheat input failed.
    ReadFailed,
}

impl fmt::Display for InterlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "overheat input unavailable"),
            Self::ReadFailed => write!(f, "overheat input read failed"),
        }
    }
}

impl From<InterlockError> for Error {
    fn from(e: InterlockError) -> Self {
        Self::Interlock(e)
    }
}

// ---------------------------------------------------------------------------
// Validation errors (manual input)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    UnknownChannel(String),
    UnknownAction(String),
    UnknownSetting(String),
    /// The value could not be parsed as a finite number.
    Malformed { kind: SetpointKind, raw: String },
    OutOfRange { kind: SetpointKind, value: f32 },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownChannel(name) => write!(f, "Unknown device: {name}"),
            Self::UnknownAction(name) => write!(f, "Unknown action: {name}"),
            Self::UnknownSetting(name) => write!(f, "Unknown setting: {name}"),
            Self::Malformed { kind, raw } => {
                write!(f, "Invalid value format for {kind}: {raw:?}")
            }
            Self::OutOfRange { kind, value } => {
                let (lo, hi) = kind.range();
                write!(
                    f,
                    "{kind} {value} rejected: must be between {lo}{unit} and {hi}{unit}",
                    unit = kind.unit()
                )
            }
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e)
    }
}

// ---------------------------------------------------------------------------
// Safety vetoes
// ---------------------------------------------------------------------------

/// Hard refusals of a heater-on request.  Independent of who asked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SafetyVeto {
    /// The overheat interlock is active or latched.
    Overheat,
    /// The last monitoring cycle is older than the staleness threshold.
    StaleSensor { age_secs: i64 },
}

impl fmt::Display for SafetyVeto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overheat => write!(f, "Cannot turn on heaters during overheat condition"),
            Self::StaleSensor { age_secs } => write!(
                f,
                "Cannot turn on heaters: temperature sensor not responding ({age_secs}s since last update)"
            ),
        }
    }
}

impl From<SafetyVeto> for Error {
    fn from(e: SafetyVeto) -> Self {
        Self::Veto(e)
    }
}

// ---------------------------------------------------------------------------
// History errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// Filesystem error, carrying the OS message.
    Io(String),
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl From<std::io::Error> for HistoryError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<HistoryError> for Error {
    fn from(e: HistoryError) -> Self {
        Self::History(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No config file exists (first start).
    NotFound,
    /// The stored config failed deserialization.
    Corrupted(String),
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the backing file.
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted(msg) => write!(f, "config corrupted: {msg}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
