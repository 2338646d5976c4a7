//! Port traits: the hexagonal boundary between the supervisor core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Incubator (domain)
//! ```
//!
//! Driven adapters (sensor, relays, overheat input, history, clock, event
//! sinks, config storage) implement these traits.  The core holds them as
//! trait objects because the supervisor thread, the interlock watcher and
//! command callers all share them.
//!
//! Every port is `Send`: the supervisor owns the sensor on its own thread,
//! and relays live behind per-channel locks that any thread may take.

use chrono::{DateTime, Utc};

use crate::config::SystemConfig;
use crate::error::{ActuatorError, ConfigError, HistoryError, InterlockError, SensorError};
use crate::sensors::Reading;

// ───────────────────────────────────────────────────────────────
// Sensor port (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One temperature/humidity measurement or a typed failure.
///
/// Implementations enforce their own bus timeouts; a read must never hang.
pub trait SensorPort: Send {
    fn read(&mut self) -> Result<Reading, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Relay port (domain → hardware)
// ───────────────────────────────────────────────────────────────

/// A single relay coil.
pub trait RelayPort: Send {
    /// Energise (`true`) or release (`false`) the relay.
    fn write(&mut self, on: bool) -> Result<(), ActuatorError>;

    /// Release the underlying pin at shutdown.
    fn release(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// Overheat input port (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// The binary thermal cutoff signal.
pub trait OverheatSignal: Send {
    /// `true` when the cutoff circuit is open (overheat).
    fn is_open(&mut self) -> Result<bool, InterlockError>;

    /// Release the underlying pin at shutdown.
    fn release(&mut self) {}
}

// ───────────────────────────────────────────────────────────────
// History port (domain → external logger)
// ───────────────────────────────────────────────────────────────

/// Flat per-minute record handed to the historical logger.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct TelemetryRecord {
    pub timestamp: DateTime<Utc>,
    pub temperature: f32,
    pub humidity: f32,
    pub heater1_on: bool,
    pub heater2_on: bool,
    pub humidifier_on: bool,
    pub target_temperature: f32,
    pub target_humidity: f32,
}

/// Fire-and-forget sink for telemetry.  Errors are logged by the caller and
/// never fed back into live state.
pub trait HistoryPort: Send + Sync {
    fn record(&self, record: &TelemetryRecord) -> Result<(), HistoryError>;

    /// Drop data older than `retention_days`.  Returns how many units
    /// (files, rows, ...) were removed.
    fn purge(&self, retention_days: u32) -> Result<usize, HistoryError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / notification)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Called from several threads.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source for `last_updated` and staleness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting and reject invalid
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}
