//! System configuration parameters
//!
//! All tunable timing and housekeeping parameters for the incubator
//! supervisor.  The safe temperature / humidity bands are not here: they
//! are fixed in [`crate::safety`] and cannot be widened by a config file.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::safety::SetpointKind;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Timing ---
    /// Monitoring cycle period (milliseconds)
    pub poll_interval_ms: u64,
    /// Age of the last cycle (seconds) after which heater-on is vetoed
    pub stale_after_secs: u64,
    /// Telemetry / history cadence (seconds)
    pub telemetry_interval_secs: u64,
    /// Overheat edge re-confirmation delay (milliseconds)
    pub interlock_debounce_ms: u64,
    /// Wait for the in-flight cycle at shutdown (milliseconds)
    pub shutdown_grace_ms: u64,

    // --- Setpoints ---
    /// Operator target temperature at start (°F)
    pub default_target_temperature_f: f32,
    /// Operator target relative humidity at start (%)
    pub default_target_humidity_pct: f32,

    // --- History ---
    /// Directory holding the daily CSV files
    pub history_dir: String,
    /// Days of history to keep
    pub retention_days: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Timing
            poll_interval_ms: 5_000,
            stale_after_secs: 120,
            telemetry_interval_secs: 60,
            interlock_debounce_ms: 100,
            shutdown_grace_ms: 1_000,

            // Setpoints
            default_target_temperature_f: 99.5,
            default_target_humidity_pct: 55.0,

            // History
            history_dir: "data".to_string(),
            retention_days: 21,
        }
    }
}

impl SystemConfig {
    /// Reject values that would disable or destabilise the supervisor.
    ///
    /// Values are never clamped: a config that fails here is replaced by
    /// the defaults at load time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("poll_interval_ms must be > 0"));
        }
        if self.stale_after_secs.saturating_mul(1000) <= self.poll_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "stale_after_secs must exceed one poll interval",
            ));
        }
        if self.telemetry_interval_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_secs must be > 0",
            ));
        }
        if self.retention_days == 0 {
            return Err(ConfigError::ValidationFailed("retention_days must be > 0"));
        }
        if !SetpointKind::Temperature.accepts(self.default_target_temperature_f) {
            return Err(ConfigError::ValidationFailed(
                "default_target_temperature_f outside the safe band",
            ));
        }
        if !SetpointKind::Humidity.accepts(self.default_target_humidity_pct) {
            return Err(ConfigError::ValidationFailed(
                "default_target_humidity_pct outside the safe band",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_ms)
    }

    pub fn telemetry_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.telemetry_interval_secs)
    }

    pub fn interlock_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interlock_debounce_ms)
    }

    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Staleness threshold as a wall-clock span (compared against `last_updated`).
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_after_secs as i64)
    }
}
