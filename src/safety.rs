//! Safety policy.
//!
//! Pure rules shared by the supervisor cycle and the command gate:
//!
//! - the fixed safe bands for temperature and humidity (also the legal
//!   setpoint ranges),
//! - the per-cycle alert evaluation,
//! - the heater-enable veto (overheat / stale sensor).
//!
//! Nothing here touches hardware or locks; callers pass in the values they
//! read from [`LiveState`](crate::state::LiveState).
//!
//! ## Sentinel readings
//!
//! A failed sensor read is published as `0.0 / 0.0`.  Range rules only run
//! on non-sentinel values, so a dead sensor produces a single
//! "Sensor error" alert rather than a spurious "too low" warning.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{SafetyVeto, ValidationError};
use crate::state::{Alert, Severity};

pub const SAFE_TEMP_LOW_F: f32 = 95.0;
pub const SAFE_TEMP_HIGH_F: f32 = 102.0;
pub const SAFE_HUMIDITY_LOW_PCT: f32 = 40.0;
pub const SAFE_HUMIDITY_HIGH_PCT: f32 = 70.0;

/// Value published for temperature and humidity when the read failed.
pub const SENTINEL: f32 = 0.0;

pub const OVERHEAT_ALERT: &str = "EMERGENCY: Overheat detected! Heaters disabled.";

// ---------------------------------------------------------------------------
// Setpoints
// ---------------------------------------------------------------------------

/// Which operator target a setpoint update addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetpointKind {
    Temperature,
    Humidity,
}

impl SetpointKind {
    /// Inclusive legal range for this kind.
    pub const fn range(self) -> (f32, f32) {
        match self {
            Self::Temperature => (SAFE_TEMP_LOW_F, SAFE_TEMP_HIGH_F),
            Self::Humidity => (SAFE_HUMIDITY_LOW_PCT, SAFE_HUMIDITY_HIGH_PCT),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°F",
            Self::Humidity => "%",
        }
    }

    /// `true` if `value` is finite and inside [`range`](Self::range).
    pub fn accepts(self, value: f32) -> bool {
        let (lo, hi) = self.range();
        value.is_finite() && (lo..=hi).contains(&value)
    }

    /// Parse operator input and check it against the band.
    pub fn validate(self, raw: &str) -> Result<f32, ValidationError> {
        let value: f32 = raw
            .trim()
            .parse()
            .ok()
            .filter(|v: &f32| v.is_finite())
            .ok_or_else(|| ValidationError::Malformed {
                kind: self,
                raw: raw.to_string(),
            })?;
        if !self.accepts(value) {
            return Err(ValidationError::OutOfRange { kind: self, value });
        }
        Ok(value)
    }
}

impl fmt::Display for SetpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SetpointKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temperature" => Ok(Self::Temperature),
            "humidity" => Ok(Self::Humidity),
            other => Err(ValidationError::UnknownSetting(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Alert evaluation
// ---------------------------------------------------------------------------

/// `true` when neither value carries a real measurement.
pub fn is_sentinel(temperature: f32, humidity: f32) -> bool {
    temperature <= SENTINEL && humidity <= SENTINEL
}

/// Threshold warnings for one reading.
///
/// Temperature: low is checked before high, so at most one fires.
/// Humidity: "too high" always applies; "too low" only while the
/// humidifier is on, since low humidity with the humidifier off is the
/// operator's choice.
pub fn evaluate_alerts(temperature: f32, humidity: f32, humidifier_on: bool) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if temperature > SENTINEL {
        if temperature < SAFE_TEMP_LOW_F {
            alerts.push(Alert::warning(format!(
                "WARNING: Temperature too low ({temperature:.1}°F)"
            )));
        } else if temperature > SAFE_TEMP_HIGH_F {
            alerts.push(Alert::warning(format!(
                "WARNING: Temperature too high ({temperature:.1}°F)"
            )));
        }
    }

    if humidity > SENTINEL {
        if humidifier_on && humidity < SAFE_HUMIDITY_LOW_PCT {
            alerts.push(Alert::warning(format!(
                "WARNING: Humidity too low ({humidity:.1}%)"
            )));
        } else if humidity > SAFE_HUMIDITY_HIGH_PCT {
            alerts.push(Alert::warning(format!(
                "WARNING: Humidity too high ({humidity:.1}%)"
            )));
        }
    }

    for alert in &alerts {
        warn!("{}", alert.message);
    }
    alerts
}

/// The alert appended on every cycle that sees the interlock active.
pub fn overheat_alert() -> Alert {
    Alert {
        severity: Severity::Danger,
        message: OVERHEAT_ALERT.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Heater-enable veto
// ---------------------------------------------------------------------------

/// Decide whether a heater may be switched on right now.
///
/// `overheat` is the union of the published `is_overheat` flag and the
/// interlock latch.  `last_updated` is the wall-clock time of the last
/// monitoring cycle.
pub fn check_heater_enable(
    overheat: bool,
    last_updated: DateTime<Utc>,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> Result<(), SafetyVeto> {
    if overheat {
        return Err(SafetyVeto::Overheat);
    }
    let age = now.signed_duration_since(last_updated);
    if age > stale_after {
        log::error!("SAFETY: temperature readings are stale, refusing to activate heaters");
        return Err(SafetyVeto::StaleSensor {
            age_secs: age.num_seconds(),
        });
    }
    Ok(())
}
