//! Live state shared between the supervisor cycle, the command gate and
//! external readers.
//!
//! [`SharedState`] is the single owner of the [`LiveState`] record.  All
//! access goes through its methods, each of which takes the lock for one
//! field group and releases it before returning, so the lock is never held
//! across sensor or relay I/O.
//!
//! Writers:
//! - the supervisor cycle (readings, overheat flag, alerts, relay flags),
//! - the command gate (setpoints, and one relay flag right after a manual
//!   command).
//!
//! Everybody else reads a cloned [`LiveState`] snapshot.

use chrono::{DateTime, Utc};
use heapless::HistoryBuffer;
use parking_lot::Mutex;
use serde::Serialize;

use crate::actuators::Channel;
use crate::safety::SetpointKind;

/// Alerts retained while the sensor keeps failing.  Older ones are
/// overwritten.
pub const ALERT_CAPACITY: usize = 16;

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Danger,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub severity: Severity,
    pub message: String,
}

impl Alert {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Danger,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read-only copy of the live state, as served to the status API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveState {
    /// Last good reading (°F), or `0.0` when the sensor is failing.
    pub temperature: f32,
    /// Last good reading (%RH), or `0.0` when the sensor is failing.
    pub humidity: f32,
    pub heater1_on: bool,
    pub heater2_on: bool,
    pub humidifier_on: bool,
    pub is_overheat: bool,
    /// Wall-clock time of the last monitoring cycle, successful or not.
    pub last_updated: DateTime<Utc>,
    /// Oldest first.
    pub alerts: Vec<Alert>,
    pub target_temperature: f32,
    pub target_humidity: f32,
}

impl LiveState {
    pub fn relay_flag(&self, channel: Channel) -> Option<bool> {
        match channel {
            Channel::Heater1 => Some(self.heater1_on),
            Channel::Heater2 => Some(self.heater2_on),
            Channel::Humidifier => Some(self.humidifier_on),
            _ => None,
        }
    }

    pub fn target(&self, kind: SetpointKind) -> f32 {
        match kind {
            SetpointKind::Temperature => self.target_temperature,
            SetpointKind::Humidity => self.target_humidity,
        }
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

struct LiveRecord {
    temperature: f32,
    humidity: f32,
    heater1_on: bool,
    heater2_on: bool,
    humidifier_on: bool,
    is_overheat: bool,
    last_updated: DateTime<Utc>,
    alerts: HistoryBuffer<Alert, ALERT_CAPACITY>,
    target_temperature: f32,
    target_humidity: f32,
}

/// Owner of the process-wide live state.
pub struct SharedState {
    inner: Mutex<LiveRecord>,
}

impl SharedState {
    /// Zeroed readings, all relays off, the given setpoints, and
    /// `last_updated = created_at`.
    pub fn new(target_temperature: f32, target_humidity: f32, created_at: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(LiveRecord {
                temperature: 0.0,
                humidity: 0.0,
                heater1_on: false,
                heater2_on: false,
                humidifier_on: false,
                is_overheat: false,
                last_updated: created_at,
                alerts: HistoryBuffer::new(),
                target_temperature,
                target_humidity,
            }),
        }
    }

    pub fn snapshot(&self) -> LiveState {
        let rec = self.inner.lock();
        LiveState {
            temperature: rec.temperature,
            humidity: rec.humidity,
            heater1_on: rec.heater1_on,
            heater2_on: rec.heater2_on,
            humidifier_on: rec.humidifier_on,
            is_overheat: rec.is_overheat,
            last_updated: rec.last_updated,
            alerts: rec.alerts.oldest_ordered().cloned().collect(),
            target_temperature: rec.target_temperature,
            target_humidity: rec.target_humidity,
        }
    }

    // ── Supervisor writes ─────────────────────────────────────

    /// Publish one cycle's baseline.  `last_updated` never moves backwards,
    /// even if the wall clock is stepped back.
    pub fn publish_cycle(
        &self,
        temperature: f32,
        humidity: f32,
        is_overheat: bool,
        at: DateTime<Utc>,
    ) {
        let mut rec = self.inner.lock();
        rec.temperature = temperature;
        rec.humidity = humidity;
        rec.is_overheat = is_overheat;
        if at > rec.last_updated {
            rec.last_updated = at;
        }
    }

    pub fn push_alert(&self, alert: Alert) {
        self.inner.lock().alerts.write(alert);
    }

    /// Optionally drop the previous alerts, then append `alerts`.
    pub fn rebuild_alerts(&self, clear_previous: bool, alerts: Vec<Alert>) {
        let mut rec = self.inner.lock();
        if clear_previous {
            rec.alerts.clear();
        }
        for alert in alerts {
            rec.alerts.write(alert);
        }
    }

    /// Mirror a relay's tracked state.  Reserved channels have no flag.
    pub fn set_relay_flag(&self, channel: Channel, on: bool) {
        let mut rec = self.inner.lock();
        match channel {
            Channel::Heater1 => rec.heater1_on = on,
            Channel::Heater2 => rec.heater2_on = on,
            Channel::Humidifier => rec.humidifier_on = on,
            _ => {}
        }
    }

    // ── Gate writes ───────────────────────────────────────────

    /// Store an already-validated setpoint.
    pub fn set_target(&self, kind: SetpointKind, value: f32) {
        let mut rec = self.inner.lock();
        match kind {
            SetpointKind::Temperature => rec.target_temperature = value,
            SetpointKind::Humidity => rec.target_humidity = value,
        }
    }

    // ── Narrow reads ──────────────────────────────────────────

    pub fn humidifier_on(&self) -> bool {
        self.inner.lock().humidifier_on
    }

    pub fn is_overheat(&self) -> bool {
        self.inner.lock().is_overheat
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.inner.lock().last_updated
    }
}
