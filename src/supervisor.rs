//! Environment supervisor: the monitoring cycle.
//!
//! One call to [`EnvironmentSupervisor::run_cycle`] is one iteration:
//!
//! ```text
//!  1 read sensor      (failure → danger alert, 0.0/0.0 sentinel)
//!  2 interlock check  (query failure → not overheating)
//!  3 publish baseline (readings, is_overheat, last_updated)
//!  4 rebuild alerts   (threshold rules, skipped for sentinel readings)
//!  5 enforce overheat (danger alert, heaters OFF, flags mirrored)
//!  6 resync relay flags from the actuator bank
//!  7 telemetry        (time-gated: log line, history record, purge)
//! ```
//!
//! The supervisor is the only automatic actuation path apart from the
//! interlock's edge trip.  It never switches anything ON.

use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};

use crate::actuators::{ActuatorBank, Channel};
use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink, HistoryPort, SensorPort, TelemetryRecord};
use crate::config::SystemConfig;
use crate::error::Result;
use crate::interlock::OverheatInterlock;
use crate::safety::{self, SENTINEL};
use crate::scheduler::Cadence;
use crate::state::{Alert, SharedState};

pub struct EnvironmentSupervisor {
    sensor: Box<dyn SensorPort>,
    state: Arc<SharedState>,
    bank: Arc<ActuatorBank>,
    interlock: Arc<OverheatInterlock>,
    history: Arc<dyn HistoryPort>,
    sink: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    telemetry: Cadence,
    retention_days: u32,
}

impl EnvironmentSupervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &SystemConfig,
        sensor: Box<dyn SensorPort>,
        state: Arc<SharedState>,
        bank: Arc<ActuatorBank>,
        interlock: Arc<OverheatInterlock>,
        history: Arc<dyn HistoryPort>,
        sink: Arc<dyn EventSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sensor,
            state,
            bank,
            interlock,
            history,
            sink,
            clock,
            telemetry: Cadence::new(config.telemetry_interval()),
            retention_days: config.retention_days,
        }
    }

    /// One iteration.  Never fails: anything that goes wrong becomes a
    /// danger alert.
    pub fn tick(&mut self) {
        if let Err(e) = self.run_cycle() {
            error!("Error in monitoring cycle: {}", e);
            self.state.push_alert(Alert::danger(format!("Sensor error: {e}")));
        }
    }

    pub fn run_cycle(&mut self) -> Result<()> {
        // 1. Read
        let (temperature, humidity) = match self.sensor.read() {
            Ok(r) => (r.temperature_f, r.humidity_pct),
            Err(e) => {
                error!("Sensor error: {}", e);
                self.state.push_alert(Alert::danger(format!("Sensor error: {e}")));
                (SENTINEL, SENTINEL)
            }
        };

        // 2. Interlock check
        let is_overheat = self.interlock.is_triggered();

        // 3. Publish baseline
        self.state
            .publish_cycle(temperature, humidity, is_overheat, self.clock.now());

        // 4. Alert rebuild
        let sentinel = safety::is_sentinel(temperature, humidity);
        let alerts = if sentinel {
            Vec::new()
        } else {
            safety::evaluate_alerts(temperature, humidity, self.state.humidifier_on())
        };
        self.state.rebuild_alerts(!sentinel, alerts);

        // 5. Interlock enforcement
        let mut shutdown = Ok(());
        if is_overheat {
            let alert = safety::overheat_alert();
            error!("{}", alert.message);
            self.state.push_alert(alert);
            shutdown = self.bank.heaters_off(Some(&self.state));
        }

        // 6. Resync
        for channel in Channel::WIRED {
            self.bank.mirror(channel, &self.state);
        }

        // 7. Telemetry
        if self.telemetry.due(Instant::now()) {
            self.emit_telemetry(temperature, humidity);
        }

        shutdown.map_err(Into::into)
    }

    fn emit_telemetry(&self, temperature: f32, humidity: f32) {
        let snap = self.state.snapshot();
        let record = TelemetryRecord {
            timestamp: snap.last_updated,
            temperature,
            humidity,
            heater1_on: snap.heater1_on,
            heater2_on: snap.heater2_on,
            humidifier_on: snap.humidifier_on,
            target_temperature: snap.target_temperature,
            target_humidity: snap.target_humidity,
        };

        info!(
            "Status: Temp={:.1}°F, Humidity={:.1}%, Heater1={}, Heater2={}, Humidifier={}",
            temperature,
            humidity,
            on_off(record.heater1_on),
            on_off(record.heater2_on),
            on_off(record.humidifier_on),
        );
        self.sink.emit(&AppEvent::Telemetry(record.clone()));

        if let Err(e) = self.history.record(&record) {
            warn!("Error logging data: {}", e);
        }
        match self.history.purge(self.retention_days) {
            Ok(0) => {}
            Ok(n) => info!("Purged {} history file(s) older than {} days", n, self.retention_days),
            Err(e) => warn!("Error during data purge: {}", e),
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}
