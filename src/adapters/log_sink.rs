//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade.  A future MQTT or websocket adapter would implement
//! the same trait.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] as one line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | T={:.1}\u{00b0}F RH={:.1}% | heater1={} heater2={} humidifier={} | \
                     target T={:.1}\u{00b0}F RH={:.1}%",
                    t.temperature,
                    t.humidity,
                    on_off(t.heater1_on),
                    on_off(t.heater2_on),
                    on_off(t.humidifier_on),
                    t.target_temperature,
                    t.target_humidity,
                );
            }
            AppEvent::InterlockTripped => {
                error!("INTERLOCK | tripped, heaters forced OFF");
            }
            AppEvent::InterlockCleared => {
                info!("INTERLOCK | cleared");
            }
            AppEvent::EmergencyShutdown => {
                warn!("EMERGENCY | operator shutdown, heaters forced OFF");
            }
            AppEvent::RelayCommanded { channel, on } => {
                info!("RELAY | {} -> {}", channel, on_off(*on));
            }
            AppEvent::SetpointChanged { kind, value } => {
                info!("SETPOINT | {} = {}{}", kind, value, kind.unit());
            }
            AppEvent::Started => {
                info!("START | supervisor running");
            }
            AppEvent::Stopped => {
                info!("STOP | relays released");
            }
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "ON" } else { "OFF" }
}
