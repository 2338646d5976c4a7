//! Application service: the hexagonal core.
//!
//! [`Incubator`] wires the live state, the actuator bank, the interlock,
//! the supervisor and the command gate together, and exposes the
//! external interface: live-state snapshots, manual commands, setpoints,
//! emergency shutdown, and the start/shutdown lifecycle.
//!
//! ```text
//!  SensorPort ──▶ ┌─────────────────────────────┐ ──▶ EventSink
//!                 │          Incubator          │ ──▶ HistoryPort
//!  RelayPort  ◀── │ Supervisor · Gate · Interlock│
//!  OverheatSignal▶└─────────────────────────────┘
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use log::{error, info, warn};
use parking_lot::Mutex;

use crate::actuators::{ActuatorBank, Channel};
use crate::config::SystemConfig;
use crate::error::ValidationError;
use crate::gate::CommandGate;
use crate::interlock::{EdgeNotifier, InterlockEvent, OverheatInterlock};
use crate::safety::SetpointKind;
use crate::scheduler::PeriodicTask;
use crate::state::{Alert, LiveState, SharedState};
use crate::supervisor::EnvironmentSupervisor;

use super::commands::{AppCommand, CommandReply};
use super::events::AppEvent;
use super::ports::{Clock, EventSink, HistoryPort, OverheatSignal, SensorPort};

// ───────────────────────────────────────────────────────────────
// Wiring
// ───────────────────────────────────────────────────────────────

/// Everything the core needs from the outside world.
pub struct Ports {
    pub sensor: Box<dyn SensorPort>,
    pub relays: ActuatorBank,
    /// `None` when the cutoff input could not be set up.
    pub overheat: Option<Box<dyn OverheatSignal>>,
    pub history: Arc<dyn HistoryPort>,
    pub sink: Arc<dyn EventSink>,
    pub clock: Arc<dyn Clock>,
}

struct Watcher {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

// ───────────────────────────────────────────────────────────────
// Incubator
// ───────────────────────────────────────────────────────────────

pub struct Incubator {
    config: SystemConfig,
    state: Arc<SharedState>,
    bank: Arc<ActuatorBank>,
    interlock: Arc<OverheatInterlock>,
    gate: CommandGate,
    supervisor: Arc<Mutex<EnvironmentSupervisor>>,
    sink: Arc<dyn EventSink>,
    task: Option<PeriodicTask>,
    watcher: Option<Watcher>,
    stopped: bool,
}

impl Incubator {
    /// Build the core.  Does **not** start any thread; call
    /// [`start`](Self::start) or drive cycles with
    /// [`run_cycle`](Self::run_cycle).
    pub fn new(config: SystemConfig, ports: Ports) -> Self {
        let Ports {
            sensor,
            relays,
            overheat,
            history,
            sink,
            clock,
        } = ports;

        let state = Arc::new(SharedState::new(
            config.default_target_temperature_f,
            config.default_target_humidity_pct,
            clock.now(),
        ));
        let bank = Arc::new(relays);
        let interlock = Arc::new(OverheatInterlock::new(
            overheat,
            config.interlock_debounce(),
            bank.clone(),
            state.clone(),
            sink.clone(),
        ));
        let gate = CommandGate::new(
            state.clone(),
            bank.clone(),
            interlock.clone(),
            sink.clone(),
            clock.clone(),
            config.stale_after(),
        );
        let supervisor = EnvironmentSupervisor::new(
            &config,
            sensor,
            state.clone(),
            bank.clone(),
            interlock.clone(),
            history,
            sink.clone(),
            clock,
        );

        Self {
            config,
            state,
            bank,
            interlock,
            gate,
            supervisor: Arc::new(Mutex::new(supervisor)),
            sink,
            task: None,
            watcher: None,
            stopped: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the interlock edge watcher and the periodic monitoring task.
    pub fn start(&mut self) -> std::io::Result<()> {
        if self.task.is_some() {
            return Ok(());
        }

        let (stop, stop_rx) = crossbeam_channel::bounded(1);
        let handle = self.interlock.spawn_watcher(stop_rx)?;
        self.watcher = Some(Watcher { stop, handle });

        let supervisor = self.supervisor.clone();
        let state = self.state.clone();
        self.task = Some(PeriodicTask::spawn(
            "supervisor",
            self.config.poll_interval(),
            move || supervisor.lock().tick(),
            move |msg| state.push_alert(Alert::danger(format!("Sensor error: {msg}"))),
        )?);

        self.stopped = false;
        self.sink.emit(&AppEvent::Started);
        info!(
            "Incubator started (poll every {} ms)",
            self.config.poll_interval_ms
        );
        Ok(())
    }

    /// Stop the loop, wait at most the configured grace for the
    /// in-flight cycle, then force every relay OFF and release the pins.
    /// Cleanup failures are logged only.  Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        info!("Shutting down hardware controllers...");

        if let Some(mut task) = self.task.take() {
            if !task.stop(self.config.shutdown_grace()) {
                warn!("Monitoring cycle did not finish in time, forcing cleanup");
            }
        }
        if let Some(Watcher { stop, handle }) = self.watcher.take() {
            let _ = stop.send(());
            if handle.join().is_err() {
                error!("Interlock watcher panicked");
            }
        }

        self.bank.shutdown(Some(&self.state));
        self.interlock.release();
        self.sink.emit(&AppEvent::Stopped);
        info!("Hardware cleanup completed");
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(PeriodicTask::is_running)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn get_live_state(&self) -> LiveState {
        self.state.snapshot()
    }

    /// Run one monitoring cycle on the caller's thread.
    pub fn run_cycle(&self) {
        self.supervisor.lock().tick();
    }

    pub fn edge_notifier(&self) -> EdgeNotifier {
        self.interlock.edge_notifier()
    }

    pub fn subscribe_interlock(&self) -> Receiver<InterlockEvent> {
        self.interlock.subscribe()
    }

    /// Tracked hardware state of any channel, reserved ones included.
    pub fn relay_state(&self, channel: Channel) -> bool {
        self.bank.get(channel)
    }

    // ── Commands ──────────────────────────────────────────────

    pub fn handle_command(&self, cmd: AppCommand) -> CommandReply {
        match cmd {
            AppCommand::Actuate { channel, on } => {
                let action = if on { "on" } else { "off" };
                self.gate
                    .request_actuation(channel, on)
                    .map(|_| format!("{channel} {action} successful"))
                    .into()
            }
            AppCommand::SetSetpoint { kind, raw } => self
                .gate
                .update_setpoint(kind, &raw)
                .map(|value| format!("{} target set to {}", capitalize(kind.name()), value))
                .into(),
            AppCommand::EmergencyShutdown => self.emergency_shutdown(),
            AppCommand::ClearInterlock => {
                if self.gate.clear_interlock() {
                    CommandReply::ok("Emergency condition cleared")
                } else {
                    CommandReply::fail("Cannot reset emergency: Overheat condition still exists")
                }
            }
        }
    }

    /// String-keyed entry point used by the dashboard: `device` is a
    /// channel name (or `emergency`), `action` is `on`, `off` or
    /// `shutdown`.
    pub fn submit_command(&self, device: &str, action: &str) -> CommandReply {
        if device == "emergency" && action == "shutdown" {
            return self.emergency_shutdown();
        }
        match parse_actuation(device, action) {
            Ok(cmd) => self.handle_command(cmd),
            Err(e) => CommandReply::fail(e.to_string()),
        }
    }

    pub fn submit_setpoint(&self, setting: &str, raw: &str) -> CommandReply {
        match setting.parse::<SetpointKind>() {
            Ok(kind) => self.handle_command(AppCommand::SetSetpoint {
                kind,
                raw: raw.to_string(),
            }),
            Err(e) => CommandReply::fail(e.to_string()),
        }
    }

    /// Always attempts every heater.  Reports failure only when the
    /// hardware itself refused a write.
    pub fn emergency_shutdown(&self) -> CommandReply {
        match self.gate.emergency_shutdown() {
            Ok(()) => CommandReply::ok("Emergency shutdown activated"),
            Err(e) => CommandReply::fail(format!("Emergency shutdown incomplete: {e}")),
        }
    }
}

impl Drop for Incubator {
    fn drop(&mut self) {
        if self.task.is_some() || self.watcher.is_some() {
            self.shutdown();
        }
    }
}

fn parse_actuation(device: &str, action: &str) -> Result<AppCommand, ValidationError> {
    let channel: Channel = device.parse()?;
    if !channel.is_wired() {
        return Err(ValidationError::UnknownChannel(device.to_string()));
    }
    let on = match action {
        "on" => true,
        "off" => false,
        other => return Err(ValidationError::UnknownAction(other.to_string())),
    };
    Ok(AppCommand::Actuate { channel, on })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
