//! Incubator daemon: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimBoard (Sht30 · RelayDriver×8 · OverheatInput)              │
//! │  LogEventSink   CsvHistoryLog   JsonFileConfig   SystemClock   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  Incubator: Supervisor · CommandGate · Interlock       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  stdin console (operator commands) · SIGINT/SIGTERM shutdown   │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};

use incubator::actuators::ActuatorBank;
use incubator::adapters::config_file::JsonFileConfig;
use incubator::adapters::history_csv::CsvHistoryLog;
use incubator::adapters::log_sink::LogEventSink;
use incubator::adapters::sim::SimBoard;
use incubator::adapters::time::SystemClock;
use incubator::app::commands::{AppCommand, CommandReply};
use incubator::app::ports::{Clock, RelayPort};
use incubator::app::service::{Incubator, Ports};
use incubator::pins;

const DEFAULT_CONFIG_PATH: &str = "incubator.json";
const CONSOLE_POLL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  incubatord v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1. Configuration ──────────────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("INCUBATOR_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = JsonFileConfig::new(&config_path).load_or_default();

    // ── 2. Adapters ───────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let history = Arc::new(
        CsvHistoryLog::new(&config.history_dir, clock.clone())
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("opening history directory {}", config.history_dir))?,
    );
    let board = SimBoard::new(
        config.default_target_temperature_f - 2.0,
        config.default_target_humidity_pct,
    );
    info!(
        "Using simulated board (no GPIO/I2C on this host): SHT30 0x{:02X} on i2c-{}",
        pins::SHT30_ADDRESS,
        pins::SENSOR_I2C_BUS
    );

    let ports = Ports {
        sensor: Box::new(board.sensor()),
        relays: ActuatorBank::new(|ch| -> Box<dyn RelayPort> { Box::new(board.relay(ch)) }),
        overheat: Some(Box::new(board.overheat_input())),
        history: history.clone(),
        sink: Arc::new(LogEventSink::new()),
        clock,
    };

    // ── 3. Core ───────────────────────────────────────────────
    let mut incubator = Incubator::new(config, ports);
    board.attach_edge(incubator.edge_notifier());
    incubator.start().context("starting supervisor")?;

    // ── 4. Signals & console ──────────────────────────────────
    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&term))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&term))?;

    let mut console = Some(spawn_console()?);
    info!("System ready. Type 'help' for commands.");

    // ── 5. Main loop ──────────────────────────────────────────
    while !term.load(Ordering::SeqCst) {
        let Some(lines) = &console else {
            thread::sleep(CONSOLE_POLL);
            continue;
        };
        match lines.recv_timeout(CONSOLE_POLL) {
            Ok(line) => handle_line(&incubator, &board, &history, line.trim()),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                info!("stdin closed, console disabled");
                console = None;
            }
        }
    }

    // ── 6. Shutdown ───────────────────────────────────────────
    warn!("Shutdown signal received");
    incubator.shutdown();
    Ok(())
}

fn spawn_console() -> Result<Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

fn handle_line(incubator: &Incubator, board: &SimBoard, history: &CsvHistoryLog, line: &str) {
    let words: Vec<&str> = line.split_whitespace().collect();
    match words.as_slice() {
        [] => {}
        ["help"] => println!(
            "commands:\n  status\n  history [days] [interval_minutes]\n  \
             <heater1|heater2|humidifier> <on|off>\n  set <temperature|humidity> <value>\n  \
             emergency\n  clear\n  sim overheat <on|off>\n  sim sensor <fail|ok>"
        ),
        ["status"] => print_json(&incubator.get_live_state()),
        ["history", rest @ ..] => {
            let days = rest.first().and_then(|s| s.parse().ok()).unwrap_or(1);
            let interval = rest.get(1).and_then(|s| s.parse().ok()).unwrap_or(10);
            match history.recent(days, interval) {
                Ok(series) if series.is_empty() => {
                    println!("no history recorded in the last {days} day(s)")
                }
                Ok(series) => print_json(&series),
                Err(e) => println!("history unavailable: {e}"),
            }
        }
        ["set", setting, value] => print_reply(&incubator.submit_setpoint(setting, value)),
        ["emergency"] => print_reply(&incubator.emergency_shutdown()),
        ["clear"] => print_reply(&incubator.handle_command(AppCommand::ClearInterlock)),
        ["sim", "overheat", level] => board.set_cutoff(*level == "on"),
        ["sim", "sensor", mode] => board.set_sensor_fault(*mode == "fail"),
        [device, action] => print_reply(&incubator.submit_command(device, action)),
        _ => println!("unrecognised command: {line:?} (try 'help')"),
    }
}

fn print_reply(reply: &CommandReply) {
    let mark = if reply.success { "ok" } else { "FAILED" };
    println!("{mark}: {}", reply.message);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => println!("serialisation failed: {e}"),
    }
}
