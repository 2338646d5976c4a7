//! Mock hardware adapter for integration tests.
//!
//! Every port the core needs is backed by a shared [`Rig`] so tests can
//! script the sensor and the cutoff, inject relay faults, move the clock,
//! and assert on the full relay command history without real GPIO.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use incubator::actuators::{ActuatorBank, Channel};
use incubator::app::events::AppEvent;
use incubator::app::ports::{
    Clock, EventSink, HistoryPort, OverheatSignal, RelayPort, SensorPort, TelemetryRecord,
};
use incubator::app::service::{Incubator, Ports};
use incubator::config::SystemConfig;
use incubator::error::{ActuatorError, HistoryError, InterlockError, SensorError};
use incubator::sensors::Reading;

// ── Relay call record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayCall {
    pub channel: Channel,
    pub on: bool,
}

// ── Sensor script ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum SensorStep {
    Value(Reading),
    Fail(SensorError),
    Panic,
    Hang(Duration),
}

/// Queued steps are consumed first; afterwards `steady` repeats.
pub struct SensorScript {
    queue: VecDeque<SensorStep>,
    steady: SensorStep,
}

pub struct ScriptedSensor {
    script: Arc<Mutex<SensorScript>>,
}

impl SensorPort for ScriptedSensor {
    fn read(&mut self) -> Result<Reading, SensorError> {
        let step = {
            let mut script = self.script.lock();
            script.queue.pop_front().unwrap_or_else(|| script.steady.clone())
        };
        match step {
            SensorStep::Value(r) => Ok(r),
            SensorStep::Fail(e) => Err(e),
            SensorStep::Panic => panic!("sensor driver crashed"),
            SensorStep::Hang(d) => {
                std::thread::sleep(d);
                Ok(Reading::new(99.5, 55.0))
            }
        }
    }
}

// ── Relays ────────────────────────────────────────────────────

/// Physical relay levels plus fault and latency injection.
pub struct RelayBoard {
    levels: Mutex<[bool; Channel::COUNT]>,
    failing: Mutex<[bool; Channel::COUNT]>,
    released: Mutex<[bool; Channel::COUNT]>,
    write_delay: Mutex<Duration>,
    pub calls: Mutex<Vec<RelayCall>>,
}

impl RelayBoard {
    fn new() -> Self {
        Self {
            levels: Mutex::new([false; Channel::COUNT]),
            failing: Mutex::new([false; Channel::COUNT]),
            released: Mutex::new([false; Channel::COUNT]),
            write_delay: Mutex::new(Duration::ZERO),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn level(&self, channel: Channel) -> bool {
        self.levels.lock()[channel as usize]
    }

    pub fn set_failing(&self, channel: Channel, failing: bool) {
        self.failing.lock()[channel as usize] = failing;
    }

    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = delay;
    }

    pub fn is_released(&self, channel: Channel) -> bool {
        self.released.lock()[channel as usize]
    }

    pub fn last_call(&self, channel: Channel) -> Option<RelayCall> {
        self.calls
            .lock()
            .iter()
            .rev()
            .find(|c| c.channel == channel)
            .copied()
    }
}

pub struct MockRelay {
    channel: Channel,
    board: Arc<RelayBoard>,
}

impl RelayPort for MockRelay {
    fn write(&mut self, on: bool) -> Result<(), ActuatorError> {
        let delay = *self.board.write_delay.lock();
        if delay.is_zero() {
            std::thread::yield_now();
        } else {
            std::thread::sleep(delay);
        }
        if self.board.failing.lock()[self.channel as usize] {
            return Err(ActuatorError::HardwareWrite(self.channel));
        }
        self.board.levels.lock()[self.channel as usize] = on;
        self.board.calls.lock().push(RelayCall {
            channel: self.channel,
            on,
        });
        Ok(())
    }

    fn release(&mut self) {
        self.board.released.lock()[self.channel as usize] = true;
    }
}

// ── Overheat cutoff ───────────────────────────────────────────

pub struct ScriptedCutoff {
    level: Arc<Mutex<Result<bool, InterlockError>>>,
}

impl OverheatSignal for ScriptedCutoff {
    fn is_open(&mut self) -> Result<bool, InterlockError> {
        *self.level.lock()
    }
}

// ── Clock ─────────────────────────────────────────────────────

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    hold: Mutex<Option<(Sender<()>, Receiver<()>)>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap();
        *self.now.lock() += by;
    }

    /// Block the next caller of [`Clock::now`] until the returned sender
    /// fires.  The returned receiver signals that the caller is parked.
    pub fn hold_next(&self) -> (Receiver<()>, Sender<()>) {
        let (parked_tx, parked_rx) = crossbeam_channel::bounded(1);
        let (resume_tx, resume_rx) = crossbeam_channel::bounded(1);
        *self.hold.lock() = Some((parked_tx, resume_rx));
        (parked_rx, resume_tx)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let hold = self.hold.lock().take();
        if let Some((parked, resume)) = hold {
            let _ = parked.send(());
            let _ = resume.recv();
        }
        *self.now.lock()
    }
}

// ── History ───────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingHistory {
    pub records: Mutex<Vec<TelemetryRecord>>,
    pub purges: Mutex<Vec<u32>>,
    pub fail: Mutex<bool>,
}

impl HistoryPort for RecordingHistory {
    fn record(&self, record: &TelemetryRecord) -> Result<(), HistoryError> {
        if *self.fail.lock() {
            return Err(HistoryError::Io("disk full".into()));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }

    fn purge(&self, retention_days: u32) -> Result<usize, HistoryError> {
        self.purges.lock().push(retention_days);
        Ok(0)
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct LogSink {
    pub events: Mutex<Vec<AppEvent>>,
}

impl EventSink for LogSink {
    fn emit(&self, event: &AppEvent) {
        self.events.lock().push(event.clone());
    }
}

#[allow(dead_code)]
impl LogSink {
    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.lock().iter().any(|e| e == event)
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Test-side handles onto everything the [`Incubator`] talks to.
#[derive(Clone)]
pub struct Rig {
    pub sensor: Arc<Mutex<SensorScript>>,
    pub cutoff: Arc<Mutex<Result<bool, InterlockError>>>,
    pub relays: Arc<RelayBoard>,
    pub clock: Arc<ManualClock>,
    pub history: Arc<RecordingHistory>,
    pub sink: Arc<LogSink>,
}

#[allow(dead_code)]
impl Rig {
    fn new() -> Self {
        Self {
            sensor: Arc::new(Mutex::new(SensorScript {
                queue: VecDeque::new(),
                steady: SensorStep::Value(Reading::new(99.5, 55.0)),
            })),
            cutoff: Arc::new(Mutex::new(Ok(false))),
            relays: Arc::new(RelayBoard::new()),
            clock: Arc::new(ManualClock {
                now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
                hold: Mutex::new(None),
            }),
            history: Arc::new(RecordingHistory::default()),
            sink: Arc::new(LogSink::default()),
        }
    }

    /// Every subsequent read returns this reading.
    pub fn set_reading(&self, temperature_f: f32, humidity_pct: f32) {
        self.set_sensor(SensorStep::Value(Reading::new(temperature_f, humidity_pct)));
    }

    pub fn set_sensor(&self, step: SensorStep) {
        let mut script = self.sensor.lock();
        script.queue.clear();
        script.steady = step;
    }

    /// Consumed once, before the steady step.
    pub fn queue_sensor(&self, step: SensorStep) {
        self.sensor.lock().queue.push_back(step);
    }

    pub fn set_cutoff(&self, level: Result<bool, InterlockError>) {
        *self.cutoff.lock() = level;
    }
}

/// Fast timings so loop and edge tests finish quickly.
pub fn test_config() -> SystemConfig {
    SystemConfig {
        poll_interval_ms: 20,
        interlock_debounce_ms: 1,
        shutdown_grace_ms: 500,
        ..SystemConfig::default()
    }
}

pub fn make_app() -> (Incubator, Rig) {
    make_app_with(test_config())
}

pub fn make_app_with(config: SystemConfig) -> (Incubator, Rig) {
    let rig = Rig::new();
    let board = rig.relays.clone();
    let ports = Ports {
        sensor: Box::new(ScriptedSensor {
            script: rig.sensor.clone(),
        }),
        relays: ActuatorBank::new(|channel| -> Box<dyn RelayPort> {
            Box::new(MockRelay {
                channel,
                board: board.clone(),
            })
        }),
        overheat: Some(Box::new(ScriptedCutoff {
            level: rig.cutoff.clone(),
        })),
        history: rig.history.clone(),
        sink: rig.sink.clone(),
        clock: rig.clock.clone(),
    };
    // The bank's power-on OFF writes are not interesting to tests.
    rig.relays.calls.lock().clear();
    (Incubator::new(config, ports), rig)
}

/// Poll `cond` until it holds or `timeout` passes.
#[allow(dead_code)]
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}
