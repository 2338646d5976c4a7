//! Overheat interlock.
//!
//! Wraps the thermal cutoff input and enforces it along two independent
//! paths:
//!
//! ```text
//!   cutoff opens ──edge──▶ EdgeNotifier ──▶ watcher thread
//!                                            │ sleep(debounce)
//!                                            │ re-check (fail-closed)
//!                                            ▼
//!                                          trip(): latch · heaters OFF
//!                                                  · CRITICAL log · notify
//!
//!   supervisor cycle ──▶ is_triggered()  (fail-open: query error → false)
//! ```
//!
//! The poll path is permissive because the edge path is the authoritative
//! trigger source.  A failed re-check on the edge path trips anyway.
//!
//! Heaters are never switched back on here.  [`clear`](OverheatInterlock::clear)
//! only resets the latch, and only when the cutoff reports closed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError, select};
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::actuators::ActuatorBank;
use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, OverheatSignal};
use crate::error::{ActuatorError, InterlockError};
use crate::safety;
use crate::state::SharedState;

/// Notification delivered to [`OverheatInterlock::subscribe`] receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterlockEvent {
    Tripped,
    Cleared,
}

/// Cloneable handle that hardware edge sources use to report a rising
/// edge on the cutoff line.  Never blocks; bursts of edges coalesce into
/// one pending check.
#[derive(Clone)]
pub struct EdgeNotifier {
    tx: Sender<()>,
}

impl EdgeNotifier {
    pub fn notify(&self) {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                debug!("Overheat edge dropped: interlock gone")
            }
        }
    }
}

pub struct OverheatInterlock {
    signal: Mutex<Option<Box<dyn OverheatSignal>>>,
    latched: AtomicBool,
    debounce: Duration,
    bank: Arc<ActuatorBank>,
    state: Arc<SharedState>,
    sink: Arc<dyn EventSink>,
    subscribers: Mutex<Vec<Sender<InterlockEvent>>>,
    edge_tx: Sender<()>,
    edge_rx: Receiver<()>,
}

impl OverheatInterlock {
    /// `signal` is `None` when the cutoff input could not be set up; the
    /// poll path then reports "not triggered".
    pub fn new(
        signal: Option<Box<dyn OverheatSignal>>,
        debounce: Duration,
        bank: Arc<ActuatorBank>,
        state: Arc<SharedState>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        if signal.is_none() {
            warn!("Overheat input not available: poll path will report safe");
        } else {
            info!("Overheat monitoring set up on GPIO {}", crate::pins::OVERHEAT_GPIO);
        }
        let (edge_tx, edge_rx) = crossbeam_channel::bounded(1);
        Self {
            signal: Mutex::new(signal),
            latched: AtomicBool::new(false),
            debounce,
            bank,
            state,
            sink,
            subscribers: Mutex::new(Vec::new()),
            edge_tx,
            edge_rx,
        }
    }

    // ── Poll path ─────────────────────────────────────────────

    /// Live cutoff level for the supervisor cycle.
    ///
    /// A successful read also refreshes the latch to the live value.  A
    /// failed or unavailable read returns `false` and leaves the latch
    /// untouched.
    pub fn is_triggered(&self) -> bool {
        match self.query() {
            Ok(open) => {
                self.latched.store(open, Ordering::SeqCst);
                open
            }
            Err(InterlockError::Unavailable) => {
                debug!("Overheat input not available, assuming safe");
                false
            }
            Err(e) => {
                error!("Error checking overheat sensor: {}", e);
                false
            }
        }
    }

    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::SeqCst)
    }

    // ── Edge path ─────────────────────────────────────────────

    pub fn edge_notifier(&self) -> EdgeNotifier {
        EdgeNotifier {
            tx: self.edge_tx.clone(),
        }
    }

    /// Run the edge watcher until `stop` fires or its sender is dropped.
    pub fn spawn_watcher(self: &Arc<Self>, stop: Receiver<()>) -> std::io::Result<JoinHandle<()>> {
        let this = Arc::clone(self);
        thread::Builder::new()
            .name("interlock-watch".into())
            .spawn(move || {
                let edges = this.edge_rx.clone();
                loop {
                    select! {
                        recv(edges) -> msg => match msg {
                            Ok(()) => this.handle_edge(),
                            Err(_) => break,
                        },
                        recv(stop) -> _ => break,
                    }
                }
                debug!("Interlock watcher stopped");
            })
    }

    /// Debounce, re-confirm and trip.  Called by the watcher for every
    /// edge; exposed so edge sources without a watcher can call it inline.
    pub fn handle_edge(&self) {
        thread::sleep(self.debounce);
        match self.query() {
            Ok(true) => self.trip("OVERHEAT DETECTED! Initiating emergency shutdown."),
            Ok(false) => debug!("Overheat edge not confirmed after debounce, ignoring"),
            Err(e) => {
                error!("CRITICAL: overheat re-check failed ({}), treating as triggered", e);
                self.trip("Overheat state unknown after edge. Initiating emergency shutdown.");
            }
        }
    }

    fn trip(&self, reason: &str) {
        error!("CRITICAL: {}", reason);
        self.latched.store(true, Ordering::SeqCst);
        if let Err(e) = self.emergency_shutdown() {
            error!("CRITICAL: heater shutdown after overheat incomplete: {}", e);
        }
        self.state.push_alert(safety::overheat_alert());
        self.sink.emit(&AppEvent::InterlockTripped);
        self.notify(InterlockEvent::Tripped);
    }

    // ── Shutdown & reset ──────────────────────────────────────

    /// Force both heaters OFF and mirror them into live state.  Does not
    /// touch the latch.
    pub fn emergency_shutdown(&self) -> Result<(), ActuatorError> {
        error!("EMERGENCY SHUTDOWN ACTIVATED");
        let result = self.bank.heaters_off(Some(&self.state));
        match &result {
            Ok(()) => info!("Emergency shutdown complete - all heaters disabled"),
            Err(e) => error!("Error during emergency shutdown: {}", e),
        }
        result
    }

    /// Reset the latch.  Refuses (returns `false`) unless the cutoff
    /// currently reads closed.
    pub fn clear(&self) -> bool {
        match self.query() {
            Ok(false) => {
                self.latched.store(false, Ordering::SeqCst);
                info!("Emergency condition cleared");
                self.sink.emit(&AppEvent::InterlockCleared);
                self.notify(InterlockEvent::Cleared);
                true
            }
            Ok(true) => {
                warn!("Cannot reset emergency: Overheat condition still exists");
                false
            }
            Err(e) => {
                warn!("Cannot reset emergency: {}", e);
                false
            }
        }
    }

    /// Release the input pin.  Subsequent queries report unavailable.
    pub fn release(&self) {
        if let Some(mut signal) = self.signal.lock().take() {
            signal.release();
            info!("Emergency handler cleanup completed");
        }
    }

    // ── Observers ─────────────────────────────────────────────

    pub fn subscribe(&self) -> Receiver<InterlockEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    fn notify(&self, event: InterlockEvent) {
        self.subscribers.lock().retain(|tx| tx.send(event).is_ok());
    }

    fn query(&self) -> Result<bool, InterlockError> {
        match self.signal.lock().as_mut() {
            Some(signal) => signal.is_open(),
            None => Err(InterlockError::Unavailable),
        }
    }
}
