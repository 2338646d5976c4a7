//! Periodic task runner and time-based cadence gate.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PeriodicTask thread                                         │
//! │                                                              │
//! │   loop {                                                     │
//! │     catch_unwind(body)  ──panic──▶ on_panic(msg)             │
//! │     stop.recv_timeout(period - elapsed)                      │
//! │        ├─ timeout      → next iteration                      │
//! │        └─ stop / drop  → exit                                │
//! │   }                                                          │
//! └──────────────────────────────────────────────────────────────┘
//!         ▲
//!         │ stop(grace): signal, then wait ≤ grace for the
//!         │ in-flight iteration before giving up on the join
//! ```
//!
//! The stop signal is only honoured between iterations; an iteration in
//! progress always runs to completion.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, warn};

// ═══════════════════════════════════════════════════════════════
//  Periodic task
// ═══════════════════════════════════════════════════════════════

pub struct PeriodicTask {
    name: String,
    stop_tx: Option<Sender<()>>,
    /// Disconnects when the worker thread exits.
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn `body` on a named thread, running it every `period`
    /// (measured start to start).  A panicking iteration is reported to
    /// `on_panic` and the loop carries on.
    pub fn spawn<F, P>(name: &str, period: Duration, mut body: F, on_panic: P) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
        P: Fn(&str) + Send + 'static,
    {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        let thread_name = name.to_string();

        let handle = thread::Builder::new().name(thread_name.clone()).spawn(move || {
            let _done = done_tx;
            loop {
                let started = Instant::now();
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(&mut body)) {
                    let msg = panic_message(payload.as_ref());
                    error!("{}: iteration panicked: {}", thread_name, msg);
                    on_panic(&msg);
                }
                let wait = period.saturating_sub(started.elapsed());
                match stop_rx.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("{}: stopped", thread_name);
        })?;

        Ok(Self {
            name: name.to_string(),
            stop_tx: Some(stop_tx),
            done_rx,
            handle: Some(handle),
        })
    }

    /// Request a stop and wait at most `grace` for the worker to finish.
    /// Returns `false` if it was still busy when the grace period ran out;
    /// the thread is then detached.
    pub fn stop(&mut self, grace: Duration) -> bool {
        let Some(stop_tx) = self.stop_tx.take() else {
            return true;
        };
        let _ = stop_tx.try_send(());
        drop(stop_tx);

        match self.done_rx.recv_timeout(grace) {
            Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
                true
            }
            Ok(()) | Err(RecvTimeoutError::Timeout) => {
                warn!("{}: still running after {:?}, detaching", self.name, grace);
                self.handle.take();
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        // Dropping the sender wakes the worker; it exits after the current
        // iteration.
        self.stop_tx.take();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Cadence gate
// ═══════════════════════════════════════════════════════════════

/// Fires at most once per `interval` of wall time, regardless of how many
/// times it is polled.  The first poll always fires.
#[derive(Debug, Clone)]
pub struct Cadence {
    interval: Duration,
    last: Option<Instant>,
}

impl Cadence {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}
