//! Concurrency harness: many callers hammering the same relays.
//!
//! Every relay write yields or sleeps inside the driver to widen the
//! window between "command accepted" and "hardware confirmed".  After all
//! callers finish, three views of each channel must agree: the bank's
//! tracked state, the published live-state flag and the physical level.

use std::time::Duration;

use incubator::actuators::Channel;
use incubator::app::commands::CommandReply;
use incubator::app::service::Incubator;
use incubator::config::SystemConfig;
use incubator::interlock::InterlockEvent;

use crate::mock_hw::{Rig, make_app, make_app_with, test_config, wait_for};

const WAIT: Duration = Duration::from_secs(2);

const THREADS: usize = 8;
const ROUNDS: usize = 150;

/// Small deterministic generator so each thread has its own sequence.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    fn channel(&mut self) -> Channel {
        Channel::WIRED[(self.next() % 3) as usize]
    }

    fn flip(&mut self) -> bool {
        self.next() % 2 == 0
    }
}

fn assert_consistent(app: &Incubator, rig: &Rig) {
    let live = app.get_live_state();
    for ch in Channel::WIRED {
        let tracked = app.relay_state(ch);
        let level = rig.relays.level(ch);
        assert_eq!(tracked, level, "{ch}: tracked vs hardware");
        assert_eq!(live.relay_flag(ch), Some(tracked), "{ch}: live vs tracked");
        let last = rig.relays.last_call(ch).is_some_and(|c| c.on);
        assert_eq!(last, level, "{ch}: last accepted write vs hardware");
    }
}

#[test]
fn concurrent_toggles_stay_in_sync() {
    let (app, rig) = make_app();
    rig.relays.set_write_delay(Duration::from_micros(50));

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let app = &app;
            s.spawn(move || {
                let mut rng = Lcg(t as u64 + 1);
                for _ in 0..ROUNDS {
                    let ch = rng.channel();
                    let action = if rng.flip() { "on" } else { "off" };
                    let _ = app.submit_command(ch.name(), action);
                }
            });
        }
    });

    assert_consistent(&app, &rig);
}

#[test]
fn injected_write_failures_never_desync() {
    let (app, rig) = make_app();

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let app = &app;
            s.spawn(move || {
                let mut rng = Lcg(t as u64 * 31 + 7);
                for _ in 0..ROUNDS {
                    let ch = rng.channel();
                    let _ = app.submit_command(ch.name(), if rng.flip() { "on" } else { "off" });
                }
            });
        }
        let relays = rig.relays.clone();
        s.spawn(move || {
            let mut rng = Lcg(99);
            for _ in 0..ROUNDS {
                relays.set_failing(rng.channel(), rng.flip());
                std::thread::yield_now();
            }
        });
    });

    assert_consistent(&app, &rig);
}

#[test]
fn emergency_shutdown_amid_toggles() {
    let (app, rig) = make_app();
    rig.relays.set_write_delay(Duration::from_micros(20));

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let app = &app;
            s.spawn(move || {
                let mut rng = Lcg(t as u64 + 1000);
                for _ in 0..ROUNDS {
                    let heater = Channel::HEATERS[(rng.next() % 2) as usize];
                    let _ = app.submit_command(heater.name(), if rng.flip() { "on" } else { "off" });
                }
            });
        }
        for _ in 0..20 {
            assert!(app.emergency_shutdown().success);
            std::thread::yield_now();
        }
    });

    assert_consistent(&app, &rig);

    assert!(app.emergency_shutdown().success);
    let live = app.get_live_state();
    assert!(!live.heater1_on);
    assert!(!live.heater2_on);
    assert!(!rig.relays.level(Channel::Heater1));
    assert!(!rig.relays.level(Channel::Heater2));
}

#[test]
fn cycles_and_commands_interleave_safely() {
    let (app, rig) = make_app();
    rig.set_cutoff(Ok(true));

    std::thread::scope(|s| {
        for t in 0..THREADS / 2 {
            let app = &app;
            s.spawn(move || {
                let mut rng = Lcg(t as u64 + 500);
                for _ in 0..ROUNDS {
                    let ch = rng.channel();
                    let _ = app.submit_command(ch.name(), if rng.flip() { "on" } else { "off" });
                }
            });
        }
        let app = &app;
        s.spawn(move || {
            for _ in 0..ROUNDS / 5 {
                app.run_cycle();
            }
        });
    });

    assert_consistent(&app, &rig);

    // Once a cycle has published the overheat, no heater can come back.
    app.run_cycle();
    for heater in Channel::HEATERS {
        assert!(!app.submit_command(heater.name(), "on").success);
        assert!(!rig.relays.level(heater));
        assert!(!app.relay_state(heater));
    }
}

// ── Veto check vs. interlock shutdown ─────────────────────────

fn assert_heaters_off(app: &Incubator, rig: &Rig) {
    let live = app.get_live_state();
    for heater in Channel::HEATERS {
        assert!(!rig.relays.level(heater), "{heater} energised on hardware");
        assert!(!app.relay_state(heater), "{heater} tracked ON");
        assert_eq!(live.relay_flag(heater), Some(false), "{heater} published ON");
    }
}

#[test]
fn heater_request_overtaken_by_edge_trip_is_vetoed() {
    let (mut app, rig) = make_app_with(SystemConfig {
        poll_interval_ms: 60_000,
        ..test_config()
    });
    app.start().unwrap();
    // The first cycle is the only other clock reader; let it finish.
    assert!(wait_for(WAIT, || !rig.history.records.lock().is_empty()));
    let events = app.subscribe_interlock();

    let (parked, resume) = rig.clock.hold_next();
    std::thread::scope(|s| {
        let request = s.spawn(|| app.submit_command("heater1", "on"));
        parked.recv_timeout(WAIT).unwrap();

        rig.set_cutoff(Ok(true));
        app.edge_notifier().notify();
        assert_eq!(events.recv_timeout(WAIT), Ok(InterlockEvent::Tripped));

        resume.send(()).unwrap();
        assert_eq!(
            request.join().unwrap(),
            CommandReply::fail("Cannot turn on heaters during overheat condition")
        );
    });

    assert_heaters_off(&app, &rig);
    app.shutdown();
}

#[test]
fn heater_request_overtaken_by_cycle_shutdown_is_vetoed() {
    let (app, rig) = make_app();
    assert!(app.submit_command("heater2", "on").success);

    let (parked, resume) = rig.clock.hold_next();
    std::thread::scope(|s| {
        let request = s.spawn(|| app.submit_command("heater1", "on"));
        parked.recv_timeout(WAIT).unwrap();

        rig.set_cutoff(Ok(true));
        app.run_cycle();
        assert!(app.get_live_state().is_overheat);

        resume.send(()).unwrap();
        assert!(!request.join().unwrap().success);
    });

    assert_heaters_off(&app, &rig);
}
