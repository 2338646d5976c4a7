//! Overheat interlock edge path: debounce, trip, latch and reset.

use std::time::Duration;

use incubator::actuators::Channel;
use incubator::app::commands::{AppCommand, CommandReply};
use incubator::app::events::AppEvent;
use incubator::config::SystemConfig;
use incubator::error::InterlockError;
use incubator::interlock::InterlockEvent;
use incubator::safety::OVERHEAT_ALERT;

use crate::mock_hw::{Rig, make_app_with, test_config, wait_for};

const WAIT: Duration = Duration::from_secs(2);

/// The loop runs its first cycle immediately; wait for it so it cannot
/// race the scripted cutoff.
fn wait_first_cycle(rig: &Rig) {
    assert!(wait_for(WAIT, || !rig.history.records.lock().is_empty()));
}

/// Slow loop so only the edge path acts during a test.
fn edge_only_config() -> SystemConfig {
    SystemConfig {
        poll_interval_ms: 60_000,
        ..test_config()
    }
}

#[test]
fn confirmed_edge_trips_and_latches() {
    let (mut app, rig) = make_app_with(edge_only_config());
    app.start().unwrap();
    wait_first_cycle(&rig);
    let events = app.subscribe_interlock();

    assert!(app.submit_command("heater1", "on").success);
    assert!(app.submit_command("heater2", "on").success);

    rig.set_cutoff(Ok(true));
    app.edge_notifier().notify();
    assert_eq!(events.recv_timeout(WAIT), Ok(InterlockEvent::Tripped));

    let live = app.get_live_state();
    assert!(!live.heater1_on);
    assert!(!live.heater2_on);
    assert!(!rig.relays.level(Channel::Heater1));
    assert!(!rig.relays.level(Channel::Heater2));
    assert!(live.alerts.iter().any(|a| a.message == OVERHEAT_ALERT));
    assert!(rig.sink.contains(&AppEvent::InterlockTripped));

    // No cycle has published is_overheat yet; the latch alone vetoes.
    assert!(!live.is_overheat);
    assert!(!app.submit_command("heater1", "on").success);

    app.shutdown();
}

#[test]
fn clear_requires_closed_cutoff() {
    let (mut app, rig) = make_app_with(edge_only_config());
    app.start().unwrap();
    wait_first_cycle(&rig);
    let events = app.subscribe_interlock();

    rig.set_cutoff(Ok(true));
    app.edge_notifier().notify();
    assert_eq!(events.recv_timeout(WAIT), Ok(InterlockEvent::Tripped));

    let reply = app.handle_command(AppCommand::ClearInterlock);
    assert_eq!(
        reply,
        CommandReply::fail("Cannot reset emergency: Overheat condition still exists")
    );

    rig.set_cutoff(Err(InterlockError::ReadFailed));
    assert!(!app.handle_command(AppCommand::ClearInterlock).success);

    rig.set_cutoff(Ok(false));
    let reply = app.handle_command(AppCommand::ClearInterlock);
    assert_eq!(reply, CommandReply::ok("Emergency condition cleared"));
    assert_eq!(events.recv_timeout(WAIT), Ok(InterlockEvent::Cleared));
    assert!(rig.sink.contains(&AppEvent::InterlockCleared));

    assert!(app.submit_command("heater1", "on").success);
    app.shutdown();
}

#[test]
fn transient_edge_is_ignored() {
    let (mut app, rig) = make_app_with(edge_only_config());
    app.start().unwrap();
    wait_first_cycle(&rig);
    let events = app.subscribe_interlock();
    assert!(app.submit_command("heater1", "on").success);

    // Cutoff reads closed again by the time the debounce re-check runs.
    rig.set_cutoff(Ok(false));
    app.edge_notifier().notify();

    assert!(events.recv_timeout(Duration::from_millis(300)).is_err());
    assert!(app.get_live_state().heater1_on);
    assert!(rig.relays.level(Channel::Heater1));
    app.shutdown();
}

#[test]
fn failed_recheck_trips() {
    let (mut app, rig) = make_app_with(edge_only_config());
    app.start().unwrap();
    wait_first_cycle(&rig);
    let events = app.subscribe_interlock();
    assert!(app.submit_command("heater2", "on").success);

    rig.set_cutoff(Err(InterlockError::ReadFailed));
    app.edge_notifier().notify();

    assert_eq!(events.recv_timeout(WAIT), Ok(InterlockEvent::Tripped));
    assert!(!app.get_live_state().heater2_on);
    assert!(!rig.relays.level(Channel::Heater2));
    app.shutdown();
}

#[test]
fn cycle_observing_closed_cutoff_lifts_latch() {
    let (mut app, rig) = make_app_with(edge_only_config());
    app.start().unwrap();
    wait_first_cycle(&rig);
    let events = app.subscribe_interlock();

    rig.set_cutoff(Ok(true));
    app.edge_notifier().notify();
    assert_eq!(events.recv_timeout(WAIT), Ok(InterlockEvent::Tripped));

    rig.set_cutoff(Ok(false));
    app.run_cycle();
    assert!(!app.get_live_state().is_overheat);
    assert!(app.submit_command("heater1", "on").success);
    app.shutdown();
}

#[test]
fn edges_after_shutdown_do_nothing() {
    let (mut app, rig) = make_app_with(edge_only_config());
    app.start().unwrap();
    app.shutdown();

    rig.set_cutoff(Ok(true));
    app.edge_notifier().notify();
    std::thread::sleep(Duration::from_millis(50));
    assert!(!rig.sink.contains(&AppEvent::InterlockTripped));
}
