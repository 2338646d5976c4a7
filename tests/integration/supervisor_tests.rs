//! Monitoring-cycle behaviour against mock hardware.

use std::time::Duration;

use incubator::actuators::Channel;
use incubator::app::events::AppEvent;
use incubator::app::ports::Clock;
use incubator::error::{InterlockError, SensorError};
use incubator::safety::OVERHEAT_ALERT;
use incubator::state::Severity;

use crate::mock_hw::{SensorStep, make_app};

fn messages(app: &incubator::app::service::Incubator) -> Vec<String> {
    app.get_live_state()
        .alerts
        .into_iter()
        .map(|a| a.message)
        .collect()
}

// ── Publishing ────────────────────────────────────────────────

#[test]
fn good_reading_is_published() {
    let (app, rig) = make_app();
    rig.set_reading(99.8, 57.2);
    rig.clock.advance(Duration::from_secs(5));

    app.run_cycle();

    let live = app.get_live_state();
    assert_eq!(live.temperature, 99.8);
    assert_eq!(live.humidity, 57.2);
    assert!(!live.is_overheat);
    assert_eq!(live.last_updated, rig.clock.now());
    assert!(live.alerts.is_empty());
}

#[test]
fn failed_read_publishes_sentinel_and_danger_alert() {
    let (app, rig) = make_app();
    rig.set_sensor(SensorStep::Fail(SensorError::Bus));
    rig.clock.advance(Duration::from_secs(5));

    app.run_cycle();

    let live = app.get_live_state();
    assert_eq!(live.temperature, 0.0);
    assert_eq!(live.humidity, 0.0);
    assert_eq!(live.last_updated, rig.clock.now());
    assert_eq!(live.alerts.len(), 1);
    assert_eq!(live.alerts[0].severity, Severity::Danger);
    assert!(live.alerts[0].message.starts_with("Sensor error: "));
}

#[test]
fn sentinel_cycle_keeps_previous_alerts() {
    let (app, rig) = make_app();
    rig.set_reading(103.0, 55.0);
    app.run_cycle();
    assert_eq!(messages(&app), vec!["WARNING: Temperature too high (103.0°F)"]);

    rig.set_sensor(SensorStep::Fail(SensorError::Checksum));
    app.run_cycle();
    app.run_cycle();

    let msgs = messages(&app);
    assert_eq!(msgs.len(), 3, "{msgs:?}");
    assert_eq!(msgs[0], "WARNING: Temperature too high (103.0°F)");
    assert!(msgs[1].starts_with("Sensor error: "));
    assert!(msgs[2].starts_with("Sensor error: "));

    rig.set_reading(99.5, 55.0);
    app.run_cycle();
    assert!(messages(&app).is_empty());
}

// ── Threshold alerts ──────────────────────────────────────────

#[test]
fn temperature_alerts_follow_reading() {
    let (app, rig) = make_app();

    rig.set_reading(94.0, 55.0);
    app.run_cycle();
    assert_eq!(messages(&app), vec!["WARNING: Temperature too low (94.0°F)"]);

    rig.set_reading(102.5, 55.0);
    app.run_cycle();
    assert_eq!(messages(&app), vec!["WARNING: Temperature too high (102.5°F)"]);

    rig.set_reading(100.0, 55.0);
    app.run_cycle();
    assert!(messages(&app).is_empty());
}

#[test]
fn low_humidity_only_warns_with_humidifier_on() {
    let (app, rig) = make_app();
    rig.set_reading(99.5, 30.0);

    app.run_cycle();
    assert!(messages(&app).is_empty());

    assert!(app.submit_command("humidifier", "on").success);
    app.run_cycle();
    assert_eq!(messages(&app), vec!["WARNING: Humidity too low (30.0%)"]);
}

#[test]
fn high_humidity_always_warns() {
    let (app, rig) = make_app();
    rig.set_reading(99.5, 75.0);
    app.run_cycle();
    assert_eq!(messages(&app), vec!["WARNING: Humidity too high (75.0%)"]);
}

// ── Interlock enforcement ─────────────────────────────────────

#[test]
fn overheat_forces_heaters_off_in_same_cycle() {
    let (app, rig) = make_app();
    assert!(app.submit_command("heater1", "on").success);
    assert!(app.submit_command("heater2", "on").success);
    assert!(app.submit_command("humidifier", "on").success);

    rig.set_cutoff(Ok(true));
    app.run_cycle();

    let live = app.get_live_state();
    assert!(live.is_overheat);
    assert!(!live.heater1_on);
    assert!(!live.heater2_on);
    assert!(live.humidifier_on, "humidifier is not part of the interlock");
    assert!(!rig.relays.level(Channel::Heater1));
    assert!(!rig.relays.level(Channel::Heater2));
    assert!(live.alerts.iter().any(|a| a.message == OVERHEAT_ALERT));
}

#[test]
fn overheat_alert_repeats_every_cycle() {
    let (app, rig) = make_app();
    rig.set_cutoff(Ok(true));
    app.run_cycle();
    app.run_cycle();

    let overheat = messages(&app)
        .iter()
        .filter(|m| *m == OVERHEAT_ALERT)
        .count();
    assert_eq!(overheat, 1, "good readings rebuild the list each cycle");
}

#[test]
fn failed_cutoff_read_is_treated_as_safe() {
    let (app, rig) = make_app();
    assert!(app.submit_command("heater1", "on").success);

    rig.set_cutoff(Err(InterlockError::ReadFailed));
    app.run_cycle();

    let live = app.get_live_state();
    assert!(!live.is_overheat);
    assert!(live.heater1_on);
    assert!(rig.relays.level(Channel::Heater1));
}

#[test]
fn refused_heater_write_keeps_state_truthful() {
    let (app, rig) = make_app();
    assert!(app.submit_command("heater1", "on").success);
    assert!(app.submit_command("heater2", "on").success);

    rig.relays.set_failing(Channel::Heater1, true);
    rig.set_cutoff(Ok(true));
    app.run_cycle();

    let live = app.get_live_state();
    // heater1 could not be switched and the state says so.
    assert!(live.heater1_on);
    assert!(rig.relays.level(Channel::Heater1));
    assert!(!live.heater2_on);
    assert!(
        live.alerts
            .iter()
            .any(|a| a.severity == Severity::Danger && a.message.contains("heater1")),
        "{:?}",
        live.alerts
    );
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn first_cycle_records_history_and_purges() {
    let (app, rig) = make_app();
    assert!(app.submit_command("heater2", "on").success);
    rig.set_reading(98.6, 52.0);

    app.run_cycle();
    app.run_cycle();

    let records = rig.history.records.lock();
    assert_eq!(records.len(), 1, "one record per telemetry interval");
    let rec = &records[0];
    assert_eq!(rec.temperature, 98.6);
    assert_eq!(rec.humidity, 52.0);
    assert!(!rec.heater1_on);
    assert!(rec.heater2_on);
    assert_eq!(rec.target_temperature, 99.5);
    assert_eq!(rec.target_humidity, 55.0);
    assert_eq!(rec.timestamp, rig.clock.now());
    assert_eq!(*rig.history.purges.lock(), vec![21]);

    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::Telemetry(_))),
        1
    );
}

#[test]
fn history_failure_does_not_reach_live_state() {
    let (app, rig) = make_app();
    *rig.history.fail.lock() = true;

    app.run_cycle();

    let live = app.get_live_state();
    assert!(live.alerts.is_empty());
    assert_eq!(live.temperature, 99.5);
}
