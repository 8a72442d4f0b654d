//! Integration tests for the AppService command, job and settings paths.
//!
//! These run on the host (x86_64) and verify that client commands reach
//! the relays, the job list and the stores correctly without any real
//! hardware.

use crate::mock_hw::{ActuatorCall, MemStore, MockHardware, RecordingSink};

use growbox::app::commands::AppCommand;
use growbox::app::events::AppEvent;
use growbox::app::ports::{ActuatorError, ConfigError, ConfigPort, JobStorePort, StorageError};
use growbox::app::service::AppService;
use growbox::config::Settings;
use growbox::control::pump::PumpState;
use growbox::error::{Error, JobError, ValveError};
use growbox::jobs::{JobRecord, JobTrigger};

fn make_app() -> (AppService, MockHardware, RecordingSink) {
    let mut app = AppService::new(Settings::default());
    let mut hw = MockHardware::new();
    let mut sink = RecordingSink::new();
    app.start(&mut hw, &mut sink).unwrap();
    (app, hw, sink)
}

fn record(id: i64) -> JobRecord {
    JobRecord {
        id,
        active: true,
        name: "basil".into(),
        trigger: JobTrigger::Time.code(),
        moisture_min: 25,
        moisture_max: 70,
        plant: 1,
        duration: 45,
        starttime: "18:30".into(),
        everyday: false,
    }
}

// ── Start-up ──────────────────────────────────────────────────

#[test]
fn start_lays_out_relays_and_reports() {
    let (app, hw, sink) = make_app();
    assert_eq!(
        &hw.calls[..2],
        &[ActuatorCall::ConfigureValves(3), ActuatorCall::AllOff]
    );
    let Some(AppEvent::Started(status)) = sink.events.first() else {
        panic!("expected Started, got {:?}", sink.events);
    };
    assert_eq!(status.pump, PumpState::Idle);
    assert_eq!(status.valves.as_slice(), &[false; 3]);
    assert!(!status.auto_enabled);
    assert_eq!(app.status(), *status);
}

// ── Valves and pump ───────────────────────────────────────────

#[test]
fn valve_toggle_twice_returns_to_closed() {
    let (mut app, mut hw, mut sink) = make_app();
    app.request_valve(2, &mut hw, &mut sink).unwrap();
    assert!(hw.valves[2]);
    app.request_valve(2, &mut hw, &mut sink).unwrap();
    assert!(!hw.valves[2]);
    assert_eq!(app.status().valves.as_slice(), &[false; 3]);
}

#[test]
fn pump_only_energised_after_valve_open() {
    let (mut app, mut hw, mut sink) = make_app();
    app.request_valve(0, &mut hw, &mut sink).unwrap();
    app.request_pump(true, true, 0, &mut hw, &mut sink).unwrap();

    let valve_at = hw
        .calls
        .iter()
        .position(|c| *c == ActuatorCall::SetValve(0, true))
        .unwrap();
    let pump_at = hw
        .calls
        .iter()
        .position(|c| *c == ActuatorCall::SetPump(true))
        .unwrap();
    assert!(valve_at < pump_at);
    assert_eq!(app.pump_state(), PumpState::Running);
}

#[test]
fn status_change_emitted_per_actuation() {
    let (mut app, mut hw, mut sink) = make_app();
    sink.events.clear();
    app.request_valve(1, &mut hw, &mut sink).unwrap();
    app.toggle_pump(0, &mut hw, &mut sink).unwrap();
    app.toggle_pump(2_000, &mut hw, &mut sink).unwrap();
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::StatusChanged(_))),
        3
    );
    let Some(AppEvent::StatusChanged(last)) = sink.events.last() else {
        panic!("expected StatusChanged");
    };
    assert_eq!(last.pump, PumpState::Idle);
    assert_eq!(last.pump_runtime_secs, 2);
}

#[test]
fn runtime_counter_resets() {
    let (mut app, mut hw, mut sink) = make_app();
    app.request_valve(0, &mut hw, &mut sink).unwrap();
    app.toggle_pump(0, &mut hw, &mut sink).unwrap();
    app.toggle_pump(9_000, &mut hw, &mut sink).unwrap();
    assert_eq!(app.status().pump_runtime_secs, 9);
    app.reset_runtime_counter(9_500, &mut sink);
    assert_eq!(app.status().pump_runtime_secs, 0);
}

// ── Jobs ──────────────────────────────────────────────────────

#[test]
fn added_job_is_listed_with_all_fields() {
    let (mut app, _, _) = make_app();
    app.add_job_record(&record(3)).unwrap();
    let jobs = app.list_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].to_record(), record(3));
}

#[test]
fn duplicate_and_invalid_jobs_rejected() {
    let (mut app, _, _) = make_app();
    app.add_job_record(&record(3)).unwrap();
    assert_eq!(
        app.add_job_record(&record(3)),
        Err(Error::Job(JobError::DuplicateId(3)))
    );
    assert_eq!(
        app.add_job_record(&record(-1)),
        Err(Error::Job(JobError::InvalidField("id")))
    );
    let mut bad_time = record(4);
    bad_time.starttime = "25:99".into();
    assert_eq!(
        app.add_job_record(&bad_time),
        Err(Error::Job(JobError::InvalidField("starttime")))
    );
    assert_eq!(app.list_jobs().len(), 1);
}

#[test]
fn id_zero_replaces_the_list() {
    let (mut app, _, _) = make_app();
    app.add_job_record(&record(1)).unwrap();
    app.add_job_record(&record(2)).unwrap();
    app.add_job_record(&record(0)).unwrap();
    let ids: Vec<u32> = app.list_jobs().iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![0]);
}

#[test]
fn jobs_survive_save_and_load() {
    let store = MemStore::default();
    let (mut app, _, _) = make_app();
    app.add_job_record(&record(1)).unwrap();
    app.add_job_record(&record(2)).unwrap();
    app.save_jobs(&store).unwrap();

    let (mut fresh, _, _) = make_app();
    assert_eq!(fresh.load_jobs(&store), Ok(2));
    assert_eq!(fresh.list_jobs(), app.list_jobs());
}

#[test]
fn invalid_stored_jobs_are_skipped() {
    let store = MemStore::default();
    let mut broken = record(2);
    broken.trigger = 9;
    store
        .save_jobs(&[record(1), broken, record(1), record(3)])
        .unwrap();

    let (mut app, _, _) = make_app();
    assert_eq!(app.load_jobs(&store), Ok(2));
    let ids: Vec<u32> = app.list_jobs().iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![1, 3]);
}

#[test]
fn failed_job_save_is_reported() {
    let store = MemStore::default();
    store.fail_writes.set(true);
    let (mut app, _, _) = make_app();
    app.add_job_record(&record(1)).unwrap();
    assert!(matches!(app.save_jobs(&store), Err(Error::Storage(_))));
}

// ── Settings ──────────────────────────────────────────────────

#[test]
fn new_plant_count_rebuilds_valve_bank() {
    let store = MemStore::default();
    let (mut app, mut hw, mut sink) = make_app();
    let settings = Settings {
        plant_count: 5,
        ..Settings::default()
    };
    app.apply_settings(settings.clone(), &mut hw, &store, &mut sink)
        .unwrap();
    assert!(hw.calls.contains(&ActuatorCall::ConfigureValves(5)));
    assert_eq!(app.status().valves.len(), 5);
    assert_eq!(app.valves().len(), 5);
    assert_eq!(store.load().unwrap(), settings);
    app.request_valve(4, &mut hw, &mut sink).unwrap();
}

#[test]
fn relayout_refused_while_pump_runs() {
    let store = MemStore::default();
    let (mut app, mut hw, mut sink) = make_app();
    app.request_valve(0, &mut hw, &mut sink).unwrap();
    app.request_pump(true, true, 0, &mut hw, &mut sink).unwrap();

    let settings = Settings {
        plant_count: 2,
        ..Settings::default()
    };
    assert_eq!(
        app.apply_settings(settings, &mut hw, &store, &mut sink),
        Err(Error::Busy)
    );
    assert_eq!(app.valves().len(), 3);
    assert!(store.settings.borrow().is_none());

    // Same layout: allowed even while watering.
    let settings = Settings {
        use_flowsensor: true,
        ..Settings::default()
    };
    app.apply_settings(settings, &mut hw, &store, &mut sink)
        .unwrap();
    assert!(app.status().use_flowsensor);
    assert!(hw.pump, "pump keeps running");
}

#[test]
fn invalid_settings_rejected() {
    let store = MemStore::default();
    let (mut app, mut hw, mut sink) = make_app();
    let settings = Settings {
        plant_count: 9,
        ..Settings::default()
    };
    assert!(matches!(
        app.apply_settings(settings, &mut hw, &store, &mut sink),
        Err(Error::Config(_))
    ));
    assert_eq!(app.settings().plant_count, 3);
}

#[test]
fn valve_layout_over_pump_relay_rejected() {
    let store = MemStore::default();
    let (mut app, mut hw, mut sink) = make_app();
    let settings = Settings {
        valve_start_pin: 26,
        plant_count: 8,
        ..Settings::default()
    };
    assert_eq!(
        app.apply_settings(settings, &mut hw, &store, &mut sink),
        Err(Error::Config("valve pins must not include the pump relay GPIO"))
    );
    assert!(!hw.calls.contains(&ActuatorCall::ConfigureValves(8)));
    assert_eq!(app.valves().len(), 3);
    assert!(store.settings.borrow().is_none());
}

#[test]
fn relay_refusal_keeps_old_layout() {
    let store = MemStore::default();
    let (mut app, mut hw, mut sink) = make_app();
    app.request_valve(1, &mut hw, &mut sink).unwrap();
    hw.bad_pin = Some(29);

    let settings = Settings {
        plant_count: 5,
        ..Settings::default()
    };
    assert_eq!(
        app.apply_settings(settings, &mut hw, &store, &mut sink),
        Err(Error::Actuator(ActuatorError::RelayConfig(29)))
    );
    assert_eq!(app.valves().len(), 3);
    assert_eq!(app.settings().plant_count, 3);
    assert!(store.settings.borrow().is_none());
    assert_eq!(hw.valves, vec![false, true, false]);

    // The rig still waters through the old layout.
    app.request_pump(true, true, 0, &mut hw, &mut sink).unwrap();
    assert!(hw.pump);
    assert!(hw.valves[1]);
}

#[test]
fn failed_settings_write_restores_layout() {
    let store = MemStore::default();
    store.fail_writes.set(true);
    let (mut app, mut hw, mut sink) = make_app();
    let settings = Settings {
        plant_count: 5,
        ..Settings::default()
    };
    assert_eq!(
        app.apply_settings(settings, &mut hw, &store, &mut sink),
        Err(Error::Settings(ConfigError::IoError))
    );
    let layouts: Vec<_> = hw
        .calls
        .iter()
        .filter(|c| matches!(c, ActuatorCall::ConfigureValves(_)))
        .collect();
    assert_eq!(
        layouts,
        vec![
            &ActuatorCall::ConfigureValves(3),
            &ActuatorCall::ConfigureValves(5),
            &ActuatorCall::ConfigureValves(3),
        ]
    );
    assert_eq!(hw.valves.len(), 3);
    assert_eq!(app.valves().len(), 3);
}

#[test]
fn start_fails_when_relays_refuse_layout() {
    let mut app = AppService::new(Settings::default());
    let mut hw = MockHardware::new();
    hw.bad_pin = Some(26);
    let mut sink = RecordingSink::new();
    assert_eq!(
        app.start(&mut hw, &mut sink),
        Err(Error::Actuator(ActuatorError::RelayConfig(26)))
    );
    assert!(hw.calls.contains(&ActuatorCall::AllOff));
    assert!(!hw.pump);
    assert!(sink.events.is_empty());
}

// ── Command dispatch ──────────────────────────────────────────

#[test]
fn commands_drive_the_rig() {
    let store = MemStore::default();
    let (mut app, mut hw, mut sink) = make_app();

    app.handle_command(AppCommand::ToggleValve(1), 0, &mut hw, &store, &mut sink)
        .unwrap();
    app.handle_command(AppCommand::TogglePump, 0, &mut hw, &store, &mut sink)
        .unwrap();
    assert!(hw.pump);
    assert_eq!(
        app.handle_command(AppCommand::ToggleValve(1), 10, &mut hw, &store, &mut sink),
        Err(Error::Valve(ValveError::PumpRunning))
    );
    app.handle_command(
        AppCommand::SetPump {
            on: false,
            manual: true,
        },
        3_000,
        &mut hw,
        &store,
        &mut sink,
    )
    .unwrap();
    assert!(!hw.pump);

    app.handle_command(AppCommand::ToggleAuto, 0, &mut hw, &store, &mut sink)
        .unwrap();
    assert!(app.status().auto_enabled);
    app.handle_command(AppCommand::SetAuto(false), 0, &mut hw, &store, &mut sink)
        .unwrap();
    assert!(!app.status().auto_enabled);

    app.handle_command(AppCommand::ResetCounter, 0, &mut hw, &store, &mut sink)
        .unwrap();
    assert_eq!(app.status().pump_runtime_secs, 0);
}

#[test]
fn job_commands_reach_the_store() {
    let store = MemStore::default();
    let (mut app, mut hw, mut sink) = make_app();

    app.handle_command(AppCommand::AddJob(record(1)), 0, &mut hw, &store, &mut sink)
        .unwrap();
    app.handle_command(AppCommand::SaveJobs, 0, &mut hw, &store, &mut sink)
        .unwrap();
    assert_eq!(store.load_jobs().unwrap(), vec![record(1)]);

    app.handle_command(AppCommand::DeleteAllJobs, 0, &mut hw, &store, &mut sink)
        .unwrap();
    assert!(app.list_jobs().is_empty());
    assert!(store.load_jobs().unwrap().is_empty());
}

#[test]
fn failed_store_delete_keeps_jobs() {
    let store = MemStore::default();
    let (mut app, mut hw, mut sink) = make_app();
    app.add_job_record(&record(1)).unwrap();
    store.fail_writes.set(true);

    assert_eq!(
        app.handle_command(AppCommand::DeleteAllJobs, 0, &mut hw, &store, &mut sink),
        Err(Error::Storage(StorageError::IoError))
    );
    assert_eq!(app.list_jobs().len(), 1);
}

#[test]
fn settings_command_persists() {
    let store = MemStore::default();
    let (mut app, mut hw, mut sink) = make_app();
    let settings = Settings {
        use_moisturesensor: true,
        ..Settings::default()
    };
    app.handle_command(
        AppCommand::ApplySettings(settings.clone()),
        0,
        &mut hw,
        &store,
        &mut sink,
    )
    .unwrap();
    assert_eq!(store.load().unwrap(), settings);
    assert!(app.status().use_moisturesensor);
}
