//! End-to-end watering scenarios.
//!
//! Drives `AppService::tick` at the control-loop cadence against mock
//! adapters and checks the relay edges, their timing and the emitted
//! events.

use crate::mock_hw::{Edge, MockClock, MockHardware, RecordingSink};

use growbox::app::events::AppEvent;
use growbox::app::service::AppService;
use growbox::config::{MoistureRule, Settings};
use growbox::control::pump::PumpState;
use growbox::error::{Error, PumpError, ValveError};
use growbox::fsm::context::AbortReason;
use growbox::fsm::JobState;
use growbox::jobs::{JobRecord, JobTrigger};

/// 2024-05-01 07:00:03 UTC.
const SEVEN_OH_THREE: i64 = 1_714_546_803;
/// 2024-05-01 12:00:00 UTC.
const NOON: i64 = 1_714_564_800;

struct Rig {
    app: AppService,
    hw: MockHardware,
    clock: MockClock,
    sink: RecordingSink,
    now_ms: u64,
    /// When set, the wall clock advances with the tick clock.
    epoch_base: Option<i64>,
}

impl Rig {
    fn new(settings: Settings, clock: MockClock) -> Self {
        let epoch_base = (clock.epoch > 0).then_some(clock.epoch);
        let mut app = AppService::new(settings);
        let mut hw = MockHardware::new();
        let mut sink = RecordingSink::new();
        app.start(&mut hw, &mut sink).unwrap();
        Self {
            app,
            hw,
            clock,
            sink,
            now_ms: 0,
            epoch_base,
        }
    }

    fn tick(&mut self) {
        self.hw.now_ms = self.now_ms;
        if let Some(base) = self.epoch_base {
            self.clock.epoch = base + (self.now_ms / 1000) as i64;
        }
        self.app
            .tick(self.now_ms, &mut self.hw, &mut self.clock, &mut self.sink);
    }

    /// Tick every 100 ms up to and including `until_ms`.
    fn run_until(&mut self, until_ms: u64) {
        while self.now_ms <= until_ms {
            self.tick();
            self.now_ms += 100;
        }
    }

    fn started_jobs(&self) -> Vec<(u32, u8)> {
        self.sink
            .events
            .iter()
            .filter_map(|e| match e {
                AppEvent::JobStarted { id, plant_index } => Some((*id, *plant_index)),
                _ => None,
            })
            .collect()
    }

    fn finished_jobs(&self) -> Vec<u32> {
        self.sink
            .events
            .iter()
            .filter_map(|e| match e {
                AppEvent::JobFinished { id } => Some(*id),
                _ => None,
            })
            .collect()
    }
}

fn auto_settings() -> Settings {
    Settings {
        auto_enabled: true,
        ..Settings::default()
    }
}

fn record(id: i64, trigger: JobTrigger, plant: i32, duration: i64, start: &str) -> JobRecord {
    JobRecord {
        id,
        active: true,
        name: format!("job {id}"),
        trigger: trigger.code(),
        moisture_min: 20,
        moisture_max: 80,
        plant,
        duration,
        starttime: start.into(),
        everyday: true,
    }
}

// ── Scheduled job runs its full cycle ─────────────────────────

#[test]
fn seven_o_clock_job_runs_full_cycle() {
    let mut rig = Rig::new(auto_settings(), MockClock::at(SEVEN_OH_THREE));
    rig.app
        .add_job_record(&record(1, JobTrigger::Time, 0, 5, "07:00"))
        .unwrap();

    rig.run_until(7_000);

    assert_eq!(rig.started_jobs(), vec![(1, 0)]);
    assert_eq!(rig.finished_jobs(), vec![1]);
    assert_eq!(
        rig.hw.edges,
        vec![
            (100, Edge::ValveOpen(0)),
            (600, Edge::PumpOn),
            (5_600, Edge::PumpOff),
            (6_350, Edge::ValveClose(0)),
        ]
    );
    assert_eq!(rig.app.job_state(), JobState::Idle);
    assert!(rig.app.running_job().is_none());
    assert_eq!(rig.app.pump_state(), PumpState::Idle);
    assert_eq!(rig.app.status().pump_runtime_secs, 5);
}

#[test]
fn clock_sync_waits_for_the_job_to_finish() {
    let mut rig = Rig::new(auto_settings(), MockClock::at(SEVEN_OH_THREE));
    rig.app
        .add_job_record(&record(1, JobTrigger::Time, 0, 5, "07:00"))
        .unwrap();

    rig.run_until(6_300);
    assert_eq!(rig.clock.sync_requests, 0, "job in flight holds the sync");

    rig.run_until(7_000);
    assert_eq!(rig.clock.sync_requests, 1);
    assert!(rig.sink.events.iter().any(|e| matches!(e, AppEvent::TimeSynced { .. })));
    assert!(rig.app.status().clock_synced);
    assert!(rig.clock.timezone.is_some());
}

#[test]
fn job_does_not_repeat_the_same_day() {
    let mut rig = Rig::new(auto_settings(), MockClock::at(SEVEN_OH_THREE));
    rig.app
        .add_job_record(&record(1, JobTrigger::Time, 0, 1, "07:00"))
        .unwrap();

    // Still inside the window long after the cycle ended.
    rig.run_until(25_000);
    assert_eq!(rig.started_jobs(), vec![(1, 0)]);
}

#[test]
fn first_matching_job_wins_second_is_deferred() {
    let mut rig = Rig::new(auto_settings(), MockClock::at(SEVEN_OH_THREE));
    rig.app
        .add_job_record(&record(1, JobTrigger::Time, 0, 2, "07:00"))
        .unwrap();
    rig.app
        .add_job_record(&record(2, JobTrigger::Time, 1, 2, "07:00"))
        .unwrap();

    rig.run_until(20_000);
    // Job 2 matches while job 1 is in flight, then the cooldown outlasts
    // the window: cycles never overlap.
    assert_eq!(rig.started_jobs(), vec![(1, 0)]);
    assert!(!rig.hw.edges_only().contains(&Edge::ValveOpen(1)));
}

#[test]
fn unsynced_clock_blocks_time_triggers_until_sync() {
    let mut clock = MockClock::unset();
    clock.sync_to = Some(SEVEN_OH_THREE);
    let mut rig = Rig::new(auto_settings(), clock);
    rig.app
        .add_job_record(&record(1, JobTrigger::Time, 0, 5, "07:00"))
        .unwrap();

    rig.run_until(0);
    assert!(rig.started_jobs().is_empty(), "no wall clock yet");
    assert_eq!(rig.clock.sync_requests, 1);

    rig.run_until(1_000);
    assert_eq!(rig.started_jobs(), vec![(1, 0)]);
}

#[test]
fn sync_gives_up_after_three_attempts() {
    let mut rig = Rig::new(auto_settings(), MockClock::unset());
    rig.run_until(40_000);
    assert_eq!(rig.clock.sync_requests, 3);
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::TimeSyncFailed { attempts: 3 }));
    assert!(!rig.app.status().clock_synced);
}

// ── Moisture triggers ─────────────────────────────────────────

fn moisture_settings(rule: MoistureRule) -> Settings {
    Settings {
        auto_enabled: true,
        use_moisturesensor: true,
        moisture_rule: rule,
        ..Settings::default()
    }
}

#[test]
fn dry_plant_triggers_moisture_job() {
    let mut rig = Rig::new(moisture_settings(MoistureRule::default()), MockClock::at(NOON));
    rig.hw.moisture.insert(1, 15);
    rig.app
        .add_job_record(&record(4, JobTrigger::Moisture, 1, 3, ""))
        .unwrap();

    rig.run_until(5_000);
    assert_eq!(rig.started_jobs(), vec![(4, 1)]);
    assert_eq!(rig.finished_jobs(), vec![4]);
    assert_eq!(rig.hw.edge_time(Edge::ValveOpen(1)), Some(100));
}

#[test]
fn mid_band_reading_depends_on_rule() {
    for (rule, fires) in [
        (MoistureRule::OutsideBand, false),
        (MoistureRule::DryOnly, false),
        (MoistureRule::AnyReading, true),
    ] {
        let mut rig = Rig::new(moisture_settings(rule), MockClock::at(NOON));
        rig.hw.moisture.insert(1, 50);
        rig.app
            .add_job_record(&record(4, JobTrigger::Moisture, 1, 3, ""))
            .unwrap();
        rig.run_until(500);
        assert_eq!(!rig.started_jobs().is_empty(), fires, "{rule:?}");
    }
}

#[test]
fn moisture_ignored_when_sensors_disabled() {
    let mut rig = Rig::new(auto_settings(), MockClock::at(NOON));
    rig.hw.moisture.insert(1, 5);
    rig.app
        .add_job_record(&record(4, JobTrigger::Moisture, 1, 3, ""))
        .unwrap();
    rig.run_until(2_000);
    assert!(rig.started_jobs().is_empty());
    assert_eq!(rig.hw.moisture_reads, 0);
}

#[test]
fn both_trigger_fires_on_moisture_outside_its_time() {
    let mut rig = Rig::new(moisture_settings(MoistureRule::default()), MockClock::at(NOON));
    rig.hw.moisture.insert(2, 10);
    rig.app
        .add_job_record(&record(5, JobTrigger::Both, 2, 3, "07:00"))
        .unwrap();
    rig.run_until(500);
    assert_eq!(rig.started_jobs(), vec![(5, 2)]);
}

#[test]
fn missing_probe_skips_job() {
    let mut rig = Rig::new(moisture_settings(MoistureRule::AnyReading), MockClock::at(NOON));
    rig.app
        .add_job_record(&record(4, JobTrigger::Moisture, 2, 3, ""))
        .unwrap();
    rig.run_until(1_000);
    assert!(rig.started_jobs().is_empty());
}

// ── Refusals and aborts ───────────────────────────────────────

#[test]
fn pump_request_with_all_valves_closed_is_refused() {
    let mut rig = Rig::new(Settings::default(), MockClock::unset());
    let result = rig
        .app
        .request_pump(true, false, 0, &mut rig.hw, &mut rig.sink);
    assert_eq!(result, Err(Error::Pump(PumpError::InterlockFailed)));
    assert_eq!(rig.app.pump_state(), PumpState::Idle);
    assert!(rig.hw.edges.is_empty(), "no physical actuation");
}

#[test]
fn job_for_missing_plant_aborts_and_releases_lock() {
    let mut rig = Rig::new(auto_settings(), MockClock::at(SEVEN_OH_THREE));
    rig.app
        .add_job_record(&record(7, JobTrigger::Time, 5, 5, "07:00"))
        .unwrap();

    rig.run_until(200);
    assert!(rig.sink.events.contains(&AppEvent::JobAborted {
        id: 7,
        reason: AbortReason::Valve(ValveError::InvalidIndex(5)),
    }));
    assert!(rig.hw.edges.is_empty());
    assert_eq!(rig.app.job_state(), JobState::Idle);
    assert!(rig.app.running_job().is_none());
}

#[test]
fn manual_pump_off_ends_job_through_stop_sequence() {
    let mut rig = Rig::new(auto_settings(), MockClock::at(SEVEN_OH_THREE));
    rig.app
        .add_job_record(&record(1, JobTrigger::Time, 0, 60, "07:00"))
        .unwrap();
    rig.run_until(2_000);
    assert_eq!(rig.app.pump_state(), PumpState::Running);

    rig.hw.now_ms = rig.now_ms;
    rig.app
        .request_pump(false, true, rig.now_ms, &mut rig.hw, &mut rig.sink)
        .unwrap();
    assert_eq!(rig.app.pump_state(), PumpState::Idle);
    assert_eq!(rig.app.job_state(), JobState::Running, "job notices on its next tick");

    rig.run_until(4_000);
    assert_eq!(rig.finished_jobs(), vec![1]);
    assert_eq!(
        rig.hw.edges_only(),
        vec![Edge::ValveOpen(0), Edge::PumpOn, Edge::PumpOff, Edge::ValveClose(0)]
    );
    let off = rig.hw.edge_time(Edge::PumpOff).unwrap();
    let close = rig.hw.edge_time(Edge::ValveClose(0)).unwrap();
    assert!(close >= off + 750, "valve closes after the pump settle delay");
}

#[test]
fn operator_cannot_close_job_valve_while_watering() {
    let mut rig = Rig::new(auto_settings(), MockClock::at(SEVEN_OH_THREE));
    rig.app
        .add_job_record(&record(1, JobTrigger::Time, 0, 5, "07:00"))
        .unwrap();
    rig.run_until(1_000);
    assert_eq!(
        rig.app.request_valve(0, &mut rig.hw, &mut rig.sink),
        Err(Error::Valve(ValveError::PumpRunning))
    );
    assert!(rig.hw.pump && rig.hw.valves[0]);
}

// ── Gates ─────────────────────────────────────────────────────

#[test]
fn auto_off_suppresses_triggers() {
    let mut rig = Rig::new(Settings::default(), MockClock::at(SEVEN_OH_THREE));
    rig.app
        .add_job_record(&record(1, JobTrigger::Time, 0, 5, "07:00"))
        .unwrap();
    rig.run_until(3_000);
    assert!(rig.started_jobs().is_empty());
    assert!(rig.app.status().clock_synced, "clock sync is independent of auto mode");

    rig.app.set_auto_enabled(true, &mut rig.sink);
    rig.run_until(5_000);
    assert_eq!(rig.started_jobs(), vec![(1, 0)]);
}

#[test]
fn firmware_update_pauses_triggers_and_sync() {
    let mut rig = Rig::new(auto_settings(), MockClock::at(SEVEN_OH_THREE));
    rig.app
        .add_job_record(&record(1, JobTrigger::Time, 0, 5, "07:00"))
        .unwrap();
    rig.app.set_ota_in_progress(true);
    rig.run_until(5_000);
    assert!(rig.started_jobs().is_empty());
    assert_eq!(rig.clock.sync_requests, 0);

    rig.app.set_ota_in_progress(false);
    rig.run_until(7_000);
    assert_eq!(rig.started_jobs(), vec![(1, 0)]);
}

#[test]
fn inactive_job_is_never_started() {
    let mut rig = Rig::new(auto_settings(), MockClock::at(SEVEN_OH_THREE));
    let mut r = record(1, JobTrigger::Time, 0, 5, "07:00");
    r.active = false;
    rig.app.add_job_record(&r).unwrap();
    rig.run_until(3_000);
    assert!(rig.started_jobs().is_empty());
}
