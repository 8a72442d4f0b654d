//! Mock adapters for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO registers, plus a settable clock,
//! an in-memory store and a recording event sink.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use growbox::app::events::AppEvent;
use growbox::app::ports::{
    ActuatorError, ActuatorPort, ConfigError, ConfigPort, EventSink, JobStorePort, MoisturePort,
    StorageError, TimeAuthority,
};
use growbox::config::Settings;
use growbox::jobs::JobRecord;
use growbox::sensors::MoistureReading;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    SetPump(bool),
    SetValve(usize, bool),
    ConfigureValves(usize),
    AllOff,
}

/// A physical change of a relay, stamped with the mock's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    PumpOn,
    PumpOff,
    ValveOpen(usize),
    ValveClose(usize),
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<ActuatorCall>,
    /// Relay changes as `(now_ms, edge)`.
    pub edges: Vec<(u64, Edge)>,
    /// Stamp used for edges; tests set it before each tick.
    pub now_ms: u64,
    pub pump: bool,
    pub valves: Vec<bool>,
    /// Moisture percent per plant; missing plants read `None`.
    pub moisture: HashMap<u8, u8>,
    pub moisture_reads: usize,
    /// Relay layouts containing this GPIO are refused.
    pub bad_pin: Option<i32>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            edges: Vec::new(),
            now_ms: 0,
            pump: false,
            valves: Vec::new(),
            moisture: HashMap::new(),
            moisture_reads: 0,
            bad_pin: None,
        }
    }

    pub fn edges_only(&self) -> Vec<Edge> {
        self.edges.iter().map(|(_, e)| *e).collect()
    }

    pub fn edge_time(&self, edge: Edge) -> Option<u64> {
        self.edges.iter().find(|(_, e)| *e == edge).map(|(t, _)| *t)
    }

    pub fn any_valve_open(&self) -> bool {
        self.valves.iter().any(|&v| v)
    }

    fn change_pump(&mut self, on: bool) {
        if self.pump != on {
            self.pump = on;
            let edge = if on { Edge::PumpOn } else { Edge::PumpOff };
            self.edges.push((self.now_ms, edge));
        }
    }

    fn change_valve(&mut self, index: usize, open: bool) {
        if index >= self.valves.len() {
            self.valves.resize(index + 1, false);
        }
        if self.valves[index] != open {
            self.valves[index] = open;
            let edge = if open {
                Edge::ValveOpen(index)
            } else {
                Edge::ValveClose(index)
            };
            self.edges.push((self.now_ms, edge));
        }
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorPort for MockHardware {
    fn set_pump(&mut self, on: bool) {
        self.calls.push(ActuatorCall::SetPump(on));
        self.change_pump(on);
    }

    fn set_valve(&mut self, index: usize, open: bool) {
        self.calls.push(ActuatorCall::SetValve(index, open));
        self.change_valve(index, open);
    }

    fn configure_valves(&mut self, pins: &[i32]) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::ConfigureValves(pins.len()));
        if let Some(bad) = self.bad_pin.filter(|bad| pins.contains(bad)) {
            return Err(ActuatorError::RelayConfig(bad));
        }
        self.valves = vec![false; pins.len()];
        Ok(())
    }

    fn all_off(&mut self) {
        self.calls.push(ActuatorCall::AllOff);
        self.change_pump(false);
        for i in 0..self.valves.len() {
            self.change_valve(i, false);
        }
    }
}

impl MoisturePort for MockHardware {
    fn read_moisture(&mut self, plant_index: u8) -> Option<MoistureReading> {
        self.moisture_reads += 1;
        self.moisture.get(&plant_index).map(|&percent| MoistureReading {
            plant_index,
            percent,
            is_dry: percent < 20,
        })
    }
}

// ── MockClock ─────────────────────────────────────────────────

pub struct MockClock {
    pub epoch: i64,
    pub offset: time::UtcOffset,
    pub sync_requests: u32,
    pub timezone: Option<String>,
    /// Epoch the clock jumps to when a sync is requested.
    pub sync_to: Option<i64>,
}

#[allow(dead_code)]
impl MockClock {
    /// A clock that has never been set.
    pub fn unset() -> Self {
        Self {
            epoch: 0,
            offset: time::UtcOffset::UTC,
            sync_requests: 0,
            timezone: None,
            sync_to: None,
        }
    }

    /// A clock already showing `epoch`.
    pub fn at(epoch: i64) -> Self {
        Self {
            epoch,
            ..Self::unset()
        }
    }
}

impl TimeAuthority for MockClock {
    fn begin_sync(&mut self) {
        self.sync_requests += 1;
        if let Some(epoch) = self.sync_to {
            self.epoch = epoch;
        }
    }

    fn current_epoch_time(&self) -> i64 {
        self.epoch
    }

    fn apply_timezone(&mut self, tz: &str) {
        self.timezone = Some(tz.to_owned());
    }

    fn utc_offset(&self, _epoch: i64) -> time::UtcOffset {
        self.offset
    }
}

// ── MemStore ──────────────────────────────────────────────────

/// In-memory settings and job store.
#[derive(Default)]
pub struct MemStore {
    pub settings: RefCell<Option<Settings>>,
    pub jobs: RefCell<Option<Vec<JobRecord>>>,
    pub fail_writes: Cell<bool>,
}

impl ConfigPort for MemStore {
    fn load(&self) -> Result<Settings, ConfigError> {
        Ok(self.settings.borrow().clone().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        settings.validate().map_err(ConfigError::ValidationFailed)?;
        if self.fail_writes.get() {
            return Err(ConfigError::IoError);
        }
        *self.settings.borrow_mut() = Some(settings.clone());
        Ok(())
    }
}

impl JobStorePort for MemStore {
    fn load_jobs(&self) -> Result<Vec<JobRecord>, StorageError> {
        Ok(self.jobs.borrow().clone().unwrap_or_default())
    }

    fn save_jobs(&self, jobs: &[JobRecord]) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Full);
        }
        *self.jobs.borrow_mut() = Some(jobs.to_vec());
        Ok(())
    }

    fn delete_jobs(&self) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::IoError);
        }
        *self.jobs.borrow_mut() = None;
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
