//! Application service: the hexagonal core.
//!
//! [`AppService`] owns every piece of mutable rig state (pump, valves, the
//! running job, the job list, trigger bookkeeping, clock sync) and is the
//! single writer of all of it.  All I/O flows through port traits injected
//! at call sites, so the whole service runs against mock adapters.
//!
//! ```text
//!  MoisturePort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  TimeAuthority ─▶ │          AppService          │
//!                   │ Job FSM · Triggers · NTP FSM │
//!  ActuatorPort ◀── └──────────────────────────────┘ ◀── ConfigPort / JobStorePort
//! ```
//!
//! Every tick runs, in this order: job machine, trigger evaluation, time
//! sync.  A job transition is therefore never skipped because a trigger
//! fired in the same tick, and at most one job is admitted per tick.

use log::{error, info, warn};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::config::Settings;
use crate::control::pump::{PumpRequest, PumpState};
use crate::control::valves::ValveBank;
use crate::error::{Error, Result};
use crate::fsm::context::{FsmContext, JobNotice};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, JobState};
use crate::jobs::{Job, JobList, JobRecord};
use crate::scheduler::{TriggerContext, TriggerEvaluator};
use crate::time_sync::{is_plausible_epoch, SyncOutcome, TimeSync};

use super::commands::AppCommand;
use super::events::{AppEvent, Status};
use super::ports::{ActuatorPort, ConfigPort, EventSink, JobStorePort, MoisturePort, TimeAuthority};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    settings: Settings,
    fsm: Fsm,
    ctx: FsmContext,
    jobs: JobList,
    evaluator: TriggerEvaluator,
    time_sync: TimeSync,
    ota_in_progress: bool,
    tick_count: u64,
}

impl AppService {
    /// Construct the service from settings.
    ///
    /// Does **not** start the job machine: call [`start`](Self::start) next.
    pub fn new(settings: Settings) -> Self {
        let valves = ValveBank::new(settings.valve_pins());
        let ctx = FsmContext::new(valves, settings.timing);
        let fsm = Fsm::new(build_state_table(), JobState::Idle);
        Self {
            evaluator: TriggerEvaluator::new(settings.timing),
            time_sync: TimeSync::new(settings.timing),
            settings,
            fsm,
            ctx,
            jobs: JobList::new(),
            ota_in_progress: false,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Lay out the relays, force everything off and start the job machine.
    ///
    /// Nothing starts if the relays refuse the layout.
    pub fn start(&mut self, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) -> Result<()> {
        let pins: Vec<i32> = self.settings.valve_pins().collect();
        let laid_out = hw.configure_valves(&pins);
        hw.all_off();
        laid_out?;
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.status()));
        info!(
            "AppService started: {} plants, auto {}",
            self.ctx.valves.len(),
            if self.settings.auto_enabled { "on" } else { "off" }
        );
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one cooperative cycle: job machine, then triggers, then clock sync.
    ///
    /// The `hw` parameter satisfies **both** [`MoisturePort`] and
    /// [`ActuatorPort`], avoiding a double mutable borrow while keeping the
    /// port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl MoisturePort + ActuatorPort),
        clock: &mut impl TimeAuthority,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        self.ctx.now_ms = now_ms;

        // 1. Progress the job in flight
        self.ctx.pump.tick(now_ms);
        self.fsm.tick(&mut self.ctx);
        self.apply_actuators(hw);
        self.flush_notices(sink);

        // 2. Evaluate triggers
        if self.settings.auto_enabled && !self.ota_in_progress {
            let trigger = TriggerContext {
                now_ms,
                local: local_time(clock),
                use_moisture: self.settings.use_moisturesensor,
                rule: self.settings.moisture_rule,
                job_active: self.ctx.is_job_running(),
            };
            if let Some(job) = self.evaluator.evaluate(&trigger, &self.jobs, hw) {
                let (id, plant_index) = (job.id, job.plant_index);
                if self.fsm.start_job(job, &mut self.ctx) {
                    sink.emit(&AppEvent::JobStarted { id, plant_index });
                }
            }
        }

        // 3. Advance clock sync
        let busy = self.ota_in_progress || self.ctx.is_job_running();
        match self
            .time_sync
            .tick(now_ms, busy, clock, &self.settings.timezone)
        {
            Some(SyncOutcome::Synced(epoch)) => sink.emit(&AppEvent::TimeSynced { epoch }),
            Some(SyncOutcome::GaveUp(attempts)) => {
                sink.emit(&AppEvent::TimeSyncFailed { attempts })
            }
            None => {}
        }
    }

    // ── Operator requests ─────────────────────────────────────

    /// Drive the pump towards `desired_on`.
    ///
    /// Starting with every valve closed fails with `InterlockFailed`; the
    /// pump stays IDLE and no relay moves.  Switching off while a job runs
    /// makes the job proceed along its stop sequence.
    pub fn request_pump(
        &mut self,
        desired_on: bool,
        manual: bool,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let changed = self.ctx.pump.request(
            PumpRequest { manual, desired_on },
            &self.ctx.valves,
            now_ms,
        )?;
        self.after_manual_change(changed, hw, sink);
        Ok(())
    }

    /// Operator pump button: flip the pump.
    pub fn toggle_pump(
        &mut self,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let changed = self.ctx.pump.toggle(&self.ctx.valves, now_ms)?;
        self.after_manual_change(changed, hw, sink);
        Ok(())
    }

    /// Flip one valve.  Closing is refused while the pump runs.
    pub fn request_valve(
        &mut self,
        plant_index: usize,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        let open = self.ctx.valves.toggle(plant_index, self.ctx.pump.state())?;
        info!(
            "VALVE: plant {} {} by operator",
            plant_index,
            if open { "opened" } else { "closed" }
        );
        self.after_manual_change(true, hw, sink);
        Ok(())
    }

    pub fn set_auto_enabled(&mut self, enabled: bool, sink: &mut impl EventSink) {
        if self.settings.auto_enabled != enabled {
            info!("AUTO: {}", if enabled { "enabled" } else { "disabled" });
            self.settings.auto_enabled = enabled;
            sink.emit(&AppEvent::StatusChanged(self.status()));
        }
    }

    pub fn toggle_auto(&mut self, sink: &mut impl EventSink) {
        self.set_auto_enabled(!self.settings.auto_enabled, sink);
    }

    /// Clear the reported pump runtime.
    pub fn reset_runtime_counter(&mut self, now_ms: u64, sink: &mut impl EventSink) {
        self.ctx.pump.reset_runtime(now_ms);
        info!("PUMP: runtime counter reset");
        sink.emit(&AppEvent::StatusChanged(self.status()));
    }

    /// Firmware update in progress: triggers and clock sync pause.
    pub fn set_ota_in_progress(&mut self, in_progress: bool) {
        if self.ota_in_progress != in_progress {
            info!("OTA: {}", if in_progress { "started, automation paused" } else { "ended" });
        }
        self.ota_in_progress = in_progress;
    }

    // ── Jobs ──────────────────────────────────────────────────

    pub fn list_jobs(&self) -> &[Job] {
        self.jobs.as_slice()
    }

    /// Append a validated job.  Id 0 replaces the whole list.
    pub fn add_job(&mut self, job: Job) -> Result<()> {
        self.jobs.add(job)?;
        Ok(())
    }

    /// Validate a client record and append it.
    pub fn add_job_record(&mut self, record: &JobRecord) -> Result<()> {
        let job = Job::try_from(record)?;
        self.add_job(job)
    }

    /// Drop every job from memory.  A job in flight keeps running.
    pub fn delete_all_jobs(&mut self) {
        self.jobs.clear();
        info!("JOB: job list cleared");
    }

    /// Persist the job list.
    pub fn save_jobs(&self, store: &impl JobStorePort) -> Result<()> {
        let records: Vec<JobRecord> = self.jobs.iter().map(Job::to_record).collect();
        store.save_jobs(&records)?;
        info!("JOB: saved {} jobs", records.len());
        Ok(())
    }

    /// Replace the job list with the stored one.  Records that fail
    /// validation are skipped.  Returns how many jobs were loaded.
    pub fn load_jobs(&mut self, store: &impl JobStorePort) -> Result<usize> {
        let records = store.load_jobs()?;
        self.jobs.clear();
        for record in &records {
            if let Err(e) = self.add_job_record(record) {
                warn!("JOB: stored job {} skipped: {}", record.id, e);
            }
        }
        info!("JOB: loaded {} of {} stored jobs", self.jobs.len(), records.len());
        Ok(self.jobs.len())
    }

    // ── Settings ──────────────────────────────────────────────

    /// Validate, persist and adopt new settings.
    ///
    /// A change of plant count or valve pins rebuilds the valve bank from
    /// scratch; that is refused with [`Error::Busy`] while the pump is not
    /// IDLE or a job is in flight.  A new timezone takes effect at the
    /// next clock sync.
    pub fn apply_settings(
        &mut self,
        settings: Settings,
        hw: &mut impl ActuatorPort,
        config: &impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> Result<()> {
        settings.validate().map_err(Error::Config)?;

        let relayout = settings.plant_count != self.settings.plant_count
            || settings.valve_start_pin != self.settings.valve_start_pin;
        if relayout && (self.ctx.pump.state() != PumpState::Idle || self.ctx.is_job_running()) {
            warn!("CONFIG: valve layout change refused, rig busy");
            return Err(Error::Busy);
        }

        if relayout {
            let pins: Vec<i32> = settings.valve_pins().collect();
            hw.all_off();
            if let Err(e) = hw.configure_valves(&pins) {
                warn!("CONFIG: relays refused the new layout ({}), keeping the old one", e);
                self.apply_actuators(hw);
                return Err(e.into());
            }
            if let Err(e) = config.save(&settings) {
                self.restore_layout(hw);
                return Err(e.into());
            }
            self.ctx.valves = ValveBank::new(pins.iter().copied());
            info!("CONFIG: valve bank rebuilt for {} plants", pins.len());
        } else {
            config.save(&settings)?;
        }

        self.ctx.timing = settings.timing;
        self.evaluator.set_timing(settings.timing);
        self.time_sync.set_timing(settings.timing);
        self.settings = settings;
        self.apply_actuators(hw);
        sink.emit(&AppEvent::StatusChanged(self.status()));
        Ok(())
    }

    // ── Command handling ──────────────────────────────────────

    /// Process a client command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        store: &(impl ConfigPort + JobStorePort),
        sink: &mut impl EventSink,
    ) -> Result<()> {
        match cmd {
            AppCommand::TogglePump => self.toggle_pump(now_ms, hw, sink),
            AppCommand::SetPump { on, manual } => self.request_pump(on, manual, now_ms, hw, sink),
            AppCommand::ToggleValve(plant) => self.request_valve(usize::from(plant), hw, sink),
            AppCommand::ToggleAuto => {
                self.toggle_auto(sink);
                Ok(())
            }
            AppCommand::SetAuto(enabled) => {
                self.set_auto_enabled(enabled, sink);
                Ok(())
            }
            AppCommand::AddJob(record) => self.add_job_record(&record),
            AppCommand::DeleteAllJobs => {
                store.delete_jobs()?;
                self.delete_all_jobs();
                Ok(())
            }
            AppCommand::SaveJobs => self.save_jobs(store),
            AppCommand::ApplySettings(settings) => self.apply_settings(settings, hw, store, sink),
            AppCommand::ResetCounter => {
                self.reset_runtime_counter(now_ms, sink);
                Ok(())
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Snapshot for clients.
    pub fn status(&self) -> Status {
        Status {
            pump: self.ctx.pump.state(),
            valves: self.ctx.valves.states(),
            auto_enabled: self.settings.auto_enabled,
            pump_runtime_secs: self.ctx.pump.runtime_secs(),
            job_state: self.fsm.current_state(),
            running_job: self.ctx.running.as_ref().map(|j| j.id),
            clock_synced: self.time_sync.is_synced(),
            use_flowsensor: self.settings.use_flowsensor,
            use_moisturesensor: self.settings.use_moisturesensor,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn job_state(&self) -> JobState {
        self.fsm.current_state()
    }

    pub fn pump_state(&self) -> PumpState {
        self.ctx.pump.state()
    }

    pub fn running_job(&self) -> Option<&Job> {
        self.ctx.running.as_ref()
    }

    pub fn valves(&self) -> &ValveBank {
        &self.ctx.valves
    }

    pub fn time_sync(&self) -> &TimeSync {
        &self.time_sync
    }

    /// Total ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Internal ──────────────────────────────────────────────

    fn after_manual_change(
        &mut self,
        changed: bool,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) {
        self.apply_actuators(hw);
        if changed {
            sink.emit(&AppEvent::StatusChanged(self.status()));
        }
    }

    /// Translate pump and valve state into port calls.
    ///
    /// Pump off first, then valves, then pump on; the relay is only
    /// energised while some valve is open.
    fn apply_actuators(&self, hw: &mut impl ActuatorPort) {
        let pump_on = self.ctx.pump.is_energized() && self.ctx.valves.any_open();
        if !pump_on {
            hw.set_pump(false);
        }
        for (i, slot) in self.ctx.valves.slots().iter().enumerate() {
            hw.set_valve(i, slot.is_open);
        }
        if pump_on {
            hw.set_pump(true);
        }
    }

    /// Put the current layout back on the relays after a relayout that
    /// could not be completed.
    fn restore_layout(&self, hw: &mut impl ActuatorPort) {
        let pins: Vec<i32> = self.settings.valve_pins().collect();
        hw.all_off();
        match hw.configure_valves(&pins) {
            Ok(()) => self.apply_actuators(hw),
            Err(e) => error!("CONFIG: old valve layout not restored ({}), relays left off", e),
        }
    }

    /// Turn queued job notices into events.  One status push per tick.
    fn flush_notices(&mut self, sink: &mut impl EventSink) {
        let notices = self.ctx.take_notices();
        if notices.iter().any(|n| *n == JobNotice::StatusChanged) {
            sink.emit(&AppEvent::StatusChanged(self.status()));
        }
        for notice in notices {
            match notice {
                JobNotice::StatusChanged => {}
                JobNotice::Finished(id) => sink.emit(&AppEvent::JobFinished { id }),
                JobNotice::Aborted(id, reason) => sink.emit(&AppEvent::JobAborted { id, reason }),
            }
        }
    }
}

/// Local wall-clock time, `None` while the clock has never been set.
fn local_time(clock: &impl TimeAuthority) -> Option<PrimitiveDateTime> {
    let epoch = clock.current_epoch_time();
    if !is_plausible_epoch(epoch) {
        return None;
    }
    let utc = OffsetDateTime::from_unix_timestamp(epoch).ok()?;
    let local = utc.to_offset(clock.utc_offset(epoch));
    Some(PrimitiveDateTime::new(local.date(), local.time()))
}
