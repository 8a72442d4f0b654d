//! Job trigger evaluator.
//!
//! Decides, at a bounded rate, whether a job from the list should start.
//! Two independent cadences feed it:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Trigger Sources                          │
//! │                                                              │
//! │   ┌──────────────────┐            ┌──────────────────────┐   │
//! │   │ Wall clock (1 s) │            │ Moisture probes (5m) │   │
//! │   └────────┬─────────┘            └──────────┬───────────┘   │
//! │            ▼                                 ▼               │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │ for job in list order: active? not run today? cooled?  │  │
//! │  │ first match wins ──▶ Some(job)                         │  │
//! │  └───────────────────────┬────────────────────────────────┘  │
//! │                          ▼                                   │
//! │                  Fsm::start_job(job)                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one job is returned per call.  A global cooldown separates any
//! two starts, and the job that started last is skipped for the rest of
//! its calendar day.

use log::{debug, info};
use time::{Date, PrimitiveDateTime};

use crate::app::ports::MoisturePort;
use crate::config::{MoistureRule, Timing};
use crate::jobs::{Job, JobList};

/// Per-call inputs besides the job list and the probes.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext {
    pub now_ms: u64,
    /// Local wall-clock time, `None` while the clock is not plausible.
    pub local: Option<PrimitiveDateTime>,
    pub use_moisture: bool,
    pub rule: MoistureRule,
    /// A job is in flight; matches are skipped.
    pub job_active: bool,
}

/// Marker of the most recently started job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastExecuted {
    id: u32,
    date: Option<Date>,
}

#[derive(Debug)]
pub struct TriggerEvaluator {
    timing: Timing,
    last_time_check_ms: Option<u64>,
    last_moisture_check_ms: Option<u64>,
    last_start_ms: Option<u64>,
    last_executed: Option<LastExecuted>,
}

impl TriggerEvaluator {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            last_time_check_ms: None,
            last_moisture_check_ms: None,
            last_start_ms: None,
            last_executed: None,
        }
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    /// Evaluate the list.  Returns the job to start, if any.
    pub fn evaluate(
        &mut self,
        ctx: &TriggerContext,
        jobs: &JobList,
        moisture: &mut impl MoisturePort,
    ) -> Option<Job> {
        let time_due = due(
            &mut self.last_time_check_ms,
            ctx.now_ms,
            u64::from(self.timing.job_check_interval_ms),
        );
        let moisture_due = ctx.use_moisture
            && due(
                &mut self.last_moisture_check_ms,
                ctx.now_ms,
                u64::from(self.timing.moisture_check_interval_secs) * 1000,
            );
        if !time_due && !moisture_due {
            return None;
        }

        if let Some(started) = self.last_start_ms {
            if ctx.now_ms.saturating_sub(started) < u64::from(self.timing.job_cooldown_secs) * 1000
            {
                return None;
            }
        }

        let today = ctx.local.map(PrimitiveDateTime::date);

        for job in jobs.iter() {
            if !job.active {
                continue;
            }
            if self.last_executed == Some(LastExecuted { id: job.id, date: today }) {
                continue;
            }

            let time_match = time_due && job.trigger.uses_time() && self.time_matches(job, ctx);
            let moisture_match =
                moisture_due && job.trigger.uses_moisture() && moisture_matches(job, ctx, moisture);
            if !time_match && !moisture_match {
                continue;
            }

            if ctx.job_active {
                debug!("SCHED: job {} due but another job active, skipping", job.id);
                continue;
            }

            info!(
                "SCHED: job {} triggered ({})",
                job.id,
                if time_match { "time" } else { "moisture" }
            );
            self.last_executed = Some(LastExecuted { id: job.id, date: today });
            self.last_start_ms = Some(ctx.now_ms);
            return Some(job.clone());
        }
        None
    }

    fn time_matches(&self, job: &Job, ctx: &TriggerContext) -> bool {
        let (Some(now), Some(start)) = (ctx.local, job.start) else {
            return false;
        };
        start.matches(now, job.recurs_daily, self.timing.trigger_window_secs)
    }

    /// Id of the job started last, if any.
    pub fn last_executed_id(&self) -> Option<u32> {
        self.last_executed.map(|m| m.id)
    }
}

fn moisture_matches(job: &Job, ctx: &TriggerContext, moisture: &mut impl MoisturePort) -> bool {
    match moisture.read_moisture(job.plant_index) {
        Some(reading) => {
            let hit = ctx
                .rule
                .matches(reading.percent, job.moisture_min, job.moisture_max);
            debug!(
                "SCHED: job {} plant {} at {}% (min {} max {}) -> {}",
                job.id, job.plant_index, reading.percent, job.moisture_min, job.moisture_max, hit
            );
            hit
        }
        None => {
            debug!("SCHED: job {} no moisture reading for plant {}", job.id, job.plant_index);
            false
        }
    }
}

/// Whether a cadence is due; stamps `last` when it is.
fn due(last: &mut Option<u64>, now_ms: u64, interval_ms: u64) -> bool {
    match *last {
        Some(t) if now_ms.saturating_sub(t) < interval_ms => false,
        _ => {
            *last = Some(now_ms);
            true
        }
    }
}
