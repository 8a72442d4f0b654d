//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers: no closures, no dynamic
//! dispatch, no heap.
//!
//! ```text
//!  IDLE ──[start_job]──▶ OPEN_VALVE ──[valve open]──▶ START_PUMP
//!    ▲                       │                            │
//!    │                  [bad index]              [valve settle, pump on]
//!    │◀──────────────────────┘                            ▼
//!    │                                                 RUNNING
//!    │                                                    │
//!    │                                 [duration elapsed or pump stopped]
//!    │                                                    ▼
//!    └──[finished]── CLOSE_VALVE ◀──[pump settle]──── STOP_PUMP
//!
//!  Any failure while a job is in flight ──▶ abort ──▶ IDLE (lock released)
//! ```

use super::context::{AbortReason, FsmContext, JobNotice};
use super::{JobState, StateDescriptor};
use crate::control::pump::PumpRequest;
use log::{debug, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; JobState::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: JobState::Idle,
            name: "IDLE",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: OpenValve
        StateDescriptor {
            id: JobState::OpenValve,
            name: "OPEN_VALVE",
            on_enter: None,
            on_exit: None,
            on_update: open_valve_update,
        },
        // Index 2: StartPump
        StateDescriptor {
            id: JobState::StartPump,
            name: "START_PUMP",
            on_enter: None,
            on_exit: None,
            on_update: start_pump_update,
        },
        // Index 3: Running
        StateDescriptor {
            id: JobState::Running,
            name: "RUNNING",
            on_enter: Some(running_enter),
            on_exit: None,
            on_update: running_update,
        },
        // Index 4: StopPump
        StateDescriptor {
            id: JobState::StopPump,
            name: "STOP_PUMP",
            on_enter: None,
            on_exit: None,
            on_update: stop_pump_update,
        },
        // Index 5: CloseValve
        StateDescriptor {
            id: JobState::CloseValve,
            name: "CLOSE_VALVE",
            on_enter: None,
            on_exit: None,
            on_update: close_valve_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(_ctx: &mut FsmContext) {
    debug!("JOB: idle, waiting for trigger");
}

fn idle_update(_ctx: &mut FsmContext) -> Option<JobState> {
    // Left only through `Fsm::start_job`.
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  OPEN_VALVE
// ═══════════════════════════════════════════════════════════════════════════

fn open_valve_update(ctx: &mut FsmContext) -> Option<JobState> {
    let Some(plant) = running_plant(ctx) else {
        return Some(JobState::Idle);
    };
    match ctx.valves.open(plant) {
        Ok(()) => {
            ctx.notify(JobNotice::StatusChanged);
            Some(JobState::StartPump)
        }
        Err(e) => abort(ctx, AbortReason::Valve(e)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  START_PUMP: wait for the valve to settle, then start the pump
// ═══════════════════════════════════════════════════════════════════════════

fn start_pump_update(ctx: &mut FsmContext) -> Option<JobState> {
    if ctx.ms_in_state < u64::from(ctx.timing.valve_settle_ms) {
        return None;
    }
    let req = PumpRequest {
        manual: false,
        desired_on: true,
    };
    match ctx.pump.request(req, &ctx.valves, ctx.now_ms) {
        Ok(changed) if ctx.pump.is_running() => {
            if changed {
                ctx.notify(JobNotice::StatusChanged);
            }
            Some(JobState::Running)
        }
        Ok(_) => abort(ctx, AbortReason::PumpNotRunning),
        Err(e) => abort(ctx, AbortReason::Pump(e)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  RUNNING: water for the job's duration
// ═══════════════════════════════════════════════════════════════════════════

fn running_enter(ctx: &mut FsmContext) {
    if let Some(job) = &ctx.running {
        info!(
            "JOB: watering plant {} for {} s",
            job.plant_index, job.duration_secs
        );
    }
}

fn running_update(ctx: &mut FsmContext) -> Option<JobState> {
    let Some(job) = &ctx.running else {
        return Some(JobState::StopPump);
    };
    let duration_ms = u64::from(job.duration_secs) * 1000;

    if !ctx.pump.is_running() {
        info!("JOB: pump stopped externally, closing up");
        return Some(JobState::StopPump);
    }
    if ctx.ms_in_state < duration_ms {
        return None;
    }

    let req = PumpRequest {
        manual: false,
        desired_on: false,
    };
    if let Ok(true) = ctx.pump.request(req, &ctx.valves, ctx.now_ms) {
        ctx.notify(JobNotice::StatusChanged);
    }
    info!("JOB: duration complete, pump stopped");
    Some(JobState::StopPump)
}

// ═══════════════════════════════════════════════════════════════════════════
//  STOP_PUMP: wait for the pump to spin down, then close the valve
// ═══════════════════════════════════════════════════════════════════════════

fn stop_pump_update(ctx: &mut FsmContext) -> Option<JobState> {
    if ctx.ms_in_state < u64::from(ctx.timing.pump_settle_ms) {
        return None;
    }
    let Some(plant) = running_plant(ctx) else {
        return Some(JobState::Idle);
    };
    match ctx.valves.close(plant, ctx.pump.state()) {
        Ok(()) => {
            ctx.notify(JobNotice::StatusChanged);
            Some(JobState::CloseValve)
        }
        Err(e) => abort(ctx, AbortReason::Valve(e)),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CLOSE_VALVE: release the lock
// ═══════════════════════════════════════════════════════════════════════════

fn close_valve_update(ctx: &mut FsmContext) -> Option<JobState> {
    if let Some(job) = ctx.running.take() {
        info!("JOB: job {} finished", job.id);
        ctx.notify(JobNotice::Finished(job.id));
    }
    Some(JobState::Idle)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Plant index of the running job.
fn running_plant(ctx: &FsmContext) -> Option<usize> {
    ctx.running.as_ref().map(|j| usize::from(j.plant_index))
}

/// Abandon the running job and release the lock.  The job's valve is
/// closed when the pump allows it.
fn abort(ctx: &mut FsmContext, reason: AbortReason) -> Option<JobState> {
    let Some(job) = ctx.running.take() else {
        return Some(JobState::Idle);
    };
    warn!("JOB: job {} aborted: {}", job.id, reason);
    let plant = usize::from(job.plant_index);
    if ctx.valves.is_open(plant) && ctx.valves.close(plant, ctx.pump.state()).is_ok() {
        ctx.notify(JobNotice::StatusChanged);
    }
    ctx.notify(JobNotice::Aborted(job.id, reason));
    Some(JobState::Idle)
}
