//! Function-pointer finite state machine engine.
//!
//! Drives one irrigation job at a time:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌────────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ JobState   │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├────────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Idle       │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ OpenValve  │ -         │ -        │ fn(ctx)->Option<> │ │
//! │  │ StartPump  │ -         │ -        │ fn(ctx)->Option<> │ │
//! │  │ Running    │ fn(ctx)   │ -        │ fn(ctx)->Option<> │ │
//! │  │ StopPump   │ -         │ -        │ fn(ctx)->Option<> │ │
//! │  │ CloseValve │ -         │ -        │ fn(ctx)->Option<> │ │
//! │  └────────────┴───────────┴──────────┴───────────────────┘ │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  All functions receive `&mut FsmContext`, which
//! holds the pump, the valve bank, the running job and the clock.

pub mod context;
pub mod states;

use context::FsmContext;
use log::{info, warn};

use crate::jobs::Job;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Orchestration state of the irrigation job machine.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum JobState {
    Idle = 0,
    OpenValve = 1,
    StartPump = 2,
    Running = 3,
    StopPump = 4,
    CloseValve = 5,
}

impl JobState {
    /// Total number of states, used to size the table array.
    pub const COUNT: usize = 6;

    /// Convert an index back to `JobState`.  Panics on out-of-range in
    /// debug builds; returns `Idle` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::OpenValve,
            2 => Self::StartPump,
            3 => Self::Running,
            4 => Self::StopPump,
            5 => Self::CloseValve,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<JobState>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
pub struct StateDescriptor {
    pub id: JobState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table and the entry timestamp of the current state.
/// Timing comes from `ctx.now_ms`, which the caller sets before every
/// [`tick`](Fsm::tick).
pub struct Fsm {
    /// Fixed-size table indexed by `JobState as usize`.
    table: [StateDescriptor; JobState::COUNT],
    /// Index of the currently active state.
    current: usize,
    /// Clock value (ms) at which the current state was entered.
    state_entry_ms: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; JobState::COUNT], initial: JobState) -> Self {
        Self {
            table,
            current: initial as usize,
            state_entry_ms: 0,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("JOB: machine starting in {}", self.table[self.current].name);
        self.state_entry_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        ctx.ms_in_state = ctx.now_ms.saturating_sub(self.state_entry_ms);

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Admit a job.  Refused (logged, nothing changes) while another job
    /// is in flight; this is the only way out of `Idle`.
    pub fn start_job(&mut self, job: Job, ctx: &mut FsmContext) -> bool {
        if let Some(running) = &ctx.running {
            warn!(
                "JOB: job {} refused, job {} still in flight",
                job.id, running.id
            );
            return false;
        }
        info!(
            "JOB: start job {} '{}' on plant {} for {} s",
            job.id, job.name, job.plant_index, job.duration_secs
        );
        ctx.running = Some(job);
        self.force_transition(JobState::OpenValve, ctx);
        true
    }

    /// Force an immediate transition, running exit/enter actions.
    pub fn force_transition(&mut self, next: JobState, ctx: &mut FsmContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_state(&self) -> JobState {
        JobState::from_index(self.current)
    }

    pub fn current_state_name(&self) -> &'static str {
        self.table[self.current].name
    }

    /// Milliseconds spent in the current state as of `now_ms`.
    pub fn ms_in_current_state(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.state_entry_ms)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: JobState, ctx: &mut FsmContext) {
        let next_idx = next_id as usize;

        info!(
            "JOB: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_ms = ctx.now_ms;
        ctx.ms_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
