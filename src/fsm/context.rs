//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct the job handlers read from and write
//! to: the pump controller, the valve bank, the running job, the clock and
//! the settle timings.  Manual operator requests mutate the same pump and
//! valves between ticks, so there is exactly one owner of actuator state.
//! Think of it as the "blackboard" in a blackboard architecture.

use crate::config::Timing;
use crate::control::pump::PumpController;
use crate::control::valves::ValveBank;
use crate::error::{PumpError, ValveError};
use crate::jobs::Job;

/// Notices queued per tick for the app service to turn into events.
pub const NOTICE_CAP: usize = 8;

/// Why a job was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Valve(ValveError),
    Pump(PumpError),
    /// Pump did not reach RUNNING after the start request.
    PumpNotRunning,
}

impl core::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Valve(e) => write!(f, "valve: {e}"),
            Self::Pump(e) => write!(f, "pump: {e}"),
            Self::PumpNotRunning => write!(f, "pump did not start"),
        }
    }
}

/// Something the job machine did that clients should hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobNotice {
    /// Pump or valve state changed.
    StatusChanged,
    Finished(u32),
    Aborted(u32, AbortReason),
}

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Monotonic clock for this tick (ms).  Set by the caller.
    pub now_ms: u64,
    /// Milliseconds since the current state was entered.
    pub ms_in_state: u64,
    pub timing: Timing,

    // -- Actuators --
    pub pump: PumpController,
    pub valves: ValveBank,

    // -- Job --
    /// The job in flight.  At most one exists.
    pub running: Option<Job>,

    // -- Output --
    pub notices: heapless::Vec<JobNotice, NOTICE_CAP>,
}

impl FsmContext {
    pub fn new(valves: ValveBank, timing: Timing) -> Self {
        Self {
            now_ms: 0,
            ms_in_state: 0,
            timing,
            pump: PumpController::new(),
            valves,
            running: None,
            notices: heapless::Vec::new(),
        }
    }

    /// Queue a notice.  Dropped when the queue is full; the next status
    /// push carries the same information.
    pub fn notify(&mut self, notice: JobNotice) {
        if self.notices.push(notice).is_err() {
            log::warn!("JOB: notice queue full, dropped {:?}", notice);
        }
    }

    /// Drain queued notices.
    pub fn take_notices(&mut self) -> heapless::Vec<JobNotice, NOTICE_CAP> {
        core::mem::take(&mut self.notices)
    }

    pub fn is_job_running(&self) -> bool {
        self.running.is_some()
    }
}
