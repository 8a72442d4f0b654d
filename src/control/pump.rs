//! Pump state machine with valve interlock.
//!
//! ```text
//!  IDLE ──[target_on]──▶ STARTING ──[valve open]──▶ RUNNING
//!   ▲                       │                          │
//!   │              [no valve open: InterlockFailed] [!target_on]
//!   │                       ▼                          ▼
//!   └───────────────────── IDLE ◀──────────────── STOPPING
//! ```
//!
//! STARTING and STOPPING resolve within the call that enters them; the
//! interlock is a stateless check, not a timed wait.  The controller only
//! holds the desired relay state (`energized`); the app service pushes it
//! to the hardware through `ActuatorPort`.

use log::{info, warn};

use crate::control::valves::ValveBank;
use crate::error::PumpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PumpState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

impl PumpState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
        }
    }
}

/// A pump request.  `manual` marks operator-initiated requests; it only
/// changes logging, never the safety rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpRequest {
    pub manual: bool,
    pub desired_on: bool,
}

#[derive(Debug, Default)]
pub struct PumpController {
    state: PumpState,
    state_entered_ms: u64,
    manual_override: bool,
    target_on: bool,
    energized: bool,
    started_ms: u64,
    /// Runtime of the current run, or of the last finished one.
    runtime_ms: u64,
}

impl PumpController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a request and drive the machine until it settles.
    ///
    /// Returns `Ok(true)` when the relay state changed.  On interlock
    /// failure the pump stays IDLE and nothing is actuated.
    pub fn request(
        &mut self,
        req: PumpRequest,
        valves: &ValveBank,
        now_ms: u64,
    ) -> Result<bool, PumpError> {
        self.manual_override = req.manual;
        self.target_on = req.desired_on;
        self.step(valves, now_ms)
    }

    /// Operator button: flip the target.
    pub fn toggle(&mut self, valves: &ValveBank, now_ms: u64) -> Result<bool, PumpError> {
        let desired_on = !self.target_on;
        self.request(
            PumpRequest {
                manual: true,
                desired_on,
            },
            valves,
            now_ms,
        )
    }

    /// Per-tick bookkeeping: refresh the runtime of a running pump.
    pub fn tick(&mut self, now_ms: u64) {
        if self.state == PumpState::Running {
            self.runtime_ms = now_ms.saturating_sub(self.started_ms);
        }
    }

    fn step(&mut self, valves: &ValveBank, now_ms: u64) -> Result<bool, PumpError> {
        let mut changed = false;
        loop {
            match self.state {
                PumpState::Idle => {
                    if !self.target_on {
                        return Ok(changed);
                    }
                    self.enter(PumpState::Starting, now_ms);
                }
                PumpState::Starting => {
                    if !valves.any_open() {
                        warn!("PUMP: start refused, no valve open");
                        self.target_on = false;
                        self.enter(PumpState::Idle, now_ms);
                        return Err(PumpError::InterlockFailed);
                    }
                    self.energized = true;
                    self.started_ms = now_ms;
                    self.runtime_ms = 0;
                    self.enter(PumpState::Running, now_ms);
                    info!(
                        "PUMP: on ({})",
                        if self.manual_override { "manual" } else { "job" }
                    );
                    return Ok(true);
                }
                PumpState::Running => {
                    if self.target_on {
                        return Ok(changed);
                    }
                    self.enter(PumpState::Stopping, now_ms);
                }
                PumpState::Stopping => {
                    self.energized = false;
                    self.target_on = false;
                    self.runtime_ms = now_ms.saturating_sub(self.started_ms);
                    self.enter(PumpState::Idle, now_ms);
                    info!(
                        "PUMP: off after {} s ({})",
                        self.runtime_ms / 1000,
                        if self.manual_override { "manual" } else { "job" }
                    );
                    changed = true;
                }
            }
        }
    }

    fn enter(&mut self, next: PumpState, now_ms: u64) {
        self.state = next;
        self.state_entered_ms = now_ms;
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> PumpState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PumpState::Running
    }

    /// Desired relay state.
    pub fn is_energized(&self) -> bool {
        self.energized
    }

    pub fn target_on(&self) -> bool {
        self.target_on
    }

    pub fn is_manual(&self) -> bool {
        self.manual_override
    }

    pub fn state_entered_ms(&self) -> u64 {
        self.state_entered_ms
    }

    pub fn runtime_secs(&self) -> u64 {
        self.runtime_ms / 1000
    }

    pub fn reset_runtime(&mut self, now_ms: u64) {
        self.runtime_ms = 0;
        if self.state == PumpState::Running {
            self.started_ms = now_ms;
        }
    }
}
