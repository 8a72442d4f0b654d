//! Wall-clock synchronisation state machine.
//!
//! ```text
//!   IDLE ──resync due──▶ INIT ──begin_sync──▶ WAITING ──plausible──▶ DONE ──▶ IDLE
//!                         ▲                      │
//!                         └──── timeout, retry ──┘ (gives up after N attempts)
//! ```
//!
//! One transition per tick, never blocking.  The machine starts in INIT so
//! the first sync is requested at boot.  While `busy` is set (firmware
//! update, job in flight) it holds its state.

use log::{info, warn};

use crate::app::ports::TimeAuthority;
use crate::config::Timing;

/// Epoch values at or below one day are treated as "clock never set".
pub const PLAUSIBLE_EPOCH_SECS: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NtpState {
    Idle,
    #[default]
    Init,
    Waiting,
    Done,
}

impl NtpState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Init => "INIT",
            Self::Waiting => "WAITING",
            Self::Done => "DONE",
        }
    }
}

/// Result of a completed sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced(i64),
    GaveUp(u8),
}

pub fn is_plausible_epoch(epoch: i64) -> bool {
    epoch > PLAUSIBLE_EPOCH_SECS
}

#[derive(Debug)]
pub struct TimeSync {
    timing: Timing,
    state: NtpState,
    state_entered_ms: u64,
    last_sync_ms: Option<u64>,
    /// Start of the resync interval: last success or last give-up.
    cycle_anchor_ms: Option<u64>,
    retry_count: u8,
    in_progress: bool,
    synced_epoch: i64,
}

impl TimeSync {
    pub fn new(timing: Timing) -> Self {
        Self {
            timing,
            state: NtpState::default(),
            state_entered_ms: 0,
            last_sync_ms: None,
            cycle_anchor_ms: None,
            retry_count: 0,
            in_progress: false,
            synced_epoch: 0,
        }
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    /// Advance by one step.  Returns an outcome when a cycle completes.
    pub fn tick(
        &mut self,
        now_ms: u64,
        busy: bool,
        clock: &mut impl TimeAuthority,
        timezone: &str,
    ) -> Option<SyncOutcome> {
        if busy {
            return None;
        }

        match self.state {
            NtpState::Idle => {
                let resync_ms = u64::from(self.timing.ntp_resync_interval_secs) * 1000;
                let due = self
                    .cycle_anchor_ms
                    .is_none_or(|anchor| now_ms.saturating_sub(anchor) >= resync_ms);
                if due {
                    self.retry_count = 0;
                    self.enter(NtpState::Init, now_ms);
                }
                None
            }
            NtpState::Init => {
                info!("NTP: requesting time (attempt {})", self.retry_count + 1);
                clock.begin_sync();
                self.in_progress = true;
                self.enter(NtpState::Waiting, now_ms);
                None
            }
            NtpState::Waiting => {
                let epoch = clock.current_epoch_time();
                if is_plausible_epoch(epoch) {
                    clock.apply_timezone(timezone);
                    self.last_sync_ms = Some(now_ms);
                    self.cycle_anchor_ms = Some(now_ms);
                    self.synced_epoch = epoch;
                    self.in_progress = false;
                    self.enter(NtpState::Done, now_ms);
                    return None;
                }
                let elapsed = now_ms.saturating_sub(self.state_entered_ms);
                if elapsed < u64::from(self.timing.ntp_attempt_timeout_ms) {
                    return None;
                }
                self.retry_count = self.retry_count.saturating_add(1);
                if self.retry_count >= self.timing.ntp_max_retries {
                    warn!("NTP: no time after {} attempts, backing off", self.retry_count);
                    self.in_progress = false;
                    self.cycle_anchor_ms = Some(now_ms);
                    self.enter(NtpState::Idle, now_ms);
                    return Some(SyncOutcome::GaveUp(self.retry_count));
                }
                warn!("NTP: attempt {} timed out, retrying", self.retry_count);
                self.enter(NtpState::Init, now_ms);
                None
            }
            NtpState::Done => {
                info!("NTP: synchronised, epoch {}", self.synced_epoch);
                self.enter(NtpState::Idle, now_ms);
                Some(SyncOutcome::Synced(self.synced_epoch))
            }
        }
    }

    fn enter(&mut self, next: NtpState, now_ms: u64) {
        if next != self.state {
            log::debug!("NTP: {} -> {}", self.state.name(), next.name());
        }
        self.state = next;
        self.state_entered_ms = now_ms;
    }

    pub fn state(&self) -> NtpState {
        self.state
    }

    pub fn is_synced(&self) -> bool {
        self.last_sync_ms.is_some()
    }

    pub fn last_sync_ms(&self) -> Option<u64> {
        self.last_sync_ms
    }

    pub fn retry_count(&self) -> u8 {
        self.retry_count
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress
    }
}
