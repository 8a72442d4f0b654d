//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, push to WebSocket
//! clients, and so on.

use crate::control::pump::PumpState;
use crate::control::valves::VALVE_CAP;
use crate::fsm::context::AbortReason;
use crate::fsm::JobState;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The application service has started.
    Started(Status),

    /// Pump, valve or mode state changed; clients should refresh.
    StatusChanged(Status),

    /// A job was admitted.
    JobStarted { id: u32, plant_index: u8 },

    /// A job ran to completion.
    JobFinished { id: u32 },

    /// A job was abandoned and the lock released.
    JobAborted { id: u32, reason: AbortReason },

    /// Wall clock synchronised.
    TimeSynced { epoch: i64 },

    /// A sync cycle gave up after its retries.
    TimeSyncFailed { attempts: u8 },
}

/// A point-in-time view of the rig, suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub pump: PumpState,
    /// Open flag per plant.
    pub valves: heapless::Vec<bool, VALVE_CAP>,
    pub auto_enabled: bool,
    pub pump_runtime_secs: u64,
    pub job_state: JobState,
    pub running_job: Option<u32>,
    pub clock_synced: bool,
    pub use_flowsensor: bool,
    pub use_moisturesensor: bool,
}
