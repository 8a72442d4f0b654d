//! Inbound commands to the application service.
//!
//! These are the client actions a transport adapter (WebSocket, serial
//! console, button) forwards to the
//! [`AppService`](super::service::AppService).

use crate::config::Settings;
use crate::jobs::JobRecord;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Operator pump button: flip the pump.
    TogglePump,

    /// Explicit pump request.
    SetPump { on: bool, manual: bool },

    /// Flip one valve.
    ToggleValve(u8),

    /// Flip auto mode.
    ToggleAuto,

    /// Enable or disable automatic job triggering.
    SetAuto(bool),

    /// Append a job (id 0 replaces the list).
    AddJob(JobRecord),

    /// Drop every job, stored copy included.
    DeleteAllJobs,

    /// Persist the current job list.
    SaveJobs,

    /// Replace and persist the settings.
    ApplySettings(Settings),

    /// Reset the reported pump runtime.
    ResetCounter,
}
