//! Unified error types for the growbox firmware.
//!
//! Every refusal the core can produce is a small `Copy` enum, so callers
//! (transport adapters, the job state machine) can match on the exact
//! reason without allocation.  None of them is fatal: each one leaves the
//! rig in the state it was in before the request.

use core::fmt;

use crate::app::ports::{ActuatorError, ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible core operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The pump refused a request.
    Pump(PumpError),
    /// The valve bank refused a request.
    Valve(ValveError),
    /// A job could not be added or loaded.
    Job(JobError),
    /// Reconfiguration attempted while the rig is active.
    Busy,
    /// Settings failed validation.
    Config(&'static str),
    /// Settings could not be persisted.
    Settings(ConfigError),
    /// The job list could not be persisted or read back.
    Storage(StorageError),
    /// The relays could not be laid out.
    Actuator(ActuatorError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pump(e) => write!(f, "pump: {e}"),
            Self::Valve(e) => write!(f, "valve: {e}"),
            Self::Job(e) => write!(f, "job: {e}"),
            Self::Busy => write!(f, "rig busy (pump running or job in flight)"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Settings(e) => write!(f, "settings: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Pump errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpError {
    /// Start requested with every valve closed.
    InterlockFailed,
}

impl fmt::Display for PumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterlockFailed => write!(f, "interlock failed: no valve open"),
        }
    }
}

impl From<PumpError> for Error {
    fn from(e: PumpError) -> Self {
        Self::Pump(e)
    }
}

// ---------------------------------------------------------------------------
// Valve errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveError {
    /// Plant index is not below the configured plant count.
    InvalidIndex(usize),
    /// Closing refused while the pump is running.
    PumpRunning,
}

impl fmt::Display for ValveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIndex(i) => write!(f, "invalid valve index {i}"),
            Self::PumpRunning => write!(f, "cannot close valve while pump is running"),
        }
    }
}

impl From<ValveError> for Error {
    fn from(e: ValveError) -> Self {
        Self::Valve(e)
    }
}

// ---------------------------------------------------------------------------
// Job errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobError {
    /// A job with this id is already in the list.
    DuplicateId(u32),
    /// A field failed validation; the text names the field.
    InvalidField(&'static str),
    /// The job list is at capacity.
    ListFull,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "job id {id} already exists"),
            Self::InvalidField(field) => write!(f, "invalid field: {field}"),
            Self::ListFull => write!(f, "job list full"),
        }
    }
}

impl From<JobError> for Error {
    fn from(e: JobError) -> Self {
        Self::Job(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Settings(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
