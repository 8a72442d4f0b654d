//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (relays, moisture probes, the time authority, event
//! sinks, storage) implement these traits.  The
//! [`AppService`](super::service::AppService) consumes them via generics,
//! so the domain core never touches hardware directly.

use crate::config::Settings;
use crate::jobs::JobRecord;
use crate::sensors::MoistureReading;

// ───────────────────────────────────────────────────────────────
// Moisture port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for soil moisture.
pub trait MoisturePort {
    /// Current reading for one plant, or `None` if it has no probe.
    fn read_moisture(&mut self, plant_index: u8) -> Option<MoistureReading>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain calls this to drive the relays.
pub trait ActuatorPort {
    /// Energise or release the pump relay.
    fn set_pump(&mut self, on: bool);

    /// Open or close one valve relay.
    fn set_valve(&mut self, index: usize, open: bool);

    /// Replace the valve relay layout.  All valves start closed.  On
    /// error the previous layout stays in place.
    fn configure_valves(&mut self, pins: &[i32]) -> Result<(), ActuatorError>;

    /// Pump off, every valve closed.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Time authority port (driven adapter: SNTP ↔ domain)
// ───────────────────────────────────────────────────────────────

/// External wall-clock source.
pub trait TimeAuthority {
    /// Kick off a sync.  Must not block.
    fn begin_sync(&mut self);

    /// Seconds since the Unix epoch as the system clock currently has it.
    fn current_epoch_time(&self) -> i64;

    /// Install the POSIX TZ rule used for local time.
    fn apply_timezone(&mut self, tz: &str);

    /// Offset of local time from UTC at `epoch`.
    fn utc_offset(&self, _epoch: i64) -> time::UtcOffset {
        time::UtcOffset::UTC
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → transport / logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log,
/// WebSocket push, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists user settings.
///
/// Implementations MUST validate before persisting: invalid values are
/// rejected with [`ConfigError::ValidationFailed`], never clamped.
pub trait ConfigPort {
    /// Load settings.  Returns [`Settings::default()`] if none are stored.
    fn load(&self) -> Result<Settings, ConfigError>;

    /// Validate and persist settings.
    fn save(&self, settings: &Settings) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Job store port (driven adapter: domain ↔ flash)
// ───────────────────────────────────────────────────────────────

/// Persists the job list as a whole.
pub trait JobStorePort {
    /// Stored records, in list order.  Empty if nothing is stored.
    fn load_jobs(&self) -> Result<Vec<JobRecord>, StorageError>;

    /// Replace the stored list atomically.
    fn save_jobs(&self, jobs: &[JobRecord]) -> Result<(), StorageError>;

    /// Remove the stored list.  `Ok(())` if nothing was stored.
    fn delete_jobs(&self) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored settings failed deserialization.
    Corrupted,
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`JobStorePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Stored data could not be decoded.
    Corrupted,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`ActuatorPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// A relay output could not be set up (GPIO number or driver code).
    RelayConfig(i32),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "stored data corrupted"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::RelayConfig(code) => write!(f, "relay setup failed ({})", code),
        }
    }
}

impl core::error::Error for ActuatorError {}
impl core::error::Error for ConfigError {}
impl core::error::Error for StorageError {}
