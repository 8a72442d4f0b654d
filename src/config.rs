//! System configuration parameters
//!
//! User settings of the watering rig plus every timing constant the
//! state machines depend on.  Values are loaded from NVS at boot and can
//! be replaced at runtime through [`AppCommand::ApplySettings`].
//!
//! [`AppCommand::ApplySettings`]: crate::app::commands::AppCommand::ApplySettings

use serde::{Deserialize, Serialize};

use crate::pins;

/// Upper bound on plants (and therefore valves) one board can drive.
pub const MAX_PLANTS: u8 = 8;

/// Capacity of the timezone string (POSIX TZ rules are short).
pub const TIMEZONE_CAP: usize = 48;

/// Core user settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // --- Sensors ---
    /// Flow sensor fitted (reported to clients only)
    pub use_flowsensor: bool,
    /// Moisture sensors fitted; moisture triggers never match without them
    pub use_moisturesensor: bool,

    // --- Automation ---
    /// Evaluate job triggers at all
    pub auto_enabled: bool,
    /// How a moisture reading is compared against a job's thresholds
    pub moisture_rule: MoistureRule,

    // --- Rig ---
    /// Number of plants, one valve each (1..=MAX_PLANTS)
    pub plant_count: u8,
    /// GPIO of valve 0; valve N sits on `valve_start_pin + N`
    pub valve_start_pin: i32,

    // --- Clock ---
    /// POSIX TZ rule applied after every successful time sync
    pub timezone: heapless::String<TIMEZONE_CAP>,

    // --- Timing ---
    pub timing: Timing,
}

/// All timing constants, in the unit their name carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// Main loop period (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Time-trigger evaluation cadence (milliseconds)
    pub job_check_interval_ms: u32,
    /// Moisture-trigger evaluation cadence (seconds)
    pub moisture_check_interval_secs: u32,
    /// Half-width of the time-of-day match window (seconds)
    pub trigger_window_secs: u32,
    /// Minimum gap between any two job starts (seconds)
    pub job_cooldown_secs: u32,
    /// Delay between opening the valve and starting the pump (milliseconds)
    pub valve_settle_ms: u32,
    /// Delay between stopping the pump and closing the valve (milliseconds)
    pub pump_settle_ms: u32,
    /// Interval between successful time syncs (seconds)
    pub ntp_resync_interval_secs: u32,
    /// Time one sync attempt may take (milliseconds)
    pub ntp_attempt_timeout_ms: u32,
    /// Sync attempts per cycle before giving up
    pub ntp_max_retries: u8,
}

/// Rule used by the moisture trigger.
///
/// `OutsideBand` is the reference behaviour: both a dry reading (at or
/// below `moisture_min`) and a saturated one (at or above `moisture_max`)
/// need attention.  `DryOnly` waters only on dry soil.  `AnyReading`
/// reproduces the legacy firmware, where an in-band reading matched too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoistureRule {
    #[default]
    OutsideBand,
    DryOnly,
    AnyReading,
}

impl MoistureRule {
    /// Whether `percent` calls for watering under this rule.
    pub fn matches(self, percent: u8, min: u8, max: u8) -> bool {
        let dry = percent <= min;
        let saturated = percent >= max;
        match self {
            Self::OutsideBand => dry || saturated,
            Self::DryOnly => dry,
            Self::AnyReading => dry || saturated || (min..=max).contains(&percent),
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            control_loop_interval_ms: 100,       // 10 Hz
            job_check_interval_ms: 1000,         // 1 Hz
            moisture_check_interval_secs: 300,   // 5 min
            trigger_window_secs: 30,
            job_cooldown_secs: 60,
            valve_settle_ms: 500,
            pump_settle_ms: 750,
            ntp_resync_interval_secs: 3600,      // 1 h
            ntp_attempt_timeout_ms: 10_000,
            ntp_max_retries: 3,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        let mut timezone = heapless::String::new();
        // Europe/Berlin; fits TIMEZONE_CAP.
        let _ = timezone.push_str("CET-1CEST,M3.5.0,M10.5.0/3");
        Self {
            use_flowsensor: false,
            use_moisturesensor: false,
            auto_enabled: false,
            moisture_rule: MoistureRule::default(),
            plant_count: 3,
            valve_start_pin: pins::VALVE_START_GPIO,
            timezone,
            timing: Timing::default(),
        }
    }
}

impl Settings {
    /// Range-check every field.  Returns a description of the first
    /// offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(1..=MAX_PLANTS).contains(&self.plant_count) {
            return Err("plant_count must be 1–8");
        }
        let last_pin = i64::from(self.valve_start_pin) + i64::from(self.plant_count) - 1;
        if self.valve_start_pin < 0 || last_pin > i64::from(pins::MAX_GPIO) {
            return Err("valve pins must lie within GPIO 0–39");
        }
        if let Some(conflict) = self.valve_pins().find_map(pins::valve_pin_conflict) {
            return Err(conflict);
        }
        if self.timezone.is_empty() {
            return Err("timezone must not be empty");
        }
        let t = &self.timing;
        if !(10..=5000).contains(&t.control_loop_interval_ms) {
            return Err("control_loop_interval_ms must be 10–5000");
        }
        if t.job_check_interval_ms == 0 || t.moisture_check_interval_secs == 0 {
            return Err("trigger check intervals must be non-zero");
        }
        if t.trigger_window_secs > 3600 {
            return Err("trigger_window_secs must be at most 3600");
        }
        if t.ntp_resync_interval_secs == 0 || t.ntp_attempt_timeout_ms == 0 {
            return Err("time sync intervals must be non-zero");
        }
        if t.ntp_max_retries == 0 {
            return Err("ntp_max_retries must be at least 1");
        }
        Ok(())
    }

    /// GPIO of every valve, in plant order.
    pub fn valve_pins(&self) -> impl Iterator<Item = i32> + '_ {
        (0..i32::from(self.plant_count)).map(|i| self.valve_start_pin.saturating_add(i))
    }
}
