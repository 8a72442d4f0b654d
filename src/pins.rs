//! GPIO / peripheral pin assignments for the growbox controller board.
//!
//! Every driver references this module rather than hard-coding pin
//! numbers.  Valve pins are the exception: they are derived
//! from `Settings::valve_start_pin` because the plant count is configurable.

// ---------------------------------------------------------------------------
// Pump relay
// ---------------------------------------------------------------------------

/// Digital output: HIGH = pump relay energised.
pub const PUMP_GPIO: i32 = 33;

// ---------------------------------------------------------------------------
// Valve relays
// ---------------------------------------------------------------------------

/// Default GPIO of valve 0.  Valve N is wired to `VALVE_START_GPIO + N`.
pub const VALVE_START_GPIO: i32 = 25;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Capacitive soil moisture sensors on the input-only ADC1 pins.
/// Entry N serves plant N.  GPIO 32/33 are taken by valve 7 and the pump.
pub const MOISTURE_ADC_GPIOS: [i32; 4] = [36, 39, 34, 35];

/// ADC1 channel for each entry of [`MOISTURE_ADC_GPIOS`].
pub const MOISTURE_ADC_CHANNELS: [u32; 4] = [0, 3, 6, 7];

// ---------------------------------------------------------------------------
// Reserved pads
// ---------------------------------------------------------------------------

/// Highest GPIO number on the ESP32.
pub const MAX_GPIO: i32 = 39;

/// Pads without an output driver.
pub const INPUT_ONLY_GPIOS: core::ops::RangeInclusive<i32> = 34..=39;

/// Pads wired to the SPI flash.
pub const FLASH_GPIOS: core::ops::RangeInclusive<i32> = 6..=11;

/// Why `pin` cannot carry a valve relay, or `None` if it can.
pub fn valve_pin_conflict(pin: i32) -> Option<&'static str> {
    if !(0..=MAX_GPIO).contains(&pin) {
        Some("valve pins must lie within GPIO 0–39")
    } else if pin == PUMP_GPIO {
        Some("valve pins must not include the pump relay GPIO")
    } else if MOISTURE_ADC_GPIOS.contains(&pin) {
        Some("valve pins must not include a moisture sensor GPIO")
    } else if INPUT_ONLY_GPIOS.contains(&pin) {
        Some("valve pins must not include input-only GPIO 34–39")
    } else if FLASH_GPIOS.contains(&pin) {
        Some("valve pins must not include flash GPIO 6–11")
    } else {
        None
    }
}
