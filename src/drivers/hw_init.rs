//! One-shot hardware peripheral initialization and raw pin access.
//!
//! Configures the relay outputs (pump + valves) and the moisture ADC
//! channels using raw ESP-IDF sys calls.  Called once from `main()` before
//! the control loop starts, and again for the valve outputs whenever the
//! valve layout is reconfigured.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    /// Not a GPIO number on this chip.
    InvalidPin(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::InvalidPin(pin) => write!(f, "GPIO {} does not exist", pin),
        }
    }
}

impl core::error::Error for HwInitError {}

#[cfg(target_os = "espidf")]
pub fn init_peripherals(valve_pins: &[i32]) -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the control loop; single-threaded.
    unsafe {
        init_adc()?;
    }
    configure_outputs(&[pins::PUMP_GPIO])?;
    configure_outputs(valve_pins)?;
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(valve_pins: &[i32]) -> Result<(), HwInitError> {
    log::info!(
        "hw_init(sim): peripheral init skipped ({} valves)",
        valve_pins.len()
    );
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for &channel in &pins::MOISTURE_ADC_CHANNELS {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!(
        "hw_init: ADC1 configured ({} moisture channels)",
        pins::MOISTURE_ADC_CHANNELS.len()
    );
    Ok(())
}

/// 12-bit reading of an ADC1 channel.  Read errors report a dry probe.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> u16 {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 4095;
    }
    raw.clamp(0, 4095) as u16
}

// ── GPIO Outputs ──────────────────────────────────────────────

/// Configure relay outputs and drive them LOW.
fn check_pins(output_pins: &[i32]) -> Result<(), HwInitError> {
    match output_pins
        .iter()
        .find(|pin| !(0..=pins::MAX_GPIO).contains(*pin))
    {
        Some(&pin) => Err(HwInitError::InvalidPin(pin)),
        None => Ok(()),
    }
}

#[cfg(target_os = "espidf")]
pub fn configure_outputs(output_pins: &[i32]) -> Result<(), HwInitError> {
    check_pins(output_pins)?;
    for &pin in output_pins {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            // Input+output so the relay level can be read back.
            mode: gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: plain register configuration from the main task.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }
    info!("hw_init: {} relay outputs configured", output_pins.len());
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn configure_outputs(output_pins: &[i32]) -> Result<(), HwInitError> {
    check_pins(output_pins)?;
    for &pin in output_pins {
        sim::write(pin, false);
    }
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin.
    // Main-loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: read-only register access on a configured pin.
    (unsafe { gpio_get_level(pin) }) != 0
}

// ── Host simulation ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicU64, Ordering};

    /// One bit per GPIO (0..=39).
    static LEVELS: AtomicU64 = AtomicU64::new(0);

    pub fn write(pin: i32, high: bool) {
        if !(0..64).contains(&pin) {
            return;
        }
        let bit = 1u64 << pin;
        if high {
            LEVELS.fetch_or(bit, Ordering::Relaxed);
        } else {
            LEVELS.fetch_and(!bit, Ordering::Relaxed);
        }
    }

    pub fn read(pin: i32) -> bool {
        (0..64).contains(&pin) && LEVELS.load(Ordering::Relaxed) & (1u64 << pin) != 0
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    sim::write(pin, high);
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    sim::read(pin)
}
