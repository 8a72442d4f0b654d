//! Capacitive soil moisture sensor driver.
//!
//! Reads a 12-bit ADC1 channel and maps it linearly onto a percentage:
//! a dry probe reads high (4095 → 0 %), a wet one low (0 → 100 %).
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads ADC1 via the oneshot API (initialised by hw_init).
//! On host/test: reads from a static `AtomicU16` per channel for injection.

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

/// Raw reading of a probe in dry air.
pub const DRY_ANALOG: u16 = 4095;
/// Raw reading of a probe in water.
pub const WET_ANALOG: u16 = 0;
/// Readings below this percentage are flagged dry.
pub const DRY_THRESHOLD_PERCENT: u8 = 20;

#[cfg(not(target_os = "espidf"))]
mod sim {
    use core::sync::atomic::{AtomicU16, Ordering};

    static SIM_MOISTURE_ADC: [AtomicU16; 10] = [const { AtomicU16::new(super::DRY_ANALOG) }; 10];

    pub fn set(channel: u32, raw: u16) {
        if let Some(slot) = SIM_MOISTURE_ADC.get(channel as usize) {
            slot.store(raw, Ordering::Relaxed);
        }
    }

    pub fn get(channel: u32) -> u16 {
        SIM_MOISTURE_ADC
            .get(channel as usize)
            .map_or(super::DRY_ANALOG, |slot| slot.load(Ordering::Relaxed))
    }
}

/// Inject a raw ADC value for `channel` (host builds only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_moisture_adc(channel: u32, raw: u16) {
    sim::set(channel, raw);
}

/// Map a raw reading onto 0..=100 %.
pub fn map_to_percent(raw: u16) -> u8 {
    let raw = raw.clamp(WET_ANALOG, DRY_ANALOG);
    let span = u32::from(DRY_ANALOG - WET_ANALOG);
    let wetness = u32::from(DRY_ANALOG - raw);
    (wetness * 100 / span) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReading {
    pub raw: u16,
    pub percent: u8,
    pub is_dry: bool,
}

pub struct MoistureSensor {
    adc_channel: u32,
    last: Option<ProbeReading>,
}

impl MoistureSensor {
    pub fn new(adc_channel: u32) -> Self {
        Self {
            adc_channel,
            last: None,
        }
    }

    pub fn read(&mut self) -> ProbeReading {
        let raw = self.read_adc();
        let percent = map_to_percent(raw);
        let reading = ProbeReading {
            raw,
            percent,
            is_dry: percent < DRY_THRESHOLD_PERCENT,
        };
        self.last = Some(reading);
        reading
    }

    pub fn last(&self) -> Option<ProbeReading> {
        self.last
    }

    pub fn adc_channel(&self) -> u32 {
        self.adc_channel
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> u16 {
        hw_init::adc1_read(self.adc_channel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> u16 {
        sim::get(self.adc_channel)
    }
}
