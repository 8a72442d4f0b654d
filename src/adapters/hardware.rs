//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the moisture probes and the relay drivers, exposing them through
//! [`MoisturePort`] and [`ActuatorPort`].  This is the only module in the
//! system that touches actual hardware.  On non-espidf targets, the
//! underlying drivers use cfg-gated simulation stubs.

use log::{info, warn};

use crate::app::ports::{ActuatorError, ActuatorPort, MoisturePort};
use crate::drivers::hw_init::HwInitError;
use crate::drivers::pump::PumpRelay;
use crate::drivers::valve::ValveRelays;
use crate::sensors::{MoistureBank, MoistureReading};

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    moisture: MoistureBank,
    pump: PumpRelay,
    valves: ValveRelays,
}

impl HardwareAdapter {
    pub fn new(moisture: MoistureBank, pump: PumpRelay, valves: ValveRelays) -> Self {
        Self {
            moisture,
            pump,
            valves,
        }
    }

    pub fn pump_relay(&self) -> &PumpRelay {
        &self.pump
    }

    pub fn valve_relays(&self) -> &ValveRelays {
        &self.valves
    }
}

// ── MoisturePort implementation ───────────────────────────────

impl MoisturePort for HardwareAdapter {
    fn read_moisture(&mut self, plant_index: u8) -> Option<MoistureReading> {
        self.moisture.read(plant_index)
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_pump(&mut self, on: bool) {
        self.pump.set(on);
    }

    fn set_valve(&mut self, index: usize, open: bool) {
        self.valves.set(index, open);
    }

    fn configure_valves(&mut self, pins: &[i32]) -> Result<(), ActuatorError> {
        self.valves.configure(pins).map_err(|e| {
            warn!("VALVE: relay reconfiguration failed: {}", e);
            match e {
                HwInitError::GpioConfigFailed(code)
                | HwInitError::AdcInitFailed(code)
                | HwInitError::InvalidPin(code) => ActuatorError::RelayConfig(code),
            }
        })?;
        let plants = u8::try_from(pins.len()).unwrap_or(u8::MAX);
        self.moisture = MoistureBank::new(plants);
        info!("VALVE: {} relays configured", pins.len());
        Ok(())
    }

    fn all_off(&mut self) {
        self.pump.set(false);
        self.valves.close_all();
    }
}
