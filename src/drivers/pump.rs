//! Pump relay driver.
//!
//! A single digital output: HIGH energises the relay.  The interlock with
//! the valves lives in `control::pump`; this driver is a dumb actuator.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the GPIO via hw_init helpers.
//! On host/test: hw_init keeps the level in a simulated register.

use log::debug;

use crate::drivers::hw_init;

pub struct PumpRelay {
    gpio: i32,
    on: bool,
}

impl PumpRelay {
    pub fn new(gpio: i32) -> Self {
        hw_init::gpio_write(gpio, false);
        Self { gpio, on: false }
    }

    pub fn set(&mut self, on: bool) {
        if on != self.on {
            debug!("PUMP: relay gpio {} -> {}", self.gpio, if on { "HIGH" } else { "LOW" });
        }
        hw_init::gpio_write(self.gpio, on);
        self.on = on;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Level actually present on the pin.
    pub fn read_back(&self) -> bool {
        hw_init::gpio_read(self.gpio)
    }
}
