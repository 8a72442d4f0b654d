//! Solenoid valve relay bank driver.
//!
//! One digital output per valve, HIGH = open.  Rebuilt through
//! [`ValveRelays::configure`] whenever the valve layout changes.

use log::{debug, warn};

use crate::drivers::hw_init::{self, HwInitError};

#[derive(Default)]
pub struct ValveRelays {
    gpios: Vec<i32>,
}

impl ValveRelays {
    pub fn new(gpios: &[i32]) -> Result<Self, HwInitError> {
        let mut relays = Self::default();
        relays.configure(gpios)?;
        Ok(relays)
    }

    /// Drop every old output LOW and take over `gpios`.
    pub fn configure(&mut self, gpios: &[i32]) -> Result<(), HwInitError> {
        for &pin in &self.gpios {
            hw_init::gpio_write(pin, false);
        }
        hw_init::configure_outputs(gpios)?;
        self.gpios = gpios.to_vec();
        Ok(())
    }

    pub fn set(&mut self, index: usize, open: bool) {
        match self.gpios.get(index) {
            Some(&pin) => {
                debug!("VALVE: relay {} gpio {} -> {}", index, pin, u8::from(open));
                hw_init::gpio_write(pin, open);
            }
            None => warn!("VALVE: no relay for index {}", index),
        }
    }

    pub fn close_all(&mut self) {
        for &pin in &self.gpios {
            hw_init::gpio_write(pin, false);
        }
    }

    pub fn len(&self) -> usize {
        self.gpios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gpios.is_empty()
    }

    pub fn is_open(&self, index: usize) -> bool {
        self.gpios.get(index).is_some_and(|&pin| hw_init::gpio_read(pin))
    }
}
