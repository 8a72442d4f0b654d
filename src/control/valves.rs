//! Valve bank: one solenoid per plant.
//!
//! Closing any valve is refused while the pump runs, so the pump never
//! pushes against a closed path.  The bank is rebuilt from scratch when
//! the plant count or pin layout changes; it is never resized in place.

use log::{info, warn};

use crate::config::MAX_PLANTS;
use crate::control::pump::PumpState;
use crate::error::ValveError;

/// Capacity of the bank.
pub const VALVE_CAP: usize = MAX_PLANTS as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveSlot {
    /// GPIO driving this valve's relay.
    pub actuator_id: i32,
    pub is_open: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ValveBank {
    slots: heapless::Vec<ValveSlot, VALVE_CAP>,
}

impl ValveBank {
    /// Build a bank with every valve closed.  Pins beyond
    /// [`VALVE_CAP`] are ignored.
    pub fn new(pins: impl IntoIterator<Item = i32>) -> Self {
        let mut slots = heapless::Vec::new();
        for actuator_id in pins {
            if slots
                .push(ValveSlot {
                    actuator_id,
                    is_open: false,
                })
                .is_err()
            {
                warn!("VALVE: more than {} valves configured, extra ignored", VALVE_CAP);
                break;
            }
        }
        Self { slots }
    }

    /// Flip one valve.  Returns the new `is_open`.
    pub fn toggle(&mut self, plant_index: usize, pump: PumpState) -> Result<bool, ValveError> {
        let open = self.slot(plant_index)?.is_open;
        if open {
            self.close(plant_index, pump)?;
        } else {
            self.open(plant_index)?;
        }
        Ok(!open)
    }

    /// Open a valve.  Opening is never refused; already open is a no-op.
    pub fn open(&mut self, plant_index: usize) -> Result<(), ValveError> {
        let slot = self.slot_mut(plant_index)?;
        if !slot.is_open {
            slot.is_open = true;
            info!("VALVE: {} open (gpio {})", plant_index, slot.actuator_id);
        }
        Ok(())
    }

    /// Close a valve unless the pump is running.
    pub fn close(&mut self, plant_index: usize, pump: PumpState) -> Result<(), ValveError> {
        if self.slot(plant_index)?.is_open && pump == PumpState::Running {
            warn!("VALVE: {} close refused, pump running", plant_index);
            return Err(ValveError::PumpRunning);
        }
        let slot = self.slot_mut(plant_index)?;
        if slot.is_open {
            slot.is_open = false;
            info!("VALVE: {} closed (gpio {})", plant_index, slot.actuator_id);
        }
        Ok(())
    }

    pub fn any_open(&self) -> bool {
        self.slots.iter().any(|s| s.is_open)
    }

    pub fn is_open(&self, plant_index: usize) -> bool {
        self.slots.get(plant_index).is_some_and(|s| s.is_open)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[ValveSlot] {
        &self.slots
    }

    /// Open/closed flag per plant.
    pub fn states(&self) -> heapless::Vec<bool, VALVE_CAP> {
        self.slots.iter().map(|s| s.is_open).collect()
    }

    fn slot(&self, plant_index: usize) -> Result<&ValveSlot, ValveError> {
        self.slots
            .get(plant_index)
            .ok_or(ValveError::InvalidIndex(plant_index))
    }

    fn slot_mut(&mut self, plant_index: usize) -> Result<&mut ValveSlot, ValveError> {
        self.slots
            .get_mut(plant_index)
            .ok_or(ValveError::InvalidIndex(plant_index))
    }
}
