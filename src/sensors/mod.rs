//! Sensor subsystem: soil moisture probes and the aggregating
//! [`MoistureBank`].
//!
//! The bank owns one probe per plant and answers the trigger evaluator's
//! per-plant reads through `MoisturePort` (see the hardware adapter).

pub mod moisture;

use log::{debug, info, warn};

use crate::pins;
use moisture::MoistureSensor;

/// Snapshot consulted by the moisture trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoistureReading {
    pub plant_index: u8,
    /// 0 = bone dry, 100 = saturated.
    pub percent: u8,
    pub is_dry: bool,
}

/// One probe per plant, in plant order.
pub struct MoistureBank {
    probes: Vec<MoistureSensor>,
}

impl MoistureBank {
    /// Build probes for the first `plant_count` ADC channels.
    pub fn new(plant_count: u8) -> Self {
        let wanted = usize::from(plant_count);
        if wanted > pins::MOISTURE_ADC_CHANNELS.len() {
            warn!(
                "SENSOR: {} plants but only {} moisture inputs",
                wanted,
                pins::MOISTURE_ADC_CHANNELS.len()
            );
        }
        let probes = pins::MOISTURE_ADC_CHANNELS
            .iter()
            .take(wanted)
            .map(|&ch| MoistureSensor::new(ch))
            .collect::<Vec<_>>();
        info!("SENSOR: {} moisture probes configured", probes.len());
        Self { probes }
    }

    /// Read one plant's probe.  `None` when the plant has no probe.
    pub fn read(&mut self, plant_index: u8) -> Option<MoistureReading> {
        let probe = self.probes.get_mut(usize::from(plant_index))?;
        let r = probe.read();
        debug!(
            "SENSOR: plant {} raw={} {}% {}",
            plant_index,
            r.raw,
            r.percent,
            if r.is_dry { "DRY" } else { "OK" }
        );
        Some(MoistureReading {
            plant_index,
            percent: r.percent,
            is_dry: r.is_dry,
        })
    }

    /// Read every probe.
    pub fn read_all(&mut self) -> Vec<MoistureReading> {
        (0..self.probes.len() as u8)
            .filter_map(|i| self.read(i))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}
