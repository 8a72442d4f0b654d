//! Application core: pure domain logic, zero I/O.
//!
//! Business rules of the watering rig: pump/valve interlocks, job
//! orchestration, trigger evaluation and clock sync.  All interaction
//! with hardware happens through **port traits** defined in [`ports`],
//! keeping this layer fully testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
