//! Growbox irrigation controller library.
//!
//! Exposes the pure-logic modules for integration testing and the
//! firmware binary. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod control;
pub mod error;
pub mod fsm;
pub mod jobs;
pub mod pins;
pub mod scheduler;
pub mod time_sync;

// Hardware-facing modules; the host build runs them against simulated
// registers.
pub mod adapters;
pub mod drivers;
pub mod sensors;
